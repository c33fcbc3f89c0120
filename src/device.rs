//! Block device abstraction.
//!
//! The filesystem layers work on 512-byte sectors borrowed straight out of the
//! backing store. A request that does not fit yields `None`, never a short or
//! panicking slice.

/// Size of one sector in bytes.
pub const SECTOR_SIZE: usize = 512;

/// A sector-addressed store that lends out views instead of copying.
///
/// [`DiskImage`](crate::DiskImage) is the implementation used by the driver.
pub trait BlockDevice {
    /// Number of whole sectors in the store.
    fn sector_count(&self) -> usize;

    /// View over `count` consecutive sectors starting at `start`.
    fn sectors(&self, start: usize, count: usize) -> Option<&[u8]>;

    /// Mutable view over `count` consecutive sectors starting at `start`.
    fn sectors_mut(&mut self, start: usize, count: usize) -> Option<&mut [u8]>;

    /// View over one sector, `None` when it lies past the end.
    fn sector(&self, index: usize) -> Option<&[u8]> {
        self.sectors(index, 1)
    }

    /// Mutable view over one sector, `None` when it lies past the end.
    fn sector_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.sectors_mut(index, 1)
    }
}

/// Byte range covered by `count` sectors from `start`, if it fits in `len`.
pub(crate) fn sector_range(len: usize, start: usize, count: usize) -> Option<core::ops::Range<usize>> {
    let begin = start.checked_mul(SECTOR_SIZE)?;
    let end = begin.checked_add(count.checked_mul(SECTOR_SIZE)?)?;
    if end > len {
        return None;
    }
    Some(begin..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_must_fit() {
        assert_eq!(sector_range(1024, 0, 2), Some(0..1024));
        assert_eq!(sector_range(1024, 1, 1), Some(512..1024));
        assert_eq!(sector_range(1024, 2, 1), None);
        assert_eq!(sector_range(1000, 1, 1), None);
        assert_eq!(sector_range(1024, usize::MAX, 1), None);
    }
}
