//! In-memory floppy disk image.

use alloc::vec;
use alloc::vec::Vec;

use crate::bpb::Geometry;
use crate::device::{sector_range, BlockDevice, SECTOR_SIZE};
use crate::error::{Error, Result};
use crate::fat;

/// Size of a 720 KB image (80 tracks, 2 sides, 9 sectors of 512 bytes).
pub const DEFAULT_720K_SIZE: usize = 737_280;

/// Fill byte of a freshly formatted floppy.
pub const FORMAT_FILL: u8 = 0xE5;

/// Word sum the boot ROM expects over sector 0 of a bootable disk.
pub const BOOT_CHECKSUM: u16 = 0x1234;

/// The whole medium as one byte buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct DiskImage {
    data: Vec<u8>,
}

impl DiskImage {
    /// `size` bytes, all set to the format fill byte.
    pub fn create_blank(size: usize) -> Self {
        Self {
            data: vec![FORMAT_FILL; size],
        }
    }

    /// Wrap bytes that are already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// A blank image with an empty FAT12 filesystem laid out per `geometry`.
    ///
    /// Sector 0 gets the BPB and the boot checksum, every FAT copy starts
    /// with the media descriptor and is otherwise free, and the root
    /// directory is zeroed so listing stops at its first slot. A geometry
    /// that fails [`Geometry::validate`] is rejected before anything is built.
    pub fn format(geometry: &Geometry) -> Result<Self> {
        geometry.validate()?;
        let mut image = Self::create_blank(geometry.total_bytes());

        let boot = image.sector_mut(0).ok_or(Error::SectorOutOfRange { index: 0 })?;
        geometry.write(boot);

        for copy in 0..geometry.num_fats as usize {
            let start = geometry.fat_start() + copy * geometry.sectors_per_fat as usize;
            let table = image
                .sectors_mut(start, geometry.sectors_per_fat as usize)
                .ok_or(Error::SectorOutOfRange { index: start })?;
            table.fill(0);
            fat::write_entry(table, 0, 0xF00 | geometry.media as u16)?;
            fat::write_entry(table, 1, fat::EOC)?;
        }

        let root = geometry.root_dir_start();
        image
            .sectors_mut(root, geometry.root_dir_sectors())
            .ok_or(Error::SectorOutOfRange { index: root })?
            .fill(0);

        image.apply_checksum();
        log::debug!(
            "formatted {} byte image, {} clusters of {} bytes",
            geometry.total_bytes(),
            geometry.cluster_count(),
            geometry.cluster_bytes()
        );
        Ok(image)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Big-endian word sum of the first `len` bytes of sector 0.
    fn boot_word_sum(&self, len: usize) -> u16 {
        self.data[..len]
            .chunks_exact(2)
            .fold(0u16, |sum, w| sum.wrapping_add(u16::from_be_bytes([w[0], w[1]])))
    }

    /// Make sector 0 sum to [`BOOT_CHECKSUM`] by rewriting its last word.
    ///
    /// Does nothing when the image is smaller than one sector.
    pub fn apply_checksum(&mut self) {
        if self.data.len() < SECTOR_SIZE {
            return;
        }
        let sum = self.boot_word_sum(SECTOR_SIZE - 2);
        let fix = BOOT_CHECKSUM.wrapping_sub(sum);
        self.data[SECTOR_SIZE - 2..SECTOR_SIZE].copy_from_slice(&fix.to_be_bytes());
    }

    /// Whether sector 0 carries a valid boot checksum.
    pub fn verify_checksum(&self) -> bool {
        if self.data.len() < SECTOR_SIZE {
            return false;
        }
        self.boot_word_sum(SECTOR_SIZE) == BOOT_CHECKSUM
    }
}

#[cfg(feature = "std")]
impl DiskImage {
    /// Read a whole image from a file, sized to the file.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let image = Self::read_from(file)?;
        log::debug!("loaded {} bytes from {}", image.len(), path.display());
        Ok(image)
    }

    /// Write the whole image to a file, replacing its contents.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        log::debug!("saved {} bytes to {}", self.len(), path.display());
        Ok(())
    }

    /// Read until end of stream.
    pub fn read_from<R: std::io::Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self { data })
    }

    pub fn write_to<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.data)?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for DiskImage {
    fn default() -> Self {
        Self::create_blank(DEFAULT_720K_SIZE)
    }
}

impl core::fmt::Debug for DiskImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DiskImage")
            .field("len", &self.data.len())
            .field("sectors", &self.sector_count())
            .finish()
    }
}

impl BlockDevice for DiskImage {
    fn sector_count(&self) -> usize {
        self.data.len() / SECTOR_SIZE
    }

    fn sectors(&self, start: usize, count: usize) -> Option<&[u8]> {
        let range = sector_range(self.data.len(), start, count)?;
        Some(&self.data[range])
    }

    fn sectors_mut(&mut self, start: usize, count: usize) -> Option<&mut [u8]> {
        let range = sector_range(self.data.len(), start, count)?;
        Some(&mut self.data[range])
    }
}
