//! FAT table helpers (FAT12).
//!
//! Two 12-bit entries share three bytes. For an even cluster the entry is the
//! first byte plus the low nibble of the second; for an odd cluster it is the
//! high nibble of the first byte plus the whole second byte.

use alloc::vec::Vec;

use crate::error::{Error, Result};

/// First cluster that can hold data. Entries 0 and 1 carry the media byte.
pub const FIRST_CLUSTER: u16 = 2;
/// Highest cluster index the allocator will ever consider.
pub const CLUSTER_MAX: u16 = 1439;

/// Unallocated cluster.
pub const FREE: u16 = 0x000;
/// Bad cluster marker.
pub const BAD: u16 = 0xFF7;
/// End-of-chain value written by this crate.
pub const EOC: u16 = 0xFFF;

/// Decoded meaning of a FAT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    /// Next cluster of the chain.
    Next(u16),
    /// 0x001 or 0xFF0..=0xFF6.
    Reserved(u16),
    Bad,
    EndOfChain,
}

impl FatEntry {
    pub fn from_raw(value: u16) -> Self {
        match value & 0x0FFF {
            FREE => FatEntry::Free,
            v @ 0x002..=0xFEF => FatEntry::Next(v),
            BAD => FatEntry::Bad,
            0xFF8..=0xFFF => FatEntry::EndOfChain,
            v => FatEntry::Reserved(v),
        }
    }
}

fn entry_offset(fat: &[u8], cluster: u16) -> Result<usize> {
    let off = cluster as usize * 3 / 2;
    if off + 1 >= fat.len() {
        return Err(Error::FatOutOfRange { cluster });
    }
    Ok(off)
}

/// Read the raw 12-bit entry for `cluster`.
pub fn read_entry(fat: &[u8], cluster: u16) -> Result<u16> {
    let off = entry_offset(fat, cluster)?;
    let (lo, hi) = (fat[off] as u16, fat[off + 1] as u16);
    let value = if cluster % 2 == 0 {
        lo | ((hi & 0x0F) << 8)
    } else {
        (lo >> 4) | (hi << 4)
    };
    Ok(value)
}

/// Write the 12-bit entry for `cluster`, keeping the neighbour's nibble.
pub fn write_entry(fat: &mut [u8], cluster: u16, value: u16) -> Result<()> {
    let off = entry_offset(fat, cluster)?;
    if cluster % 2 == 0 {
        fat[off] = (value & 0xFF) as u8;
        fat[off + 1] = (fat[off + 1] & 0xF0) | ((value >> 8) & 0x0F) as u8;
    } else {
        fat[off] = (fat[off] & 0x0F) | ((value << 4) & 0xF0) as u8;
        fat[off + 1] = ((value >> 4) & 0xFF) as u8;
    }
    Ok(())
}

/// First free cluster in `FIRST_CLUSTER..=last`.
pub fn find_free_cluster(fat: &[u8], last: u16) -> Result<Option<u16>> {
    find_free_from(fat, FIRST_CLUSTER, last)
}

fn find_free_from(fat: &[u8], start: u16, last: u16) -> Result<Option<u16>> {
    for c in start.max(FIRST_CLUSTER)..=last {
        if read_entry(fat, c)? == FREE {
            return Ok(Some(c));
        }
    }
    Ok(None)
}

/// The first `count` free clusters in ascending order, without marking them.
///
/// This is the same sequence repeated `find_free_cluster` calls produce when
/// each result is marked used before the next search.
pub fn first_free(fat: &[u8], last: u16, count: usize) -> Result<Vec<u16>> {
    let mut out = Vec::with_capacity(count);
    let mut next = FIRST_CLUSTER;
    while out.len() < count {
        match find_free_from(fat, next, last)? {
            Some(c) => {
                out.push(c);
                next = c + 1;
            }
            None => return Err(Error::NoSpace),
        }
    }
    Ok(out)
}

/// Number of free clusters in `FIRST_CLUSTER..=last`.
pub fn count_free(fat: &[u8], last: u16) -> Result<usize> {
    let mut n = 0;
    for c in FIRST_CLUSTER..=last {
        if read_entry(fat, c)? == FREE {
            n += 1;
        }
    }
    Ok(n)
}
