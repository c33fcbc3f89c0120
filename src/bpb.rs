//! BPB / boot sector geometry.
//!
//! Every region of the disk (FAT copies, root directory, data clusters) is
//! derived from a [`Geometry`] instead of hard-coded sector numbers.

use crate::device::SECTOR_SIZE;
use crate::error::{Error, Result};
use crate::fat::{CLUSTER_MAX, FIRST_CLUSTER};

/// Size of one directory record.
pub const DIR_ENTRY_SIZE: usize = 32;

/// Clusters above this count are not FAT12.
const FAT12_MAX_CLUSTERS: usize = 4084;

/// Parsed BPB (BIOS Parameter Block) fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes per sector (always 512 here).
    pub bytes_per_sector: u16,
    /// Sectors per allocation cluster.
    pub sectors_per_cluster: u8,
    /// Reserved sectors before the first FAT.
    pub reserved_sectors: u16,
    /// Number of FAT copies.
    pub num_fats: u8,
    /// Root directory capacity in entries.
    pub root_entries: u16,
    /// Total sectors on the medium.
    pub total_sectors: u16,
    /// Media descriptor byte, also stored in FAT entry 0.
    pub media: u8,
    /// Sectors per FAT copy.
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub sides: u16,
}

fn le_u16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

impl Geometry {
    /// Double sided, 80 tracks, 9 sectors per track: 720 KB.
    pub const FLOPPY_720K: Geometry = Geometry {
        bytes_per_sector: 512,
        sectors_per_cluster: 2,
        reserved_sectors: 1,
        num_fats: 2,
        root_entries: 112,
        total_sectors: 1440,
        media: 0xF9,
        sectors_per_fat: 5,
        sectors_per_track: 9,
        sides: 2,
    };

    /// Parse and validate the BPB held in a boot sector.
    pub fn parse(boot: &[u8]) -> Result<Self> {
        if boot.len() < SECTOR_SIZE {
            return Err(Error::InvalidBpb("boot sector too short"));
        }

        let geometry = Self {
            bytes_per_sector: le_u16(&boot[0x0B..0x0D]),
            sectors_per_cluster: boot[0x0D],
            reserved_sectors: le_u16(&boot[0x0E..0x10]),
            num_fats: boot[0x10],
            root_entries: le_u16(&boot[0x11..0x13]),
            total_sectors: le_u16(&boot[0x13..0x15]),
            media: boot[0x15],
            sectors_per_fat: le_u16(&boot[0x16..0x18]),
            sectors_per_track: le_u16(&boot[0x18..0x1A]),
            sides: le_u16(&boot[0x1A..0x1C]),
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check the fields every layout calculation depends on.
    pub fn validate(&self) -> Result<()> {
        if self.bytes_per_sector as usize != SECTOR_SIZE {
            return Err(Error::InvalidBpb("bytes per sector must be 512"));
        }
        let spc = self.sectors_per_cluster;
        if spc == 0 || (spc & (spc - 1)) != 0 {
            return Err(Error::InvalidBpb("sectors per cluster must be a power of two"));
        }
        if self.reserved_sectors == 0 || self.num_fats == 0 || self.sectors_per_fat == 0 {
            return Err(Error::InvalidBpb("missing reserved or FAT sectors"));
        }
        if self.root_entries == 0 || (self.root_entries as usize * DIR_ENTRY_SIZE) % SECTOR_SIZE != 0 {
            return Err(Error::InvalidBpb("root directory must fill whole sectors"));
        }
        if self.total_sectors as usize <= self.data_start() {
            return Err(Error::InvalidBpb("no data region"));
        }
        let clusters = self.cluster_count();
        if clusters > FAT12_MAX_CLUSTERS {
            return Err(Error::InvalidBpb("too many clusters for FAT12"));
        }
        if self.fat_capacity() < clusters + FIRST_CLUSTER as usize {
            return Err(Error::InvalidBpb("FAT too small for the data region"));
        }
        Ok(())
    }

    /// Store the BPB fields into a boot sector. Other bytes are left alone.
    pub fn write(&self, boot: &mut [u8]) {
        boot[0x0B..0x0D].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        boot[0x0D] = self.sectors_per_cluster;
        boot[0x0E..0x10].copy_from_slice(&self.reserved_sectors.to_le_bytes());
        boot[0x10] = self.num_fats;
        boot[0x11..0x13].copy_from_slice(&self.root_entries.to_le_bytes());
        boot[0x13..0x15].copy_from_slice(&self.total_sectors.to_le_bytes());
        boot[0x15] = self.media;
        boot[0x16..0x18].copy_from_slice(&self.sectors_per_fat.to_le_bytes());
        boot[0x18..0x1A].copy_from_slice(&self.sectors_per_track.to_le_bytes());
        boot[0x1A..0x1C].copy_from_slice(&self.sides.to_le_bytes());
    }

    /// Image size in bytes.
    pub fn total_bytes(&self) -> usize {
        self.total_sectors as usize * SECTOR_SIZE
    }

    /// First sector of FAT copy #0.
    pub fn fat_start(&self) -> usize {
        self.reserved_sectors as usize
    }

    pub fn root_dir_start(&self) -> usize {
        self.fat_start() + self.num_fats as usize * self.sectors_per_fat as usize
    }

    pub fn root_dir_sectors(&self) -> usize {
        (self.root_entries as usize * DIR_ENTRY_SIZE).div_ceil(SECTOR_SIZE)
    }

    /// First sector of cluster 2.
    pub fn data_start(&self) -> usize {
        self.root_dir_start() + self.root_dir_sectors()
    }

    pub fn cluster_bytes(&self) -> usize {
        self.sectors_per_cluster as usize * SECTOR_SIZE
    }

    /// Number of whole clusters in the data region.
    pub fn cluster_count(&self) -> usize {
        (self.total_sectors as usize).saturating_sub(self.data_start()) / self.sectors_per_cluster as usize
    }

    /// Entries one FAT copy can hold.
    fn fat_capacity(&self) -> usize {
        self.sectors_per_fat as usize * SECTOR_SIZE * 2 / 3
    }

    /// Highest cluster the allocator may hand out.
    pub fn last_cluster(&self) -> u16 {
        let data_last = self.cluster_count() + FIRST_CLUSTER as usize - 1;
        data_last.min(CLUSTER_MAX as usize) as u16
    }

    /// First sector of `cluster`.
    pub fn cluster_to_sector(&self, cluster: u16) -> usize {
        self.data_start() + (cluster as usize - FIRST_CLUSTER as usize) * self.sectors_per_cluster as usize
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::FLOPPY_720K
    }
}
