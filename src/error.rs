//! Errors for the FAT12 library.

use thiserror::Error;

/// Result alias used by this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors returned by the disk image and the filesystem driver.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading the source or writing the destination failed.
    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested sector range lies past the end of the image.
    #[error("sector {index} is outside the disk image")]
    SectorOutOfRange { index: usize },

    /// The FAT view does not contain the entry for this cluster.
    #[error("cluster {cluster} has no entry in the allocation table")]
    FatOutOfRange { cluster: u16 },

    /// Sector 0 does not describe a usable FAT12 layout.
    #[error("invalid BPB: {0}")]
    InvalidBpb(&'static str),

    /// No free slot in the root directory.
    #[error("root directory is full")]
    DirectoryFull,

    /// Not enough free clusters for the payload.
    #[error("not enough free clusters")]
    NoSpace,

    /// The requested file was not found.
    #[error("file not found")]
    NotFound,

    /// The name cannot be stored as an 8.3 short name.
    #[error("invalid 8.3 file name")]
    InvalidName,

    /// The payload does not fit the 32-bit size field.
    #[error("file of {len} bytes is too large")]
    FileTooLarge { len: usize },

    /// The FAT chain ended or looped before the declared size was read.
    #[error("cluster chain broken at cluster {cluster}")]
    BrokenChain { cluster: u16 },
}
