//! FAT12 access to 720 KB Atari ST floppy images.
//!
//! A [`DiskImage`] holds the raw medium and knows about sectors and the boot
//! checksum; [`Fat12`] borrows it to list, inject and extract root directory
//! files.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bpb;
pub mod config;
pub mod device;
pub mod dir;
pub mod error;
pub mod fat;
pub mod fs;
pub mod image;
pub mod shared;

pub use crate::bpb::Geometry;
pub use crate::config::Config;
pub use crate::device::{BlockDevice, SECTOR_SIZE};
pub use crate::dir::{DirEntry, NameMode};
pub use crate::error::{Error, Result};
pub use crate::fs::Fat12;
pub use crate::image::{DiskImage, DEFAULT_720K_SIZE};
pub use crate::shared::SharedImage;
