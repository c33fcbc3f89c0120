//! A disk image that several threads can operate on in turn.
//!
//! Directory, FAT and data sectors are updated in several steps, so the lock
//! is held for a whole driver operation, never for a single sector.

use spin::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::fs::Fat12;
use crate::image::DiskImage;

pub struct SharedImage {
    disk: Mutex<DiskImage>,
    config: Config,
}

impl SharedImage {
    pub fn new(disk: DiskImage) -> Self {
        Self::with_config(disk, Config::default())
    }

    pub fn with_config(disk: DiskImage, config: Config) -> Self {
        Self {
            disk: Mutex::new(disk),
            config,
        }
    }

    /// Run `op` with a driver that has the image to itself.
    pub fn with_fs<R>(&self, op: impl FnOnce(&mut Fat12<'_, DiskImage>) -> Result<R>) -> Result<R> {
        let mut disk = self.disk.lock();
        let mut fs = Fat12::with_config(&mut *disk, self.config);
        op(&mut fs)
    }

    /// Run `op` on the raw image, e.g. to save it.
    pub fn with_image<R>(&self, op: impl FnOnce(&mut DiskImage) -> R) -> R {
        op(&mut *self.disk.lock())
    }

    pub fn into_inner(self) -> DiskImage {
        self.disk.into_inner()
    }
}
