//! Driver options.

use crate::bpb::Geometry;
use crate::dir::NameMode;

/// Options for a [`Fat12`](crate::Fat12) driver.
///
/// The default is the 720 KB floppy layout with lenient 8.3 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    /// Disk layout; replaced by the BPB when the driver is mounted.
    pub geometry: Geometry,
    /// How file names are converted to 8.3 form on inject.
    pub name_mode: NameMode,
}

impl Config {
    pub fn with_name_mode(mut self, name_mode: NameMode) -> Self {
        self.name_mode = name_mode;
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }
}
