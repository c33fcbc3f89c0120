//! FAT12 high-level filesystem API.

use alloc::vec;
use alloc::vec::Vec;

use crate::bpb::Geometry;
use crate::config::Config;
use crate::device::{BlockDevice, SECTOR_SIZE};
use crate::dir::{self, DirEntry, NameMode};
use crate::error::{Error, Result};
use crate::fat::{self, FatEntry, FIRST_CLUSTER};

/// FAT12 driver bound to a borrowed device.
///
/// Every operation runs to completion against the device before returning;
/// the borrow keeps anything else from touching the image meanwhile.
pub struct Fat12<'a, D: BlockDevice> {
    dev: &'a mut D,
    config: Config,
}

impl<'a, D: BlockDevice> Fat12<'a, D> {
    /// Driver using the 720 KB layout and lenient names.
    pub fn new(dev: &'a mut D) -> Self {
        Self::with_config(dev, Config::default())
    }

    pub fn with_config(dev: &'a mut D, config: Config) -> Self {
        Self { dev, config }
    }

    /// Driver whose geometry comes from the BPB in sector 0.
    pub fn mount(dev: &'a mut D) -> Result<Self> {
        Self::mount_with(dev, Config::default())
    }

    /// Like [`mount`](Self::mount), keeping every option of `config` except
    /// the geometry, which is read from the BPB.
    pub fn mount_with(dev: &'a mut D, config: Config) -> Result<Self> {
        let boot = dev.sector(0).ok_or(Error::SectorOutOfRange { index: 0 })?;
        let geometry = Geometry::parse(boot)?;
        if dev.sector_count() < geometry.total_sectors as usize {
            log::warn!(
                "image holds {} sectors but the BPB declares {}",
                dev.sector_count(),
                geometry.total_sectors
            );
        }
        log::debug!(
            "mounted FAT12: {} clusters of {} bytes, data at sector {}",
            geometry.cluster_count(),
            geometry.cluster_bytes(),
            geometry.data_start()
        );
        Ok(Self::with_config(dev, config.with_geometry(geometry)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn geometry(&self) -> &Geometry {
        &self.config.geometry
    }

    // Geometry the cluster arithmetic can rely on.
    fn layout(&self) -> Result<Geometry> {
        self.config.geometry.validate()?;
        Ok(self.config.geometry)
    }

    fn fat(&self) -> Result<&[u8]> {
        let g = &self.config.geometry;
        self.dev
            .sectors(g.fat_start(), g.sectors_per_fat as usize)
            .ok_or(Error::SectorOutOfRange { index: g.fat_start() })
    }

    // Only the first FAT copy is maintained.
    fn fat_mut(&mut self) -> Result<&mut [u8]> {
        let g = self.config.geometry;
        self.dev
            .sectors_mut(g.fat_start(), g.sectors_per_fat as usize)
            .ok_or(Error::SectorOutOfRange { index: g.fat_start() })
    }

    /// Files in the root directory, in on-disk order.
    pub fn list_root_directory(&self) -> Result<Vec<DirEntry>> {
        dir::list(&*self.dev, &self.config.geometry)
    }

    /// Number of unallocated clusters.
    pub fn free_clusters(&self) -> Result<usize> {
        let g = self.layout()?;
        fat::count_free(self.fat()?, g.last_cluster())
    }

    pub fn free_bytes(&self) -> Result<usize> {
        Ok(self.free_clusters()? * self.layout()?.cluster_bytes())
    }

    /// Store `data` as a new root directory file called `name`.
    ///
    /// The directory slot and the whole cluster chain are reserved before the
    /// first byte is written, so on error the image is left as it was.
    pub fn inject_bytes(&mut self, data: &[u8], name: &str) -> Result<()> {
        let size = u32::try_from(data.len()).map_err(|_| Error::FileTooLarge { len: data.len() })?;
        let raw_name = dir::short_name(name, self.config.name_mode)?;
        let g = self.layout()?;
        let spc = g.sectors_per_cluster as usize;

        let slot = dir::find_free_slot(&*self.dev, &g)?;
        if let Some(t) = slot.terminator(&g) {
            self.dev.sector(t.sector).ok_or(Error::SectorOutOfRange { index: t.sector })?;
        }
        let needed = data.len().div_ceil(g.cluster_bytes());
        let chain = fat::first_free(self.fat()?, g.last_cluster(), needed)?;
        if let Some(&last) = chain.last() {
            let start = g.cluster_to_sector(last);
            if self.dev.sectors(start, spc).is_none() {
                return Err(Error::SectorOutOfRange { index: start + spc - 1 });
            }
        }

        let mut remaining = data;
        for (i, &cluster) in chain.iter().enumerate() {
            // provisional end of chain until the successor is known
            fat::write_entry(self.fat_mut()?, cluster, fat::EOC)?;

            let first = g.cluster_to_sector(cluster);
            for s in first..first + spc {
                if remaining.is_empty() {
                    break;
                }
                let take = remaining.len().min(SECTOR_SIZE);
                let sector = self.dev.sector_mut(s).ok_or(Error::SectorOutOfRange { index: s })?;
                sector[..take].copy_from_slice(&remaining[..take]);
                sector[take..].fill(0);
                remaining = &remaining[take..];
            }

            if let Some(&next) = chain.get(i + 1) {
                fat::write_entry(self.fat_mut()?, cluster, next)?;
            }
            log::trace!("{}: cluster {} -> {:?}", name, cluster, chain.get(i + 1));
        }

        // An empty file owns no clusters.
        let first_cluster = chain.first().copied().unwrap_or(0);
        dir::write_entry(&mut *self.dev, &g, slot, &raw_name, first_cluster, size)?;
        log::debug!(
            "injected {} ({} bytes, {} clusters from {}) at sector {} offset {}",
            name,
            size,
            chain.len(),
            first_cluster,
            slot.sector,
            slot.offset
        );
        Ok(())
    }

    // Matched on the 8.3 form, so any name inject accepted finds its file.
    fn lookup(&self, name: &str) -> Result<DirEntry> {
        let raw_name = dir::short_name(name, NameMode::Lenient).map_err(|_| Error::NotFound)?;
        self.list_root_directory()?
            .into_iter()
            .find(|e| e.raw_name == raw_name)
            .ok_or(Error::NotFound)
    }

    /// Contents of the first root directory file named `name`.
    ///
    /// Reading stops once the size recorded in the directory is consumed; the
    /// chain must supply a cluster for every byte of it and visit no cluster
    /// twice.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let g = self.layout()?;
        let entry = self.lookup(name)?;
        let mut remaining = entry.file_size as usize;
        let mut data = Vec::with_capacity(remaining);
        if remaining == 0 {
            return Ok(data);
        }

        let table = self.fat()?;
        let highest = g.cluster_count() + FIRST_CLUSTER as usize - 1;
        let mut cluster = entry.first_cluster;
        let mut seen = vec![false; g.cluster_count()];

        loop {
            if cluster < FIRST_CLUSTER || cluster as usize > highest {
                return Err(Error::BrokenChain { cluster });
            }
            let visited = &mut seen[(cluster - FIRST_CLUSTER) as usize];
            if *visited {
                return Err(Error::BrokenChain { cluster });
            }
            *visited = true;

            let first = g.cluster_to_sector(cluster);
            for s in first..first + g.sectors_per_cluster as usize {
                if remaining == 0 {
                    break;
                }
                let buf = self.dev.sector(s).ok_or(Error::SectorOutOfRange { index: s })?;
                let take = remaining.min(SECTOR_SIZE);
                data.extend_from_slice(&buf[..take]);
                remaining -= take;
            }

            let next = FatEntry::from_raw(fat::read_entry(table, cluster)?);
            log::trace!("{}: cluster {} -> {:?}", name, cluster, next);
            if remaining == 0 {
                if next != FatEntry::EndOfChain {
                    log::warn!("{}: chain continues past its size at cluster {} ({:?})", name, cluster, next);
                }
                break;
            }
            match next {
                FatEntry::Next(n) => cluster = n,
                _ => return Err(Error::BrokenChain { cluster }),
            }
        }

        Ok(data)
    }
}

#[cfg(feature = "std")]
impl<D: BlockDevice> Fat12<'_, D> {
    /// Inject the host file at `source` as `name`.
    pub fn inject<P: AsRef<std::path::Path>>(&mut self, source: P, name: &str) -> Result<()> {
        let data = std::fs::read(source.as_ref())?;
        self.inject_bytes(&data, name)
    }

    /// Copy `name` out of the image into the host file `dest`.
    ///
    /// `dest` is only created once the whole file has been read, so a failed
    /// lookup leaves it untouched.
    pub fn extract<P: AsRef<std::path::Path>>(&self, name: &str, dest: P) -> Result<()> {
        let data = self.read_file(name)?;
        std::fs::write(dest.as_ref(), &data)?;
        log::debug!("extracted {} ({} bytes) to {}", name, data.len(), dest.as_ref().display());
        Ok(())
    }
}
