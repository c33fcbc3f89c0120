//! Root directory parsing and editing (8.3 names only).

use alloc::string::String;
use alloc::vec::Vec;

use crate::bpb::{Geometry, DIR_ENTRY_SIZE};
use crate::device::{BlockDevice, SECTOR_SIZE};
use crate::error::{Error, Result};

/// Attribute of a plain file.
pub const ATTR_NORMAL: u8 = 0x00;
/// Volume label attribute bit. Long-name records carry it too.
pub const ATTR_VOLUME_ID: u8 = 0x08;

const END_OF_DIR: u8 = 0x00;
const DELETED: u8 = 0xE5;
// Stand-in for a name whose first byte really is 0xE5.
const E5_ESCAPE: u8 = 0x05;

/// How names handed to the driver are turned into 8.3 form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameMode {
    /// Upper-case and silently truncate to 8.3.
    #[default]
    Lenient,
    /// Reject anything that is not already a legal 8.3 name.
    Strict,
}

/// A file record from the root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 11 bytes name (8 + 3) as stored on disk.
    pub raw_name: [u8; 11],
    pub attr: u8,
    pub first_cluster: u16,
    pub file_size: u32,
}

/// What one 32-byte slot holds.
#[derive(Debug)]
enum Slot {
    End,
    Deleted,
    VolumeLabel,
    File(DirEntry),
}

fn le_u16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}
fn le_u32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

impl DirEntry {
    fn parse(rec: &[u8]) -> Slot {
        match rec[0] {
            END_OF_DIR => return Slot::End,
            DELETED => return Slot::Deleted,
            _ => {}
        }
        let attr = rec[11];
        if attr & ATTR_VOLUME_ID != 0 {
            return Slot::VolumeLabel;
        }

        let mut raw_name = [0u8; 11];
        raw_name.copy_from_slice(&rec[0..11]);
        Slot::File(Self {
            raw_name,
            attr,
            first_cluster: le_u16(&rec[26..28]),
            file_size: le_u32(&rec[28..32]),
        })
    }

    /// Build the 32-byte record of a plain file.
    pub fn encode(raw_name: &[u8; 11], first_cluster: u16, file_size: u32) -> [u8; 32] {
        let mut rec = [0u8; DIR_ENTRY_SIZE];
        rec[0..11].copy_from_slice(raw_name);
        rec[11] = ATTR_NORMAL;
        rec[26..28].copy_from_slice(&first_cluster.to_le_bytes());
        rec[28..32].copy_from_slice(&file_size.to_le_bytes());
        rec
    }

    /// `NAME.EXT`, or just `NAME` when the extension is blank.
    pub fn name(&self) -> String {
        let mut raw = self.raw_name;
        if raw[0] == E5_ESCAPE {
            raw[0] = DELETED;
        }
        // Bytes map 1:1 onto Latin-1 so nothing is lost for non-ASCII names.
        let base: String = raw[..8].iter().map(|&b| b as char).collect();
        let ext: String = raw[8..].iter().map(|&b| b as char).collect();
        let (base, ext) = (base.trim_end_matches(' '), ext.trim_end_matches(' '));
        if ext.is_empty() {
            String::from(base)
        } else {
            alloc::format!("{}.{}", base, ext)
        }
    }
}

fn legal_short_char(c: u8) -> bool {
    c.is_ascii_uppercase()
        || c.is_ascii_digit()
        || b"!#$%&'()-@^_`{}~".contains(&c)
}

/// Convert a name like `hello.txt` to the 11-byte on-disk form.
///
/// The base name ends at the first `.`. In lenient mode everything past
/// 8 + 3 bytes is dropped; strict mode returns [`Error::InvalidName`] instead,
/// and also for characters outside the short-name set. An empty base name is
/// rejected in both modes.
pub fn short_name(name: &str, mode: NameMode) -> Result<[u8; 11]> {
    let (base, ext) = name.split_once('.').unwrap_or((name, ""));
    if base.is_empty() {
        return Err(Error::InvalidName);
    }
    if mode == NameMode::Strict {
        let legal = base.len() <= 8
            && ext.len() <= 3
            && base.bytes().chain(ext.bytes()).all(|c| legal_short_char(c.to_ascii_uppercase()));
        if !legal {
            return Err(Error::InvalidName);
        }
    }

    let mut out = [b' '; 11];
    for (dst, c) in out[..8].iter_mut().zip(base.bytes()) {
        *dst = c.to_ascii_uppercase();
    }
    for (dst, c) in out[8..].iter_mut().zip(ext.bytes()) {
        *dst = c.to_ascii_uppercase();
    }
    if out[0] == DELETED {
        out[0] = E5_ESCAPE;
    }
    Ok(out)
}

/// Location of one 32-byte slot: its sector and byte offset in that sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub sector: usize,
    pub offset: usize,
    /// The slot held the end-of-directory marker.
    pub end_of_dir: bool,
}

impl SlotRef {
    /// Slot that has to carry the end-of-directory marker once this one is
    /// filled. `None` unless this slot was the marker and is not the last
    /// slot of the root directory.
    pub fn terminator(&self, geometry: &Geometry) -> Option<SlotRef> {
        if !self.end_of_dir {
            return None;
        }
        let (sector, offset) = if self.offset + DIR_ENTRY_SIZE < SECTOR_SIZE {
            (self.sector, self.offset + DIR_ENTRY_SIZE)
        } else {
            (self.sector + 1, 0)
        };
        root_sectors(geometry).contains(&sector).then_some(SlotRef {
            sector,
            offset,
            end_of_dir: true,
        })
    }
}

fn root_sectors(geometry: &Geometry) -> core::ops::Range<usize> {
    let start = geometry.root_dir_start();
    start..start + geometry.root_dir_sectors()
}

/// Read the root directory entries, in on-disk order.
///
/// Stops at the first end-of-directory slot; deleted slots and volume labels
/// are skipped.
pub fn list<D: BlockDevice>(dev: &D, geometry: &Geometry) -> Result<Vec<DirEntry>> {
    let mut out = Vec::new();
    for s in root_sectors(geometry) {
        let buf = dev.sector(s).ok_or(Error::SectorOutOfRange { index: s })?;
        for rec in buf.chunks_exact(DIR_ENTRY_SIZE) {
            match DirEntry::parse(rec) {
                Slot::End => return Ok(out),
                Slot::Deleted | Slot::VolumeLabel => continue,
                Slot::File(e) => out.push(e),
            }
        }
    }
    Ok(out)
}

/// First slot that is unused or deleted.
pub fn find_free_slot<D: BlockDevice>(dev: &D, geometry: &Geometry) -> Result<SlotRef> {
    for s in root_sectors(geometry) {
        let buf = dev.sector(s).ok_or(Error::SectorOutOfRange { index: s })?;
        for offset in (0..SECTOR_SIZE).step_by(DIR_ENTRY_SIZE) {
            let first = buf[offset];
            if first == END_OF_DIR || first == DELETED {
                return Ok(SlotRef {
                    sector: s,
                    offset,
                    end_of_dir: first == END_OF_DIR,
                });
            }
        }
    }
    Err(Error::DirectoryFull)
}

/// Store a plain file record into `slot`.
///
/// Filling the end-of-directory slot moves the marker to the next slot, so
/// stale records further down stay hidden. Nothing is written unless both
/// sectors are present.
pub fn write_entry<D: BlockDevice>(
    dev: &mut D,
    geometry: &Geometry,
    slot: SlotRef,
    raw_name: &[u8; 11],
    first_cluster: u16,
    file_size: u32,
) -> Result<()> {
    let terminator = slot.terminator(geometry);
    if let Some(t) = terminator {
        dev.sector(t.sector).ok_or(Error::SectorOutOfRange { index: t.sector })?;
    }
    let buf = dev
        .sector_mut(slot.sector)
        .ok_or(Error::SectorOutOfRange { index: slot.sector })?;
    let rec = DirEntry::encode(raw_name, first_cluster, file_size);
    buf[slot.offset..slot.offset + DIR_ENTRY_SIZE].copy_from_slice(&rec);

    if let Some(t) = terminator {
        let buf = dev.sector_mut(t.sector).ok_or(Error::SectorOutOfRange { index: t.sector })?;
        buf[t.offset] = END_OF_DIR;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiskImage;

    fn put(img: &mut DiskImage, index: usize, name: &[u8; 11], attr: u8, cluster: u16, size: u32) {
        let sector = 11 + index / 16;
        let off = (index % 16) * DIR_ENTRY_SIZE;
        let buf = img.sector_mut(sector).unwrap();
        buf[off..off + 32].copy_from_slice(&DirEntry::encode(name, cluster, size));
        buf[off + 11] = attr;
    }

    #[test]
    fn short_name_lenient() {
        assert_eq!(&short_name("test.txt", NameMode::Lenient).unwrap(), b"TEST    TXT");
        assert_eq!(&short_name("README", NameMode::Lenient).unwrap(), b"README     ");
        assert_eq!(&short_name("VERYLONGNAME.TEXT", NameMode::Lenient).unwrap(), b"VERYLONGTEX");
        assert_eq!(&short_name("A.B.C", NameMode::Lenient).unwrap(), b"A       B.C");
        assert!(matches!(short_name(".TXT", NameMode::Lenient), Err(Error::InvalidName)));
        assert!(matches!(short_name("", NameMode::Lenient), Err(Error::InvalidName)));
    }

    #[test]
    fn short_name_strict() {
        assert_eq!(&short_name("hello.prg", NameMode::Strict).unwrap(), b"HELLO   PRG");
        assert_eq!(&short_name("A_B-C~1", NameMode::Strict).unwrap(), b"A_B-C~1    ");
        for bad in ["VERYLONGNAME.TXT", "FILE.TEXT", "SP ACE.TXT", "A.B.C", "BAD*.TXT", "ÄTARI.PRG"] {
            assert!(short_name(bad, NameMode::Strict).is_err(), "{bad}");
        }
    }

    #[test]
    fn leading_e5_is_escaped() {
        let raw = short_name("\u{e5}", NameMode::Lenient);
        // 'å' is two UTF-8 bytes (C3 A5), so no escape is needed here
        assert_eq!(raw.unwrap()[0], 0xC3);

        let entry = DirEntry {
            raw_name: *b"\x05BC     DAT",
            attr: 0,
            first_cluster: 2,
            file_size: 1,
        };
        assert_eq!(entry.name(), "\u{e5}BC.DAT");
    }

    #[test]
    fn listing_skips_and_stops() {
        let mut img = DiskImage::format(&Geometry::FLOPPY_720K).unwrap();
        put(&mut img, 0, b"MYDISK     ", ATTR_VOLUME_ID, 0, 0);
        put(&mut img, 1, b"README  TXT", 0, 2, 100);
        put(&mut img, 2, b"GONE    TXT", 0, 3, 200);
        img.sector_mut(11).unwrap()[2 * 32] = DELETED;
        put(&mut img, 3, b"NOEXT      ", 0x20, 4, 300);
        // slot 4 stays zero: end of directory
        put(&mut img, 5, b"STALE   TXT", 0, 5, 400);
        put(&mut img, 20, b"LATER   TXT", 0, 6, 500);

        let entries = list(&img, &Geometry::FLOPPY_720K).unwrap();
        let names: Vec<String> = entries.iter().map(DirEntry::name).collect();
        assert_eq!(names, ["README.TXT", "NOEXT"]);
        assert_eq!(entries[0].first_cluster, 2);
        assert_eq!(entries[0].file_size, 100);
        assert_eq!(entries[1].attr, 0x20);
    }

    #[test]
    fn free_slot_reuses_deleted_records() {
        let mut img = DiskImage::format(&Geometry::FLOPPY_720K).unwrap();
        let geo = Geometry::FLOPPY_720K;
        let slot = find_free_slot(&img, &geo).unwrap();
        assert_eq!(slot, SlotRef { sector: 11, offset: 0, end_of_dir: true });

        for i in 0..17 {
            put(&mut img, i, b"FILE    BIN", 0, 2, 1);
        }
        let slot = find_free_slot(&img, &geo).unwrap();
        assert_eq!(slot, SlotRef { sector: 12, offset: 32, end_of_dir: true });

        img.sector_mut(11).unwrap()[5 * 32] = DELETED;
        let slot = find_free_slot(&img, &geo).unwrap();
        assert_eq!(slot, SlotRef { sector: 11, offset: 160, end_of_dir: false });
        assert_eq!(slot.terminator(&geo), None);
    }

    #[test]
    fn full_directory() {
        let mut img = DiskImage::format(&Geometry::FLOPPY_720K).unwrap();
        for i in 0..112 {
            put(&mut img, i, b"FILE    BIN", 0, 2, 1);
        }
        let geo = Geometry::FLOPPY_720K;
        assert!(matches!(find_free_slot(&img, &geo), Err(Error::DirectoryFull)));
        assert_eq!(list(&img, &geo).unwrap().len(), 112);
    }

    #[test]
    fn write_entry_layout() {
        let mut img = DiskImage::format(&Geometry::FLOPPY_720K).unwrap();
        img.sector_mut(12).unwrap()[64] = DELETED;
        let slot = SlotRef { sector: 12, offset: 64, end_of_dir: false };
        write_entry(&mut img, &Geometry::FLOPPY_720K, slot, b"TEST    TXT", 0x0102, 5000).unwrap();

        let rec = &img.sector(12).unwrap()[64..96];
        assert_eq!(&rec[0..11], b"TEST    TXT");
        assert_eq!(rec[11], ATTR_NORMAL);
        assert!(rec[12..26].iter().all(|&b| b == 0));
        assert_eq!(&rec[26..28], &[0x02, 0x01]);
        assert_eq!(&rec[28..32], &5000u32.to_le_bytes());
    }

    #[test]
    fn truncated_image_fails_cleanly() {
        let img = DiskImage::create_blank(12 * SECTOR_SIZE);
        let geo = Geometry::FLOPPY_720K;
        // sector 11 is all 0xE5 (deleted), sector 12 is missing
        assert!(matches!(list(&img, &geo), Err(Error::SectorOutOfRange { index: 12 })));
        let slot = find_free_slot(&img, &geo).unwrap();
        assert_eq!(slot, SlotRef { sector: 11, offset: 0, end_of_dir: false });

        let img = DiskImage::create_blank(SECTOR_SIZE);
        assert!(matches!(find_free_slot(&img, &geo), Err(Error::SectorOutOfRange { index: 11 })));
    }

    #[test]
    fn filling_the_end_marker_moves_it() {
        let mut img = DiskImage::format(&Geometry::FLOPPY_720K).unwrap();
        let geo = Geometry::FLOPPY_720K;
        put(&mut img, 1, b"STALE   TXT", 0, 5, 400);
        assert!(list(&img, &geo).unwrap().is_empty());

        let slot = find_free_slot(&img, &geo).unwrap();
        assert_eq!(slot.terminator(&geo), Some(SlotRef { sector: 11, offset: 32, end_of_dir: true }));
        write_entry(&mut img, &geo, slot, b"NEW     TXT", 2, 10).unwrap();

        let names: Vec<String> = list(&img, &geo).unwrap().iter().map(DirEntry::name).collect();
        assert_eq!(names, ["NEW.TXT"]);
        assert_eq!(img.sector(11).unwrap()[32], END_OF_DIR);
        // the rest of the stale record is left as it was
        assert_eq!(&img.sector(11).unwrap()[33..43], b"TALE   TXT");
    }

    #[test]
    fn end_marker_crosses_sectors_and_stops_at_the_last_slot() {
        let mut img = DiskImage::format(&Geometry::FLOPPY_720K).unwrap();
        let geo = Geometry::FLOPPY_720K;
        for i in 0..15 {
            put(&mut img, i, b"FILE    BIN", 0, 2, 1);
        }
        put(&mut img, 16, b"STALE   TXT", 0, 5, 400);
        let slot = find_free_slot(&img, &geo).unwrap();
        assert_eq!(slot, SlotRef { sector: 11, offset: 480, end_of_dir: true });
        write_entry(&mut img, &geo, slot, b"SIXTEEN BIN", 2, 1).unwrap();
        assert_eq!(img.sector(12).unwrap()[0], END_OF_DIR);
        assert_eq!(list(&img, &geo).unwrap().len(), 16);

        // the final slot has nothing after it inside the root directory
        let last = SlotRef { sector: 17, offset: 480, end_of_dir: true };
        assert_eq!(last.terminator(&geo), None);
        let before = img.sector(18).unwrap().to_vec();
        write_entry(&mut img, &geo, last, b"LAST    BIN", 2, 1).unwrap();
        assert_eq!(&img.sector(17).unwrap()[480..491], b"LAST    BIN");
        assert_eq!(img.sector(18).unwrap(), &before[..]);
    }

    #[test]
    fn missing_terminator_sector_writes_nothing() {
        let full = DiskImage::format(&Geometry::FLOPPY_720K).unwrap();
        let mut img = DiskImage::from_bytes(full.as_bytes()[..12 * SECTOR_SIZE].to_vec());
        let geo = Geometry::FLOPPY_720K;
        let slot = SlotRef { sector: 11, offset: 480, end_of_dir: true };
        let before = img.clone();
        assert!(matches!(
            write_entry(&mut img, &geo, slot, b"X          ", 0, 0),
            Err(Error::SectorOutOfRange { index: 12 })
        ));
        assert_eq!(img, before);
    }
}
