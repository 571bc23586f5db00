//! Creating 8.3 directory entries in existing directory slots.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use super::entry::{ATTR_NORMAL, DIR_ENTRY_SIZE, SLOT_DELETED, SLOT_EMPTY};
use super::fat::{DirLocation, Volume};
use crate::error::ScandiskError;

/// Extension used when the filename has none.
const DEFAULT_EXTENSION: &[u8; 3] = b"___";

/// Fill `slot` with a normal-file entry for `filename`.
///
/// The directory part of `filename` (up to the last `/` or `\`) is dropped,
/// the rest is split on its last `.`, upper-cased and truncated to 8.3.
/// Returns `false` if the name had no extension and `___` was used.
pub fn write_dirent(slot: &mut [u8], filename: &str, start_cluster: u16, size: u32) -> bool {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);

    let (stem, extension) = match base.rfind('.') {
        Some(dot) => (&base[..dot], Some(&base[dot + 1..])),
        None => (base, None),
    };

    slot[..DIR_ENTRY_SIZE].fill(0);
    slot[..11].fill(b' ');
    copy_name_field(&mut slot[0..8], stem);
    match extension {
        Some(ext) => copy_name_field(&mut slot[8..11], ext),
        None => {
            warn!("no filename extension given for {filename:?}, defaulting to .___");
            slot[8..11].copy_from_slice(DEFAULT_EXTENSION);
        }
    }

    slot[11] = ATTR_NORMAL;
    LittleEndian::write_u16(&mut slot[26..28], start_cluster);
    LittleEndian::write_u32(&mut slot[28..32], size);

    extension.is_some()
}

/// Upper-cased ASCII into a space-padded field; other characters become `_`.
fn copy_name_field(field: &mut [u8], text: &str) {
    for (dst, c) in field.iter_mut().zip(text.chars()) {
        *dst = if c.is_ascii_graphic() {
            c.to_ascii_uppercase() as u8
        } else {
            b'_'
        };
    }
}

/// Write an entry into the first reusable slot of `dir`.
///
/// An empty slot is used and the slot after it (if the directory has one)
/// is re-stamped empty unless it holds a live entry. A deleted slot is
/// reused in place. Returns the byte offset of the written slot.
pub fn find_slot_and_write(
    volume: &mut Volume<'_>,
    dir: DirLocation,
    filename: &str,
    start_cluster: u16,
    size: u32,
) -> Result<usize, ScandiskError> {
    let slots = volume.directory_slots(dir);

    for (i, &offset) in slots.iter().enumerate() {
        match volume.dirent(offset).name[0] {
            SLOT_EMPTY => {
                write_dirent(volume.slot_mut(offset), filename, start_cluster, size);
                if let Some(&following) = slots.get(i + 1) {
                    if volume.dirent(following).is_deleted() {
                        volume.slot_mut(following)[0] = SLOT_EMPTY;
                    }
                }
                return Ok(offset);
            }
            SLOT_DELETED => {
                write_dirent(volume.slot_mut(offset), filename, start_cluster, size);
                return Ok(offset);
            }
            _ => {}
        }
    }

    Err(ScandiskError::DirectoryFull(dir.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::entry::DirEntry;
    use crate::testutil::{TestImage, ROOT_OFFSET};

    fn written(filename: &str) -> ([u8; 32], bool) {
        let mut slot = [0xAAu8; 32];
        let had_ext = write_dirent(&mut slot, filename, 0x123, 512);
        (slot, had_ext)
    }

    #[test]
    fn test_write_dirent_fields() {
        let (slot, had_ext) = written("found1.dat");
        assert!(had_ext);
        assert_eq!(&slot[..11], b"FOUND1  DAT");
        assert_eq!(slot[11], ATTR_NORMAL);
        let e = DirEntry::parse(&slot, 0);
        assert_eq!(e.start_cluster, 0x123);
        assert_eq!(e.file_size, 512);
        // timestamps and reserved bytes cleared
        assert!(slot[12..26].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_dirent_truncates() {
        let (slot, _) = written("averylongname.text");
        assert_eq!(&slot[..11], b"AVERYLONTEX");
    }

    #[test]
    fn test_write_dirent_strips_directories() {
        let (slot, _) = written("/tmp/dir\\inner/report.md");
        assert_eq!(&slot[..11], b"REPORT  MD ");
    }

    #[test]
    fn test_write_dirent_splits_on_last_dot() {
        let (slot, _) = written("archive.tar.gz");
        assert_eq!(&slot[..11], b"ARCHIVE.GZ ");
    }

    #[test]
    fn test_write_dirent_default_extension() {
        let (slot, had_ext) = written("README");
        assert!(!had_ext);
        assert_eq!(&slot[..11], b"README  ___");
    }

    #[test]
    fn test_find_slot_uses_first_empty_and_restamps() {
        let mut img = TestImage::new();
        img.root_entry(0, b"A       TXT", 0x20, 0, 0);
        img.root_entry(2, b"\xE5TALE   TXT", 0x20, 0, 0);
        let mut vol = Volume::open(&mut img.data).unwrap();
        let off = find_slot_and_write(&mut vol, DirLocation::Root, "found1.dat", 9, 512).unwrap();
        assert_eq!(off, ROOT_OFFSET + 32);
        assert_eq!(vol.dirent(off).short_name(), "FOUND1.DAT");
        assert!(vol.dirent(ROOT_OFFSET + 64).is_empty());
    }

    #[test]
    fn test_find_slot_keeps_live_entry_after_empty_slot() {
        let mut img = TestImage::new();
        img.root_entry(0, b"A       TXT", 0x20, 0, 0);
        img.root_entry(2, b"LATE    TXT", 0x20, 2, 10);
        let mut vol = Volume::open(&mut img.data).unwrap();
        let off = find_slot_and_write(&mut vol, DirLocation::Root, "found1.dat", 9, 512).unwrap();
        assert_eq!(off, ROOT_OFFSET + 32);
        let late = vol.dirent(ROOT_OFFSET + 64);
        assert_eq!(late.short_name(), "LATE.TXT");
        assert_eq!(late.start_cluster, 2);
    }

    #[test]
    fn test_find_slot_reuses_deleted() {
        let mut img = TestImage::new();
        img.root_entry(0, b"A       TXT", 0x20, 0, 0);
        img.root_entry(1, b"\xE5       OLD", 0x20, 0, 0);
        img.root_entry(2, b"C       TXT", 0x20, 0, 0);
        let mut vol = Volume::open(&mut img.data).unwrap();
        let off = find_slot_and_write(&mut vol, DirLocation::Root, "x.y", 4, 512).unwrap();
        assert_eq!(off, ROOT_OFFSET + 32);
        assert_eq!(vol.dirent(ROOT_OFFSET + 64).short_name(), "C.TXT");
        assert!(vol.dirent(ROOT_OFFSET + 96).is_empty());
    }

    #[test]
    fn test_find_slot_last_slot_has_no_follower() {
        let mut img = TestImage::new();
        for i in 0..15 {
            img.root_entry(i, b"FILE    TXT", 0x20, 0, 0);
        }
        let mut vol = Volume::open(&mut img.data).unwrap();
        let off = find_slot_and_write(&mut vol, DirLocation::Root, "last.dat", 2, 512).unwrap();
        assert_eq!(off, ROOT_OFFSET + 15 * 32);
        // the first data cluster is untouched
        assert_eq!(vol.dirent(vol.cluster_offset(2)).name, [0u8; 8]);
    }

    #[test]
    fn test_find_slot_full_root() {
        let mut img = TestImage::new();
        for i in 0..16 {
            img.root_entry(i, b"FILE    TXT", 0x20, 0, 0);
        }
        let mut vol = Volume::open(&mut img.data).unwrap();
        let err = find_slot_and_write(&mut vol, DirLocation::Root, "x.dat", 2, 512).unwrap_err();
        assert!(matches!(err, ScandiskError::DirectoryFull(_)));
        assert!(err.to_string().contains("root directory"));
    }

    #[test]
    fn test_find_slot_in_subdirectory_chain() {
        let mut img = TestImage::new();
        img.chain(&[5, 6]);
        for i in 0..16 {
            img.dir_entry(5, i, b"FILE    TXT", 0x20, 0, 0);
        }
        let mut vol = Volume::open(&mut img.data).unwrap();
        let off = find_slot_and_write(&mut vol, DirLocation::Cluster(5), "n.dat", 7, 512).unwrap();
        assert_eq!(off, vol.cluster_offset(6));
    }
}
