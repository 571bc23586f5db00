use byteorder::{ByteOrder, LittleEndian};

// FAT directory entry layout
pub const DIR_ENTRY_SIZE: usize = 32;
pub const SLOT_EMPTY: u8 = 0x00;
pub const SLOT_DELETED: u8 = 0xE5;
const DOT_NAME: u8 = 0x2E;

pub const ATTR_NORMAL: u8 = 0x00;
pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LONG_NAME: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;

const START_CLUSTER_OFFSET: usize = 26;
const FILE_SIZE_OFFSET: usize = 28;

/// A decoded 8.3 directory entry and the byte offset of its slot in the image.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub offset: usize,
    pub name: [u8; 8],
    pub extension: [u8; 3],
    pub attributes: u8,
    pub start_cluster: u16,
    pub file_size: u32,
}

impl DirEntry {
    /// Decode the 32-byte slot `raw` located at `offset`.
    pub fn parse(raw: &[u8], offset: usize) -> Self {
        let mut name = [0u8; 8];
        let mut extension = [0u8; 3];
        name.copy_from_slice(&raw[0..8]);
        extension.copy_from_slice(&raw[8..11]);
        Self {
            offset,
            name,
            extension,
            attributes: raw[11],
            start_cluster: LittleEndian::read_u16(&raw[START_CLUSTER_OFFSET..START_CLUSTER_OFFSET + 2]),
            file_size: LittleEndian::read_u32(&raw[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 4]),
        }
    }

    /// Never-used slot; no live entries follow it.
    pub fn is_empty(&self) -> bool {
        self.name[0] == SLOT_EMPTY
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == SLOT_DELETED
    }

    /// `.` or `..`
    pub fn is_dot(&self) -> bool {
        self.name[0] == DOT_NAME
    }

    pub fn is_long_name(&self) -> bool {
        self.attributes & ATTR_LONG_NAME == ATTR_LONG_NAME
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes & ATTR_VOLUME_ID != 0
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes & ATTR_HIDDEN != 0
    }

    /// `NAME.EXT`, or `NAME` when the extension is blank.
    pub fn short_name(&self) -> String {
        let name = decode_name_bytes(&self.name);
        let ext = decode_name_bytes(&self.extension);
        if ext.is_empty() {
            name
        } else {
            format!("{name}.{ext}")
        }
    }

    /// Name and extension run together, as volume labels are stored.
    pub fn label(&self) -> String {
        let mut raw = [0u8; 11];
        raw[..8].copy_from_slice(&self.name);
        raw[8..].copy_from_slice(&self.extension);
        decode_name_bytes(&raw)
    }

    /// `rhsa` flag column used in listings, blank for unset bits.
    pub fn attribute_flags(&self) -> String {
        [
            (ATTR_READ_ONLY, 'r'),
            (ATTR_HIDDEN, 'h'),
            (ATTR_SYSTEM, 's'),
            (ATTR_ARCHIVE, 'a'),
        ]
        .iter()
        .map(|&(bit, c)| if self.attributes & bit != 0 { c } else { ' ' })
        .collect()
    }
}

/// Space-padded OEM name bytes to a display string. Non-ASCII bytes become `?`.
fn decode_name_bytes(bytes: &[u8]) -> String {
    let s: String = bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect();
    s.trim_end().to_string()
}

/// Overwrite the start cluster field of a raw slot.
pub fn set_start_cluster(raw: &mut [u8], cluster: u16) {
    LittleEndian::write_u16(&mut raw[START_CLUSTER_OFFSET..START_CLUSTER_OFFSET + 2], cluster);
}

/// Overwrite the file size field of a raw slot.
pub fn set_file_size(raw: &mut [u8], size: u32) {
    LittleEndian::write_u32(&mut raw[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 4], size);
}
