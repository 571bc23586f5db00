//! BIOS Parameter Block parsing for FAT12 volumes.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::ScandiskError;
use crate::fs::entry::DIR_ENTRY_SIZE;

/// Cluster counts at or above this are FAT16.
const FAT12_CLUSTER_LIMIT: u32 = 4085;

/// First table value that is not a usable cluster number (0xFF0..0xFF6 are reserved).
const FAT12_RESERVED_FIRST: u32 = 0x0FF0;

/// Volume layout read from the boot sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes per sector (512, 1024, 2048 or 4096).
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    /// Sectors before the first FAT, including the boot sector.
    pub reserved_sectors: u16,
    /// Number of FAT copies (typically 2).
    pub num_fats: u8,
    /// Fixed root directory capacity in entries.
    pub root_entry_count: u16,
    pub total_sectors: u32,
    pub sectors_per_fat: u16,
    pub media: u8,
}

impl Geometry {
    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    /// Byte offset of the first FAT copy.
    pub fn fat_offset(&self) -> usize {
        self.reserved_sectors as usize * self.bytes_per_sector as usize
    }

    /// Size of one FAT copy in bytes.
    pub fn fat_size(&self) -> usize {
        self.sectors_per_fat as usize * self.bytes_per_sector as usize
    }

    pub fn root_dir_sectors(&self) -> u32 {
        let bps = self.bytes_per_sector as u32;
        (self.root_entry_count as u32 * DIR_ENTRY_SIZE as u32 + (bps - 1)) / bps
    }

    /// Byte offset of the fixed root directory region.
    pub fn root_dir_offset(&self) -> usize {
        self.fat_offset() + self.num_fats as usize * self.fat_size()
    }

    pub fn data_start_sector(&self) -> u32 {
        self.reserved_sectors as u32
            + self.num_fats as u32 * self.sectors_per_fat as u32
            + self.root_dir_sectors()
    }

    /// Byte offset of cluster 2.
    pub fn data_offset(&self) -> usize {
        self.data_start_sector() as usize * self.bytes_per_sector as usize
    }

    /// Number of data clusters on the volume.
    pub fn cluster_count(&self) -> u32 {
        self.total_sectors.saturating_sub(self.data_start_sector()) / self.sectors_per_cluster as u32
    }

    /// Exclusive upper bound of legal data cluster numbers.
    pub fn max_cluster(&self) -> u16 {
        (self.cluster_count() + 2).min(FAT12_RESERVED_FIRST) as u16
    }

    /// Bytes the buffer must hold for every legal cluster to be addressable.
    pub fn required_len(&self) -> u64 {
        self.data_offset() as u64
            + (self.max_cluster() as u64 - 2) * self.bytes_per_cluster() as u64
    }
}

/// Parse and validate the boot sector at the start of `data`.
pub fn parse_boot_sector(data: &[u8]) -> Result<Geometry, ScandiskError> {
    if data.len() < 512 {
        return Err(ScandiskError::InvalidBootSector(format!(
            "image is only {} bytes",
            data.len()
        )));
    }
    let bpb = &data[..512];

    // Jump instruction (EB xx 90 or E9 xx xx)
    if bpb[0] != 0xEB && bpb[0] != 0xE9 {
        return Err(ScandiskError::InvalidBootSector(format!(
            "bad jump instruction 0x{:02X}",
            bpb[0]
        )));
    }
    if bpb[510] != 0x55 || bpb[511] != 0xAA {
        return Err(ScandiskError::InvalidBootSector(format!(
            "missing boot signature (found 0x{:02X}{:02X})",
            bpb[510], bpb[511]
        )));
    }

    let bytes_per_sector = LittleEndian::read_u16(&bpb[11..13]);
    if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096) {
        return Err(ScandiskError::InvalidBootSector(format!(
            "invalid bytes per sector: {bytes_per_sector}"
        )));
    }

    let sectors_per_cluster = bpb[13];
    if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
        return Err(ScandiskError::InvalidBootSector(format!(
            "invalid sectors per cluster: {sectors_per_cluster}"
        )));
    }

    let reserved_sectors = LittleEndian::read_u16(&bpb[14..16]);
    if reserved_sectors == 0 {
        return Err(ScandiskError::InvalidBootSector(
            "reserved sector count is 0".into(),
        ));
    }

    let num_fats = bpb[16];
    if num_fats == 0 {
        return Err(ScandiskError::InvalidBootSector("FAT count is 0".into()));
    }

    let root_entry_count = LittleEndian::read_u16(&bpb[17..19]);
    let sectors_per_fat = LittleEndian::read_u16(&bpb[22..24]);
    if root_entry_count == 0 || sectors_per_fat == 0 {
        return Err(ScandiskError::Unsupported(
            "FAT32 layout (no fixed root directory)".into(),
        ));
    }

    let total_sectors_16 = LittleEndian::read_u16(&bpb[19..21]) as u32;
    let total_sectors = if total_sectors_16 != 0 {
        total_sectors_16
    } else {
        LittleEndian::read_u32(&bpb[32..36])
    };

    let geometry = Geometry {
        bytes_per_sector,
        sectors_per_cluster,
        reserved_sectors,
        num_fats,
        root_entry_count,
        total_sectors,
        sectors_per_fat,
        media: bpb[21],
    };

    if geometry.data_start_sector() >= total_sectors {
        return Err(ScandiskError::InvalidBootSector(format!(
            "data region starts at sector {} but volume has {} sectors",
            geometry.data_start_sector(),
            total_sectors
        )));
    }

    let clusters = geometry.cluster_count();
    if clusters >= FAT12_CLUSTER_LIMIT {
        return Err(ScandiskError::Unsupported(format!(
            "{clusters} clusters is a FAT16 volume"
        )));
    }

    // Every legal cluster must have a complete 12-bit entry in the FAT.
    let needed = (geometry.max_cluster() as usize * 3 + 1) / 2;
    if geometry.fat_size() < needed {
        return Err(ScandiskError::InvalidBootSector(format!(
            "FAT holds {} bytes, {} clusters need {}",
            geometry.fat_size(),
            clusters,
            needed
        )));
    }

    Ok(geometry)
}
