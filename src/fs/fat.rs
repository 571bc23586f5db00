use std::collections::HashSet;

use byteorder::{ByteOrder, LittleEndian};

use super::bpb::{parse_boot_sector, Geometry};
use super::entry::{DirEntry, DIR_ENTRY_SIZE};
use crate::error::ScandiskError;

pub const FAT12_MASK: u16 = 0x0FFF;
pub const CLUSTER_FREE: u16 = 0x0000;
pub const CLUSTER_BAD: u16 = 0x0FF7;
/// Value written when terminating a chain.
pub const CLUSTER_EOC: u16 = 0x0FFF;
/// First cluster number of the data region.
pub const CLUSTER_FIRST: u16 = 0x0002;

/// Classified FAT12 table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    /// Link to the next data cluster of the chain.
    Next(u16),
    Bad,
    EndOfChain,
    /// 0x001, 0xFF0..0xFF6, or a cluster number past the end of the volume.
    Reserved(u16),
}

/// End-of-chain markers are 0xFF8..0xFFF.
pub fn is_end_of_chain(raw: u16) -> bool {
    (raw & FAT12_MASK) >= 0x0FF8
}

/// A directory whose slots can be scanned: the fixed root region or a
/// subdirectory's cluster chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirLocation {
    Root,
    Cluster(u16),
}

impl std::fmt::Display for DirLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirLocation::Root => write!(f, "root directory"),
            DirLocation::Cluster(c) => write!(f, "directory at cluster {c}"),
        }
    }
}

/// A FAT12 volume over an exclusively borrowed image buffer.
///
/// All reads and writes go straight to the buffer; nothing is cached.
pub struct Volume<'a> {
    data: &'a mut [u8],
    geometry: Geometry,
}

impl<'a> Volume<'a> {
    /// Parse the boot sector and check that the buffer covers the data region.
    pub fn open(data: &'a mut [u8]) -> Result<Self, ScandiskError> {
        let geometry = parse_boot_sector(data)?;
        let needed = geometry.required_len();
        if (data.len() as u64) < needed {
            return Err(ScandiskError::ImageTooSmall {
                needed,
                available: data.len() as u64,
            });
        }
        Ok(Self { data, geometry })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Legal data cluster: `CLUSTER_FIRST <= cluster < max_cluster`.
    pub fn is_valid_cluster(&self, cluster: u16) -> bool {
        cluster >= CLUSTER_FIRST && cluster < self.geometry.max_cluster()
    }

    /// Byte offset of a data cluster.
    pub fn cluster_offset(&self, cluster: u16) -> usize {
        self.geometry.data_offset()
            + (cluster as usize - CLUSTER_FIRST as usize) * self.geometry.bytes_per_cluster() as usize
    }

    pub fn root_dir_offset(&self) -> usize {
        self.geometry.root_dir_offset()
    }

    /// Raw 12-bit entry for `cluster`, read from the first FAT.
    pub fn fat_entry(&self, cluster: u16) -> u16 {
        let off = self.geometry.fat_offset() + (cluster as usize * 3) / 2;
        let val = LittleEndian::read_u16(&self.data[off..off + 2]);
        if cluster & 1 == 1 {
            val >> 4
        } else {
            val & FAT12_MASK
        }
    }

    /// Write a 12-bit entry into every FAT copy.
    pub fn set_fat_entry(&mut self, cluster: u16, value: u16) {
        let value = value & FAT12_MASK;
        let fat_size = self.geometry.fat_size();
        for copy in 0..self.geometry.num_fats as usize {
            let off = self.geometry.fat_offset() + copy * fat_size + (cluster as usize * 3) / 2;
            let existing = LittleEndian::read_u16(&self.data[off..off + 2]);
            let new_val = if cluster & 1 == 1 {
                (existing & 0x000F) | (value << 4)
            } else {
                (existing & 0xF000) | value
            };
            LittleEndian::write_u16(&mut self.data[off..off + 2], new_val);
        }
    }

    /// Classify a raw table value for this volume.
    pub fn classify(&self, raw: u16) -> FatEntry {
        match raw & FAT12_MASK {
            CLUSTER_FREE => FatEntry::Free,
            CLUSTER_BAD => FatEntry::Bad,
            v if is_end_of_chain(v) => FatEntry::EndOfChain,
            v if self.is_valid_cluster(v) => FatEntry::Next(v),
            v => FatEntry::Reserved(v),
        }
    }

    /// Classified table entry for `cluster`.
    pub fn entry(&self, cluster: u16) -> FatEntry {
        self.classify(self.fat_entry(cluster))
    }

    /// Allocated per the table: neither free nor bad.
    pub fn is_taken(&self, cluster: u16) -> bool {
        self.is_valid_cluster(cluster)
            && !matches!(self.entry(cluster), FatEntry::Free | FatEntry::Bad)
    }

    /// Decode the directory entry whose slot starts at `offset`.
    pub fn dirent(&self, offset: usize) -> DirEntry {
        DirEntry::parse(&self.data[offset..offset + DIR_ENTRY_SIZE], offset)
    }

    /// Mutable view of the 32-byte slot at `offset`.
    pub fn slot_mut(&mut self, offset: usize) -> &mut [u8] {
        &mut self.data[offset..offset + DIR_ENTRY_SIZE]
    }

    /// Slot offsets of the fixed root directory region.
    pub fn root_slots(&self) -> Vec<usize> {
        let base = self.root_dir_offset();
        (0..self.geometry.root_entry_count as usize)
            .map(|i| base + i * DIR_ENTRY_SIZE)
            .collect()
    }

    /// Slot offsets of every cluster in `clusters`, in order.
    pub fn cluster_slots(&self, clusters: &[u16]) -> Vec<usize> {
        let per_cluster = self.geometry.bytes_per_cluster() as usize / DIR_ENTRY_SIZE;
        clusters
            .iter()
            .flat_map(|&c| {
                let base = self.cluster_offset(c);
                (0..per_cluster).map(move |i| base + i * DIR_ENTRY_SIZE)
            })
            .collect()
    }

    /// Slot offsets of a directory, following a subdirectory's chain until
    /// it ends, leaves the data range, or revisits a cluster.
    pub fn directory_slots(&self, dir: DirLocation) -> Vec<usize> {
        match dir {
            DirLocation::Root => self.root_slots(),
            DirLocation::Cluster(start) => {
                let mut clusters = Vec::new();
                let mut seen = HashSet::new();
                let mut cluster = start;
                while self.is_valid_cluster(cluster) && seen.insert(cluster) {
                    clusters.push(cluster);
                    match self.entry(cluster) {
                        FatEntry::Next(next) => cluster = next,
                        _ => break,
                    }
                }
                self.cluster_slots(&clusters)
            }
        }
    }
}
