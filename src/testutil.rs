//! In-memory FAT12 images for unit tests.
//!
//! Layout: 512-byte sectors, 1 sector per cluster, 1 reserved sector,
//! 2 one-sector FATs, a 16-entry root directory and 64 data clusters.

pub const SECTOR: usize = 512;
pub const FAT_OFFSET: usize = SECTOR;
pub const ROOT_OFFSET: usize = 3 * SECTOR;
pub const DATA_OFFSET: usize = 4 * SECTOR;
pub const TOTAL_SECTORS: usize = 68;

pub struct TestImage {
    pub data: Vec<u8>,
}

impl TestImage {
    /// A freshly formatted, empty volume.
    pub fn new() -> Self {
        let mut data = vec![0u8; TOTAL_SECTORS * SECTOR];
        data[0] = 0xEB;
        data[1] = 0x3C;
        data[2] = 0x90;
        data[3..11].copy_from_slice(b"MSWIN4.1");
        data[11..13].copy_from_slice(&(SECTOR as u16).to_le_bytes());
        data[13] = 1; // sectors per cluster
        data[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved
        data[16] = 2; // FATs
        data[17..19].copy_from_slice(&16u16.to_le_bytes()); // root entries
        data[19..21].copy_from_slice(&(TOTAL_SECTORS as u16).to_le_bytes());
        data[21] = 0xF8;
        data[22..24].copy_from_slice(&1u16.to_le_bytes()); // sectors per FAT
        data[510] = 0x55;
        data[511] = 0xAA;

        let mut img = Self { data };
        img.set_fat(0, 0x0FF8);
        img.set_fat(1, 0x0FFF);
        img
    }

    pub fn set_fat(&mut self, cluster: u16, value: u16) {
        for copy in 0..2 {
            let off = FAT_OFFSET + copy * SECTOR + cluster as usize * 3 / 2;
            if cluster % 2 == 0 {
                self.data[off] = value as u8;
                self.data[off + 1] = (self.data[off + 1] & 0xF0) | ((value >> 8) as u8 & 0x0F);
            } else {
                self.data[off] = (self.data[off] & 0x0F) | ((value << 4) as u8);
                self.data[off + 1] = (value >> 4) as u8;
            }
        }
    }

    pub fn fat(&self, cluster: u16) -> u16 {
        self.fat_copy(0, cluster)
    }

    pub fn fat_copy(&self, copy: usize, cluster: u16) -> u16 {
        let off = FAT_OFFSET + copy * SECTOR + cluster as usize * 3 / 2;
        let lo = self.data[off] as u16;
        let hi = self.data[off + 1] as u16;
        if cluster % 2 == 0 {
            lo | ((hi & 0x0F) << 8)
        } else {
            (lo >> 4) | (hi << 4)
        }
    }

    /// Link `clusters` in order and terminate the last one.
    pub fn chain(&mut self, clusters: &[u16]) {
        for pair in clusters.windows(2) {
            self.set_fat(pair[0], pair[1]);
        }
        if let Some(&last) = clusters.last() {
            self.set_fat(last, 0x0FFF);
        }
    }

    pub fn cluster_offset(cluster: u16) -> usize {
        DATA_OFFSET + (cluster as usize - 2) * SECTOR
    }

    pub fn root_entry(&mut self, index: usize, name: &[u8; 11], attr: u8, start: u16, size: u32) {
        self.write_entry(ROOT_OFFSET + index * 32, name, attr, start, size);
    }

    /// Entry `index` inside the directory cluster `cluster`.
    pub fn dir_entry(
        &mut self,
        cluster: u16,
        index: usize,
        name: &[u8; 11],
        attr: u8,
        start: u16,
        size: u32,
    ) {
        self.write_entry(Self::cluster_offset(cluster) + index * 32, name, attr, start, size);
    }

    fn write_entry(&mut self, off: usize, name: &[u8; 11], attr: u8, start: u16, size: u32) {
        let slot = &mut self.data[off..off + 32];
        slot.fill(0);
        slot[..11].copy_from_slice(name);
        slot[11] = attr;
        slot[26..28].copy_from_slice(&start.to_le_bytes());
        slot[28..32].copy_from_slice(&size.to_le_bytes());
    }

    pub fn root_raw(&self, index: usize) -> &[u8] {
        let off = ROOT_OFFSET + index * 32;
        &self.data[off..off + 32]
    }

    pub fn root_size(&self, index: usize) -> u32 {
        let raw = self.root_raw(index);
        u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]])
    }

    pub fn root_start(&self, index: usize) -> u16 {
        let raw = self.root_raw(index);
        u16::from_le_bytes([raw[26], raw[27]])
    }
}

/// Run a default check over `img`, collecting the diagnostic lines.
pub fn run_check(img: &mut TestImage) -> (crate::check::CheckReport, Vec<String>) {
    let mut lines = Vec::new();
    let report = crate::check::check_volume(
        &mut img.data,
        &crate::check::CheckOptions::default(),
        &mut |l: &str| lines.push(l.to_string()),
    )
    .unwrap();
    (report, lines)
}
