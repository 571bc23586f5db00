//! Cluster reachability bitmap.
//!
//! One bit per 12-bit cluster number, little-endian bit order within each
//! byte (bit 0 = LSB). A bit is set once the directory walk has visited the
//! cluster while following a chain reachable from the root.

/// Number of distinct FAT12 cluster numbers.
pub const FAT12_CLUSTER_SPACE: u32 = 0x1000;

pub struct ClusterBitmap {
    data: Vec<u8>,
    bit_count: u32,
}

impl ClusterBitmap {
    /// Create a cleared bitmap with `bit_count` valid bits.
    pub fn new(bit_count: u32) -> Self {
        Self {
            data: vec![0u8; bit_count.div_ceil(8) as usize],
            bit_count,
        }
    }

    /// A cleared bitmap covering every FAT12 cluster number.
    pub fn for_fat12() -> Self {
        Self::new(FAT12_CLUSTER_SPACE)
    }

    /// Set the bit for `cluster`. Returns `false` if it was already set or
    /// `cluster` is out of range.
    #[inline]
    pub fn mark(&mut self, cluster: u16) -> bool {
        let index = cluster as u32;
        if index >= self.bit_count {
            return false;
        }
        let byte = &mut self.data[(index / 8) as usize];
        let mask = 1u8 << (index % 8);
        if *byte & mask != 0 {
            return false;
        }
        *byte |= mask;
        true
    }

    /// Test whether `cluster` has been visited.
    ///
    /// Returns `false` if `cluster` is out of range.
    #[inline]
    pub fn is_marked(&self, cluster: u16) -> bool {
        let index = cluster as u32;
        if index >= self.bit_count {
            return false;
        }
        self.data[(index / 8) as usize] & (1u8 << (index % 8)) != 0
    }

    /// Count the set bits in the valid range.
    pub fn count_marked(&self) -> u32 {
        let full_bytes = (self.bit_count / 8) as usize;
        let remaining_bits = self.bit_count % 8;

        let mut count: u32 = self.data[..full_bytes]
            .iter()
            .map(|b| b.count_ones())
            .sum();

        if remaining_bits > 0 {
            let mask = (1u8 << remaining_bits) - 1;
            count += (self.data[full_bytes] & mask).count_ones();
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_clear() {
        let bm = ClusterBitmap::for_fat12();
        assert_eq!(bm.bit_count, 4096);
        assert_eq!(bm.count_marked(), 0);
        assert!(!bm.is_marked(2));
    }

    #[test]
    fn test_mark_once() {
        let mut bm = ClusterBitmap::for_fat12();
        assert!(bm.mark(5));
        assert!(!bm.mark(5));
        assert!(bm.is_marked(5));
        assert!(!bm.is_marked(4));
        assert!(!bm.is_marked(6));
        assert_eq!(bm.count_marked(), 1);
    }

    #[test]
    fn test_bit_order_within_byte() {
        let mut bm = ClusterBitmap::new(16);
        bm.mark(0);
        bm.mark(9);
        assert_eq!(bm.data, vec![0b0000_0001, 0b0000_0010]);
    }

    #[test]
    fn test_highest_cluster_number() {
        let mut bm = ClusterBitmap::for_fat12();
        assert!(bm.mark(0x0FFF));
        assert!(bm.is_marked(0x0FFF));
        assert!(!bm.is_marked(0x0FFE));
        assert_eq!(bm.count_marked(), 1);
    }

    #[test]
    fn test_out_of_range() {
        let mut bm = ClusterBitmap::new(10);
        assert!(!bm.mark(10));
        assert!(!bm.mark(100));
        assert!(!bm.is_marked(100));
        assert_eq!(bm.count_marked(), 0);
    }

    #[test]
    fn test_partial_byte_count() {
        let mut bm = ClusterBitmap::new(12);
        for c in 0..12 {
            bm.mark(c);
        }
        assert_eq!(bm.count_marked(), 12);
        assert_eq!(bm.data, vec![0xFF, 0x0F]);
    }
}
