pub mod bitmap;
pub mod bpb;
pub mod dir_writer;
pub mod entry;
pub mod fat;

pub use bitmap::ClusterBitmap;
pub use bpb::{parse_boot_sector, Geometry};
pub use dir_writer::{find_slot_and_write, write_dirent};
pub use entry::DirEntry;
pub use fat::{is_end_of_chain, DirLocation, FatEntry, Volume};
