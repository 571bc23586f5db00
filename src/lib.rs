pub mod check;
pub mod error;
pub mod fs;
pub mod image;

#[cfg(test)]
mod testutil;

pub use check::{check_volume, Anomaly, CheckOptions, CheckReport};
pub use error::ScandiskError;
pub use image::{check_image_file, DiskImage};
