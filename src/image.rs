//! Disk image files on the host.
//!
//! The whole image is read into memory, checked there, and written back in
//! one piece only when a repair changed it.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::check::{check_volume, CheckOptions, CheckReport};

/// An image file opened for reading and writing, with its contents in memory.
pub struct DiskImage {
    file: File,
    path: PathBuf,
    data: Vec<u8>,
}

impl DiskImage {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("cannot open {} for reading and writing", path.display()))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .with_context(|| format!("failed to read {}", path.display()))?;
        debug!("read {} bytes from {}", data.len(), path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Write the in-memory contents back over the file.
    pub fn persist(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .with_context(|| format!("failed to seek in {}", self.path.display()))?;
        self.file
            .write_all(&self.data)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        self.file
            .sync_all()
            .with_context(|| format!("failed to sync {}", self.path.display()))?;
        debug!("wrote {} bytes to {}", self.data.len(), self.path.display());
        Ok(())
    }
}

/// Check the FAT12 image at `path`, writing repairs back to the file.
///
/// The file is only rewritten when the check finished and changed the image.
/// A fatal error leaves the file as it was.
pub fn check_image_file(
    path: &Path,
    options: &CheckOptions,
    log_cb: &mut impl FnMut(&str),
) -> Result<CheckReport> {
    let mut image = DiskImage::open(path)?;
    let report = check_volume(image.data_mut(), options, log_cb)
        .with_context(|| format!("cannot check {}", path.display()))?;

    if report.modified_image() {
        image.persist()?;
    }
    Ok(report)
}
