use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScandiskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid boot sector: {0}")]
    InvalidBootSector(String),

    #[error("unsupported filesystem: {0}")]
    Unsupported(String),

    #[error("image truncated: need {needed} bytes, have {available} bytes")]
    ImageTooSmall { needed: u64, available: u64 },

    #[error("directory full: no empty or deleted slot in {0}")]
    DirectoryFull(String),
}
