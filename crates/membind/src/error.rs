use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(u32),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Target process has exited")]
    ProcessExited,

    #[error("Access denied at address {address:#x}: {message}")]
    AccessDenied { address: u64, message: String },

    #[error("Invalid address {address:#x} ({len} bytes)")]
    InvalidAddress { address: u64, len: usize },

    #[error("Partial write at address {address:#x}: wrote {written} of {expected} bytes")]
    PartialWrite {
        address: u64,
        expected: usize,
        written: usize,
    },

    #[error("Binding target is detached")]
    Detached,

    #[error("Layout configuration error: {0}")]
    Configuration(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Value for field {field} does not match its shape: expected {expected}, got {actual}")]
    ShapeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Field {0} has not been loaded yet")]
    NotLoaded(String),

    #[error("Failed to parse value: {0}")]
    ValueParse(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
