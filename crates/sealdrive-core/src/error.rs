use thiserror::Error;

/// Boxed source error from an external client (HTTP transport, S3 SDK).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SealError {
    // IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Keys
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    // Crypto
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    // Remote storage
    #[error("Remote file already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to get the upload URL (status {status}): {reason}")]
    UploadUrl { status: u16, reason: String },

    #[error("Failed to get the download URL (status {status}): {reason}")]
    DownloadUrl { status: u16, reason: String },

    #[error("Failed to list files (status {status}): {reason}")]
    List { status: u16, reason: String },

    #[error("Failed to upload the file. Status: {status}")]
    Upload { status: u16 },

    #[error("Failed to download the file. Status: {status}")]
    Download { status: u16 },

    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    // Config
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found at {0}")]
    ConfigNotFound(String),

    #[error("TOML deserialization error: {0}")]
    TomlDe(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

impl SealError {
    /// Wrap a client-level failure without altering it.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        SealError::Transport(err.into())
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SealError::UploadUrl { status, .. }
            | SealError::DownloadUrl { status, .. }
            | SealError::List { status, .. }
            | SealError::Upload { status }
            | SealError::Download { status } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SealError>;
