//! Error types for rill-connection
//!
//! Two families live here: the registry's stable, user-visible failure
//! messages (duplicate create, unknown type, drop refused, ...) and the
//! factory-facing taxonomy that partitions errors into transient I/O
//! failures and permanent configuration failures.

use thiserror::Error;

/// Result type alias for connection registry operations
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Errors produced by the connection registry and by connection factories
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// An operation was called with an empty connection id
    #[error("connection id should be defined")]
    IdRequired,

    /// Create was called with an empty id or type
    #[error("connection id and type should be defined")]
    IdAndTypeRequired,

    /// No factory is registered for the requested type
    #[error("unknown connection type")]
    UnknownType,

    /// A live connection already exists under this id
    #[error("connection {0} already been created")]
    AlreadyCreated(String),

    /// No live connection exists under this id
    #[error("connection {0} not existed")]
    NotExisted(String),

    /// Drop refused while shared attachers still hold the connection
    #[error("connection {0} can't be dropped due to reference")]
    StillReferenced(String),

    /// Deleting the persisted record failed; the connection stays live
    #[error("drop connection {id} failed, err:{cause}")]
    DropFailed { id: String, cause: String },

    /// I/O failure talking to the external system (retryable)
    #[error("io error: {0}")]
    Io(String),

    /// Timed out waiting for the external system (retryable)
    #[error("timeout: {0}")]
    Timeout(String),

    /// Configuration rejected by the factory or driver
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication rejected by the external system
    #[error("authentication error: {0}")]
    Auth(String),

    /// Key-value store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Property bag serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConnectionError {
    /// True for I/O-class failures worth retrying under backoff.
    ///
    /// Everything else is treated as permanent: retrying a bad credential
    /// or an unknown host option cannot succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_))
    }

    /// Create an I/O error
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
