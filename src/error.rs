use std::path::PathBuf;
use thiserror::Error;

/// Error codes shared by the foreign-call surface and the wire protocol
pub mod code {
    pub const OK: i32 = 0;
    pub const INVALID_HANDLE: i32 = -1;
    pub const ALLOCATION_FAILED: i32 = -2;
    pub const IO_ERROR: i32 = -3;
    pub const INVALID_ARGUMENT: i32 = -4;
    pub const NOT_FOUND: i32 = -5;
}

/// Main error type for index, codec and driver operations
#[derive(Error, Debug)]
pub enum FtsError {
    #[error("index is already built; no further documents can be added")]
    AlreadyBuilt,

    #[error("index is not built yet; call build() before searching")]
    NotBuilt,

    #[error("index has been closed")]
    Closed,

    #[error("FST keys must be strictly ascending: {key:?} inserted after {previous:?}")]
    KeysNotSorted { previous: Vec<u8>, key: Vec<u8> },

    #[error("invalid or destroyed index handle")]
    InvalidHandle,

    #[error("allocation failed")]
    AllocationFailed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt segment {}: {reason}", path.display())]
    CorruptSegment { path: PathBuf, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Remote(String),

    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for fts operations
pub type Result<T> = std::result::Result<T, FtsError>;

impl FtsError {
    /// Integer code used across the native boundary
    pub fn code(&self) -> i32 {
        match self {
            FtsError::InvalidHandle => code::INVALID_HANDLE,
            FtsError::AllocationFailed => code::ALLOCATION_FAILED,
            FtsError::Io(_)
            | FtsError::Json(_)
            | FtsError::CorruptSegment { .. }
            | FtsError::Protocol(_)
            | FtsError::Remote(_) => code::IO_ERROR,
            FtsError::NotFound(_) | FtsError::UnknownDriver(_) => code::NOT_FOUND,
            FtsError::AlreadyBuilt
            | FtsError::NotBuilt
            | FtsError::Closed
            | FtsError::KeysNotSorted { .. }
            | FtsError::InvalidArgument(_) => code::INVALID_ARGUMENT,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FtsError::CorruptSegment {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FtsError::KeysNotSorted {
            previous: b"b".to_vec(),
            key: b"a".to_vec(),
        };
        assert!(err.to_string().contains("strictly ascending"));

        let err = FtsError::corrupt("/tmp/seg_0001.fts", "bad magic");
        assert_eq!(err.to_string(), "corrupt segment /tmp/seg_0001.fts: bad magic");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(FtsError::InvalidHandle.code(), code::INVALID_HANDLE);
        assert_eq!(FtsError::AllocationFailed.code(), code::ALLOCATION_FAILED);
        assert_eq!(FtsError::AlreadyBuilt.code(), code::INVALID_ARGUMENT);
        assert_eq!(FtsError::NotBuilt.code(), code::INVALID_ARGUMENT);
        assert_eq!(FtsError::NotFound("x".into()).code(), code::NOT_FOUND);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(FtsError::from(io).code(), code::IO_ERROR);
    }
}
