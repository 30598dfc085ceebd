//! Error types for the outer surfaces of the engine.
//!
//! Evaluation and rendering never fail: missing data, bad arithmetic and
//! type mismatches degrade to neutral values. Errors only exist where the
//! engine talks to collaborators or the caller (store access, cancellation,
//! configuration).

use thiserror::Error;

/// Errors reported by [`crate::store::SchemaStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("schema not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed schema document '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the engine to its caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("resolution cancelled")]
    Cancelled,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Stable error code for host-side reporting
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::Store(_) => "STORE",
            Self::Config(_) => "CONFIG",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(EngineError::Cancelled.code(), "CANCELLED");
        assert_eq!(EngineError::Config("x".into()).code(), "CONFIG");
        assert_eq!(
            EngineError::from(StoreError::NotFound("w".into())).code(),
            "STORE"
        );
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Parse {
            path: "ticker.json".into(),
            message: "expected value".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed schema document 'ticker.json': expected value"
        );
    }
}
