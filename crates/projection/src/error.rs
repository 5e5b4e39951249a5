//! Error types for coordinate reference system handling.

use thiserror::Error;

/// Result type for projection operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Errors raised while parsing reference systems or transforming coordinates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// The reference system is recognised but has no known definition.
    #[error("unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// The reference system definition could not be parsed.
    #[error("invalid CRS definition: {0}")]
    InvalidDefinition(String),

    /// The underlying projection library rejected a transform.
    #[error("coordinate transform from {from} to {to} failed: {message}")]
    TransformFailed {
        from: String,
        to: String,
        message: String,
    },
}

impl ProjectionError {
    /// Create a TransformFailed error.
    pub fn transform_failed(
        from: impl ToString,
        to: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::TransformFailed {
            from: from.to_string(),
            to: to.to_string(),
            message: message.into(),
        }
    }
}
