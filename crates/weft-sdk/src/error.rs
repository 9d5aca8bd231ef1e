//! Error types for the native engine contract

use crate::handle::{NativeHandle, NativeType, PropertyHandle};

/// Result type for engine calls
pub type AbiResult<T> = Result<T, NativeError>;

/// Native engine error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// Object handle is null or no longer alive
    #[error("Invalid native object handle: {0}")]
    InvalidHandle(NativeHandle),

    /// Type handle was never registered (or belongs to a previous engine session)
    #[error("Unknown native type: {0}")]
    UnknownType(NativeType),

    /// Property handle was never registered (or belongs to a previous engine session)
    #[error("Unknown native property: {0}")]
    UnknownProperty(PropertyHandle),

    /// Value representation does not match the property's native type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected representation
        expected: String,
        /// Actual representation
        got: String,
    },

    /// Engine-reported failure
    #[error("{0}")]
    Engine(String),
}

impl From<String> for NativeError {
    fn from(s: String) -> Self {
        NativeError::Engine(s)
    }
}

impl From<&str> for NativeError {
    fn from(s: &str) -> Self {
        NativeError::Engine(s.to_string())
    }
}
