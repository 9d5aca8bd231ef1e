//! Bridge error types

use crate::options::ConfigError;
use weft_sdk::NativeError;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors reported by the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Caller passed a malformed argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Registration default does not fit the property type
    #[error("Default value {value} of property '{property}' is not assignable to {expected}")]
    InvalidDefaultValue {
        /// Property being registered
        property: String,
        /// Declared property type
        expected: String,
        /// Offending value
        value: String,
    },

    /// Object default could not be frozen for sharing across threads
    #[error("Default value of property '{property}' is a thread-affine object that cannot be frozen")]
    UnfreezableThreadAffineDefault {
        /// Property being registered
        property: String,
    },

    /// Value does not fit the property type
    #[error("Value {value} is not valid for property '{property}' of type {expected}")]
    InvalidValue {
        /// Target property
        property: String,
        /// Declared property type
        expected: String,
        /// Offending value
        value: String,
    },

    /// Value fits the managed type but not the native storage type
    #[error("Value {value} of property '{property}' does not fit native {storage}")]
    ValueOutOfRange {
        /// Target property
        property: String,
        /// Native storage type
        storage: String,
        /// Offending value
        value: String,
    },

    /// Proxy has no native object any more
    #[error("Object of type {0} has been disposed")]
    ObjectDisposed(String),

    /// Property has no native registration and could not be rebound
    #[error("Property '{0}' has been disposed")]
    PropertyDisposed(String),

    /// Proxy outlived the bridge that created it
    #[error("Proxy is not attached to a live bridge")]
    Detached,

    /// A recorded override names a property the type no longer exposes
    #[error("Type {type_name} has no static member '{member}'")]
    MissingResurrectionTarget {
        /// Type being resurrected
        type_name: String,
        /// Member looked up
        member: String,
    },

    /// Native engine call failed
    #[error("Native engine error: {0}")]
    Native(#[from] NativeError),

    /// Options could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// Check if the error is recoverable by re-registering with the engine
    pub fn is_disposal(&self) -> bool {
        matches!(
            self,
            BridgeError::ObjectDisposed(_) | BridgeError::PropertyDisposed(_) | BridgeError::Detached
        )
    }
}
