//! Weft core
//!
//! Managed side of a native object bridge:
//! - Proxy objects with one-proxy-per-native-object identity
//! - Owning and observing native lifetimes
//! - Dependency property registration, metadata overrides and typed get/set
//! - Resurrection of property wrappers and overrides after the native engine
//!   is reinitialized or a managed class is reloaded
//!
//! Everything hangs off a [`Bridge`], which drives any [`weft_sdk::NativeEngine`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod bridge;
pub mod error;
mod natives;
pub mod options;
pub mod property;
pub mod proxy;
pub mod resurrection;
pub mod types;
pub mod value;

pub use bridge::Bridge;
pub use error::{BridgeError, BridgeResult};
pub use options::{BridgeOptions, ConfigError, ResurrectionOptions};
pub use property::{DependencyProperty, PropertyChange, PropertyMetadata};
pub use proxy::{Ownership, Proxy, ProxyObject};
pub use resurrection::ResurrectionReport;
pub use types::{Capability, ClassKey, Primitive, TypeKind, TypeRef};
pub use value::Value;
