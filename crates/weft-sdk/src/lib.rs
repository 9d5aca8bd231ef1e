//! Weft SDK - contract between the object bridge and a native engine
//!
//! This crate provides the minimal types and traits a native UI engine has to
//! expose so the Weft bridge can mirror its reference-counted objects:
//!
//! - Opaque handles (`NativeHandle`, `NativeType`, `PropertyHandle`)
//! - The `NativeValue` marshaling value
//! - The `NativeEngine` trait (object lifetime, property registration,
//!   value access, destruction and change notifications)
//! - `MemoryEngine`, an in-process engine with reference-count probes
//!
//! # Example
//!
//! ```ignore
//! use weft_sdk::{MemoryEngine, NativeEngine, NativeTypeDesc, NativeTypeKind};
//!
//! let engine = MemoryEngine::new();
//! let ty = engine.register_type(&NativeTypeDesc::class("Demo.Panel", None))?;
//! let handle = engine.new_object(ty)?;
//! assert_eq!(engine.reference_count(handle), 1);
//! engine.release(handle);
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod handle;
pub mod memory;
pub mod value;

pub use engine::{
    DestroyedCallback, NativeEngine, NativeMetadata, NativePrimitive, NativeTypeDesc,
    NativeTypeKind, PropertyChanged, PropertyChangedCallback, ReferenceHook,
};
pub use error::{AbiResult, NativeError};
pub use handle::{NativeHandle, NativeType, PropertyHandle};
pub use memory::{EngineStats, MemoryEngine};
pub use value::{NativeValue, NativeValueKind};
