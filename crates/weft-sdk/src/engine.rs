//! NativeEngine trait: the engine side of the bridge
//!
//! Defines the interface a native UI engine implements. The bridge programs
//! against this trait only; it never sees engine internals and never
//! dereferences a handle.

use crate::error::AbiResult;
use crate::handle::{NativeHandle, NativeType, PropertyHandle};
use crate::value::NativeValue;
use std::sync::Arc;

/// Value representations the engine stores natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativePrimitive {
    /// `bool`
    Bool,
    /// `i16`
    Int16,
    /// `u16`
    UInt16,
    /// `i32`
    Int32,
    /// `u32`
    UInt32,
    /// `f32`
    Single,
    /// `f64`
    Double,
    /// UTF-8 string
    String,
}

/// Shape of a type being registered with the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeTypeKind {
    /// Primitive value type
    Primitive(NativePrimitive),
    /// Enumeration stored as `i32`
    Enum,
    /// Nullable wrapper around another registered type
    Nullable(NativeType),
    /// Reference-counted object type
    Class,
}

/// Type registration request
#[derive(Debug, Clone, Copy)]
pub struct NativeTypeDesc<'a> {
    /// Fully qualified type name
    pub name: &'a str,
    /// Registered base type (classes only)
    pub base: Option<NativeType>,
    /// Kind of type
    pub kind: NativeTypeKind,
    /// Instances can be frozen (made immutable and shareable across threads)
    pub freezable: bool,
}

impl<'a> NativeTypeDesc<'a> {
    /// Describe a class type
    pub fn class(name: &'a str, base: Option<NativeType>) -> Self {
        Self {
            name,
            base,
            kind: NativeTypeKind::Class,
            freezable: false,
        }
    }

    /// Describe a primitive value type
    pub fn primitive(name: &'a str, primitive: NativePrimitive) -> Self {
        Self {
            name,
            base: None,
            kind: NativeTypeKind::Primitive(primitive),
            freezable: false,
        }
    }

    /// Mark instances of the type as freezable
    pub fn freezable(mut self) -> Self {
        self.freezable = true;
        self
    }
}

/// Metadata attached to a native property registration or override
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NativeMetadata {
    /// Default value in native representation
    pub default_value: NativeValue,
    /// The managed side wants change notifications for this property
    pub notify_changed: bool,
    /// The managed side coerces values for this property
    pub coerces: bool,
}

impl NativeMetadata {
    /// Metadata with only a default value
    pub fn with_default(default_value: NativeValue) -> Self {
        Self {
            default_value,
            ..Default::default()
        }
    }
}

/// Notification payload for a native property change
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChanged {
    /// Object whose value changed
    pub object: NativeHandle,
    /// Property that changed
    pub property: PropertyHandle,
    /// Previous effective value
    pub old_value: NativeValue,
    /// New effective value
    pub new_value: NativeValue,
}

/// Called when the engine destroys an object the bridge asked to watch
pub type DestroyedCallback = Arc<dyn Fn(NativeHandle) + Send + Sync>;

/// Called when a watched property value changes on the native side
pub type PropertyChangedCallback = Arc<dyn Fn(&PropertyChanged) + Send + Sync>;

/// Called with the new reference count whenever an object's count changes
pub type ReferenceHook = Arc<dyn Fn(NativeHandle, u32) + Send + Sync>;

/// Abstract native engine.
///
/// Implementations must invoke callbacks without holding their own internal
/// locks: callbacks re-enter the bridge, and the bridge may call back into the
/// engine while handling them.
pub trait NativeEngine: Send + Sync {
    // ========================================================================
    // Types
    // ========================================================================

    /// Register a type, or find the existing registration with the same name
    fn register_type(&self, desc: &NativeTypeDesc<'_>) -> AbiResult<NativeType>;

    // ========================================================================
    // Object Lifetime
    // ========================================================================

    /// Allocate a new native object of a registered class type
    fn new_object(&self, ty: NativeType) -> AbiResult<NativeHandle>;

    /// Get the runtime type of an object
    fn type_of(&self, handle: NativeHandle) -> AbiResult<NativeType>;

    /// Add a reference; returns the new count (0 for a dead handle)
    fn add_reference(&self, handle: NativeHandle) -> u32;

    /// Release a reference; returns the remaining count. The object is
    /// destroyed when the count reaches zero.
    fn release(&self, handle: NativeHandle) -> u32;

    /// Current reference count (0 for a dead handle)
    fn reference_count(&self, handle: NativeHandle) -> u32;

    /// Make an object immutable; returns false when it cannot be frozen
    fn freeze(&self, handle: NativeHandle) -> bool;

    // ========================================================================
    // Properties
    // ========================================================================

    /// Register a property, or find the existing registration for
    /// (`owner`, `name`)
    fn register_property(
        &self,
        owner: NativeType,
        name: &str,
        value_type: NativeType,
        metadata: &NativeMetadata,
    ) -> AbiResult<PropertyHandle>;

    /// Replace the metadata of `property` for `target` and its subtypes
    fn override_metadata(
        &self,
        target: NativeType,
        property: PropertyHandle,
        metadata: &NativeMetadata,
    ) -> AbiResult<()>;

    /// Read the effective value of a property
    fn get_value(&self, object: NativeHandle, property: PropertyHandle) -> AbiResult<NativeValue>;

    /// Write the local value of a property
    fn set_value(
        &self,
        object: NativeHandle,
        property: PropertyHandle,
        value: NativeValue,
    ) -> AbiResult<()>;

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Ask to be told when `handle` is destroyed
    fn bind_destroyed(&self, handle: NativeHandle, callback: DestroyedCallback) -> AbiResult<()>;

    /// Stop watching `handle`; unknown handles are ignored
    fn unbind_destroyed(&self, handle: NativeHandle);

    /// Install the engine-wide property change callback
    fn bind_property_changed(&self, callback: PropertyChangedCallback);

    /// Install the engine-wide reference count hook
    fn bind_reference_hook(&self, hook: ReferenceHook);
}
