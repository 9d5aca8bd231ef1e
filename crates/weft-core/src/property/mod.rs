//! Dependency properties
//!
//! A [`DependencyProperty`] is the managed wrapper of one native property
//! registration. The wrapper outlives the registration: when the engine is
//! reloaded the wrapper is unbound (its handle becomes NULL) and later rebound
//! to a fresh registration, so code holding the wrapper keeps working. The
//! owner follows the class too: when the owning class is reloaded the wrapper
//! moves over to the new generation of the type.

pub mod dispatch;
mod metadata;
mod registry;

pub use metadata::{ChangedCallback, CoerceCallback, PropertyChange, PropertyMetadata};
pub use registry::PropertyRegistry;

use crate::types::{normalize, ClassKey, TypeRef, WeakTypeEntry};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use weft_sdk::PropertyHandle;

/// Managed wrapper of a native property registration
pub struct DependencyProperty {
    name: String,
    class: ClassKey,
    owner: RwLock<WeakTypeEntry>,
    property_type: TypeRef,
    storage_type: TypeRef,
    metadata: PropertyMetadata,
    native: AtomicUsize,
    overrides: RwLock<Vec<(WeakTypeEntry, PropertyMetadata)>>,
}

impl DependencyProperty {
    pub(crate) fn new(
        name: &str,
        owner: &TypeRef,
        property_type: &TypeRef,
        metadata: PropertyMetadata,
        native: PropertyHandle,
    ) -> Self {
        Self {
            name: name.to_string(),
            class: owner.class_key().clone(),
            owner: RwLock::new(WeakTypeEntry::new(owner)),
            property_type: property_type.clone(),
            storage_type: normalize(property_type),
            metadata: metadata.filled(property_type),
            native: AtomicUsize::new(native.as_raw()),
            overrides: RwLock::new(Vec::new()),
        }
    }

    /// A wrapper with no native registration
    #[cfg(test)]
    pub(crate) fn detached(name: &str, owner: &TypeRef, property_type: &TypeRef) -> Self {
        Self::new(
            name,
            owner,
            property_type,
            PropertyMetadata::new(),
            PropertyHandle::NULL,
        )
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning type, if still loaded
    pub fn owner_type(&self) -> Option<TypeRef> {
        self.owner.read().upgrade()
    }

    /// Name of the owning type
    pub fn owner_name(&self) -> &str {
        self.class.as_str()
    }

    /// Logical class of the owning type
    pub fn owner_class(&self) -> &ClassKey {
        &self.class
    }

    /// Check if `ty` is the owning type
    pub fn is_owned_by(&self, ty: &TypeRef) -> bool {
        self.owner.read().matches(ty)
    }

    /// Move the wrapper to a later generation of its owning class
    pub(crate) fn set_owner(&self, owner: &TypeRef) {
        debug_assert_eq!(owner.class_key(), &self.class);
        *self.owner.write() = WeakTypeEntry::new(owner);
    }

    /// Declared value type
    pub fn property_type(&self) -> &TypeRef {
        &self.property_type
    }

    /// Type the value is stored as natively
    pub fn storage_type(&self) -> &TypeRef {
        &self.storage_type
    }

    /// Metadata given at registration, with the default filled in
    pub fn default_metadata(&self) -> &PropertyMetadata {
        &self.metadata
    }

    /// Native registration, or NULL while disposed
    pub fn native_handle(&self) -> PropertyHandle {
        PropertyHandle::from_raw(self.native.load(Ordering::Acquire))
    }

    /// Check if the wrapper has no native registration
    pub fn is_disposed(&self) -> bool {
        self.native_handle().is_null()
    }

    pub(crate) fn rebind(&self, handle: PropertyHandle) {
        self.native.store(handle.as_raw(), Ordering::Release);
    }

    pub(crate) fn unbind(&self) {
        self.native.store(0, Ordering::Release);
    }

    /// Effective metadata for instances of `ty`.
    ///
    /// Walks `ty` and its bases for the nearest override; falls back to the
    /// registration metadata.
    pub fn metadata_for(&self, ty: &TypeRef) -> PropertyMetadata {
        let overrides = self.overrides.read();
        if !overrides.is_empty() {
            for ancestor in ty.ancestors() {
                if let Some((_, metadata)) =
                    overrides.iter().find(|(entry, _)| entry.matches(&ancestor))
                {
                    return metadata.clone();
                }
            }
        }
        self.metadata.clone()
    }

    pub(crate) fn set_override(&self, ty: &TypeRef, metadata: PropertyMetadata) {
        let mut overrides = self.overrides.write();
        overrides.retain(|(entry, _)| entry.is_alive() && !entry.matches(ty));
        overrides.push((WeakTypeEntry::new(ty), metadata));
    }

    /// Number of types with overridden metadata
    pub fn override_count(&self) -> usize {
        self.overrides.read().len()
    }
}

impl fmt::Debug for DependencyProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyProperty")
            .field("name", &self.name)
            .field("owner", &*self.owner.read())
            .field("type", &self.property_type.name())
            .field("native", &self.native_handle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;
    use crate::value::Value;

    fn control() -> TypeRef {
        TypeRef::class("App.Control")
            .base(&TypeRef::dependency_object())
            .build()
    }

    #[test]
    fn test_bind_and_unbind() {
        let owner = control();
        let property = DependencyProperty::detached(
            "Count",
            &owner,
            &TypeRef::primitive(Primitive::Int64),
        );
        assert!(property.is_disposed());
        assert_eq!(property.storage_type(), &TypeRef::primitive(Primitive::Int32));
        assert_eq!(property.default_metadata().default_value(), Some(&Value::I64(0)));

        property.rebind(PropertyHandle::from_raw(0x50));
        assert!(!property.is_disposed());
        property.unbind();
        assert!(property.native_handle().is_null());
    }

    #[test]
    fn test_owner_is_weak() {
        let owner = control();
        let property = DependencyProperty::detached("Text", &owner, &TypeRef::string());
        assert!(property.is_owned_by(&owner));
        drop(owner);
        assert!(property.owner_type().is_none());
        assert_eq!(property.owner_name(), "App.Control");
    }

    #[test]
    fn test_owner_moves_to_next_generation() {
        let first = control();
        let property = DependencyProperty::detached("Text", &first, &TypeRef::string());
        let second = control();

        property.set_owner(&second);
        assert!(property.is_owned_by(&second));
        assert!(!property.is_owned_by(&first));
        assert_eq!(property.owner_type(), Some(second));
        assert_eq!(property.owner_class(), first.class_key());
    }

    #[test]
    fn test_metadata_for_walks_bases() {
        let owner = control();
        let button = TypeRef::class("App.Button").base(&owner).build();
        let repeat = TypeRef::class("App.RepeatButton").base(&button).build();
        let property = DependencyProperty::detached(
            "Width",
            &owner,
            &TypeRef::primitive(Primitive::Double),
        );

        property.set_override(&button, PropertyMetadata::with_default(80.0));
        assert_eq!(
            property.metadata_for(&repeat).default_value(),
            Some(&Value::F64(80.0))
        );
        assert_eq!(
            property.metadata_for(&owner).default_value(),
            Some(&Value::F64(0.0))
        );

        property.set_override(&button, PropertyMetadata::with_default(90.0));
        assert_eq!(property.override_count(), 1);
        assert_eq!(
            property.metadata_for(&button).default_value(),
            Some(&Value::F64(90.0))
        );
    }
}
