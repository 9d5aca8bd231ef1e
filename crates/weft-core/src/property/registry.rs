//! Dependency property registration
//!
//! [`PropertyRegistry`] caches live wrappers by (owner type, name) and by
//! native handle. Registration itself lives on the bridge because it needs
//! the engine, the native type cache and the resurrection managers.

use super::{DependencyProperty, PropertyMetadata};
use crate::bridge::BridgeInner;
use crate::error::{BridgeError, BridgeResult};
use crate::property::dispatch;
use crate::types::{normalize, Capability, TypeRef, WeakTypeEntry};
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};
use tracing::debug;
use weft_sdk::{NativeMetadata, PropertyHandle};

#[derive(Default)]
struct Tables {
    by_key: FxHashMap<(WeakTypeEntry, String), Weak<DependencyProperty>>,
    by_native: FxHashMap<PropertyHandle, Weak<DependencyProperty>>,
}

/// Cache of live property wrappers
#[derive(Default)]
pub struct PropertyRegistry {
    tables: Mutex<Tables>,
}

impl PropertyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a bound wrapper by owner and name
    pub fn find(&self, owner: &TypeRef, name: &str) -> Option<Arc<DependencyProperty>> {
        let key = (WeakTypeEntry::new(owner), name.to_string());
        self.tables
            .lock()
            .by_key
            .get(&key)
            .and_then(Weak::upgrade)
            .filter(|property| !property.is_disposed())
    }

    /// Find a bound wrapper by native handle
    pub fn by_handle(&self, handle: PropertyHandle) -> Option<Arc<DependencyProperty>> {
        self.tables
            .lock()
            .by_native
            .get(&handle)
            .and_then(Weak::upgrade)
            .filter(|property| property.native_handle() == handle)
    }

    pub(crate) fn insert(&self, owner: &TypeRef, property: &Arc<DependencyProperty>) {
        let mut tables = self.tables.lock();
        tables.by_key.insert(
            (WeakTypeEntry::new(owner), property.name().to_string()),
            Arc::downgrade(property),
        );
        tables
            .by_native
            .insert(property.native_handle(), Arc::downgrade(property));
    }

    /// Unbind every live wrapper and empty the cache; returns how many
    /// wrappers were unbound
    pub(crate) fn unbind_all(&self) -> usize {
        let tables = std::mem::take(&mut *self.tables.lock());
        let mut unbound = 0;
        for property in tables.by_native.values().filter_map(Weak::upgrade) {
            property.unbind();
            unbound += 1;
        }
        unbound
    }

    /// Drop cache entries for unloaded owners and dead wrappers
    pub fn prune(&self) -> usize {
        let mut tables = self.tables.lock();
        let before = tables.by_key.len() + tables.by_native.len();
        tables
            .by_key
            .retain(|(owner, _), property| owner.is_alive() && property.strong_count() > 0);
        tables
            .by_native
            .retain(|_, property| property.strong_count() > 0);
        before - tables.by_key.len() - tables.by_native.len()
    }

    /// Number of cached (owner, name) registrations
    pub fn len(&self) -> usize {
        self.tables.lock().by_key.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.tables.lock().by_key.is_empty()
    }
}

impl BridgeInner {
    /// Register `name` on `owner`, or return the live wrapper for it.
    ///
    /// A wrapper from an earlier engine generation, or from an earlier load
    /// of the owning class, is rebound to the new registration and returned
    /// instead of a new wrapper.
    pub(crate) fn register_property(
        &self,
        name: &str,
        value_type: &TypeRef,
        owner: &TypeRef,
        metadata: Option<PropertyMetadata>,
    ) -> BridgeResult<Arc<DependencyProperty>> {
        if name.trim().is_empty() {
            return Err(BridgeError::InvalidArgument(
                "property name must not be empty".to_string(),
            ));
        }
        if !owner.is_class() {
            return Err(BridgeError::InvalidArgument(format!(
                "owner type {} is not a class",
                owner.name()
            )));
        }
        let metadata = self.prepare_metadata(name, value_type, metadata)?;
        self.register_prepared(name, value_type, owner, metadata)
    }

    /// Registration with metadata that already went through
    /// `prepare_metadata` once.
    ///
    /// Replay and lazy rebinding come through here: an object default was
    /// frozen when it was first registered and may since have been detached
    /// by an engine reload, so it is not validated again.
    pub(crate) fn register_prepared(
        &self,
        name: &str,
        value_type: &TypeRef,
        owner: &TypeRef,
        metadata: PropertyMetadata,
    ) -> BridgeResult<Arc<DependencyProperty>> {
        if let Some(existing) = self.properties.find(owner, name) {
            return Ok(existing);
        }
        let owner_native = self.native_type(owner)?;
        let value_native = self.native_type(&normalize(value_type))?;
        // Registering the owner may have replayed this very property.
        if let Some(existing) = self.properties.find(owner, name) {
            return Ok(existing);
        }

        let native_metadata = self.native_metadata(name, value_type, &metadata)?;
        let handle =
            self.engine
                .register_property(owner_native, name, value_native, &native_metadata)?;

        if self.options.resurrection.properties {
            if let Some(survivor) = self.property_records.try_resurrect(handle, owner, name) {
                debug!(property = name, owner = %owner, %handle, "rebound surviving property");
                self.properties.insert(owner, &survivor);
                return Ok(survivor);
            }
        }
        self.property_records.remove(owner, name);

        let property = Arc::new(DependencyProperty::new(
            name,
            owner,
            value_type,
            metadata.clone(),
            handle,
        ));
        self.properties.insert(owner, &property);
        self.property_records
            .register(&property, owner, name, value_type, &metadata);
        debug!(property = name, owner = %owner, %handle, "registered property");
        Ok(property)
    }

    /// Override `property`'s metadata for `for_type` and its subtypes
    pub(crate) fn override_metadata(
        &self,
        property: &DependencyProperty,
        for_type: &TypeRef,
        metadata: PropertyMetadata,
    ) -> BridgeResult<()> {
        if !for_type.is_subclass_of(&TypeRef::dependency_object()) {
            return Err(BridgeError::InvalidArgument(format!(
                "type {} does not derive from {}",
                for_type.name(),
                TypeRef::dependency_object().name()
            )));
        }
        if let Some(value) = metadata.default_value() {
            self.validate_default(property.name(), property.property_type(), value)?;
        }
        if self.options.resurrection.metadata_overrides {
            self.override_records
                .register(for_type, property.name(), &metadata);
        }
        self.apply_override(property, for_type, metadata)
    }

    /// Push already validated override metadata to the engine
    pub(crate) fn apply_override(
        &self,
        property: &DependencyProperty,
        for_type: &TypeRef,
        metadata: PropertyMetadata,
    ) -> BridgeResult<()> {
        let target = self.native_type(for_type)?;
        let handle = self.bound_property(property)?;
        let effective = metadata.inherit(&property.metadata_for(for_type));
        let native_metadata =
            self.native_metadata(property.name(), property.property_type(), &effective)?;
        self.engine
            .override_metadata(target, handle, &native_metadata)?;
        property.set_override(for_type, effective);
        debug!(property = property.name(), for_type = %for_type, "overrode metadata");
        Ok(())
    }

    /// Native registration of `property`, rebinding it first if the engine
    /// was reloaded since it was last used
    pub(crate) fn bound_property(&self, property: &DependencyProperty) -> BridgeResult<PropertyHandle> {
        if !property.is_disposed() {
            return Ok(property.native_handle());
        }
        let disposed = || BridgeError::PropertyDisposed(property.name().to_string());
        let owner = property.owner_type().ok_or_else(disposed)?;
        self.native_type(&owner)?;
        if property.is_disposed() && self.options.resurrection.properties {
            self.register_prepared(
                property.name(),
                property.property_type(),
                &owner,
                property.default_metadata().clone(),
            )?;
        }
        if property.is_disposed() {
            return Err(disposed());
        }
        Ok(property.native_handle())
    }

    fn prepare_metadata(
        &self,
        name: &str,
        value_type: &TypeRef,
        metadata: Option<PropertyMetadata>,
    ) -> BridgeResult<PropertyMetadata> {
        let mut metadata = metadata.unwrap_or_default();
        match metadata.default_value() {
            Some(value) => self.validate_default(name, value_type, value)?,
            None => metadata.set_default(Value::zero_for(value_type)),
        }
        Ok(metadata)
    }

    fn validate_default(&self, name: &str, ty: &TypeRef, value: &Value) -> BridgeResult<()> {
        if !value.is_assignable_to(ty) {
            return Err(BridgeError::InvalidDefaultValue {
                property: name.to_string(),
                expected: ty.name().to_string(),
                value: format!("{value:?}"),
            });
        }
        if let Value::Object(object) = value {
            let frozen = object.supports(&Capability::Freezable)
                && !object.is_disposed()
                && self.engine.freeze(object.handle());
            if !frozen {
                return Err(BridgeError::UnfreezableThreadAffineDefault {
                    property: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn native_metadata(
        &self,
        name: &str,
        ty: &TypeRef,
        metadata: &PropertyMetadata,
    ) -> BridgeResult<NativeMetadata> {
        let default = match metadata.default_value() {
            // Detached by an engine reload; the new engine has no such object.
            Some(Value::Object(object)) if object.is_disposed() => Value::Null,
            Some(value) => value.clone(),
            None => Value::Null,
        };
        let default_value =
            dispatch::to_native(&default, ty).ok_or_else(|| BridgeError::ValueOutOfRange {
                property: name.to_string(),
                storage: normalize(ty).name().to_string(),
                value: format!("{default:?}"),
            })?;
        Ok(NativeMetadata {
            default_value,
            notify_changed: metadata.changed_callback().is_some(),
            coerces: metadata.coerce_callback().is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;

    #[test]
    fn test_cache_lookup() {
        let registry = PropertyRegistry::new();
        let owner = TypeRef::class("App.Control").build();
        let property = Arc::new(DependencyProperty::new(
            "Width",
            &owner,
            &TypeRef::primitive(Primitive::Double),
            PropertyMetadata::new(),
            PropertyHandle::from_raw(0x80),
        ));
        registry.insert(&owner, &property);

        assert!(registry.find(&owner, "Width").is_some());
        assert!(registry.find(&owner, "Height").is_none());
        assert!(registry.by_handle(PropertyHandle::from_raw(0x80)).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unbind_all() {
        let registry = PropertyRegistry::new();
        let owner = TypeRef::class("App.Control").build();
        let property = Arc::new(DependencyProperty::new(
            "Width",
            &owner,
            &TypeRef::primitive(Primitive::Double),
            PropertyMetadata::new(),
            PropertyHandle::from_raw(0x80),
        ));
        registry.insert(&owner, &property);

        assert_eq!(registry.unbind_all(), 1);
        assert!(property.is_disposed());
        assert!(registry.is_empty());
        assert!(registry.by_handle(PropertyHandle::from_raw(0x80)).is_none());
    }

    #[test]
    fn test_prune_unloaded_owner() {
        let registry = PropertyRegistry::new();
        let owner = TypeRef::class("App.Control").build();
        let property = Arc::new(DependencyProperty::new(
            "Width",
            &owner,
            &TypeRef::primitive(Primitive::Double),
            PropertyMetadata::new(),
            PropertyHandle::from_raw(0x80),
        ));
        registry.insert(&owner, &property);
        drop(owner);

        assert_eq!(registry.prune(), 1);
        assert!(registry.is_empty());
        drop(property);
        assert_eq!(registry.prune(), 1);
    }
}
