//! The bridge context
//!
//! A [`Bridge`] binds one native engine to the managed object model. It owns
//! the proxy identity table, the native type cache, the property registry and
//! both resurrection managers, and it receives the engine's notifications
//! (object destroyed, reference count changed, property changed).
//!
//! No bridge lock is ever held across an engine call or while a proxy may be
//! dropped, so engines are free to call back into the bridge synchronously.

use crate::error::{BridgeError, BridgeResult};
use crate::natives::NativeTypeTable;
use crate::options::BridgeOptions;
use crate::property::{dispatch, DependencyProperty, PropertyChange, PropertyMetadata, PropertyRegistry};
use crate::proxy::{EntryKind, HandleSlot, Ownership, Proxy, ProxyObject, ProxyTable};
use crate::resurrection::{MetadataOverrideResurrection, PropertyResurrection, ResurrectionReport};
use crate::types::{normalize, Primitive, TypeKind, TypeRef};
use crate::value::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};
use weft_sdk::{
    NativeEngine, NativeHandle, NativePrimitive, NativeType, NativeTypeDesc, NativeTypeKind,
    PropertyChanged, PropertyHandle,
};

pub(crate) struct BridgeInner {
    this: Weak<BridgeInner>,
    pub(crate) engine: Arc<dyn NativeEngine>,
    pub(crate) options: BridgeOptions,
    pub(crate) proxies: ProxyTable,
    pub(crate) natives: NativeTypeTable,
    pub(crate) properties: PropertyRegistry,
    pub(crate) property_records: PropertyResurrection,
    pub(crate) override_records: MetadataOverrideResurrection,
    generation: AtomicU64,
}

/// Shared handle to a bridge context
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Create a bridge over `engine` with default options
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self::with_options(engine, BridgeOptions::default())
    }

    /// Create a bridge over `engine`
    pub fn with_options(engine: Arc<dyn NativeEngine>, options: BridgeOptions) -> Self {
        let inner = Arc::new_cyclic(|this| BridgeInner {
            this: this.clone(),
            engine,
            options,
            proxies: ProxyTable::new(),
            natives: NativeTypeTable::default(),
            properties: PropertyRegistry::new(),
            property_records: PropertyResurrection::new(),
            override_records: MetadataOverrideResurrection::new(),
            generation: AtomicU64::new(0),
        });
        inner.bind_engine_callbacks();
        info!(?options, "bridge created");
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<BridgeInner>) -> Self {
        Self { inner }
    }

    /// Bridge options
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// The native engine
    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.inner.engine
    }

    /// Number of times the native engine has been reloaded
    pub fn native_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    // ========================================================================
    // Proxies
    // ========================================================================

    /// Construct a new native object of class `ty` and return its owning proxy
    pub fn create(&self, ty: &TypeRef) -> BridgeResult<Proxy> {
        self.inner.create(ty)
    }

    /// Get the proxy for a native object, creating one if needed.
    ///
    /// With `add_ref_if_new` a new proxy takes a reference and owns the
    /// object; otherwise it observes it. Returns `None` only for NULL.
    pub fn get_proxy(&self, handle: NativeHandle, add_ref_if_new: bool) -> Option<Proxy> {
        self.inner.get_proxy(handle, add_ref_if_new)
    }

    /// Get the live proxy for a native object without creating one
    pub fn lookup_proxy(&self, handle: NativeHandle) -> Option<Proxy> {
        self.inner.proxies.lookup(handle)
    }

    /// The proxy identity table
    pub fn proxies(&self) -> &ProxyTable {
        &self.inner.proxies
    }

    // ========================================================================
    // Types and Properties
    // ========================================================================

    /// Native registration of a managed type, registering it if needed
    pub fn native_type(&self, ty: &TypeRef) -> BridgeResult<NativeType> {
        self.inner.native_type(ty)
    }

    /// Register a dependency property `name` of type `value_type` on `owner`
    pub fn register_property(
        &self,
        name: &str,
        value_type: &TypeRef,
        owner: &TypeRef,
        metadata: Option<PropertyMetadata>,
    ) -> BridgeResult<Arc<DependencyProperty>> {
        self.inner
            .register_property(name, value_type, owner, metadata)
    }

    /// Override the metadata of `property` for `for_type` and its subtypes
    pub fn override_metadata(
        &self,
        property: &DependencyProperty,
        for_type: &TypeRef,
        metadata: PropertyMetadata,
    ) -> BridgeResult<()> {
        self.inner.override_metadata(property, for_type, metadata)
    }

    /// Find a live, bound property by owner and name
    pub fn find_property(&self, owner: &TypeRef, name: &str) -> Option<Arc<DependencyProperty>> {
        self.inner.properties.find(owner, name)
    }

    /// Find a live, bound property by native handle
    pub fn property_by_handle(&self, handle: PropertyHandle) -> Option<Arc<DependencyProperty>> {
        self.inner.properties.by_handle(handle)
    }

    /// Read a property value
    pub fn get_value(&self, object: &ProxyObject, property: &DependencyProperty) -> BridgeResult<Value> {
        self.inner.get_value(object, property)
    }

    /// Write a property value
    pub fn set_value(
        &self,
        object: &ProxyObject,
        property: &DependencyProperty,
        value: impl Into<Value>,
    ) -> BridgeResult<()> {
        self.inner.set_value(object, property, value.into())
    }

    // ========================================================================
    // Resurrection
    // ========================================================================

    /// Property resurrection records
    pub fn property_resurrection(&self) -> &PropertyResurrection {
        &self.inner.property_records
    }

    /// Metadata override resurrection records
    pub fn override_resurrection(&self) -> &MetadataOverrideResurrection {
        &self.inner.override_records
    }

    /// Register `ty` with the engine and replay its recorded properties and
    /// overrides, even if it was already registered in this generation
    pub fn resurrect_type(&self, ty: &TypeRef) -> BridgeResult<ResurrectionReport> {
        self.inner.native_type(ty)?;
        Ok(self.inner.replay_type(ty))
    }

    // ========================================================================
    // Engine Notifications
    // ========================================================================

    /// The engine destroyed an observed object
    pub fn on_native_destroyed(&self, handle: NativeHandle) {
        self.inner.on_native_destroyed(handle)
    }

    /// An object's native reference count changed
    pub fn on_reference_changed(&self, handle: NativeHandle, count: u32) {
        self.inner.on_reference_changed(handle, count)
    }

    /// A property value changed on the native side
    pub fn on_property_changed(&self, change: &PropertyChanged) {
        self.inner.on_property_changed(change)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Forget every native registration after the engine was reinitialized.
    ///
    /// Property wrappers are unbound and proxies detached without releasing
    /// anything. Managed types stay loaded; registering one again replays its
    /// recorded properties and overrides.
    pub fn reload_native(&self) {
        self.inner.reload_native()
    }

    /// Drop bookkeeping for unloaded types and dead wrappers
    pub fn prune_unloaded_types(&self) -> usize {
        let inner = &self.inner;
        let pruned = inner.natives.prune()
            + inner.properties.prune()
            + inner.property_records.prune()
            + inner.override_records.prune()
            + inner.proxies.prune();
        debug!(pruned, "pruned unloaded types");
        pruned
    }

    /// Dispose every proxy and forget all registrations and records
    pub fn shutdown(&self) {
        self.inner.shutdown()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("generation", &self.native_generation())
            .field("proxies", &self.inner.proxies.len())
            .field("native_types", &self.inner.natives.len())
            .field("properties", &self.inner.properties.len())
            .finish()
    }
}

impl BridgeInner {
    fn bind_engine_callbacks(&self) {
        let this = self.this.clone();
        self.engine
            .bind_property_changed(Arc::new(move |change: &PropertyChanged| {
                if let Some(bridge) = this.upgrade() {
                    bridge.on_property_changed(change);
                }
            }));
        let this = self.this.clone();
        self.engine
            .bind_reference_hook(Arc::new(move |handle: NativeHandle, count: u32| {
                if let Some(bridge) = this.upgrade() {
                    bridge.on_reference_changed(handle, count);
                }
            }));
    }

    pub(crate) fn native_type(&self, ty: &TypeRef) -> BridgeResult<NativeType> {
        if let Some(native) = self.natives.get(ty) {
            return Ok(native);
        }
        let base = match ty.base() {
            Some(base) => Some(self.native_type(base)?),
            None => None,
        };
        let (name, kind) = match ty.kind() {
            TypeKind::Primitive(p) => (
                p.storage().name().to_string(),
                NativeTypeKind::Primitive(native_primitive(*p)),
            ),
            TypeKind::Enum => (ty.name().to_string(), NativeTypeKind::Enum),
            TypeKind::Nullable(inner) => {
                let inner = normalize(inner);
                (
                    format!("Nullable<{}>", inner.name()),
                    NativeTypeKind::Nullable(self.native_type(&inner)?),
                )
            }
            TypeKind::Class => (ty.name().to_string(), NativeTypeKind::Class),
        };
        let desc = NativeTypeDesc {
            name: &name,
            base,
            kind,
            freezable: ty.supports(&crate::types::Capability::Freezable),
        };
        let native = self.engine.register_type(&desc)?;
        let (native, revived) = self.natives.insert(ty, native);
        trace!(ty = %ty, %native, "registered native type");
        if revived || self.needs_replay(ty) {
            self.replay_type(ty);
        }
        Ok(native)
    }

    fn create(&self, ty: &TypeRef) -> BridgeResult<Proxy> {
        if !ty.is_class() {
            return Err(BridgeError::InvalidArgument(format!(
                "cannot construct non-class type {}",
                ty.name()
            )));
        }
        let native_type = self.native_type(ty)?;
        let handle = self.engine.new_object(native_type)?;
        if handle.is_null() {
            warn!(ty = %ty, "engine returned no object");
            return Ok(ProxyObject::detached(ty.clone()));
        }
        if self.engine.reference_count(handle) == 0 {
            self.engine.add_reference(handle);
        }
        let proxy = Arc::new(ProxyObject::new(
            ty.clone(),
            HandleSlot::owned(handle, self.engine.clone()),
            self.this.clone(),
        ));
        self.proxies.register(&proxy, EntryKind::Strong);
        debug!(ty = %ty, %handle, "constructed object");
        Ok(proxy)
    }

    pub(crate) fn get_proxy(&self, handle: NativeHandle, add_ref_if_new: bool) -> Option<Proxy> {
        if handle.is_null() {
            return None;
        }
        if let Some(existing) = self.proxies.lookup(handle) {
            return Some(existing);
        }
        let ty = self
            .engine
            .type_of(handle)
            .ok()
            .and_then(|native| self.natives.resolve(native))
            .unwrap_or_else(TypeRef::dependency_object);
        let slot = if add_ref_if_new {
            self.engine.add_reference(handle);
            HandleSlot::owned(handle, self.engine.clone())
        } else {
            HandleSlot::observed(handle)
        };
        let proxy = Arc::new(ProxyObject::new(ty, slot, self.this.clone()));
        if let Some(existing) = self.proxies.insert_or_get(&proxy, EntryKind::Weak) {
            return Some(existing);
        }
        if proxy.ownership() == Ownership::Observing && self.options.bind_destroyed_callbacks {
            let this = self.this.clone();
            let bound = self.engine.bind_destroyed(
                handle,
                Arc::new(move |handle: NativeHandle| {
                    if let Some(bridge) = this.upgrade() {
                        bridge.on_native_destroyed(handle);
                    }
                }),
            );
            if let Err(error) = bound {
                warn!(%handle, %error, "could not watch native object");
            }
        }
        trace!(%handle, ownership = ?proxy.ownership(), "wrapped native object");
        Some(proxy)
    }

    /// Remove `proxy`'s table entry after it was disposed
    pub(crate) fn forget_proxy(&self, handle: NativeHandle, proxy: *const ProxyObject, ownership: Ownership) {
        let evicted = self.proxies.remove(handle, proxy);
        if evicted.is_some() && ownership == Ownership::Observing {
            self.engine.unbind_destroyed(handle);
        }
        drop(evicted);
    }

    pub(crate) fn get_value(&self, object: &ProxyObject, property: &DependencyProperty) -> BridgeResult<Value> {
        let handle = object.handle();
        if handle.is_null() {
            return Err(BridgeError::ObjectDisposed(object.type_ref().name().to_string()));
        }
        let native_property = self.bound_property(property)?;
        let native = self.engine.get_value(handle, native_property)?;
        let resolve = |h: NativeHandle| self.get_proxy(h, true);
        dispatch::from_native(&native, property.property_type(), &resolve).ok_or_else(|| {
            BridgeError::InvalidValue {
                property: property.name().to_string(),
                expected: property.property_type().name().to_string(),
                value: format!("{native:?}"),
            }
        })
    }

    pub(crate) fn set_value(
        &self,
        object: &ProxyObject,
        property: &DependencyProperty,
        value: Value,
    ) -> BridgeResult<()> {
        let handle = object.handle();
        if handle.is_null() {
            return Err(BridgeError::ObjectDisposed(object.type_ref().name().to_string()));
        }
        let invalid = |value: &Value| BridgeError::InvalidValue {
            property: property.name().to_string(),
            expected: property.property_type().name().to_string(),
            value: format!("{value:?}"),
        };
        if !value.is_assignable_to(property.property_type()) {
            return Err(invalid(&value));
        }
        let metadata = property.metadata_for(object.type_ref());
        let value = match metadata.coerce_callback() {
            Some(coerce) => coerce(object, value),
            None => value,
        };
        if !value.is_assignable_to(property.property_type()) {
            return Err(invalid(&value));
        }
        if let Value::Object(target) = &value {
            if target.is_disposed() {
                return Err(BridgeError::ObjectDisposed(target.type_ref().name().to_string()));
            }
        }
        let native = dispatch::to_native(&value, property.property_type()).ok_or_else(|| {
            BridgeError::ValueOutOfRange {
                property: property.name().to_string(),
                storage: property.storage_type().name().to_string(),
                value: format!("{value:?}"),
            }
        })?;
        let native_property = self.bound_property(property)?;
        self.engine.set_value(handle, native_property, native)?;
        Ok(())
    }

    pub(crate) fn on_native_destroyed(&self, handle: NativeHandle) {
        let Some(evicted) = self.proxies.remove_handle(handle) else {
            return;
        };
        if let Some(proxy) = evicted.proxy() {
            proxy.detach();
        }
        trace!(%handle, "native object destroyed");
        drop(evicted);
    }

    pub(crate) fn on_reference_changed(&self, handle: NativeHandle, count: u32) {
        if !self.options.pin_grabbed_proxies {
            return;
        }
        if count > 1 {
            if self.proxies.pin(handle) {
                trace!(%handle, count, "pinned proxy");
            }
        } else {
            let released = self.proxies.unpin(handle);
            if released.is_some() {
                trace!(%handle, count, "unpinned proxy");
            }
            drop(released);
        }
    }

    pub(crate) fn on_property_changed(&self, change: &PropertyChanged) {
        let Some(property) = self.properties.by_handle(change.property) else {
            return;
        };
        let Some(object) = self.proxies.lookup(change.object) else {
            return;
        };
        let metadata = property.metadata_for(object.type_ref());
        let Some(callback) = metadata.changed_callback() else {
            return;
        };
        let resolve = |h: NativeHandle| self.get_proxy(h, true);
        let ty = property.property_type().clone();
        let old_value = dispatch::from_native(&change.old_value, &ty, &resolve).unwrap_or_default();
        let new_value = dispatch::from_native(&change.new_value, &ty, &resolve).unwrap_or_default();
        callback(
            &*object,
            &PropertyChange {
                property,
                old_value,
                new_value,
            },
        );
    }

    fn reload_native(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let types = self.natives.retire();
        let unbound = self.properties.unbind_all();
        let evicted = self.proxies.drain();
        let detached = evicted
            .iter()
            .filter_map(|entry| entry.proxy())
            .filter(|proxy| proxy.detach())
            .count();
        drop(evicted);
        info!(generation, types, unbound, detached, "native engine reloaded");
    }

    fn shutdown(&self) {
        let evicted = self.proxies.drain();
        for entry in &evicted {
            if let Some(proxy) = entry.proxy() {
                if proxy.ownership() == Ownership::Observing && !proxy.is_disposed() {
                    self.engine.unbind_destroyed(entry.handle);
                }
                proxy.dispose();
            }
        }
        drop(evicted);
        self.properties.unbind_all();
        self.natives.clear();
        self.property_records.clear();
        self.override_records.clear();
        info!("bridge shut down");
    }
}

fn native_primitive(primitive: Primitive) -> NativePrimitive {
    match primitive {
        Primitive::Bool => NativePrimitive::Bool,
        Primitive::Int16 => NativePrimitive::Int16,
        Primitive::UInt16 => NativePrimitive::UInt16,
        Primitive::Int32 | Primitive::Int64 => NativePrimitive::Int32,
        Primitive::UInt32 | Primitive::UInt64 | Primitive::Char => NativePrimitive::UInt32,
        Primitive::Single => NativePrimitive::Single,
        Primitive::Double => NativePrimitive::Double,
        Primitive::String => NativePrimitive::String,
    }
}
