//! In-process reference engine
//!
//! `MemoryEngine` implements [`NativeEngine`] entirely in Rust. It is what the
//! bridge runs against in headless hosts and in every test suite: it keeps
//! real reference counts, honours metadata overrides along the base-type
//! chain, and counts every contract call so callers can probe side effects.

use crate::engine::{
    DestroyedCallback, NativeEngine, NativeMetadata, NativePrimitive, NativeTypeDesc,
    NativeTypeKind, PropertyChanged, PropertyChangedCallback, ReferenceHook,
};
use crate::error::{AbiResult, NativeError};
use crate::handle::{NativeHandle, NativeType, PropertyHandle};
use crate::value::{NativeValue, NativeValueKind};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Handles are spaced like pointers so they never look like small integers
const HANDLE_STRIDE: usize = 0x10;
const FIRST_HANDLE: usize = 0x1000;

/// Contract call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// `register_type` calls that created a new type
    pub types_registered: usize,
    /// Objects allocated (managed or native side)
    pub objects_created: usize,
    /// Objects destroyed
    pub objects_destroyed: usize,
    /// `add_reference` calls
    pub add_reference_calls: usize,
    /// `release` calls
    pub release_calls: usize,
    /// `register_property` calls (including ones that found an existing registration)
    pub register_property_calls: usize,
    /// `override_metadata` calls
    pub override_metadata_calls: usize,
    /// `set_value` calls
    pub set_value_calls: usize,
}

struct TypeRecord {
    base: Option<NativeType>,
    kind: NativeTypeKind,
    freezable: bool,
}

struct PropertyRecord {
    value_type: NativeType,
    metadata: NativeMetadata,
    overrides: FxHashMap<NativeType, NativeMetadata>,
}

struct ObjectRecord {
    ty: NativeType,
    refs: u32,
    frozen: bool,
    values: FxHashMap<PropertyHandle, NativeValue>,
}

#[derive(Default)]
struct State {
    types: FxHashMap<NativeType, TypeRecord>,
    type_names: FxHashMap<String, NativeType>,
    properties: FxHashMap<PropertyHandle, PropertyRecord>,
    property_keys: FxHashMap<(NativeType, String), PropertyHandle>,
    objects: FxHashMap<NativeHandle, ObjectRecord>,
    destroyed: FxHashMap<NativeHandle, DestroyedCallback>,
    property_changed: Option<PropertyChangedCallback>,
    reference_hook: Option<ReferenceHook>,
    stats: EngineStats,
}

impl State {
    fn type_chain(&self, ty: NativeType) -> Vec<NativeType> {
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            chain.push(t);
            current = self.types.get(&t).and_then(|record| record.base);
        }
        chain
    }

    fn effective_value(
        &self,
        object: NativeHandle,
        property: PropertyHandle,
    ) -> AbiResult<NativeValue> {
        let record = self
            .objects
            .get(&object)
            .ok_or(NativeError::InvalidHandle(object))?;
        let prop = self
            .properties
            .get(&property)
            .ok_or(NativeError::UnknownProperty(property))?;

        if let Some(local) = record.values.get(&property) {
            return Ok(local.clone());
        }
        for ty in self.type_chain(record.ty) {
            if let Some(metadata) = prop.overrides.get(&ty) {
                return Ok(metadata.default_value.clone());
            }
        }
        Ok(prop.metadata.default_value.clone())
    }

    fn check_value(&self, value_type: NativeType, value: &NativeValue) -> AbiResult<()> {
        let record = self
            .types
            .get(&value_type)
            .ok_or(NativeError::UnknownType(value_type))?;
        let expected = match record.kind {
            NativeTypeKind::Primitive(NativePrimitive::String) if value.is_null() => return Ok(()),
            NativeTypeKind::Primitive(p) => primitive_kind(p),
            NativeTypeKind::Enum => NativeValueKind::I32,
            NativeTypeKind::Nullable(inner) => {
                if value.is_null() {
                    return Ok(());
                }
                return self.check_value(inner, value);
            }
            NativeTypeKind::Class => {
                if value.is_null() {
                    return Ok(());
                }
                NativeValueKind::Object
            }
        };
        if value.kind() == expected {
            Ok(())
        } else {
            Err(NativeError::TypeMismatch {
                expected: expected.to_string(),
                got: value.kind().to_string(),
            })
        }
    }
}

fn primitive_kind(primitive: NativePrimitive) -> NativeValueKind {
    match primitive {
        NativePrimitive::Bool => NativeValueKind::Bool,
        NativePrimitive::Int16 => NativeValueKind::I16,
        NativePrimitive::UInt16 => NativeValueKind::U16,
        NativePrimitive::Int32 => NativeValueKind::I32,
        NativePrimitive::UInt32 => NativeValueKind::U32,
        NativePrimitive::Single => NativeValueKind::F32,
        NativePrimitive::Double => NativeValueKind::F64,
        NativePrimitive::String => NativeValueKind::Str,
    }
}

/// In-process native engine
pub struct MemoryEngine {
    state: Mutex<State>,
    next_handle: AtomicUsize,
    floating_objects: bool,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryEngine")
            .field("types", &state.types.len())
            .field("properties", &state.properties.len())
            .field("objects", &state.objects.len())
            .field("floating_objects", &self.floating_objects)
            .finish()
    }
}

impl MemoryEngine {
    /// Create an engine whose new objects start with one reference
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_handle: AtomicUsize::new(FIRST_HANDLE),
            floating_objects: false,
        }
    }

    /// Create an engine whose new objects start with zero references
    pub fn with_floating_objects() -> Self {
        Self {
            floating_objects: true,
            ..Self::new()
        }
    }

    fn next_raw(&self) -> usize {
        self.next_handle.fetch_add(HANDLE_STRIDE, Ordering::Relaxed)
    }

    fn allocate(&self, ty: NativeType, refs: u32) -> AbiResult<NativeHandle> {
        let mut state = self.state.lock();
        match state.types.get(&ty) {
            Some(record) if record.kind == NativeTypeKind::Class => {}
            Some(_) => {
                return Err(NativeError::Engine(format!(
                    "type {} is not instantiable",
                    ty
                )))
            }
            None => return Err(NativeError::UnknownType(ty)),
        }
        let handle = NativeHandle::from_raw(self.next_raw());
        state.objects.insert(
            handle,
            ObjectRecord {
                ty,
                refs,
                frozen: false,
                values: FxHashMap::default(),
            },
        );
        state.stats.objects_created += 1;
        Ok(handle)
    }

    /// Call counters so far
    pub fn stats(&self) -> EngineStats {
        self.state.lock().stats
    }

    /// Create an object from the native side; the engine holds its single reference
    pub fn create_native(&self, ty: NativeType) -> AbiResult<NativeHandle> {
        self.allocate(ty, 1)
    }

    /// Check whether an object is still alive
    pub fn is_alive(&self, handle: NativeHandle) -> bool {
        self.state.lock().objects.contains_key(&handle)
    }

    /// Number of live objects
    pub fn live_objects(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Check whether an object has a destroyed callback bound
    pub fn has_destroyed_callback(&self, handle: NativeHandle) -> bool {
        self.state.lock().destroyed.contains_key(&handle)
    }

    /// Destroy an object regardless of its reference count
    pub fn destroy(&self, handle: NativeHandle) -> bool {
        let (callback, hook) = {
            let mut state = self.state.lock();
            if state.objects.remove(&handle).is_none() {
                return false;
            }
            state.stats.objects_destroyed += 1;
            (state.destroyed.remove(&handle), state.reference_hook.clone())
        };
        if let Some(hook) = hook {
            hook(handle, 0);
        }
        if let Some(callback) = callback {
            callback(handle);
        }
        true
    }

    /// Simulate the engine being torn down and initialised again.
    ///
    /// Every type, property and object registration is forgotten without
    /// firing callbacks. Handle values keep increasing, so nothing from the
    /// previous session is ever handed out again.
    pub fn restart(&self) {
        let mut state = self.state.lock();
        state.types.clear();
        state.type_names.clear();
        state.properties.clear();
        state.property_keys.clear();
        state.objects.clear();
        state.destroyed.clear();
    }

    /// Look up a registered property by owner and name
    pub fn find_property(&self, owner: NativeType, name: &str) -> Option<PropertyHandle> {
        self.state
            .lock()
            .property_keys
            .get(&(owner, name.to_string()))
            .copied()
    }

    /// Look up a registered type by name
    pub fn find_type(&self, name: &str) -> Option<NativeType> {
        self.state.lock().type_names.get(name).copied()
    }

    /// Simulate a native-side change of a property value (animation, binding, ...)
    pub fn set_value_from_native(
        &self,
        object: NativeHandle,
        property: PropertyHandle,
        value: NativeValue,
    ) -> AbiResult<()> {
        self.write_value(object, property, value)
    }

    fn write_value(
        &self,
        object: NativeHandle,
        property: PropertyHandle,
        value: NativeValue,
    ) -> AbiResult<()> {
        let notify = {
            let mut state = self.state.lock();
            let value_type = state
                .properties
                .get(&property)
                .ok_or(NativeError::UnknownProperty(property))?
                .value_type;
            state.check_value(value_type, &value)?;
            let old_value = state.effective_value(object, property)?;

            let record = state
                .objects
                .get_mut(&object)
                .ok_or(NativeError::InvalidHandle(object))?;
            if record.frozen {
                return Err(NativeError::Engine(format!("object {} is frozen", object)));
            }
            record.values.insert(property, value.clone());

            if old_value != value {
                state.property_changed.clone().map(|callback| {
                    (
                        callback,
                        PropertyChanged {
                            object,
                            property,
                            old_value,
                            new_value: value,
                        },
                    )
                })
            } else {
                None
            }
        };
        if let Some((callback, change)) = notify {
            callback(&change);
        }
        Ok(())
    }

    fn change_refs(&self, handle: NativeHandle, add: bool) -> u32 {
        let (count, hook, destroyed) = {
            let mut state = self.state.lock();
            if add {
                state.stats.add_reference_calls += 1;
            } else {
                state.stats.release_calls += 1;
            }
            let Some(record) = state.objects.get_mut(&handle) else {
                return 0;
            };
            if add {
                record.refs += 1;
            } else {
                record.refs = record.refs.saturating_sub(1);
            }
            let count = record.refs;
            let destroyed = if count == 0 && !add {
                state.objects.remove(&handle);
                state.stats.objects_destroyed += 1;
                Some(state.destroyed.remove(&handle))
            } else {
                None
            };
            (count, state.reference_hook.clone(), destroyed)
        };
        if let Some(hook) = hook {
            hook(handle, count);
        }
        if let Some(Some(callback)) = destroyed {
            callback(handle);
        }
        count
    }
}

impl NativeEngine for MemoryEngine {
    fn register_type(&self, desc: &NativeTypeDesc<'_>) -> AbiResult<NativeType> {
        let mut state = self.state.lock();
        if let Some(existing) = state.type_names.get(desc.name) {
            return Ok(*existing);
        }
        if let Some(base) = desc.base {
            if !state.types.contains_key(&base) {
                return Err(NativeError::UnknownType(base));
            }
        }
        if let NativeTypeKind::Nullable(inner) = desc.kind {
            if !state.types.contains_key(&inner) {
                return Err(NativeError::UnknownType(inner));
            }
        }
        let ty = NativeType::from_raw(self.next_raw());
        state.types.insert(
            ty,
            TypeRecord {
                base: desc.base,
                kind: desc.kind,
                freezable: desc.freezable,
            },
        );
        state.type_names.insert(desc.name.to_string(), ty);
        state.stats.types_registered += 1;
        Ok(ty)
    }

    fn new_object(&self, ty: NativeType) -> AbiResult<NativeHandle> {
        let refs = if self.floating_objects { 0 } else { 1 };
        self.allocate(ty, refs)
    }

    fn type_of(&self, handle: NativeHandle) -> AbiResult<NativeType> {
        self.state
            .lock()
            .objects
            .get(&handle)
            .map(|record| record.ty)
            .ok_or(NativeError::InvalidHandle(handle))
    }

    fn add_reference(&self, handle: NativeHandle) -> u32 {
        self.change_refs(handle, true)
    }

    fn release(&self, handle: NativeHandle) -> u32 {
        self.change_refs(handle, false)
    }

    fn reference_count(&self, handle: NativeHandle) -> u32 {
        self.state
            .lock()
            .objects
            .get(&handle)
            .map_or(0, |record| record.refs)
    }

    fn freeze(&self, handle: NativeHandle) -> bool {
        let mut state = self.state.lock();
        let Some(ty) = state.objects.get(&handle).map(|record| record.ty) else {
            return false;
        };
        let freezable = state.types.get(&ty).is_some_and(|record| record.freezable);
        if freezable {
            if let Some(record) = state.objects.get_mut(&handle) {
                record.frozen = true;
            }
        }
        freezable
    }

    fn register_property(
        &self,
        owner: NativeType,
        name: &str,
        value_type: NativeType,
        metadata: &NativeMetadata,
    ) -> AbiResult<PropertyHandle> {
        let mut state = self.state.lock();
        state.stats.register_property_calls += 1;
        if !state.types.contains_key(&owner) {
            return Err(NativeError::UnknownType(owner));
        }
        if !state.types.contains_key(&value_type) {
            return Err(NativeError::UnknownType(value_type));
        }
        let key = (owner, name.to_string());
        if let Some(existing) = state.property_keys.get(&key) {
            return Ok(*existing);
        }
        state.check_value(value_type, &metadata.default_value)?;

        let property = PropertyHandle::from_raw(self.next_raw());
        state.properties.insert(
            property,
            PropertyRecord {
                value_type,
                metadata: metadata.clone(),
                overrides: FxHashMap::default(),
            },
        );
        state.property_keys.insert(key, property);
        Ok(property)
    }

    fn override_metadata(
        &self,
        target: NativeType,
        property: PropertyHandle,
        metadata: &NativeMetadata,
    ) -> AbiResult<()> {
        let mut state = self.state.lock();
        state.stats.override_metadata_calls += 1;
        if !state.types.contains_key(&target) {
            return Err(NativeError::UnknownType(target));
        }
        let value_type = state
            .properties
            .get(&property)
            .ok_or(NativeError::UnknownProperty(property))?
            .value_type;
        state.check_value(value_type, &metadata.default_value)?;
        if let Some(record) = state.properties.get_mut(&property) {
            record.overrides.insert(target, metadata.clone());
        }
        Ok(())
    }

    fn get_value(&self, object: NativeHandle, property: PropertyHandle) -> AbiResult<NativeValue> {
        self.state.lock().effective_value(object, property)
    }

    fn set_value(
        &self,
        object: NativeHandle,
        property: PropertyHandle,
        value: NativeValue,
    ) -> AbiResult<()> {
        self.state.lock().stats.set_value_calls += 1;
        self.write_value(object, property, value)
    }

    fn bind_destroyed(&self, handle: NativeHandle, callback: DestroyedCallback) -> AbiResult<()> {
        let mut state = self.state.lock();
        if !state.objects.contains_key(&handle) {
            return Err(NativeError::InvalidHandle(handle));
        }
        state.destroyed.insert(handle, callback);
        Ok(())
    }

    fn unbind_destroyed(&self, handle: NativeHandle) {
        self.state.lock().destroyed.remove(&handle);
    }

    fn bind_property_changed(&self, callback: PropertyChangedCallback) {
        self.state.lock().property_changed = Some(callback);
    }

    fn bind_reference_hook(&self, hook: ReferenceHook) {
        self.state.lock().reference_hook = Some(hook);
    }
}
