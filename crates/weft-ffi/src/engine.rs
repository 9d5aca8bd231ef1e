//! NativeEngine implementation over a C function table

use crate::value::{OwnedValue, WeftValue};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use tracing::warn;
use weft_sdk::{
    AbiResult, DestroyedCallback, NativeEngine, NativeError, NativeHandle, NativeMetadata,
    NativePrimitive, NativeType, NativeTypeDesc, NativeTypeKind, NativeValue, PropertyChanged,
    PropertyChangedCallback, PropertyHandle, ReferenceHook,
};

// ============================================================================
// C Types
// ============================================================================

/// Kind of a type being registered (`WeftTypeDesc::kind`)
pub type WeftTypeKind = u32;

/// Primitive value type; `primitive` names the storage
pub const WEFT_TYPE_PRIMITIVE: WeftTypeKind = 0;
/// Enumeration stored as `i32`
pub const WEFT_TYPE_ENUM: WeftTypeKind = 1;
/// Nullable wrapper; `inner` is the wrapped type
pub const WEFT_TYPE_NULLABLE: WeftTypeKind = 2;
/// Reference-counted class
pub const WEFT_TYPE_CLASS: WeftTypeKind = 3;

/// Primitive storage, in the order of the `WEFT_VALUE_*` scalar tags
pub type WeftPrimitive = u32;

/// Type registration request
#[repr(C)]
pub struct WeftTypeDesc {
    /// Fully qualified type name (borrowed for the call)
    pub name: *const c_char,
    /// Registered base type, 0 for none
    pub base: usize,
    /// One of the `WEFT_TYPE_*` constants
    pub kind: WeftTypeKind,
    /// Storage for primitive types
    pub primitive: WeftPrimitive,
    /// Wrapped type for nullable types
    pub inner: usize,
    /// Instances can be frozen
    pub freezable: bool,
}

/// Property metadata passed to the engine
#[repr(C)]
pub struct WeftMetadata {
    /// Default value (strings borrowed for the call)
    pub default_value: WeftValue,
    /// Report changes through `weft_notify_property_changed`
    pub notify_changed: bool,
    /// The bridge coerces values for this property
    pub coerces: bool,
}

/// Function table a native engine provides to the bridge
///
/// Every function receives `user_data` as its first argument. Functions
/// returning a handle return 0 on failure; functions returning `c_int`
/// return 0 on success.
#[repr(C)]
pub struct WeftEngineVTable {
    /// Opaque engine pointer
    pub user_data: *mut c_void,
    /// Register a type or find the existing one with the same name
    pub register_type: Option<unsafe extern "C" fn(*mut c_void, *const WeftTypeDesc) -> usize>,
    /// Allocate an object of a class type
    pub new_object: Option<unsafe extern "C" fn(*mut c_void, usize) -> usize>,
    /// Runtime type of an object
    pub type_of: Option<unsafe extern "C" fn(*mut c_void, usize) -> usize>,
    /// Add a reference; returns the new count
    pub add_reference: Option<unsafe extern "C" fn(*mut c_void, usize) -> u32>,
    /// Release a reference; returns the remaining count
    pub release: Option<unsafe extern "C" fn(*mut c_void, usize) -> u32>,
    /// Current reference count
    pub reference_count: Option<unsafe extern "C" fn(*mut c_void, usize) -> u32>,
    /// Freeze an object; returns false when it cannot be frozen
    pub freeze: Option<unsafe extern "C" fn(*mut c_void, usize) -> bool>,
    /// Register a property on (owner, name)
    pub register_property: Option<
        unsafe extern "C" fn(*mut c_void, usize, *const c_char, usize, *const WeftMetadata) -> usize,
    >,
    /// Override metadata of a property for a type
    pub override_metadata:
        Option<unsafe extern "C" fn(*mut c_void, usize, usize, *const WeftMetadata) -> c_int>,
    /// Read a property value into the out-parameter
    pub get_value: Option<unsafe extern "C" fn(*mut c_void, usize, usize, *mut WeftValue) -> c_int>,
    /// Write a property value
    pub set_value:
        Option<unsafe extern "C" fn(*mut c_void, usize, usize, *const WeftValue) -> c_int>,
    /// Start (true) or stop (false) reporting destruction of an object
    /// through `weft_notify_destroyed`
    pub watch_destroyed: Option<unsafe extern "C" fn(*mut c_void, usize, bool) -> c_int>,
}

macro_rules! required {
    ($vtable:expr, $($name:ident),+ $(,)?) => {
        Functions {
            $($name: $vtable.$name.ok_or(stringify!($name))?,)+
        }
    };
}

struct Functions {
    register_type: unsafe extern "C" fn(*mut c_void, *const WeftTypeDesc) -> usize,
    new_object: unsafe extern "C" fn(*mut c_void, usize) -> usize,
    type_of: unsafe extern "C" fn(*mut c_void, usize) -> usize,
    add_reference: unsafe extern "C" fn(*mut c_void, usize) -> u32,
    release: unsafe extern "C" fn(*mut c_void, usize) -> u32,
    reference_count: unsafe extern "C" fn(*mut c_void, usize) -> u32,
    freeze: unsafe extern "C" fn(*mut c_void, usize) -> bool,
    register_property:
        unsafe extern "C" fn(*mut c_void, usize, *const c_char, usize, *const WeftMetadata) -> usize,
    override_metadata: unsafe extern "C" fn(*mut c_void, usize, usize, *const WeftMetadata) -> c_int,
    get_value: unsafe extern "C" fn(*mut c_void, usize, usize, *mut WeftValue) -> c_int,
    set_value: unsafe extern "C" fn(*mut c_void, usize, usize, *const WeftValue) -> c_int,
    watch_destroyed: unsafe extern "C" fn(*mut c_void, usize, bool) -> c_int,
}

#[derive(Default)]
struct Callbacks {
    destroyed: FxHashMap<NativeHandle, DestroyedCallback>,
    property_changed: Option<PropertyChangedCallback>,
    reference_hook: Option<ReferenceHook>,
}

// ============================================================================
// FfiEngine
// ============================================================================

/// [`NativeEngine`] backed by a [`WeftEngineVTable`]
///
/// Notifications the engine reports through the `weft_notify_*` functions
/// are routed to the callbacks the bridge installed here.
pub struct FfiEngine {
    user_data: *mut c_void,
    functions: Functions,
    callbacks: Mutex<Callbacks>,
}

// SAFETY: `weft_bridge_new` requires every vtable function to be callable
// from any thread with the same `user_data`.
unsafe impl Send for FfiEngine {}
unsafe impl Sync for FfiEngine {}

impl FfiEngine {
    /// Wrap a function table; fails with the name of the first missing
    /// function
    pub fn new(vtable: &WeftEngineVTable) -> Result<Self, &'static str> {
        let functions = required!(
            vtable,
            register_type,
            new_object,
            type_of,
            add_reference,
            release,
            reference_count,
            freeze,
            register_property,
            override_metadata,
            get_value,
            set_value,
            watch_destroyed,
        );
        Ok(Self {
            user_data: vtable.user_data,
            functions,
            callbacks: Mutex::new(Callbacks::default()),
        })
    }

    /// The engine destroyed `handle`
    pub fn notify_destroyed(&self, handle: NativeHandle) {
        let callback = self.callbacks.lock().destroyed.remove(&handle);
        if let Some(callback) = callback {
            callback(handle);
        }
    }

    /// The reference count of `handle` changed to `count`
    pub fn notify_reference_changed(&self, handle: NativeHandle, count: u32) {
        let hook = self.callbacks.lock().reference_hook.clone();
        if let Some(hook) = hook {
            hook(handle, count);
        }
    }

    /// A watched property changed on the native side
    pub fn notify_property_changed(&self, change: &PropertyChanged) {
        let callback = self.callbacks.lock().property_changed.clone();
        if let Some(callback) = callback {
            callback(change);
        }
    }

    /// Number of objects whose destruction is being watched
    pub fn watched_objects(&self) -> usize {
        self.callbacks.lock().destroyed.len()
    }

    /// Forget every destroyed callback without calling back into the engine
    pub fn forget_watches(&self) {
        self.callbacks.lock().destroyed.clear();
    }
}

fn check(status: c_int, operation: &str) -> AbiResult<()> {
    if status == 0 {
        Ok(())
    } else {
        Err(NativeError::Engine(format!(
            "{operation} failed with status {status}"
        )))
    }
}

fn c_string(s: &str) -> AbiResult<CString> {
    CString::new(s).map_err(|_| NativeError::Engine(format!("name contains NUL: {s:?}")))
}

fn primitive_code(primitive: NativePrimitive) -> WeftPrimitive {
    match primitive {
        NativePrimitive::Bool => 0,
        NativePrimitive::Int16 => 1,
        NativePrimitive::UInt16 => 2,
        NativePrimitive::Int32 => 3,
        NativePrimitive::UInt32 => 4,
        NativePrimitive::Single => 5,
        NativePrimitive::Double => 6,
        NativePrimitive::String => 7,
    }
}

/// Inverse of the primitive numbering used in [`WeftTypeDesc::primitive`]
pub fn primitive_from_code(code: WeftPrimitive) -> Option<NativePrimitive> {
    let primitive = match code {
        0 => NativePrimitive::Bool,
        1 => NativePrimitive::Int16,
        2 => NativePrimitive::UInt16,
        3 => NativePrimitive::Int32,
        4 => NativePrimitive::UInt32,
        5 => NativePrimitive::Single,
        6 => NativePrimitive::Double,
        7 => NativePrimitive::String,
        _ => return None,
    };
    Some(primitive)
}

struct OwnedMetadata {
    raw: WeftMetadata,
    _default: OwnedValue,
}

impl OwnedMetadata {
    fn new(metadata: &NativeMetadata) -> AbiResult<Self> {
        let default = OwnedValue::new(&metadata.default_value)?;
        Ok(Self {
            raw: WeftMetadata {
                default_value: *default.as_raw(),
                notify_changed: metadata.notify_changed,
                coerces: metadata.coerces,
            },
            _default: default,
        })
    }
}

impl NativeEngine for FfiEngine {
    fn register_type(&self, desc: &NativeTypeDesc<'_>) -> AbiResult<NativeType> {
        let name = c_string(desc.name)?;
        let (kind, primitive, inner) = match desc.kind {
            NativeTypeKind::Primitive(p) => (WEFT_TYPE_PRIMITIVE, primitive_code(p), 0),
            NativeTypeKind::Enum => (WEFT_TYPE_ENUM, 0, 0),
            NativeTypeKind::Nullable(inner) => (WEFT_TYPE_NULLABLE, 0, inner.as_raw()),
            NativeTypeKind::Class => (WEFT_TYPE_CLASS, 0, 0),
        };
        let raw = WeftTypeDesc {
            name: name.as_ptr(),
            base: desc.base.map_or(0, NativeType::as_raw),
            kind,
            primitive,
            inner,
            freezable: desc.freezable,
        };
        let ty = unsafe { (self.functions.register_type)(self.user_data, &raw) };
        if ty == 0 {
            return Err(NativeError::Engine(format!(
                "register_type failed for {}",
                desc.name
            )));
        }
        Ok(NativeType::from_raw(ty))
    }

    fn new_object(&self, ty: NativeType) -> AbiResult<NativeHandle> {
        let handle = unsafe { (self.functions.new_object)(self.user_data, ty.as_raw()) };
        if handle == 0 {
            return Err(NativeError::UnknownType(ty));
        }
        Ok(NativeHandle::from_raw(handle))
    }

    fn type_of(&self, handle: NativeHandle) -> AbiResult<NativeType> {
        let ty = unsafe { (self.functions.type_of)(self.user_data, handle.as_raw()) };
        if ty == 0 {
            return Err(NativeError::InvalidHandle(handle));
        }
        Ok(NativeType::from_raw(ty))
    }

    fn add_reference(&self, handle: NativeHandle) -> u32 {
        unsafe { (self.functions.add_reference)(self.user_data, handle.as_raw()) }
    }

    fn release(&self, handle: NativeHandle) -> u32 {
        unsafe { (self.functions.release)(self.user_data, handle.as_raw()) }
    }

    fn reference_count(&self, handle: NativeHandle) -> u32 {
        unsafe { (self.functions.reference_count)(self.user_data, handle.as_raw()) }
    }

    fn freeze(&self, handle: NativeHandle) -> bool {
        unsafe { (self.functions.freeze)(self.user_data, handle.as_raw()) }
    }

    fn register_property(
        &self,
        owner: NativeType,
        name: &str,
        value_type: NativeType,
        metadata: &NativeMetadata,
    ) -> AbiResult<PropertyHandle> {
        let c_name = c_string(name)?;
        let metadata = OwnedMetadata::new(metadata)?;
        let property = unsafe {
            (self.functions.register_property)(
                self.user_data,
                owner.as_raw(),
                c_name.as_ptr(),
                value_type.as_raw(),
                &metadata.raw,
            )
        };
        if property == 0 {
            return Err(NativeError::Engine(format!(
                "register_property failed for {name}"
            )));
        }
        Ok(PropertyHandle::from_raw(property))
    }

    fn override_metadata(
        &self,
        target: NativeType,
        property: PropertyHandle,
        metadata: &NativeMetadata,
    ) -> AbiResult<()> {
        let metadata = OwnedMetadata::new(metadata)?;
        let status = unsafe {
            (self.functions.override_metadata)(
                self.user_data,
                target.as_raw(),
                property.as_raw(),
                &metadata.raw,
            )
        };
        check(status, "override_metadata")
    }

    fn get_value(&self, object: NativeHandle, property: PropertyHandle) -> AbiResult<NativeValue> {
        let mut out = WeftValue::null();
        let status = unsafe {
            (self.functions.get_value)(self.user_data, object.as_raw(), property.as_raw(), &mut out)
        };
        check(status, "get_value")?;
        unsafe { out.to_native() }
    }

    fn set_value(
        &self,
        object: NativeHandle,
        property: PropertyHandle,
        value: NativeValue,
    ) -> AbiResult<()> {
        let value = OwnedValue::new(&value)?;
        let status = unsafe {
            (self.functions.set_value)(
                self.user_data,
                object.as_raw(),
                property.as_raw(),
                value.as_raw(),
            )
        };
        check(status, "set_value")
    }

    fn bind_destroyed(&self, handle: NativeHandle, callback: DestroyedCallback) -> AbiResult<()> {
        self.callbacks.lock().destroyed.insert(handle, callback);
        let status = unsafe { (self.functions.watch_destroyed)(self.user_data, handle.as_raw(), true) };
        if status != 0 {
            self.callbacks.lock().destroyed.remove(&handle);
        }
        check(status, "watch_destroyed")
    }

    fn unbind_destroyed(&self, handle: NativeHandle) {
        if self.callbacks.lock().destroyed.remove(&handle).is_none() {
            return;
        }
        let status =
            unsafe { (self.functions.watch_destroyed)(self.user_data, handle.as_raw(), false) };
        if status != 0 {
            warn!(%handle, status, "engine refused to stop watching object");
        }
    }

    fn bind_property_changed(&self, callback: PropertyChangedCallback) {
        self.callbacks.lock().property_changed = Some(callback);
    }

    fn bind_reference_hook(&self, hook: ReferenceHook) {
        self.callbacks.lock().reference_hook = Some(hook);
    }
}
