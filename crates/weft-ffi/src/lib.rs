//! C FFI bindings for the Weft object bridge
//!
//! This module lets a native engine written in another language host the
//! bridge. The engine hands over a [`WeftEngineVTable`] and reports
//! destruction, reference count and property change events back through the
//! `weft_notify_*` functions. The API follows these principles:
//! - ABI-stable (uses only C-compatible types)
//! - Error handling via out-parameters
//! - Opaque pointers for bridge objects
//! - Manual memory management

mod engine;
mod value;

pub use engine::{
    primitive_from_code, FfiEngine, WeftEngineVTable, WeftMetadata, WeftPrimitive, WeftTypeDesc,
    WeftTypeKind, WEFT_TYPE_CLASS, WEFT_TYPE_ENUM, WEFT_TYPE_NULLABLE, WEFT_TYPE_PRIMITIVE,
};
pub use value::*;

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use weft_core::{Bridge, BridgeError, BridgeOptions, ConfigError};
use weft_sdk::{NativeError, NativeHandle, PropertyChanged, PropertyHandle};

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to a bridge instance
#[repr(C)]
pub struct WeftBridge {
    _private: [u8; 0],
}

/// Error information
#[repr(C)]
pub struct WeftError {
    message: *mut c_char,
}

// Internal representation of a bridge (not exposed to C)
struct BridgeHandle {
    engine: Arc<FfiEngine>,
    bridge: Bridge,
}

/// Failures reported through `WeftError`
#[derive(Debug, thiserror::Error)]
enum FfiError {
    #[error("Invalid arguments (null pointer)")]
    NullPointer,

    #[error("Engine vtable is missing function: {0}")]
    MissingFunction(&'static str),

    #[error("Configuration is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Native(#[from] NativeError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert Rust string to C string (caller must free)
unsafe fn rust_to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Create error from FfiError
unsafe fn create_error(error: FfiError) -> *mut WeftError {
    let message = rust_to_c_string(&error.to_string());
    let err = Box::new(WeftError { message });
    Box::into_raw(err)
}

/// Set error out-parameter
unsafe fn set_error(error_out: *mut *mut WeftError, error: FfiError) {
    if !error_out.is_null() {
        *error_out = create_error(error);
    }
}

unsafe fn handle_ref<'a>(bridge: *mut WeftBridge) -> Option<&'a BridgeHandle> {
    (bridge as *const BridgeHandle).as_ref()
}

unsafe fn new_bridge(
    vtable: *const WeftEngineVTable,
    options: BridgeOptions,
) -> Result<*mut WeftBridge, FfiError> {
    let vtable = vtable.as_ref().ok_or(FfiError::NullPointer)?;
    let engine = Arc::new(FfiEngine::new(vtable).map_err(FfiError::MissingFunction)?);
    let bridge = Bridge::with_options(engine.clone(), options);
    debug!(?options, "bridge created over C engine");
    let handle = Box::new(BridgeHandle { engine, bridge });
    Ok(Box::into_raw(handle) as *mut WeftBridge)
}

// ============================================================================
// Bridge Lifecycle Functions
// ============================================================================

/// Create a bridge over a native engine
///
/// # Arguments
/// * `vtable` - Engine function table (copied; must not be NULL)
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * Non-null pointer to WeftBridge on success
/// * NULL on failure (check error parameter)
///
/// # Safety
/// - Every vtable function must be set and callable from any thread
/// - `user_data` must stay valid until `weft_bridge_destroy()` returns
/// - The returned bridge must be freed with `weft_bridge_destroy()`
///
/// # Example (C)
/// ```c
/// WeftError* error = NULL;
/// WeftBridge* bridge = weft_bridge_new(&engine_vtable, &error);
/// if (bridge == NULL) {
///     fprintf(stderr, "Failed to create bridge: %s\n", weft_error_message(error));
///     weft_error_free(error);
///     return 1;
/// }
/// // Use bridge...
/// weft_bridge_destroy(bridge);
/// ```
#[no_mangle]
pub unsafe extern "C" fn weft_bridge_new(
    vtable: *const WeftEngineVTable,
    error: *mut *mut WeftError,
) -> *mut WeftBridge {
    match new_bridge(vtable, BridgeOptions::default()) {
        Ok(bridge) => bridge,
        Err(e) => {
            set_error(error, e);
            ptr::null_mut()
        }
    }
}

/// Create a bridge configured from a TOML document
///
/// # Arguments
/// * `vtable` - Engine function table (copied; must not be NULL)
/// * `config` - NUL-terminated TOML (NULL for defaults)
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * Non-null pointer to WeftBridge on success
/// * NULL on failure (check error parameter)
///
/// # Safety
/// Same requirements as `weft_bridge_new()`.
#[no_mangle]
pub unsafe extern "C" fn weft_bridge_new_with_config(
    vtable: *const WeftEngineVTable,
    config: *const c_char,
    error: *mut *mut WeftError,
) -> *mut WeftBridge {
    let options = if config.is_null() {
        Ok(BridgeOptions::default())
    } else {
        CStr::from_ptr(config)
            .to_str()
            .map_err(|_| FfiError::InvalidUtf8)
            .and_then(|s| BridgeOptions::from_str(s).map_err(FfiError::from))
    };

    match options.and_then(|options| new_bridge(vtable, options)) {
        Ok(bridge) => bridge,
        Err(e) => {
            set_error(error, e);
            ptr::null_mut()
        }
    }
}

/// Shut down a bridge and free all resources
///
/// Owning proxies release their native references; observing proxies stop
/// watching their objects.
///
/// # Arguments
/// * `bridge` - Pointer to WeftBridge (may be NULL)
///
/// # Safety
/// - Bridge pointer must be valid (created by `weft_bridge_new()`)
/// - Bridge must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn weft_bridge_destroy(bridge: *mut WeftBridge) {
    if bridge.is_null() {
        return;
    }

    let handle = Box::from_raw(bridge as *mut BridgeHandle);
    handle.bridge.shutdown();
    drop(handle);
}

/// Tell the bridge the native engine was reinitialized
///
/// Every proxy is detached without releasing its handle and every property
/// is unbound until its owner type is registered again.
///
/// # Arguments
/// * `bridge` - Pointer to WeftBridge (must not be NULL)
///
/// # Returns
/// * The new native generation
/// * 0 if bridge is NULL
///
/// # Safety
/// Bridge pointer must be valid
#[no_mangle]
pub unsafe extern "C" fn weft_bridge_reload(bridge: *mut WeftBridge) -> u64 {
    let Some(handle) = handle_ref(bridge) else {
        return 0;
    };

    handle.bridge.reload_native();
    handle.engine.forget_watches();
    handle.bridge.native_generation()
}

/// Number of live proxies the bridge is tracking
///
/// # Safety
/// Bridge pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn weft_bridge_proxy_count(bridge: *mut WeftBridge) -> usize {
    handle_ref(bridge).map_or(0, |handle| handle.bridge.proxies().len())
}

// ============================================================================
// Notification Functions
// ============================================================================

/// Report that the engine destroyed a watched object
///
/// # Arguments
/// * `bridge` - Pointer to WeftBridge (NULL is ignored)
/// * `object` - Destroyed object handle
///
/// # Safety
/// Bridge pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn weft_notify_destroyed(bridge: *mut WeftBridge, object: usize) {
    if let Some(handle) = handle_ref(bridge) {
        handle.engine.notify_destroyed(NativeHandle::from_raw(object));
    }
}

/// Report a change of an object's reference count
///
/// # Arguments
/// * `bridge` - Pointer to WeftBridge (NULL is ignored)
/// * `object` - Object handle
/// * `count` - New reference count
///
/// # Safety
/// Bridge pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn weft_notify_reference_changed(
    bridge: *mut WeftBridge,
    object: usize,
    count: u32,
) {
    if let Some(handle) = handle_ref(bridge) {
        handle
            .engine
            .notify_reference_changed(NativeHandle::from_raw(object), count);
    }
}

/// Report a change of a property registered with `notify_changed`
///
/// # Arguments
/// * `bridge` - Pointer to WeftBridge (must not be NULL)
/// * `object` - Object whose value changed
/// * `property` - Property handle
/// * `old_value` - Previous value (NULL means null)
/// * `new_value` - New value (NULL means null)
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * 0 on success
/// * -1 on failure (check error parameter)
///
/// # Safety
/// - Bridge pointer must be valid
/// - Value pointers must be valid or NULL, with valid string payloads
#[no_mangle]
pub unsafe extern "C" fn weft_notify_property_changed(
    bridge: *mut WeftBridge,
    object: usize,
    property: usize,
    old_value: *const WeftValue,
    new_value: *const WeftValue,
    error: *mut *mut WeftError,
) -> c_int {
    let Some(handle) = handle_ref(bridge) else {
        set_error(error, FfiError::NullPointer);
        return -1;
    };

    let read = |value: *const WeftValue| match value.as_ref() {
        Some(value) => value.to_native(),
        None => Ok(weft_sdk::NativeValue::Null),
    };
    let change = read(old_value).and_then(|old_value| {
        Ok(PropertyChanged {
            object: NativeHandle::from_raw(object),
            property: PropertyHandle::from_raw(property),
            old_value,
            new_value: read(new_value)?,
        })
    });

    match change {
        Ok(change) => {
            handle.engine.notify_property_changed(&change);
            0
        }
        Err(e) => {
            set_error(error, e.into());
            -1
        }
    }
}

// ============================================================================
// Error Handling Functions
// ============================================================================

/// Get error message
///
/// # Arguments
/// * `error` - Pointer to WeftError (may be NULL)
///
/// # Returns
/// * Null-terminated error message string
/// * NULL if error is NULL
///
/// # Safety
/// - Error pointer must be valid
/// - Returned string is valid until `weft_error_free()` is called
/// - Do not free the returned string directly
#[no_mangle]
pub unsafe extern "C" fn weft_error_message(error: *const WeftError) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }

    (*error).message
}

/// Free an error
///
/// # Arguments
/// * `error` - Pointer to WeftError (may be NULL)
///
/// # Safety
/// - Error pointer must be valid (created by the Weft API)
/// - Error must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn weft_error_free(error: *mut WeftError) {
    if error.is_null() {
        return;
    }

    if !(*error).message.is_null() {
        let _ = CString::from_raw((*error).message);
    }

    let _ = Box::from_raw(error);
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Weft bridge version string
///
/// # Returns
/// * Null-terminated version string (e.g., "0.1.0")
///
/// # Safety
/// - The returned string is a static string and must not be freed
#[no_mangle]
pub unsafe extern "C" fn weft_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Tests
// ============================================================================
