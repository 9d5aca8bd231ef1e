//! C representation of native values

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use weft_sdk::{AbiResult, NativeError, NativeHandle, NativeValue};

/// Discriminant of a [`WeftValue`]
pub type WeftValueTag = u32;

/// No value / null reference
pub const WEFT_VALUE_NULL: WeftValueTag = 0;
/// `payload.boolean`
pub const WEFT_VALUE_BOOL: WeftValueTag = 1;
/// `payload.int`, narrowed to 16 bits
pub const WEFT_VALUE_I16: WeftValueTag = 2;
/// `payload.uint`, narrowed to 16 bits
pub const WEFT_VALUE_U16: WeftValueTag = 3;
/// `payload.int`
pub const WEFT_VALUE_I32: WeftValueTag = 4;
/// `payload.uint`
pub const WEFT_VALUE_U32: WeftValueTag = 5;
/// `payload.single`
pub const WEFT_VALUE_F32: WeftValueTag = 6;
/// `payload.double`
pub const WEFT_VALUE_F64: WeftValueTag = 7;
/// `payload.string`, NUL-terminated UTF-8
pub const WEFT_VALUE_STRING: WeftValueTag = 8;
/// `payload.handle`
pub const WEFT_VALUE_OBJECT: WeftValueTag = 9;

/// Value payload, interpreted according to the tag
#[repr(C)]
#[derive(Clone, Copy)]
pub union WeftPayload {
    /// Boolean
    pub boolean: bool,
    /// Signed integer
    pub int: i32,
    /// Unsigned integer
    pub uint: u32,
    /// 32-bit float
    pub single: f32,
    /// 64-bit float
    pub double: f64,
    /// Native object handle
    pub handle: usize,
    /// String pointer (borrowed)
    pub string: *const c_char,
}

/// Tagged value crossing the C boundary
///
/// Strings are always borrowed: a value handed to the engine is valid for
/// the duration of the call, and a string returned by the engine must stay
/// valid until the engine function returns to the bridge.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WeftValue {
    /// One of the `WEFT_VALUE_*` constants
    pub tag: WeftValueTag,
    /// Payload for `tag`
    pub payload: WeftPayload,
}

impl WeftValue {
    /// The null value
    pub const fn null() -> Self {
        Self {
            tag: WEFT_VALUE_NULL,
            payload: WeftPayload { handle: 0 },
        }
    }

    /// Copy this value into a [`NativeValue`]
    ///
    /// # Safety
    /// A string payload must point to a valid NUL-terminated string.
    pub unsafe fn to_native(&self) -> AbiResult<NativeValue> {
        let value = match self.tag {
            WEFT_VALUE_NULL => NativeValue::Null,
            WEFT_VALUE_BOOL => NativeValue::Bool(self.payload.boolean),
            WEFT_VALUE_I16 => NativeValue::I16(narrow(i16::try_from(self.payload.int), "i16")?),
            WEFT_VALUE_U16 => NativeValue::U16(narrow(u16::try_from(self.payload.uint), "u16")?),
            WEFT_VALUE_I32 => NativeValue::I32(self.payload.int),
            WEFT_VALUE_U32 => NativeValue::U32(self.payload.uint),
            WEFT_VALUE_F32 => NativeValue::F32(self.payload.single),
            WEFT_VALUE_F64 => NativeValue::F64(self.payload.double),
            WEFT_VALUE_STRING => {
                let string = self.payload.string;
                if string.is_null() {
                    NativeValue::Null
                } else {
                    let text = CStr::from_ptr(string)
                        .to_str()
                        .map_err(|_| NativeError::Engine("string value is not UTF-8".to_string()))?;
                    NativeValue::Str(text.to_string())
                }
            }
            WEFT_VALUE_OBJECT => {
                let handle = NativeHandle::from_raw(self.payload.handle);
                if handle.is_null() {
                    NativeValue::Null
                } else {
                    NativeValue::Object(handle)
                }
            }
            tag => return Err(NativeError::Engine(format!("unknown value tag {tag}"))),
        };
        Ok(value)
    }
}

impl Default for WeftValue {
    fn default() -> Self {
        Self::null()
    }
}

fn narrow<T, E>(value: Result<T, E>, storage: &str) -> AbiResult<T> {
    value.map_err(|_| NativeError::TypeMismatch {
        expected: storage.to_string(),
        got: "out-of-range integer".to_string(),
    })
}

/// A [`WeftValue`] together with the string storage it borrows
pub struct OwnedValue {
    raw: WeftValue,
    _string: Option<CString>,
}

impl OwnedValue {
    /// Convert a native value for a call into the engine
    pub fn new(value: &NativeValue) -> AbiResult<Self> {
        let mut string = None;
        let (tag, payload) = match value {
            NativeValue::Null => (WEFT_VALUE_NULL, WeftPayload { handle: 0 }),
            NativeValue::Bool(b) => (WEFT_VALUE_BOOL, WeftPayload { boolean: *b }),
            NativeValue::I16(i) => (WEFT_VALUE_I16, WeftPayload { int: i32::from(*i) }),
            NativeValue::U16(u) => (WEFT_VALUE_U16, WeftPayload { uint: u32::from(*u) }),
            NativeValue::I32(i) => (WEFT_VALUE_I32, WeftPayload { int: *i }),
            NativeValue::U32(u) => (WEFT_VALUE_U32, WeftPayload { uint: *u }),
            NativeValue::F32(f) => (WEFT_VALUE_F32, WeftPayload { single: *f }),
            NativeValue::F64(f) => (WEFT_VALUE_F64, WeftPayload { double: *f }),
            NativeValue::Str(s) => {
                let c_string = CString::new(s.as_str())
                    .map_err(|_| NativeError::Engine("string value contains NUL".to_string()))?;
                let payload = WeftPayload {
                    string: c_string.as_ptr(),
                };
                string = Some(c_string);
                (WEFT_VALUE_STRING, payload)
            }
            NativeValue::Object(h) => (WEFT_VALUE_OBJECT, WeftPayload { handle: h.as_raw() }),
        };
        Ok(Self {
            raw: WeftValue { tag, payload },
            _string: string,
        })
    }

    /// Borrow the C value
    pub fn as_raw(&self) -> &WeftValue {
        &self.raw
    }
}
