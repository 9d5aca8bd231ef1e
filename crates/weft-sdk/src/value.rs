//! NativeValue: values as they cross the engine boundary
//!
//! The engine only understands a small closed set of representations.
//! Managed types outside that set are narrowed by the bridge before they
//! get here (64-bit integers to 32-bit, characters to `u32`, ...).

use crate::handle::NativeHandle;
use std::fmt;

/// Value passed to or returned from the native engine
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NativeValue {
    /// Null reference / empty nullable
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 16-bit signed integer
    I16(i16),
    /// 16-bit unsigned integer
    U16(u16),
    /// 32-bit signed integer (also carries enum values)
    I32(i32),
    /// 32-bit unsigned integer
    U32(u32),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// UTF-8 string
    Str(String),
    /// Native object reference
    Object(NativeHandle),
}

/// Discriminant of a [`NativeValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeValueKind {
    /// `NativeValue::Null`
    Null,
    /// `NativeValue::Bool`
    Bool,
    /// `NativeValue::I16`
    I16,
    /// `NativeValue::U16`
    U16,
    /// `NativeValue::I32`
    I32,
    /// `NativeValue::U32`
    U32,
    /// `NativeValue::F32`
    F32,
    /// `NativeValue::F64`
    F64,
    /// `NativeValue::Str`
    Str,
    /// `NativeValue::Object`
    Object,
}

impl NativeValue {
    /// Get the value kind
    pub fn kind(&self) -> NativeValueKind {
        match self {
            NativeValue::Null => NativeValueKind::Null,
            NativeValue::Bool(_) => NativeValueKind::Bool,
            NativeValue::I16(_) => NativeValueKind::I16,
            NativeValue::U16(_) => NativeValueKind::U16,
            NativeValue::I32(_) => NativeValueKind::I32,
            NativeValue::U32(_) => NativeValueKind::U32,
            NativeValue::F32(_) => NativeValueKind::F32,
            NativeValue::F64(_) => NativeValueKind::F64,
            NativeValue::Str(_) => NativeValueKind::Str,
            NativeValue::Object(_) => NativeValueKind::Object,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Get as boolean if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32 if this is an i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NativeValue::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as u32 if this is a u32
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            NativeValue::U32(u) => Some(*u),
            _ => None,
        }
    }

    /// Get as f64 if this is an f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the string contents if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the object handle if this is an object reference
    pub fn as_object(&self) -> Option<NativeHandle> {
        match self {
            NativeValue::Object(h) => Some(*h),
            _ => None,
        }
    }
}

impl fmt::Display for NativeValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeValueKind::Null => "null",
            NativeValueKind::Bool => "bool",
            NativeValueKind::I16 => "i16",
            NativeValueKind::U16 => "u16",
            NativeValueKind::I32 => "i32",
            NativeValueKind::U32 => "u32",
            NativeValueKind::F32 => "f32",
            NativeValueKind::F64 => "f64",
            NativeValueKind::Str => "string",
            NativeValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert_eq!(NativeValue::Bool(true).as_bool(), Some(true));
        assert_eq!(NativeValue::I32(-4).as_i32(), Some(-4));
        assert_eq!(NativeValue::I32(-4).as_u32(), None);
        assert_eq!(NativeValue::Str("hi".into()).as_str(), Some("hi"));
        assert!(NativeValue::default().is_null());
    }

    #[test]
    fn test_value_kind() {
        let handle = NativeHandle::from_raw(0x20);
        assert_eq!(NativeValue::Object(handle).kind(), NativeValueKind::Object);
        assert_eq!(NativeValue::Object(handle).as_object(), Some(handle));
        assert_eq!(NativeValueKind::Str.to_string(), "string");
    }
}
