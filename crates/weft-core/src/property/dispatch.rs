//! Typed value dispatch
//!
//! Converts between managed [`Value`]s and the engine's [`NativeValue`]s.
//! Primitive conversions go through a fixed table of function pointers
//! indexed by the declared primitive; enums, nullables and classes are
//! handled structurally.

use crate::proxy::Proxy;
use crate::types::{Primitive, TypeKind, TypeRef};
use crate::value::Value;
use weft_sdk::{NativeHandle, NativeValue};

/// Conversion pair for one declared primitive
pub struct Marshaler {
    /// Managed to native; `None` when the value does not fit
    pub to_native: fn(&Value) -> Option<NativeValue>,
    /// Native to managed; `None` on a representation mismatch
    pub from_native: fn(&NativeValue) -> Option<Value>,
}

static MARSHALERS: [Marshaler; 11] = [
    Marshaler {
        to_native: bool_to_native,
        from_native: bool_from_native,
    },
    Marshaler {
        to_native: char_to_native,
        from_native: char_from_native,
    },
    Marshaler {
        to_native: i16_to_native,
        from_native: i16_from_native,
    },
    Marshaler {
        to_native: u16_to_native,
        from_native: u16_from_native,
    },
    Marshaler {
        to_native: i32_to_native,
        from_native: i32_from_native,
    },
    Marshaler {
        to_native: u32_to_native,
        from_native: u32_from_native,
    },
    Marshaler {
        to_native: i64_to_native,
        from_native: i64_from_native,
    },
    Marshaler {
        to_native: u64_to_native,
        from_native: u64_from_native,
    },
    Marshaler {
        to_native: f32_to_native,
        from_native: f32_from_native,
    },
    Marshaler {
        to_native: f64_to_native,
        from_native: f64_from_native,
    },
    Marshaler {
        to_native: str_to_native,
        from_native: str_from_native,
    },
];

/// Conversion pair for a declared primitive
pub fn marshaler(primitive: Primitive) -> &'static Marshaler {
    &MARSHALERS[primitive as usize]
}

/// Convert a managed value for a property declared as `ty`.
///
/// Returns `None` when the value does not fit the native storage type (a
/// 64-bit integer outside the 32-bit range, a disposed proxy, a value of the
/// wrong shape).
pub fn to_native(value: &Value, ty: &TypeRef) -> Option<NativeValue> {
    match ty.kind() {
        TypeKind::Primitive(p) => (marshaler(*p).to_native)(value),
        TypeKind::Enum => value.as_i32().map(NativeValue::I32),
        TypeKind::Nullable(inner) => match value {
            Value::Null => Some(NativeValue::Null),
            other => to_native(other, inner),
        },
        TypeKind::Class => match value {
            Value::Null => Some(NativeValue::Null),
            Value::Object(proxy) if !proxy.is_disposed() => Some(NativeValue::Object(proxy.handle())),
            _ => None,
        },
    }
}

/// Convert a native value read from a property declared as `ty`.
///
/// Object handles are turned into proxies through `resolve`.
pub fn from_native(
    native: &NativeValue,
    ty: &TypeRef,
    resolve: &dyn Fn(NativeHandle) -> Option<Proxy>,
) -> Option<Value> {
    match ty.kind() {
        TypeKind::Primitive(p) => (marshaler(*p).from_native)(native),
        TypeKind::Enum => native.as_i32().map(Value::Enum),
        TypeKind::Nullable(inner) => match native {
            NativeValue::Null => Some(Value::Null),
            other => from_native(other, inner, resolve),
        },
        TypeKind::Class => match native {
            NativeValue::Null => Some(Value::Null),
            NativeValue::Object(handle) => Some(resolve(*handle).map_or(Value::Null, Value::Object)),
            _ => None,
        },
    }
}

fn bool_to_native(v: &Value) -> Option<NativeValue> {
    v.as_bool().map(NativeValue::Bool)
}

fn bool_from_native(n: &NativeValue) -> Option<Value> {
    n.as_bool().map(Value::Bool)
}

fn char_to_native(v: &Value) -> Option<NativeValue> {
    match v {
        Value::Char(c) => Some(NativeValue::U32(*c as u32)),
        _ => None,
    }
}

fn char_from_native(n: &NativeValue) -> Option<Value> {
    n.as_u32().and_then(char::from_u32).map(Value::Char)
}

fn i16_to_native(v: &Value) -> Option<NativeValue> {
    match v {
        Value::I16(i) => Some(NativeValue::I16(*i)),
        _ => None,
    }
}

fn i16_from_native(n: &NativeValue) -> Option<Value> {
    match n {
        NativeValue::I16(i) => Some(Value::I16(*i)),
        _ => None,
    }
}

fn u16_to_native(v: &Value) -> Option<NativeValue> {
    match v {
        Value::U16(u) => Some(NativeValue::U16(*u)),
        _ => None,
    }
}

fn u16_from_native(n: &NativeValue) -> Option<Value> {
    match n {
        NativeValue::U16(u) => Some(Value::U16(*u)),
        _ => None,
    }
}

fn i32_to_native(v: &Value) -> Option<NativeValue> {
    v.as_i32().map(NativeValue::I32)
}

fn i32_from_native(n: &NativeValue) -> Option<Value> {
    n.as_i32().map(Value::I32)
}

fn u32_to_native(v: &Value) -> Option<NativeValue> {
    match v {
        Value::U32(u) => Some(NativeValue::U32(*u)),
        _ => None,
    }
}

fn u32_from_native(n: &NativeValue) -> Option<Value> {
    n.as_u32().map(Value::U32)
}

fn i64_to_native(v: &Value) -> Option<NativeValue> {
    match v {
        Value::I64(i) => i32::try_from(*i).ok().map(NativeValue::I32),
        _ => None,
    }
}

fn i64_from_native(n: &NativeValue) -> Option<Value> {
    n.as_i32().map(|i| Value::I64(i64::from(i)))
}

fn u64_to_native(v: &Value) -> Option<NativeValue> {
    match v {
        Value::U64(u) => u32::try_from(*u).ok().map(NativeValue::U32),
        _ => None,
    }
}

fn u64_from_native(n: &NativeValue) -> Option<Value> {
    n.as_u32().map(|u| Value::U64(u64::from(u)))
}

fn f32_to_native(v: &Value) -> Option<NativeValue> {
    match v {
        Value::F32(f) => Some(NativeValue::F32(*f)),
        _ => None,
    }
}

fn f32_from_native(n: &NativeValue) -> Option<Value> {
    match n {
        NativeValue::F32(f) => Some(Value::F32(*f)),
        _ => None,
    }
}

fn f64_to_native(v: &Value) -> Option<NativeValue> {
    v.as_f64().map(NativeValue::F64)
}

fn f64_from_native(n: &NativeValue) -> Option<Value> {
    n.as_f64().map(Value::F64)
}

fn str_to_native(v: &Value) -> Option<NativeValue> {
    match v {
        Value::Str(s) => Some(NativeValue::Str(s.clone())),
        Value::Null => Some(NativeValue::Null),
        _ => None,
    }
}

fn str_from_native(n: &NativeValue) -> Option<Value> {
    match n {
        NativeValue::Str(s) => Some(Value::Str(s.clone())),
        NativeValue::Null => Some(Value::Null),
        _ => None,
    }
}
