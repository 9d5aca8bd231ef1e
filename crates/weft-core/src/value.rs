//! Managed values
//!
//! [`Value`] is what managed code reads from and writes to dependency
//! properties. It is wider than the native representation: 64-bit integers,
//! characters, enums and live proxies all have their own variants and are
//! narrowed only when crossing into the engine.

use crate::proxy::Proxy;
use crate::types::{Primitive, TypeKind, TypeRef};

/// Managed property value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null reference / empty nullable
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Character
    Char(char),
    /// 16-bit signed integer
    I16(i16),
    /// 16-bit unsigned integer
    U16(u16),
    /// 32-bit signed integer
    I32(i32),
    /// 32-bit unsigned integer
    U32(u32),
    /// 64-bit signed integer
    I64(i64),
    /// 64-bit unsigned integer
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// String
    Str(String),
    /// Enumeration member, by underlying value
    Enum(i32),
    /// Proxy for a native object
    Object(Proxy),
}

impl Value {
    /// The value a property of type `ty` starts with when no default is given.
    ///
    /// Strings default to the empty string, value types to zero, and
    /// everything else (classes, nullables) to null.
    pub fn zero_for(ty: &TypeRef) -> Value {
        match ty.kind() {
            TypeKind::Primitive(p) => match p {
                Primitive::Bool => Value::Bool(false),
                Primitive::Char => Value::Char('\0'),
                Primitive::Int16 => Value::I16(0),
                Primitive::UInt16 => Value::U16(0),
                Primitive::Int32 => Value::I32(0),
                Primitive::UInt32 => Value::U32(0),
                Primitive::Int64 => Value::I64(0),
                Primitive::UInt64 => Value::U64(0),
                Primitive::Single => Value::F32(0.0),
                Primitive::Double => Value::F64(0.0),
                Primitive::String => Value::Str(String::new()),
            },
            TypeKind::Enum => Value::Enum(0),
            TypeKind::Nullable(_) | TypeKind::Class => Value::Null,
        }
    }

    /// Check whether this value can be stored in a property of type `ty`
    pub fn is_assignable_to(&self, ty: &TypeRef) -> bool {
        match ty.kind() {
            TypeKind::Nullable(inner) => self.is_null() || self.is_assignable_to(inner),
            TypeKind::Primitive(p) => matches!(
                (self, p),
                (Value::Bool(_), Primitive::Bool)
                    | (Value::Char(_), Primitive::Char)
                    | (Value::I16(_), Primitive::Int16)
                    | (Value::U16(_), Primitive::UInt16)
                    | (Value::I32(_) | Value::Enum(_), Primitive::Int32)
                    | (Value::U32(_), Primitive::UInt32)
                    | (Value::I64(_), Primitive::Int64)
                    | (Value::U64(_), Primitive::UInt64)
                    | (Value::F32(_), Primitive::Single)
                    | (Value::F64(_), Primitive::Double)
                    | (Value::Str(_) | Value::Null, Primitive::String)
            ),
            TypeKind::Enum => matches!(self, Value::Enum(_) | Value::I32(_)),
            TypeKind::Class => match self {
                Value::Null => true,
                Value::Object(proxy) => proxy.type_ref().is_subclass_of(ty),
                _ => false,
            },
        }
    }

    /// Short name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::I16(_) => "i16",
            Value::U16(_) => "u16",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
            Value::Object(_) => "object",
        }
    }

    /// Check if this is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32 (enums included)
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) | Value::Enum(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the proxy
    pub fn as_object(&self) -> Option<&Proxy> {
        match self {
            Value::Object(p) => Some(p),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    char => Char,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Str,
    Proxy => Object,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyObject;

    #[test]
    fn test_zero_values() {
        assert_eq!(Value::zero_for(&TypeRef::string()), Value::Str(String::new()));
        assert_eq!(
            Value::zero_for(&TypeRef::primitive(Primitive::Double)),
            Value::F64(0.0)
        );
        assert_eq!(
            Value::zero_for(&TypeRef::enumeration("App.Color")),
            Value::Enum(0)
        );
        let nullable = TypeRef::nullable(&TypeRef::primitive(Primitive::Int32)).unwrap();
        assert_eq!(Value::zero_for(&nullable), Value::Null);
        assert_eq!(Value::zero_for(&TypeRef::dependency_object()), Value::Null);
    }

    #[test]
    fn test_primitive_assignability() {
        let double = TypeRef::primitive(Primitive::Double);
        assert!(Value::F64(1.5).is_assignable_to(&double));
        assert!(!Value::I32(1).is_assignable_to(&double));
        assert!(!Value::Null.is_assignable_to(&double));
        assert!(Value::Null.is_assignable_to(&TypeRef::string()));
        assert!(Value::from("x").is_assignable_to(&TypeRef::string()));
    }

    #[test]
    fn test_nullable_and_enum_assignability() {
        let int = TypeRef::primitive(Primitive::Int32);
        let nullable = TypeRef::nullable(&int).unwrap();
        assert!(Value::Null.is_assignable_to(&nullable));
        assert!(Value::I32(3).is_assignable_to(&nullable));
        assert!(!Value::F64(3.0).is_assignable_to(&nullable));

        let color = TypeRef::enumeration("App.Color");
        assert!(Value::Enum(2).is_assignable_to(&color));
        assert!(Value::I32(2).is_assignable_to(&color));
        assert!(Value::Enum(2).is_assignable_to(&int));
        assert!(!Value::U32(2).is_assignable_to(&color));
    }

    #[test]
    fn test_object_assignability() {
        let control = TypeRef::class("App.Control")
            .base(&TypeRef::dependency_object())
            .build();
        let button = TypeRef::class("App.Button").base(&control).build();
        let value = Value::Object(ProxyObject::detached(button.clone()));

        assert!(value.is_assignable_to(&control));
        assert!(value.is_assignable_to(&button));
        assert!(!Value::Object(ProxyObject::detached(control.clone())).is_assignable_to(&button));
        assert!(Value::Null.is_assignable_to(&button));
        assert!(!Value::I32(0).is_assignable_to(&button));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(7i64), Value::I64(7));
        assert_eq!(Value::from(Some(1.0f32)), Value::F32(1.0));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::Enum(4).as_i32(), Some(4));
        assert_eq!(Value::from('a').type_name(), "char");
    }
}
