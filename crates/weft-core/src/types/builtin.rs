//! Built-in types shared by every bridge

use super::{CapabilitySet, Primitive, TypeInfo, TypeKind, TypeRef};
use once_cell::sync::Lazy;

static PRIMITIVES: Lazy<Vec<TypeRef>> = Lazy::new(|| {
    Primitive::ALL
        .iter()
        .map(|&p| {
            TypeRef::from_info(TypeInfo::new(
                p.name().to_string(),
                TypeKind::Primitive(p),
                None,
                CapabilitySet::none(),
            ))
        })
        .collect()
});

static NULLABLES: Lazy<Vec<TypeRef>> = Lazy::new(|| {
    Primitive::ALL
        .iter()
        .map(|&p| TypeRef::new_nullable(&primitive(p)))
        .collect()
});

static DEPENDENCY_OBJECT: Lazy<TypeRef> =
    Lazy::new(|| TypeRef::class("Weft.DependencyObject").build());

static FREEZABLE: Lazy<TypeRef> = Lazy::new(|| {
    TypeRef::class("Weft.Freezable")
        .base(&DEPENDENCY_OBJECT)
        .freezable()
        .build()
});

pub(super) fn primitive(p: Primitive) -> TypeRef {
    PRIMITIVES[p.index()].clone()
}

pub(super) fn nullable(p: Primitive) -> TypeRef {
    NULLABLES[p.index()].clone()
}

pub(super) fn dependency_object() -> TypeRef {
    DEPENDENCY_OBJECT.clone()
}

pub(super) fn freezable() -> TypeRef {
    FREEZABLE.clone()
}

/// Map a declared type to the type its values are stored as natively.
///
/// `Int64` becomes `Int32`, `UInt64` and `Char` become `UInt32`, and the same
/// narrowing applies inside nullable wrappers. Every other type maps to
/// itself.
pub fn normalize(ty: &TypeRef) -> TypeRef {
    match ty.kind() {
        TypeKind::Primitive(p) if p.storage() != *p => primitive(p.storage()),
        TypeKind::Nullable(inner) => {
            let storage = normalize(inner);
            if TypeRef::ptr_eq(&storage, inner) {
                ty.clone()
            } else {
                TypeRef::nullable(&storage).unwrap_or_else(|| ty.clone())
            }
        }
        _ => ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_shared() {
        let a = TypeRef::primitive(Primitive::Double);
        let b = TypeRef::primitive(Primitive::Double);
        assert_eq!(a, b);
        assert_eq!(a.name(), "Double");
    }

    #[test]
    fn test_normalize() {
        let int64 = TypeRef::primitive(Primitive::Int64);
        let int32 = TypeRef::primitive(Primitive::Int32);
        let uint32 = TypeRef::primitive(Primitive::UInt32);
        assert_eq!(normalize(&int64), int32);
        assert_eq!(normalize(&TypeRef::primitive(Primitive::UInt64)), uint32);
        assert_eq!(normalize(&TypeRef::primitive(Primitive::Char)), uint32);
        assert_eq!(normalize(&int32), int32);

        let nullable_int64 = TypeRef::nullable(&int64).unwrap();
        assert_eq!(normalize(&nullable_int64), TypeRef::nullable(&int32).unwrap());

        let color = TypeRef::enumeration("App.Color");
        assert_eq!(normalize(&color), color);
        let dobj = TypeRef::dependency_object();
        assert_eq!(normalize(&dobj), dobj);
    }
}
