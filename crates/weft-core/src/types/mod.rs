//! Managed type descriptors
//!
//! Every managed type the bridge knows about is described by a [`TypeInfo`]
//! shared through a [`TypeRef`]. A type is "loaded" for as long as something
//! holds a `TypeRef` to it; once the last reference goes away the type is
//! unloaded, and bookkeeping keyed by [`WeakTypeEntry`] stops resolving it.
//!
//! Type identity is allocation identity. Two separately built types with the
//! same name are different types, and a type built after another one was
//! unloaded is never mistaken for it. Separately, every type carries a
//! [`ClassKey`] and a generation: types built with the same name are
//! successive generations of one logical class, which is what resurrection
//! follows across a reload.

mod builtin;
mod capability;
mod lineage;
mod weak;

pub use builtin::normalize;
pub use capability::{Capability, CapabilitySet};
pub use lineage::ClassKey;
pub use weak::WeakTypeEntry;

use crate::property::DependencyProperty;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Unique, never reused identifier of a type instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeUid(u64);

impl TypeUid {
    fn next() -> Self {
        static NEXT_UID: AtomicU64 = AtomicU64::new(1);
        TypeUid(NEXT_UID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw identifier
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Built-in primitive value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `i16`
    Int16,
    /// `u16`
    UInt16,
    /// `i32`
    Int32,
    /// `u32`
    UInt32,
    /// `i64`
    Int64,
    /// `u64`
    UInt64,
    /// `f32`
    Single,
    /// `f64`
    Double,
    /// `String`
    String,
}

impl Primitive {
    /// All primitives, in declaration order
    pub const ALL: [Primitive; 11] = [
        Primitive::Bool,
        Primitive::Char,
        Primitive::Int16,
        Primitive::UInt16,
        Primitive::Int32,
        Primitive::UInt32,
        Primitive::Int64,
        Primitive::UInt64,
        Primitive::Single,
        Primitive::Double,
        Primitive::String,
    ];

    /// Type name
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "Boolean",
            Primitive::Char => "Char",
            Primitive::Int16 => "Int16",
            Primitive::UInt16 => "UInt16",
            Primitive::Int32 => "Int32",
            Primitive::UInt32 => "UInt32",
            Primitive::Int64 => "Int64",
            Primitive::UInt64 => "UInt64",
            Primitive::Single => "Single",
            Primitive::Double => "Double",
            Primitive::String => "String",
        }
    }

    /// The primitive this one is stored as natively.
    ///
    /// The engine has no 64-bit integers and no character type: `Int64`
    /// narrows to `Int32`, `UInt64` and `Char` to `UInt32`.
    pub fn storage(self) -> Primitive {
        match self {
            Primitive::Int64 => Primitive::Int32,
            Primitive::UInt64 | Primitive::Char => Primitive::UInt32,
            other => other,
        }
    }

    /// Check for primitives that are not reference types
    pub fn is_value_type(self) -> bool {
        self != Primitive::String
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Shape of a managed type
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Built-in primitive
    Primitive(Primitive),
    /// Enumeration backed by `i32`
    Enum,
    /// Nullable wrapper around a value type
    Nullable(TypeRef),
    /// Reference type; proxies are instances of class types
    Class,
}

/// Descriptor of a managed type
pub struct TypeInfo {
    uid: TypeUid,
    name: String,
    class: ClassKey,
    generation: u32,
    kind: TypeKind,
    base: Option<TypeRef>,
    capabilities: CapabilitySet,
    statics: RwLock<FxHashMap<String, Arc<DependencyProperty>>>,
}

impl TypeInfo {
    fn new(name: String, kind: TypeKind, base: Option<TypeRef>, own: CapabilitySet) -> Self {
        let capabilities = match &base {
            Some(base) => own.merged(&base.capabilities),
            None => own,
        };
        Self {
            uid: TypeUid::next(),
            class: ClassKey::new(&name),
            generation: lineage::next_generation(&name),
            name,
            kind,
            base,
            capabilities,
            statics: RwLock::new(FxHashMap::default()),
        }
    }

    /// Unique identifier of this type instance
    pub fn uid(&self) -> TypeUid {
        self.uid
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical class this type is a generation of
    pub fn class_key(&self) -> &ClassKey {
        &self.class
    }

    /// Load generation of the class, starting at 1
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Type shape
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Direct base type
    pub fn base(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    /// Declared and inherited capabilities
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Check for a capability
    pub fn supports(&self, capability: &Capability) -> bool {
        self.capabilities.supports(capability)
    }

    /// Check if this is a class type
    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class)
    }

    /// Check if this is a nullable wrapper
    pub fn is_nullable(&self) -> bool {
        matches!(self.kind, TypeKind::Nullable(_))
    }

    /// Check if this is a non-nullable value type
    pub fn is_value_type(&self) -> bool {
        match &self.kind {
            TypeKind::Primitive(p) => p.is_value_type(),
            TypeKind::Enum => true,
            TypeKind::Nullable(_) | TypeKind::Class => false,
        }
    }

    /// Get the primitive if this is a primitive type
    pub fn primitive(&self) -> Option<Primitive> {
        match self.kind {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("uid", &self.uid.0)
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("kind", &self.kind)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .finish()
    }
}

/// Shared reference to a loaded type
#[derive(Clone)]
pub struct TypeRef(Arc<TypeInfo>);

impl TypeRef {
    /// Start building a class type
    pub fn class(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into())
    }

    /// Create an enumeration type
    pub fn enumeration(name: impl Into<String>) -> TypeRef {
        Self::from_info(TypeInfo::new(
            name.into(),
            TypeKind::Enum,
            None,
            CapabilitySet::none(),
        ))
    }

    /// Built-in primitive type
    pub fn primitive(primitive: Primitive) -> TypeRef {
        builtin::primitive(primitive)
    }

    /// Built-in `String` type
    pub fn string() -> TypeRef {
        builtin::primitive(Primitive::String)
    }

    /// Nullable wrapper around a value type.
    ///
    /// Wrappers around primitives are shared; other wrappers are created on
    /// each call. Returns `None` when `inner` is not a non-nullable value type.
    pub fn nullable(inner: &TypeRef) -> Option<TypeRef> {
        if !inner.is_value_type() {
            return None;
        }
        if let Some(p) = inner.primitive() {
            if TypeRef::ptr_eq(inner, &builtin::primitive(p)) {
                return Some(builtin::nullable(p));
            }
        }
        Some(Self::new_nullable(inner))
    }

    fn new_nullable(inner: &TypeRef) -> TypeRef {
        Self::from_info(TypeInfo::new(
            format!("Nullable<{}>", inner.name()),
            TypeKind::Nullable(inner.clone()),
            None,
            CapabilitySet::none(),
        ))
    }

    /// Root of every type that can own dependency properties
    pub fn dependency_object() -> TypeRef {
        builtin::dependency_object()
    }

    /// Built-in freezable base class
    pub fn freezable() -> TypeRef {
        builtin::freezable()
    }

    fn from_info(info: TypeInfo) -> TypeRef {
        TypeRef(Arc::new(info))
    }

    /// Check if two references point at the same type instance
    pub fn ptr_eq(a: &TypeRef, b: &TypeRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub(crate) fn downgrade(&self) -> Weak<TypeInfo> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn from_arc(arc: Arc<TypeInfo>) -> TypeRef {
        TypeRef(arc)
    }

    /// This type followed by its base chain
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: Some(self.clone()),
        }
    }

    /// Check if this type is `other` or derives from it
    pub fn is_subclass_of(&self, other: &TypeRef) -> bool {
        self.ancestors().any(|t| TypeRef::ptr_eq(&t, other))
    }

    // ========================================================================
    // Statics
    // ========================================================================

    /// Publish a property as a static member of this type.
    ///
    /// Metadata override resurrection resolves properties by member name
    /// (`<Name>Property`) through this table. The table holds the property
    /// strongly; a property whose value type is this type itself forms a
    /// cycle that keeps the type loaded until [`TypeRef::clear_statics`].
    pub fn set_static(&self, member: impl Into<String>, property: Arc<DependencyProperty>) {
        self.0.statics.write().insert(member.into(), property);
    }

    /// Remove a static member
    pub fn remove_static(&self, member: &str) -> Option<Arc<DependencyProperty>> {
        self.0.statics.write().remove(member)
    }

    /// Remove every static member
    pub fn clear_statics(&self) {
        let drained: Vec<_> = self.0.statics.write().drain().collect();
        drop(drained);
    }

    /// Look up a static member on this type or its bases
    pub fn static_property(&self, member: &str) -> Option<Arc<DependencyProperty>> {
        self.ancestors()
            .find_map(|t| t.0.statics.read().get(member).cloned())
    }
}

impl Deref for TypeRef {
    type Target = TypeInfo;

    fn deref(&self) -> &TypeInfo {
        &self.0
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        TypeRef::ptr_eq(self, other)
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.uid.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({}#{})", self.0.name, self.0.uid.0)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Iterator over a type and its bases
pub struct Ancestors {
    next: Option<TypeRef>,
}

impl Iterator for Ancestors {
    type Item = TypeRef;

    fn next(&mut self) -> Option<TypeRef> {
        let current = self.next.take()?;
        self.next = current.base().cloned();
        Some(current)
    }
}

/// Builder for class types
#[derive(Debug)]
pub struct TypeBuilder {
    name: String,
    base: Option<TypeRef>,
    capabilities: CapabilitySet,
}

impl TypeBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            base: None,
            capabilities: CapabilitySet::none(),
        }
    }

    /// Set the base class
    pub fn base(mut self, base: &TypeRef) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Declare a capability
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Declare that instances can be frozen
    pub fn freezable(self) -> Self {
        self.capability(Capability::Freezable)
    }

    /// Declare an implemented interface
    pub fn implements(self, interface: impl Into<String>) -> Self {
        self.capability(Capability::Interface(interface.into()))
    }

    /// Finish the type
    pub fn build(self) -> TypeRef {
        TypeRef::from_info(TypeInfo::new(
            self.name,
            TypeKind::Class,
            self.base,
            self.capabilities,
        ))
    }
}
