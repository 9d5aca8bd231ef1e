//! Weak type keys

use super::{ClassKey, TypeInfo, TypeRef, TypeUid};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Weak;

/// Map key that refers to a type without keeping it loaded.
///
/// Two entries are equal only when they were taken from the same type
/// instance. An entry whose type has been unloaded keeps comparing equal to
/// its own clones (so it can still be found and removed) but never to an
/// entry for a newly built type, even one with the same name. The class
/// key and generation stay available after unloading so a later generation
/// of the class can be related back to it.
#[derive(Clone)]
pub struct WeakTypeEntry {
    uid: TypeUid,
    class: ClassKey,
    generation: u32,
    ty: Weak<TypeInfo>,
}

impl WeakTypeEntry {
    /// Create an entry for `ty`
    pub fn new(ty: &TypeRef) -> Self {
        Self {
            uid: ty.uid(),
            class: ty.class_key().clone(),
            generation: ty.generation(),
            ty: ty.downgrade(),
        }
    }

    /// Get the type if it is still loaded
    pub fn upgrade(&self) -> Option<TypeRef> {
        self.ty.upgrade().map(TypeRef::from_arc)
    }

    /// Check if the type is still loaded
    pub fn is_alive(&self) -> bool {
        self.ty.strong_count() > 0
    }

    /// Check if this entry was taken from `ty`
    pub fn matches(&self, ty: &TypeRef) -> bool {
        self.uid == ty.uid() && self.is_alive()
    }

    /// Identifier of the referenced type
    pub fn uid(&self) -> TypeUid {
        self.uid
    }

    /// Name of the referenced type, available after unloading
    pub fn name(&self) -> &str {
        self.class.as_str()
    }

    /// Logical class of the referenced type
    pub fn class_key(&self) -> &ClassKey {
        &self.class
    }

    /// Generation of the referenced type
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Check if `ty` is a later generation of the same class
    pub fn is_superseded_by(&self, ty: &TypeRef) -> bool {
        self.class == *ty.class_key() && self.generation < ty.generation()
    }
}

impl PartialEq for WeakTypeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid && Weak::ptr_eq(&self.ty, &other.ty)
    }
}

impl Eq for WeakTypeEntry {}

impl Hash for WeakTypeEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

impl From<&TypeRef> for WeakTypeEntry {
    fn from(ty: &TypeRef) -> Self {
        WeakTypeEntry::new(ty)
    }
}

impl fmt::Debug for WeakTypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_alive() { "loaded" } else { "unloaded" };
        write!(
            f,
            "WeakTypeEntry({}#{} gen {}, {})",
            self.class,
            self.uid.as_u64(),
            self.generation,
            state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_entry_equality() {
        let button = TypeRef::class("App.Button").build();
        let a = WeakTypeEntry::new(&button);
        let b = WeakTypeEntry::from(&button);
        assert_eq!(a, b);
        assert!(a.matches(&button));
        assert_eq!(a.upgrade(), Some(button));
    }

    #[test]
    fn test_unloaded_type_is_not_conflated() {
        let old = TypeRef::class("App.Button").build();
        let old_entry = WeakTypeEntry::new(&old);
        let mut map = FxHashMap::default();
        map.insert(old_entry.clone(), 1);
        drop(old);

        assert!(!old_entry.is_alive());
        assert!(old_entry.upgrade().is_none());
        assert_eq!(old_entry.name(), "App.Button");

        let new = TypeRef::class("App.Button").build();
        let new_entry = WeakTypeEntry::new(&new);
        assert_ne!(old_entry, new_entry);
        assert!(!old_entry.matches(&new));
        assert!(!map.contains_key(&new_entry));
        assert_eq!(map.remove(&old_entry), Some(1));

        assert_eq!(old_entry.class_key(), new_entry.class_key());
        assert!(old_entry.is_superseded_by(&new));
        assert!(!new_entry.is_superseded_by(&new));
    }
}
