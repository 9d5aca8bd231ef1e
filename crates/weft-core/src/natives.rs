//! Managed type to native type cache

use crate::types::{TypeRef, WeakTypeEntry};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use weft_sdk::NativeType;

#[derive(Default)]
struct Tables {
    by_type: FxHashMap<WeakTypeEntry, NativeType>,
    by_native: FxHashMap<NativeType, WeakTypeEntry>,
    retired: FxHashSet<WeakTypeEntry>,
}

/// Native registrations of managed types for the current engine generation.
///
/// Types registered in an earlier generation are remembered as *retired*
/// until they are registered again, which is when their recorded properties
/// and overrides get replayed. A native type maps back to the newest loaded
/// generation of the class registered as it.
#[derive(Default)]
pub(crate) struct NativeTypeTable {
    tables: Mutex<Tables>,
}

impl NativeTypeTable {
    pub(crate) fn get(&self, ty: &TypeRef) -> Option<NativeType> {
        self.tables
            .lock()
            .by_type
            .get(&WeakTypeEntry::new(ty))
            .copied()
    }

    /// Record a registration. Returns the registration that ends up in the
    /// table and whether `ty` was retired, i.e. needs its records replayed.
    pub(crate) fn insert(&self, ty: &TypeRef, native: NativeType) -> (NativeType, bool) {
        let key = WeakTypeEntry::new(ty);
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.by_type.get(&key) {
            return (*existing, false);
        }
        tables.by_type.insert(key.clone(), native);
        let stale = tables
            .by_native
            .get(&native)
            .map_or(true, |existing| !existing.is_alive() || existing.is_superseded_by(ty));
        if stale {
            tables.by_native.insert(native, key.clone());
        }
        let revived = tables.retired.remove(&key);
        (native, revived)
    }

    /// Managed type registered as `native`
    pub(crate) fn resolve(&self, native: NativeType) -> Option<TypeRef> {
        self.tables
            .lock()
            .by_native
            .get(&native)
            .and_then(WeakTypeEntry::upgrade)
    }

    /// Forget the current generation's registrations, marking their types
    /// for replay
    pub(crate) fn retire(&self) -> usize {
        let mut tables = self.tables.lock();
        let by_type = std::mem::take(&mut tables.by_type);
        tables.by_native.clear();
        let count = by_type.len();
        tables
            .retired
            .extend(by_type.into_keys().filter(WeakTypeEntry::is_alive));
        count
    }

    /// Forget everything
    pub(crate) fn clear(&self) {
        *self.tables.lock() = Tables::default();
    }

    /// Drop entries for unloaded types
    pub(crate) fn prune(&self) -> usize {
        let mut tables = self.tables.lock();
        let before = tables.by_type.len() + tables.by_native.len() + tables.retired.len();
        tables.by_type.retain(|entry, _| entry.is_alive());
        tables.by_native.retain(|_, entry| entry.is_alive());
        tables.retired.retain(WeakTypeEntry::is_alive);
        before - tables.by_type.len() - tables.by_native.len() - tables.retired.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.tables.lock().by_type.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_resolve() {
        let table = NativeTypeTable::default();
        let button = TypeRef::class("App.Button").build();
        let native = NativeType::from_raw(0x10);

        assert_eq!(table.insert(&button, native), (native, false));
        assert_eq!(table.get(&button), Some(native));
        assert_eq!(table.resolve(native), Some(button.clone()));

        let (kept, _) = table.insert(&button, NativeType::from_raw(0x20));
        assert_eq!(kept, native);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_retired_types_are_revived_once() {
        let table = NativeTypeTable::default();
        let button = TypeRef::class("App.Button").build();
        table.insert(&button, NativeType::from_raw(0x10));

        assert_eq!(table.retire(), 1);
        assert!(table.get(&button).is_none());
        assert!(table.resolve(NativeType::from_raw(0x10)).is_none());

        let native = NativeType::from_raw(0x30);
        assert_eq!(table.insert(&button, native), (native, true));
        table.retire();
        assert_eq!(table.insert(&button, native), (native, true));
    }

    #[test]
    fn test_reverse_mapping_skips_unloaded_types() {
        let table = NativeTypeTable::default();
        let native = NativeType::from_raw(0x10);
        let old = TypeRef::class("App.Gadget").build();
        table.insert(&old, native);
        drop(old);

        let new = TypeRef::class("App.Gadget").build();
        table.insert(&new, native);
        assert_eq!(table.resolve(native), Some(new));
    }

    #[test]
    fn test_reverse_mapping_follows_newest_generation() {
        let table = NativeTypeTable::default();
        let native = NativeType::from_raw(0x10);
        let old = TypeRef::class("App.Gizmo").build();
        let new = TypeRef::class("App.Gizmo").build();

        table.insert(&new, native);
        table.insert(&old, native);
        assert_eq!(table.resolve(native), Some(new.clone()));

        let newest = TypeRef::class("App.Gizmo").build();
        table.insert(&newest, native);
        assert_eq!(table.resolve(native), Some(newest));
        assert_eq!(table.get(&old), Some(native));
    }

    #[test]
    fn test_prune() {
        let table = NativeTypeTable::default();
        let button = TypeRef::class("App.Button").build();
        table.insert(&button, NativeType::from_raw(0x10));
        drop(button);
        assert_eq!(table.prune(), 2);
        assert_eq!(table.len(), 0);
    }
}
