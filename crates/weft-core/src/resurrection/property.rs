//! Property wrapper resurrection

use super::ResurrectionReport;
use crate::error::BridgeResult;
use crate::property::{DependencyProperty, PropertyMetadata};
use crate::types::{ClassKey, TypeRef, WeakTypeEntry};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};
use weft_sdk::PropertyHandle;

/// Everything needed to register a property again
#[derive(Clone)]
pub struct PropertyRecord {
    /// Property name
    pub name: String,
    /// Declared value type
    pub value_type: TypeRef,
    /// Registration metadata
    pub metadata: PropertyMetadata,
    owner: WeakTypeEntry,
    property: Weak<DependencyProperty>,
}

impl PropertyRecord {
    /// The recorded wrapper, if it is still alive
    pub fn property(&self) -> Option<Arc<DependencyProperty>> {
        self.property.upgrade()
    }

    /// Check if the wrapper is gone
    pub fn is_stale(&self) -> bool {
        self.property.strong_count() == 0
    }

    /// Generation of the owning class the wrapper was last bound for
    pub fn owner(&self) -> &WeakTypeEntry {
        &self.owner
    }

    fn visible_to(&self, owner: &TypeRef) -> bool {
        self.owner.generation() <= owner.generation()
    }
}

/// Records of property registrations, per owning class.
///
/// Records are keyed by [`ClassKey`], so a later generation of the owning
/// class finds the records of the one it replaces. Each record remembers
/// the generation it was last bound for; an older generation never claims
/// a record from a newer one.
#[derive(Default)]
pub struct PropertyResurrection {
    records: Mutex<FxHashMap<ClassKey, Vec<PropertyRecord>>>,
}

impl PropertyResurrection {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a registration; returns false if `owner` already has a
    /// record for `name`.
    ///
    /// A record for `name` left by another generation of the class is
    /// replaced.
    pub fn register(
        &self,
        property: &Arc<DependencyProperty>,
        owner: &TypeRef,
        name: &str,
        value_type: &TypeRef,
        metadata: &PropertyMetadata,
    ) -> bool {
        let record = PropertyRecord {
            name: name.to_string(),
            value_type: value_type.clone(),
            metadata: metadata.clone(),
            owner: WeakTypeEntry::new(owner),
            property: Arc::downgrade(property),
        };
        let replaced = {
            let mut records = self.records.lock();
            let list = records.entry(owner.class_key().clone()).or_default();
            match list.iter_mut().find(|r| r.name == name) {
                Some(existing) if existing.owner == record.owner => return false,
                Some(existing) => Some(std::mem::replace(existing, record)),
                None => {
                    list.push(record);
                    None
                }
            }
        };
        drop(replaced);
        true
    }

    /// Rebind the surviving wrapper recorded for (`owner`, `name`) to
    /// `handle` and return it.
    ///
    /// The wrapper may have been registered on an earlier generation of
    /// `owner`'s class; it then moves over to `owner`.
    pub fn try_resurrect(
        &self,
        handle: PropertyHandle,
        owner: &TypeRef,
        name: &str,
    ) -> Option<Arc<DependencyProperty>> {
        let survivor = {
            let mut records = self.records.lock();
            let record = records
                .get_mut(owner.class_key())?
                .iter_mut()
                .find(|record| record.name == name && record.visible_to(owner))?;
            let survivor = record.property()?;
            record.owner = WeakTypeEntry::new(owner);
            survivor
        };
        survivor.rebind(handle);
        if !survivor.is_owned_by(owner) {
            survivor.set_owner(owner);
        }
        Some(survivor)
    }

    /// Forget the record for (`owner`, `name`)
    pub fn remove(&self, owner: &TypeRef, name: &str) -> bool {
        let removed = {
            let mut records = self.records.lock();
            let key = owner.class_key();
            let Some(list) = records.get_mut(key) else {
                return false;
            };
            let index = list
                .iter()
                .position(|record| record.name == name && record.visible_to(owner));
            let removed = index.map(|i| list.remove(i));
            if list.is_empty() {
                records.remove(key);
            }
            removed
        };
        removed.is_some()
    }

    /// Replay every record of `owner`'s class through `replay`.
    ///
    /// Records whose wrapper is gone are dropped instead of replayed.
    pub fn resurrect_all<F>(&self, owner: &TypeRef, mut replay: F) -> ResurrectionReport
    where
        F: FnMut(&PropertyRecord) -> BridgeResult<Arc<DependencyProperty>>,
    {
        let mut report = ResurrectionReport::default();
        for record in self.records(owner) {
            if record.is_stale() {
                self.remove(owner, &record.name);
                report.discarded += 1;
                continue;
            }
            match replay(&record) {
                Ok(_) => report.resurrected.push(record.name.clone()),
                Err(error) => report.skipped.push(error),
            }
        }
        report
    }

    /// Snapshot of the records `owner` can replay
    pub fn records(&self, owner: &TypeRef) -> Vec<PropertyRecord> {
        self.records
            .lock()
            .get(owner.class_key())
            .map(|list| {
                list.iter()
                    .filter(|record| record.visible_to(owner))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if `owner`'s class has any records
    pub fn has_records(&self, owner: &TypeRef) -> bool {
        self.records.lock().contains_key(owner.class_key())
    }

    /// Check if `owner` replaces a generation that left records behind
    pub fn needs_replay(&self, owner: &TypeRef) -> bool {
        self.records
            .lock()
            .get(owner.class_key())
            .is_some_and(|list| list.iter().any(|r| r.owner.is_superseded_by(owner)))
    }

    /// Drop records whose wrapper is gone.
    ///
    /// Records of an unloaded owner are kept while the wrapper lives: the
    /// next generation of the class picks them up.
    pub fn prune(&self) -> usize {
        let dropped: Vec<PropertyRecord> = {
            let mut records = self.records.lock();
            let mut dropped = Vec::new();
            records.retain(|_, list| {
                let (live, stale): (Vec<_>, Vec<_>) =
                    std::mem::take(list).into_iter().partition(|r| !r.is_stale());
                *list = live;
                dropped.extend(stale);
                !list.is_empty()
            });
            dropped
        };
        dropped.len()
    }

    /// Remove every record
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.records.lock());
        drop(drained);
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.records.lock().values().map(Vec::len).sum()
    }

    /// Check if there are no records
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
