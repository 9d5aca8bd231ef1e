//! Metadata override resurrection

use super::ResurrectionReport;
use crate::error::{BridgeError, BridgeResult};
use crate::property::{DependencyProperty, PropertyMetadata};
use crate::types::{ClassKey, TypeRef, WeakTypeEntry};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A recorded metadata override
#[derive(Debug, Clone)]
pub struct OverrideRecord {
    /// Name of the overridden property
    pub property_name: String,
    /// Override metadata as given by the caller
    pub metadata: PropertyMetadata,
    target: WeakTypeEntry,
}

impl OverrideRecord {
    /// Static member the property is published under
    pub fn member_name(&self) -> String {
        format!("{}Property", self.property_name)
    }

    /// Generation of the overriding class the record was last applied to
    pub fn target(&self) -> &WeakTypeEntry {
        &self.target
    }

    fn visible_to(&self, for_type: &TypeRef) -> bool {
        self.target.generation() <= for_type.generation()
    }
}

/// Records of metadata overrides, per overriding class
///
/// Keyed by [`ClassKey`] like the property records, so a reloaded class
/// gets the overrides of the generation it replaces.
#[derive(Default)]
pub struct MetadataOverrideResurrection {
    records: Mutex<FxHashMap<ClassKey, Vec<OverrideRecord>>>,
}

impl MetadataOverrideResurrection {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an override, replacing an earlier one for the same property
    pub fn register(&self, for_type: &TypeRef, property_name: &str, metadata: &PropertyMetadata) {
        let record = OverrideRecord {
            property_name: property_name.to_string(),
            metadata: metadata.clone(),
            target: WeakTypeEntry::new(for_type),
        };
        let replaced = {
            let mut records = self.records.lock();
            let list = records.entry(for_type.class_key().clone()).or_default();
            match list.iter_mut().find(|r| r.property_name == property_name) {
                Some(existing) => Some(std::mem::replace(existing, record)),
                None => {
                    list.push(record);
                    None
                }
            }
        };
        drop(replaced);
    }

    /// Re-apply every override recorded for `for_type`'s class.
    ///
    /// The records move over to `for_type` before they are applied. Each
    /// property is resolved through the type's static members as
    /// `<Name>Property`. Properties that cannot be found, or that are still
    /// disposed, are skipped and reported.
    pub fn try_resurrect<F>(&self, for_type: &TypeRef, mut apply: F) -> ResurrectionReport
    where
        F: FnMut(&Arc<DependencyProperty>, PropertyMetadata) -> BridgeResult<()>,
    {
        let mut report = ResurrectionReport::default();
        for record in self.claim(for_type) {
            let member = record.member_name();
            let Some(property) = for_type.static_property(&member) else {
                report.skipped.push(BridgeError::MissingResurrectionTarget {
                    type_name: for_type.name().to_string(),
                    member,
                });
                continue;
            };
            if property.is_disposed() {
                report
                    .skipped
                    .push(BridgeError::PropertyDisposed(record.property_name));
                continue;
            }
            match apply(&property, record.metadata) {
                Ok(()) => report.resurrected.push(member),
                Err(error) => report.skipped.push(error),
            }
        }
        report
    }

    fn claim(&self, for_type: &TypeRef) -> Vec<OverrideRecord> {
        let mut records = self.records.lock();
        let Some(list) = records.get_mut(for_type.class_key()) else {
            return Vec::new();
        };
        list.iter_mut()
            .filter(|record| record.visible_to(for_type))
            .map(|record| {
                record.target = WeakTypeEntry::new(for_type);
                record.clone()
            })
            .collect()
    }

    /// Snapshot of the overrides `for_type` can replay
    pub fn records(&self, for_type: &TypeRef) -> Vec<OverrideRecord> {
        self.records
            .lock()
            .get(for_type.class_key())
            .map(|list| {
                list.iter()
                    .filter(|record| record.visible_to(for_type))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if `for_type`'s class has any records
    pub fn has_records(&self, for_type: &TypeRef) -> bool {
        self.records.lock().contains_key(for_type.class_key())
    }

    /// Check if `for_type` replaces a generation that left records behind
    pub fn needs_replay(&self, for_type: &TypeRef) -> bool {
        self.records
            .lock()
            .get(for_type.class_key())
            .is_some_and(|list| list.iter().any(|r| r.target.is_superseded_by(for_type)))
    }

    /// Drop records whose overriding type is unloaded.
    ///
    /// Once pruned, a later generation of the class starts without them.
    pub fn prune(&self) -> usize {
        let dropped: Vec<OverrideRecord> = {
            let mut records = self.records.lock();
            let mut dropped = Vec::new();
            records.retain(|_, list| {
                let (live, dead): (Vec<_>, Vec<_>) = std::mem::take(list)
                    .into_iter()
                    .partition(|r| r.target.is_alive());
                *list = live;
                dropped.extend(dead);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;
    use crate::value::Value;
    use weft_sdk::PropertyHandle;

    fn bound_property(owner: &TypeRef) -> Arc<DependencyProperty> {
        let property = Arc::new(DependencyProperty::detached(
            "Width",
            owner,
            &TypeRef::primitive(Primitive::Double),
        ));
        property.rebind(PropertyHandle::from_raw(0x70));
        property
    }

    #[test]
    fn test_register_replaces() {
        let button = TypeRef::class("App.Button").build();
        let manager = MetadataOverrideResurrection::new();
        manager.register(&button, "Width", &PropertyMetadata::with_default(10.0));
        manager.register(&button, "Width", &PropertyMetadata::with_default(20.0));
        manager.register(&button, "Height", &PropertyMetadata::with_default(5.0));

        let records = manager.records(&button);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metadata.default_value(), Some(&Value::F64(20.0)));
    }

    #[test]
    fn test_replay_resolves_static_members() {
        let control = TypeRef::class("App.Control").build();
        let button = TypeRef::class("App.Button").base(&control).build();
        let property = bound_property(&control);
        control.set_static("WidthProperty", property.clone());

        let manager = MetadataOverrideResurrection::new();
        manager.register(&button, "Width", &PropertyMetadata::with_default(10.0));

        let mut applied = Vec::new();
        let report = manager.try_resurrect(&button, |p, metadata| {
            applied.push((p.name().to_string(), metadata.default_value().cloned()));
            Ok(())
        });
        assert_eq!(report.resurrected, vec!["WidthProperty".to_string()]);
        assert_eq!(applied, vec![("Width".to_string(), Some(Value::F64(10.0)))]);
        control.clear_statics();
    }

    #[test]
    fn test_missing_member_is_skipped() {
        let button = TypeRef::class("App.Button").build();
        let manager = MetadataOverrideResurrection::new();
        manager.register(&button, "Width", &PropertyMetadata::new());

        let report = manager.try_resurrect(&button, |_, _| Ok(()));
        assert!(report.resurrected.is_empty());
        assert!(matches!(
            &report.skipped[..],
            [BridgeError::MissingResurrectionTarget { member, .. }] if member == "WidthProperty"
        ));
    }

    #[test]
    fn test_disposed_property_is_skipped() {
        let button = TypeRef::class("App.Button").build();
        let property = bound_property(&button);
        property.unbind();
        button.set_static("WidthProperty", property);

        let manager = MetadataOverrideResurrection::new();
        manager.register(&button, "Width", &PropertyMetadata::new());
        let report = manager.try_resurrect(&button, |_, _| Ok(()));
        assert!(matches!(&report.skipped[..], [BridgeError::PropertyDisposed(_)]));
        button.clear_statics();
    }

    #[test]
    fn test_reloaded_type_claims_overrides() {
        let control = TypeRef::class("App.Control").build();
        let property = bound_property(&control);
        control.set_static("WidthProperty", property.clone());

        let manager = MetadataOverrideResurrection::new();
        let first = TypeRef::class("App.Button").base(&control).build();
        manager.register(&first, "Width", &PropertyMetadata::with_default(10.0));
        drop(first);

        let second = TypeRef::class("App.Button").base(&control).build();
        assert!(manager.needs_replay(&second));
        let report = manager.try_resurrect(&second, |_, _| Ok(()));
        assert_eq!(report.resurrected, vec!["WidthProperty".to_string()]);
        assert!(!manager.needs_replay(&second));
        assert!(manager.records(&second)[0].target().matches(&second));
        control.clear_statics();
    }

    #[test]
    fn test_prune() {
        let button = TypeRef::class("App.Button").build();
        let manager = MetadataOverrideResurrection::new();
        manager.register(&button, "Width", &PropertyMetadata::new());
        drop(button);
        assert_eq!(manager.prune(), 1);
        assert!(manager.is_empty());
    }
}
