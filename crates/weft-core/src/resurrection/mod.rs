//! Resurrection after a native engine reload or a class reload
//!
//! When the native engine is reinitialized every native registration is
//! lost, but managed types and the property wrappers they hold survive. When
//! a managed class is reloaded, a new type instance takes the place of the
//! old one while wrappers registered on the old one are still held. The
//! managers here remember enough about each registration to replay it the
//! next time the owning class is registered:
//!
//! - [`PropertyResurrection`] rebinds surviving [`DependencyProperty`]
//!   wrappers to fresh native registrations.
//! - [`MetadataOverrideResurrection`] re-applies recorded metadata overrides.
//!
//! Both are keyed by [`ClassKey`]: a reloaded class is the next generation
//! of the same key and picks up the records of the one it replaces. Each
//! record also keeps a [`WeakTypeEntry`] for the generation it was last
//! bound to, so an older generation never takes over a newer one's records.
//!
//! [`DependencyProperty`]: crate::DependencyProperty
//! [`ClassKey`]: crate::types::ClassKey
//! [`WeakTypeEntry`]: crate::types::WeakTypeEntry

mod metadata;
mod property;

pub use metadata::{MetadataOverrideResurrection, OverrideRecord};
pub use property::{PropertyRecord, PropertyResurrection};

use crate::bridge::BridgeInner;
use crate::error::BridgeError;
use crate::types::TypeRef;
use tracing::{debug, warn};

/// Outcome of replaying recorded registrations for one type
#[derive(Debug, Default)]
pub struct ResurrectionReport {
    /// Names of properties and overrides that were replayed
    pub resurrected: Vec<String>,
    /// Records dropped because their property no longer exists
    pub discarded: usize,
    /// Records that could not be replayed
    pub skipped: Vec<BridgeError>,
}

impl ResurrectionReport {
    /// Append another report
    pub fn merge(&mut self, other: ResurrectionReport) {
        self.resurrected.extend(other.resurrected);
        self.discarded += other.discarded;
        self.skipped.extend(other.skipped);
    }

    /// Check if nothing was skipped
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Check if the report is empty
    pub fn is_empty(&self) -> bool {
        self.resurrected.is_empty() && self.discarded == 0 && self.skipped.is_empty()
    }
}

impl BridgeInner {
    /// Check if `ty` is a reloaded class with records from an earlier
    /// generation
    pub(crate) fn needs_replay(&self, ty: &TypeRef) -> bool {
        (self.options.resurrection.properties && self.property_records.needs_replay(ty))
            || (self.options.resurrection.metadata_overrides
                && self.override_records.needs_replay(ty))
    }

    /// Replay every record kept for `ty`'s class.
    ///
    /// Recorded metadata was validated when it was first registered and is
    /// replayed as is.
    pub(crate) fn replay_type(&self, ty: &TypeRef) -> ResurrectionReport {
        let mut report = ResurrectionReport::default();
        if self.options.resurrection.properties {
            report.merge(self.property_records.resurrect_all(ty, |record| {
                self.register_prepared(&record.name, &record.value_type, ty, record.metadata.clone())
            }));
        }
        if self.options.resurrection.metadata_overrides {
            report.merge(
                self.override_records
                    .try_resurrect(ty, |property, metadata| {
                        self.apply_override(property, ty, metadata)
                    }),
            );
        }
        for error in &report.skipped {
            warn!(ty = %ty, %error, "skipped resurrection record");
        }
        if !report.is_empty() {
            debug!(
                ty = %ty,
                resurrected = report.resurrected.len(),
                discarded = report.discarded,
                skipped = report.skipped.len(),
                "replayed registrations"
            );
        }
        report
    }
}
