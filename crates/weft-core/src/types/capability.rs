//! Type capabilities
//!
//! A capability is an interface-like trait of a managed type that callers
//! query at runtime ("can instances of this type be frozen?"). Capabilities
//! are inherited: a type's set contains everything its base chain declares.

use std::fmt;

/// A single capability a type declares
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Instances can be made immutable and shared across threads
    Freezable,

    /// Named interface implemented by the type
    Interface(String),
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Freezable => f.write_str("freezable"),
            Self::Interface(name) => write!(f, "interface:{name}"),
        }
    }
}

/// Capabilities of a type, including those inherited from its bases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    capabilities: Vec<Capability>,
}

impl CapabilitySet {
    /// Create a set from a list, dropping duplicates
    #[must_use]
    pub fn new(capabilities: Vec<Capability>) -> Self {
        let mut set = Self::none();
        for capability in capabilities {
            set.insert(capability);
        }
        set
    }

    /// Empty set
    #[must_use]
    pub fn none() -> Self {
        Self {
            capabilities: Vec::new(),
        }
    }

    /// Add a capability; returns false if it was already present
    pub fn insert(&mut self, capability: Capability) -> bool {
        if self.supports(&capability) {
            return false;
        }
        self.capabilities.push(capability);
        true
    }

    /// Check for a capability
    #[must_use]
    pub fn supports(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Check for a named interface
    #[must_use]
    pub fn implements(&self, interface: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| matches!(c, Capability::Interface(name) if name == interface))
    }

    /// Union of `self` and `other`, keeping `self`'s order first
    #[must_use]
    pub fn merged(&self, other: &CapabilitySet) -> Self {
        let mut merged = self.clone();
        for capability in &other.capabilities {
            merged.insert(capability.clone());
        }
        merged
    }

    /// Iterate over the capabilities
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    /// Number of capabilities
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
