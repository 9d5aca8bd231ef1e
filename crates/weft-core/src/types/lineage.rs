//! Logical class identity across reloads

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

static GENERATIONS: Lazy<Mutex<FxHashMap<String, u32>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

/// Allocate the next generation number for a type name.
///
/// The first type built with a given name is generation 1; every later
/// type with that name (a reload of the same class) gets the next number.
pub(crate) fn next_generation(name: &str) -> u32 {
    let mut generations = GENERATIONS.lock();
    let counter = generations.entry(name.to_string()).or_insert(0);
    *counter += 1;
    *counter
}

/// The class a type instance represents, independent of which load of the
/// class it came from.
///
/// Two type instances with the same name share a `ClassKey`. Resurrection
/// bookkeeping is keyed by it so a reloaded class finds the records left
/// by its previous generation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassKey(Arc<str>);

impl ClassKey {
    pub(crate) fn new(name: &str) -> Self {
        ClassKey(Arc::from(name))
    }

    /// Class name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassKey({})", self.0)
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations_count_per_name() {
        let first = next_generation("Test.Lineage.A");
        let second = next_generation("Test.Lineage.A");
        let other = next_generation("Test.Lineage.B");
        assert_eq!(second, first + 1);
        assert_eq!(other, 1);
    }

    #[test]
    fn test_class_key_is_by_name() {
        assert_eq!(ClassKey::new("App.Button"), ClassKey::new("App.Button"));
        assert_ne!(ClassKey::new("App.Button"), ClassKey::new("App.Control"));
        assert_eq!(ClassKey::new("App.Button").as_str(), "App.Button");
    }
}
