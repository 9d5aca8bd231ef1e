//! Property metadata and callbacks

use super::DependencyProperty;
use crate::proxy::ProxyObject;
use crate::types::TypeRef;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// A property change delivered to a managed callback
#[derive(Debug, Clone)]
pub struct PropertyChange {
    /// Property that changed
    pub property: Arc<DependencyProperty>,
    /// Previous effective value
    pub old_value: Value,
    /// New effective value
    pub new_value: Value,
}

/// Invoked after a property value changes on an object
pub type ChangedCallback = Arc<dyn Fn(&ProxyObject, &PropertyChange) + Send + Sync>;

/// Invoked before a value is written; returns the value to store
pub type CoerceCallback = Arc<dyn Fn(&ProxyObject, Value) -> Value + Send + Sync>;

/// Default value and callbacks of a property, for one type
#[derive(Clone, Default)]
pub struct PropertyMetadata {
    default_value: Option<Value>,
    changed: Option<ChangedCallback>,
    coerce: Option<CoerceCallback>,
}

impl PropertyMetadata {
    /// Metadata with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata with a default value
    pub fn with_default(value: impl Into<Value>) -> Self {
        Self {
            default_value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Set the changed callback
    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProxyObject, &PropertyChange) + Send + Sync + 'static,
    {
        self.changed = Some(Arc::new(callback));
        self
    }

    /// Set the coerce callback
    pub fn coerce_with<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProxyObject, Value) -> Value + Send + Sync + 'static,
    {
        self.coerce = Some(Arc::new(callback));
        self
    }

    /// Default value, if one was given
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Changed callback
    pub fn changed_callback(&self) -> Option<&ChangedCallback> {
        self.changed.as_ref()
    }

    /// Coerce callback
    pub fn coerce_callback(&self) -> Option<&CoerceCallback> {
        self.coerce.as_ref()
    }

    pub(crate) fn set_default(&mut self, value: Value) {
        self.default_value = Some(value);
    }

    /// Copy with the default filled in for a property of type `ty`
    pub(crate) fn filled(mut self, ty: &TypeRef) -> Self {
        if self.default_value.is_none() {
            self.default_value = Some(Value::zero_for(ty));
        }
        self
    }

    /// Copy where unset parts are taken from `base`
    pub(crate) fn inherit(mut self, base: &PropertyMetadata) -> Self {
        if self.default_value.is_none() {
            self.default_value = base.default_value.clone();
        }
        if self.changed.is_none() {
            self.changed = base.changed.clone();
        }
        if self.coerce.is_none() {
            self.coerce = base.coerce.clone();
        }
        self
    }
}

impl fmt::Debug for PropertyMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("default_value", &self.default_value)
            .field("changed", &self.changed.is_some())
            .field("coerce", &self.coerce.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;

    #[test]
    fn test_filled() {
        let double = TypeRef::primitive(Primitive::Double);
        let metadata = PropertyMetadata::new().filled(&double);
        assert_eq!(metadata.default_value(), Some(&Value::F64(0.0)));

        let metadata = PropertyMetadata::with_default(2.5).filled(&double);
        assert_eq!(metadata.default_value(), Some(&Value::F64(2.5)));
    }

    #[test]
    fn test_inherit() {
        let base = PropertyMetadata::with_default(1.0)
            .on_changed(|_: &ProxyObject, _: &PropertyChange| {})
            .coerce_with(|_: &ProxyObject, v: Value| v);
        let own = PropertyMetadata::with_default(2.0).inherit(&base);
        assert_eq!(own.default_value(), Some(&Value::F64(2.0)));
        assert!(own.changed_callback().is_some());
        assert!(own.coerce_callback().is_some());

        let bare = PropertyMetadata::new().inherit(&base);
        assert_eq!(bare.default_value(), Some(&Value::F64(1.0)));
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let metadata = PropertyMetadata::new().on_changed(|_: &ProxyObject, _: &PropertyChange| {});
        let text = format!("{:?}", metadata);
        assert!(text.contains("changed: true"));
        assert!(text.contains("coerce: false"));
    }
}
