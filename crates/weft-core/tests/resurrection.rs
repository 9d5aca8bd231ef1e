//! Integration tests for resurrection after a native engine reload or a
//! class reload

use parking_lot::Mutex;
use std::sync::Arc;
use weft_core::{
    Bridge, BridgeError, BridgeOptions, PropertyChange, PropertyMetadata, Primitive, ProxyObject,
    TypeRef, Value,
};
use weft_sdk::{MemoryEngine, NativeValue};

struct Fixture {
    engine: Arc<MemoryEngine>,
    bridge: Bridge,
    control: TypeRef,
    button: TypeRef,
}

fn setup_with(options: BridgeOptions) -> Fixture {
    let engine = Arc::new(MemoryEngine::new());
    let bridge = Bridge::with_options(engine.clone(), options);
    let control = TypeRef::class("App.Control")
        .base(&TypeRef::dependency_object())
        .build();
    let button = TypeRef::class("App.Button").base(&control).build();
    Fixture {
        engine,
        bridge,
        control,
        button,
    }
}

fn setup() -> Fixture {
    setup_with(BridgeOptions::default())
}

fn double() -> TypeRef {
    TypeRef::primitive(Primitive::Double)
}

fn panel() -> TypeRef {
    TypeRef::class("App.Panel")
        .base(&TypeRef::dependency_object())
        .build()
}

impl Fixture {
    fn reload(&self) {
        self.engine.restart();
        self.bridge.reload_native();
    }
}

#[test]
fn test_reload_unbinds_properties() {
    let f = setup();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();

    f.reload();
    assert!(width.is_disposed());
    assert!(f.bridge.find_property(&f.control, "Width").is_none());
    assert_eq!(f.bridge.native_generation(), 1);
}

#[test]
fn test_reregistering_returns_surviving_wrapper() {
    let f = setup();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    let old_handle = width.native_handle();

    f.reload();
    let again = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();

    assert!(Arc::ptr_eq(&width, &again));
    assert!(!width.is_disposed());
    assert_ne!(width.native_handle(), old_handle);
    let owner = f.bridge.native_type(&f.control).unwrap();
    assert_eq!(f.engine.find_property(owner, "Width"), Some(width.native_handle()));
}

#[test]
fn test_registering_owner_replays_properties() {
    let f = setup();
    let width = f
        .bridge
        .register_property(
            "Width",
            &double(),
            &f.control,
            Some(PropertyMetadata::with_default(25.0)),
        )
        .unwrap();
    let height = f
        .bridge
        .register_property("Height", &double(), &f.control, None)
        .unwrap();

    f.reload();
    let button = f.bridge.create(&f.button).unwrap();

    assert!(!width.is_disposed());
    assert!(!height.is_disposed());
    assert_eq!(button.get_value(&width).unwrap(), Value::F64(25.0));
    button.set_value(&height, 4.0).unwrap();
    assert_eq!(button.get_value(&height).unwrap(), Value::F64(4.0));
}

#[test]
fn test_dead_wrappers_are_not_resurrected() {
    let f = setup();
    let height = f
        .bridge
        .register_property("Height", &double(), &f.control, None)
        .unwrap();
    drop(height);

    f.reload();
    let report = f.bridge.resurrect_type(&f.control).unwrap();
    assert!(report.resurrected.is_empty());
    assert!(f.bridge.property_resurrection().records(&f.control).is_empty());

    let fresh = f
        .bridge
        .register_property("Height", &double(), &f.control, None)
        .unwrap();
    assert!(!fresh.is_disposed());
    assert_eq!(f.bridge.property_resurrection().records(&f.control).len(), 1);
}

#[test]
fn test_repeated_reloads() {
    let f = setup();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();

    for generation in 1..=3 {
        f.reload();
        let object = f.bridge.create(&f.control).unwrap();
        object.set_value(&width, f64::from(generation)).unwrap();
        assert_eq!(
            object.get_value(&width).unwrap(),
            Value::F64(f64::from(generation))
        );
    }
    assert_eq!(f.bridge.native_generation(), 3);
}

#[test]
fn test_overrides_are_reapplied() {
    let f = setup();
    let width = f
        .bridge
        .register_property(
            "Width",
            &double(),
            &f.control,
            Some(PropertyMetadata::with_default(10.0)),
        )
        .unwrap();
    f.control.set_static("WidthProperty", width.clone());
    f.bridge
        .override_metadata(&width, &f.button, PropertyMetadata::with_default(80.0))
        .unwrap();

    f.reload();
    let button = f.bridge.create(&f.button).unwrap();
    let control = f.bridge.create(&f.control).unwrap();

    assert_eq!(button.get_value(&width).unwrap(), Value::F64(80.0));
    assert_eq!(control.get_value(&width).unwrap(), Value::F64(10.0));
    assert_eq!(f.engine.stats().override_metadata_calls, 2);
    f.control.clear_statics();
}

#[test]
fn test_missing_override_target_is_reported() {
    let f = setup();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    f.bridge
        .override_metadata(&width, &f.button, PropertyMetadata::with_default(80.0))
        .unwrap();

    f.reload();
    let report = f.bridge.resurrect_type(&f.button).unwrap();
    assert!(report.resurrected.is_empty());
    assert!(matches!(
        &report.skipped[..],
        [BridgeError::MissingResurrectionTarget { member, .. }] if member == "WidthProperty"
    ));

    let button = f.bridge.create(&f.button).unwrap();
    assert_eq!(button.get_value(&width).unwrap(), Value::F64(0.0));
}

#[test]
fn test_resurrection_can_be_disabled() {
    let f = setup_with(BridgeOptions::without_resurrection());
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();

    f.reload();
    let object = f.bridge.create(&f.control).unwrap();
    assert!(width.is_disposed());
    assert!(matches!(
        object.get_value(&width),
        Err(BridgeError::PropertyDisposed(_))
    ));

    let fresh = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    assert!(!Arc::ptr_eq(&fresh, &width));
    assert_eq!(object.get_value(&fresh).unwrap(), Value::F64(0.0));
}

// ============================================================================
// Class Reload
// ============================================================================

#[test]
fn test_reloaded_class_keeps_wrapper() {
    let f = setup();
    let first = panel();
    let width = f
        .bridge
        .register_property("Width", &double(), &first, None)
        .unwrap();
    let handle = width.native_handle();
    drop(first);
    assert!(width.owner_type().is_none());

    let reloaded = panel();
    let again = f
        .bridge
        .register_property("Width", &double(), &reloaded, None)
        .unwrap();

    assert!(Arc::ptr_eq(&width, &again));
    assert!(!width.is_disposed());
    assert_eq!(width.native_handle(), handle);
    assert_eq!(width.owner_type(), Some(reloaded.clone()));
    assert!(f
        .bridge
        .find_property(&reloaded, "Width")
        .is_some_and(|found| Arc::ptr_eq(&found, &width)));

    let object = f.bridge.create(&reloaded).unwrap();
    object.set_value(&width, 12.0).unwrap();
    assert_eq!(object.get_value(&width).unwrap(), Value::F64(12.0));
}

#[test]
fn test_registering_reloaded_class_replays_properties() {
    let f = setup();
    let first = panel();
    let width = f
        .bridge
        .register_property(
            "Width",
            &double(),
            &first,
            Some(PropertyMetadata::with_default(30.0)),
        )
        .unwrap();

    // The previous generation is still referenced while the new one loads.
    let reloaded = panel();
    let object = f.bridge.create(&reloaded).unwrap();

    assert!(width.is_owned_by(&reloaded));
    assert!(!width.is_owned_by(&first));
    assert_eq!(object.get_value(&width).unwrap(), Value::F64(30.0));
    assert_eq!(
        f.bridge.property_resurrection().records(&reloaded).len(),
        1
    );
}

#[test]
fn test_class_reload_after_engine_reload() {
    let f = setup();
    let first = panel();
    let width = f
        .bridge
        .register_property(
            "Width",
            &double(),
            &first,
            Some(PropertyMetadata::with_default(7.0)),
        )
        .unwrap();
    drop(first);

    f.reload();
    assert!(width.is_disposed());
    let reloaded = panel();
    let report = f.bridge.resurrect_type(&reloaded).unwrap();

    assert_eq!(report.resurrected, vec!["Width".to_string()]);
    assert!(!width.is_disposed());
    assert!(width.is_owned_by(&reloaded));
    let object = f.bridge.create(&reloaded).unwrap();
    assert_eq!(object.get_value(&width).unwrap(), Value::F64(7.0));
}

#[test]
fn test_unloaded_type_is_not_found_by_new_generation() {
    let f = setup();
    let first = panel();
    let size = f
        .bridge
        .register_property("Size", &double(), &first, None)
        .unwrap();
    drop(first);
    drop(size);

    let reloaded = panel();
    assert!(f.bridge.find_property(&reloaded, "Size").is_none());
    let report = f.bridge.resurrect_type(&reloaded).unwrap();
    assert!(report.resurrected.is_empty());
    assert!(f.bridge.prune_unloaded_types() > 0);
    assert!(f.bridge.property_resurrection().records(&reloaded).is_empty());
}

#[test]
fn test_overrides_follow_reloaded_class() {
    let f = setup();
    let width = f
        .bridge
        .register_property(
            "Width",
            &double(),
            &f.control,
            Some(PropertyMetadata::with_default(10.0)),
        )
        .unwrap();
    f.control.set_static("WidthProperty", width.clone());
    let toggle = TypeRef::class("App.Toggle").base(&f.control).build();
    f.bridge
        .override_metadata(&width, &toggle, PropertyMetadata::with_default(80.0))
        .unwrap();
    drop(toggle);

    let reloaded = TypeRef::class("App.Toggle").base(&f.control).build();
    let object = f.bridge.create(&reloaded).unwrap();

    assert_eq!(object.get_value(&width).unwrap(), Value::F64(80.0));
    assert_eq!(
        width.metadata_for(&reloaded).default_value(),
        Some(&Value::F64(80.0))
    );
    assert_eq!(f.engine.stats().override_metadata_calls, 2);
    f.control.clear_statics();
}

// ============================================================================
// Recorded Metadata
// ============================================================================

#[test]
fn test_frozen_object_default_survives_reload() {
    let f = setup();
    let brush_type = TypeRef::class("App.Brush")
        .base(&TypeRef::freezable())
        .build();
    let brush = f.bridge.create(&brush_type).unwrap();
    let background = f
        .bridge
        .register_property(
            "Background",
            &brush_type,
            &f.control,
            Some(PropertyMetadata::with_default(brush.clone())),
        )
        .unwrap();

    f.reload();
    assert!(brush.is_disposed());
    let report = f.bridge.resurrect_type(&f.control).unwrap();

    assert_eq!(report.resurrected, vec!["Background".to_string()]);
    assert!(report.is_clean());
    assert!(!background.is_disposed());
    let control = f.bridge.create(&f.control).unwrap();
    assert_eq!(control.get_value(&background).unwrap(), Value::Null);

    let replacement = f.bridge.create(&brush_type).unwrap();
    control.set_value(&background, replacement.clone()).unwrap();
    assert_eq!(
        control.get_value(&background).unwrap().as_object(),
        Some(&replacement)
    );
}

#[test]
fn test_coerce_callback_survives_reload() {
    let f = setup();
    let width = f
        .bridge
        .register_property(
            "Width",
            &double(),
            &f.control,
            Some(PropertyMetadata::new().coerce_with(|_: &ProxyObject, value: Value| {
                match value {
                    Value::F64(w) if w > 100.0 => Value::F64(100.0),
                    other => other,
                }
            })),
        )
        .unwrap();

    f.reload();
    let object = f.bridge.create(&f.control).unwrap();
    object.set_value(&width, 500.0).unwrap();
    assert_eq!(object.get_value(&width).unwrap(), Value::F64(100.0));
}

#[test]
fn test_changed_callback_survives_reloads() {
    let f = setup();
    let seen: Arc<Mutex<Vec<(Value, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let first = panel();
    let width = f
        .bridge
        .register_property(
            "Width",
            &double(),
            &first,
            Some(PropertyMetadata::new().on_changed(
                move |_: &ProxyObject, change: &PropertyChange| {
                    sink.lock()
                        .push((change.old_value.clone(), change.new_value.clone()));
                },
            )),
        )
        .unwrap();
    drop(first);

    f.reload();
    let reloaded = panel();
    let object = f.bridge.create(&reloaded).unwrap();
    object.set_value(&width, 3.0).unwrap();
    f.engine
        .set_value_from_native(object.handle(), width.native_handle(), NativeValue::F64(4.0))
        .unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            (Value::F64(0.0), Value::F64(3.0)),
            (Value::F64(3.0), Value::F64(4.0)),
        ]
    );
}

#[test]
fn test_resurrect_type_reports_replayed_names() {
    let f = setup();
    let _width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();

    f.reload();
    let report = f.bridge.resurrect_type(&f.control).unwrap();
    assert_eq!(report.resurrected, vec!["Width".to_string()]);
    assert!(report.is_clean());
}
