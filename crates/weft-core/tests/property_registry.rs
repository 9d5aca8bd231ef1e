//! Integration tests for dependency property registration and typed access

use parking_lot::Mutex;
use std::sync::Arc;
use weft_core::{
    Bridge, BridgeError, PropertyChange, PropertyMetadata, Primitive, ProxyObject, TypeRef, Value,
};
use weft_sdk::{MemoryEngine, NativeValue};

struct Fixture {
    engine: Arc<MemoryEngine>,
    bridge: Bridge,
    control: TypeRef,
    button: TypeRef,
}

fn setup() -> Fixture {
    let engine = Arc::new(MemoryEngine::new());
    let bridge = Bridge::new(engine.clone());
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

fn double() -> TypeRef {
    TypeRef::primitive(Primitive::Double)
}

#[test]
fn test_register_is_idempotent() {
    let f = setup();
    let a = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    let b = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(f.engine.stats().register_property_calls, 1);
    assert!(!a.is_disposed());
    assert_eq!(a.owner_type(), Some(f.control.clone()));
    assert_eq!(
        f.bridge.find_property(&f.control, "Width").map(|p| p.native_handle()),
        Some(a.native_handle())
    );
    assert!(f.bridge.property_by_handle(a.native_handle()).is_some());
}

#[test]
fn test_same_name_on_different_owners() {
    let f = setup();
    let on_control = f
        .bridge
        .register_property("Tag", &TypeRef::string(), &f.control, None)
        .unwrap();
    let on_button = f
        .bridge
        .register_property("Tag", &TypeRef::string(), &f.button, None)
        .unwrap();
    assert!(!Arc::ptr_eq(&on_control, &on_button));
    assert_ne!(on_control.native_handle(), on_button.native_handle());
}

#[test]
fn test_rejects_bad_arguments() {
    let f = setup();
    let result = f.bridge.register_property("  ", &double(), &f.control, None);
    assert!(matches!(result, Err(BridgeError::InvalidArgument(_))));

    let result = f
        .bridge
        .register_property("Width", &double(), &TypeRef::primitive(Primitive::Int32), None);
    assert!(matches!(result, Err(BridgeError::InvalidArgument(_))));
    assert_eq!(f.engine.stats().register_property_calls, 0);
}

#[test]
fn test_rejects_mismatched_default() {
    let f = setup();
    let result = f.bridge.register_property(
        "Width",
        &double(),
        &f.control,
        Some(PropertyMetadata::with_default("wide")),
    );
    assert!(matches!(
        result,
        Err(BridgeError::InvalidDefaultValue { ref property, .. }) if property == "Width"
    ));
    assert_eq!(f.engine.stats().register_property_calls, 0);
}

#[test]
fn test_default_is_filled_per_type() {
    let f = setup();
    let text = f
        .bridge
        .register_property("Text", &TypeRef::string(), &f.control, None)
        .unwrap();
    let count = f
        .bridge
        .register_property("Count", &TypeRef::primitive(Primitive::Int64), &f.control, None)
        .unwrap();
    let content = f
        .bridge
        .register_property("Content", &TypeRef::dependency_object(), &f.control, None)
        .unwrap();

    let object = f.bridge.create(&f.control).unwrap();
    assert_eq!(object.get_value(&text).unwrap(), Value::Str(String::new()));
    assert_eq!(object.get_value(&count).unwrap(), Value::I64(0));
    assert_eq!(object.get_value(&content).unwrap(), Value::Null);
}

#[test]
fn test_object_default_must_be_freezable() {
    let f = setup();
    let plain = f.bridge.create(&f.control).unwrap();
    let result = f.bridge.register_property(
        "Template",
        &TypeRef::dependency_object(),
        &f.button,
        Some(PropertyMetadata::with_default(plain)),
    );
    assert!(matches!(
        result,
        Err(BridgeError::UnfreezableThreadAffineDefault { .. })
    ));

    let brush_type = TypeRef::class("App.Brush")
        .base(&TypeRef::freezable())
        .build();
    let brush = f.bridge.create(&brush_type).unwrap();
    let background = f
        .bridge
        .register_property(
            "Background",
            &brush_type,
            &f.button,
            Some(PropertyMetadata::with_default(brush.clone())),
        )
        .unwrap();

    let button = f.bridge.create(&f.button).unwrap();
    let value = button.get_value(&background).unwrap();
    assert_eq!(value.as_object(), Some(&brush));
}

#[test]
fn test_typed_get_set() {
    let f = setup();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    let count = f
        .bridge
        .register_property("Count", &TypeRef::primitive(Primitive::Int64), &f.control, None)
        .unwrap();
    let letter = f
        .bridge
        .register_property("Letter", &TypeRef::primitive(Primitive::Char), &f.control, None)
        .unwrap();
    let object = f.bridge.create(&f.control).unwrap();

    object.set_value(&width, 12.5).unwrap();
    assert_eq!(object.get_value(&width).unwrap(), Value::F64(12.5));

    object.set_value(&count, 42i64).unwrap();
    assert_eq!(object.get_value(&count).unwrap(), Value::I64(42));

    object.set_value(&letter, 'w').unwrap();
    assert_eq!(object.get_value(&letter).unwrap(), Value::Char('w'));
    assert_eq!(
        weft_sdk::NativeEngine::get_value(&*f.engine, object.handle(), letter.native_handle())
            .unwrap(),
        NativeValue::U32('w' as u32)
    );
}

#[test]
fn test_out_of_range_values_are_rejected() {
    let f = setup();
    let count = f
        .bridge
        .register_property("Count", &TypeRef::primitive(Primitive::Int64), &f.control, None)
        .unwrap();
    let object = f.bridge.create(&f.control).unwrap();

    let result = object.set_value(&count, i64::from(i32::MAX) + 1);
    assert!(matches!(result, Err(BridgeError::ValueOutOfRange { .. })));
    assert_eq!(f.engine.stats().set_value_calls, 0);
}

#[test]
fn test_wrong_type_is_rejected() {
    let f = setup();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    let object = f.bridge.create(&f.control).unwrap();

    let result = object.set_value(&width, "wide");
    assert!(matches!(result, Err(BridgeError::InvalidValue { .. })));
}

#[test]
fn test_enum_and_nullable_properties() {
    let f = setup();
    let alignment = TypeRef::enumeration("App.Alignment");
    let align = f
        .bridge
        .register_property("Align", &alignment, &f.control, None)
        .unwrap();
    let nullable = TypeRef::nullable(&TypeRef::primitive(Primitive::Int32)).unwrap();
    let max = f
        .bridge
        .register_property("Max", &nullable, &f.control, None)
        .unwrap();
    let object = f.bridge.create(&f.control).unwrap();

    assert_eq!(object.get_value(&align).unwrap(), Value::Enum(0));
    object.set_value(&align, Value::Enum(2)).unwrap();
    assert_eq!(object.get_value(&align).unwrap(), Value::Enum(2));

    assert_eq!(object.get_value(&max).unwrap(), Value::Null);
    object.set_value(&max, 7).unwrap();
    assert_eq!(object.get_value(&max).unwrap(), Value::I32(7));
    object.set_value(&max, Value::Null).unwrap();
    assert_eq!(object.get_value(&max).unwrap(), Value::Null);
}

#[test]
fn test_object_valued_property() {
    let f = setup();
    let content = f
        .bridge
        .register_property("Content", &f.control, &f.button, None)
        .unwrap();
    let button = f.bridge.create(&f.button).unwrap();
    let child = f.bridge.create(&f.control).unwrap();

    button.set_value(&content, child.clone()).unwrap();
    let value = button.get_value(&content).unwrap();
    assert!(Arc::ptr_eq(value.as_object().unwrap(), &child));

    let other = f.bridge.create(&f.button).unwrap();
    other.dispose();
    let result = button.set_value(&content, other);
    assert!(matches!(result, Err(BridgeError::ObjectDisposed(_))));
}

#[test]
fn test_disposed_object_access_fails() {
    let f = setup();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    let object = f.bridge.create(&f.control).unwrap();
    object.dispose();

    assert!(matches!(
        object.get_value(&width),
        Err(BridgeError::ObjectDisposed(_))
    ));
    assert!(matches!(
        object.set_value(&width, 1.0),
        Err(BridgeError::ObjectDisposed(_))
    ));
}

#[test]
fn test_override_metadata_changes_default() {
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
    f.bridge
        .override_metadata(&width, &f.button, PropertyMetadata::with_default(80.0))
        .unwrap();

    let control = f.bridge.create(&f.control).unwrap();
    let button = f.bridge.create(&f.button).unwrap();
    assert_eq!(control.get_value(&width).unwrap(), Value::F64(10.0));
    assert_eq!(button.get_value(&width).unwrap(), Value::F64(80.0));
    assert_eq!(
        width.metadata_for(&f.button).default_value(),
        Some(&Value::F64(80.0))
    );
    assert_eq!(f.engine.stats().override_metadata_calls, 1);
}

#[test]
fn test_override_validates_default() {
    let f = setup();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    let result = f
        .bridge
        .override_metadata(&width, &f.button, PropertyMetadata::with_default(true));
    assert!(matches!(result, Err(BridgeError::InvalidDefaultValue { .. })));

    let result = f.bridge.override_metadata(
        &width,
        &TypeRef::primitive(Primitive::Int32),
        PropertyMetadata::new(),
    );
    assert!(matches!(result, Err(BridgeError::InvalidArgument(_))));
    assert_eq!(f.engine.stats().override_metadata_calls, 0);
}

#[test]
fn test_coerce_callback() {
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
    let object = f.bridge.create(&f.control).unwrap();

    object.set_value(&width, 500.0).unwrap();
    assert_eq!(object.get_value(&width).unwrap(), Value::F64(100.0));
    object.set_value(&width, 50.0).unwrap();
    assert_eq!(object.get_value(&width).unwrap(), Value::F64(50.0));
}

#[test]
fn test_changed_callback() {
    let f = setup();
    let seen: Arc<Mutex<Vec<(Value, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let width = f
        .bridge
        .register_property(
            "Width",
            &double(),
            &f.control,
            Some(PropertyMetadata::new().on_changed(
                move |_: &ProxyObject, change: &PropertyChange| {
                    sink.lock()
                        .push((change.old_value.clone(), change.new_value.clone()));
                },
            )),
        )
        .unwrap();
    let object = f.bridge.create(&f.control).unwrap();

    object.set_value(&width, 3.0).unwrap();
    object.set_value(&width, 3.0).unwrap();
    f.engine
        .set_value_from_native(object.handle(), width.native_handle(), NativeValue::F64(4.0))
        .unwrap();

    let seen = seen.lock();
    assert_eq!(
        *seen,
        vec![
            (Value::F64(0.0), Value::F64(3.0)),
            (Value::F64(3.0), Value::F64(4.0)),
        ]
    );
}

#[test]
fn test_changed_callback_from_override() {
    let f = setup();
    let hits = Arc::new(Mutex::new(0));
    let counter = hits.clone();
    let width = f
        .bridge
        .register_property("Width", &double(), &f.control, None)
        .unwrap();
    f.bridge
        .override_metadata(
            &width,
            &f.button,
            PropertyMetadata::new().on_changed(move |object: &ProxyObject, _: &PropertyChange| {
                assert_eq!(object.type_ref().name(), "App.Button");
                *counter.lock() += 1;
            }),
        )
        .unwrap();

    let control = f.bridge.create(&f.control).unwrap();
    let button = f.bridge.create(&f.button).unwrap();
    control.set_value(&width, 1.0).unwrap();
    button.set_value(&width, 1.0).unwrap();
    assert_eq!(*hits.lock(), 1);
}
