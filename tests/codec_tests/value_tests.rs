//! Tests for the serialization codec
//!
//! These tests verify:
//! - Encoding and decoding of every value shape
//! - Float bit patterns (NaN, infinities, signed zero) survive storage
//! - Unregistered objects are rejected at encode time, however deeply nested
//! - Garbled payloads and tag/shape disagreements are `CorruptRecord`
//! - Typed reads report `TypeMismatch` for the wrong shape

use std::collections::{BTreeMap, HashMap};

use stashkv::codec::{
    self, take_attr, FromValue, PersistObject, ToValue, TypeRegistry, TypeTag, Value,
};
use stashkv::StashError;

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

impl PersistObject for Point {
    const TYPE_NAME: &'static str = "codec_tests.Point";

    fn to_attributes(&self) -> stashkv::Result<BTreeMap<String, Value>> {
        let mut attrs = BTreeMap::new();
        attrs.insert("x".to_string(), self.x.to_value()?);
        attrs.insert("y".to_string(), self.y.to_value()?);
        Ok(attrs)
    }

    fn from_attributes(mut attrs: BTreeMap<String, Value>) -> stashkv::Result<Self> {
        Ok(Self {
            x: take_attr(&mut attrs, "x")?,
            y: take_attr(&mut attrs, "y")?,
        })
    }
}

stashkv::persist_object!(Point);

fn store_and_load(value: &Value) -> Value {
    let registry = TypeRegistry::new();
    let (tag, bytes) = codec::encode(value, &registry).unwrap();
    codec::decode(tag.as_byte(), &bytes).unwrap()
}

// =============================================================================
// Shape Tests
// =============================================================================

#[test]
fn test_nested_containers() {
    let mut inner = BTreeMap::new();
    inner.insert("list".to_string(), Value::List(vec![Value::Null, Value::Bool(true)]));
    inner.insert("bytes".to_string(), Value::Bytes(vec![0, 255, 7]));
    inner.insert("empty".to_string(), Value::Map(BTreeMap::new()));

    let value = Value::List(vec![
        Value::Int(i64::MIN),
        Value::Str("héllo wörld ✓".into()),
        Value::Map(inner),
    ]);

    assert_eq!(store_and_load(&value), value);
}

#[test]
fn test_tags_follow_top_level_shape() {
    let registry = TypeRegistry::new();
    let cases = [
        (Value::Null, TypeTag::Null),
        (Value::Int(1), TypeTag::Int),
        (Value::Str(String::new()), TypeTag::Str),
        (Value::List(vec![Value::Int(1)]), TypeTag::List),
        (Value::Map(BTreeMap::new()), TypeTag::Map),
    ];

    for (value, expected) in cases {
        let (tag, _) = codec::encode(&value, &registry).unwrap();
        assert_eq!(tag, expected);
    }
}

#[test]
fn test_float_bits_preserved() {
    for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.0, 4.125, f64::MIN_POSITIVE] {
        let back = store_and_load(&Value::Float(x)).as_float().unwrap();
        assert_eq!(back.to_bits(), x.to_bits());
    }
}

#[test]
fn test_hashmap_and_option_conversions() {
    let mut scores = HashMap::new();
    scores.insert("alice".to_string(), Some(3i32));
    scores.insert("bob".to_string(), None);

    let value = scores.to_value().unwrap();
    let back: HashMap<String, Option<i32>> = FromValue::from_value(store_and_load(&value)).unwrap();
    assert_eq!(back, scores);
}

// =============================================================================
// Object Tests
// =============================================================================

#[test]
fn test_registered_object() {
    let mut registry = TypeRegistry::new();
    registry.register::<Point>();

    let point = Point { x: 3, y: -4 };
    let (tag, bytes) = codec::encode(&point.to_value().unwrap(), &registry).unwrap();
    assert_eq!(tag, TypeTag::Object);

    let value = codec::decode(tag.as_byte(), &bytes).unwrap();
    let rebuilt = registry.instantiate(value).unwrap();
    assert_eq!(*rebuilt.downcast::<Point>().unwrap(), point);
}

#[test]
fn test_nested_unregistered_object_rejected() {
    let registry = TypeRegistry::new();
    let value = vec![Point { x: 1, y: 2 }].to_value().unwrap();

    assert!(matches!(
        codec::encode(&value, &registry),
        Err(StashError::UnsupportedType(_))
    ));
}

#[test]
fn test_object_of_other_type_is_mismatch() {
    let other = Value::object("codec_tests.Other", BTreeMap::new());
    assert!(matches!(
        Point::from_value(other),
        Err(StashError::TypeMismatch { .. })
    ));
}

#[test]
fn test_missing_attribute_is_corrupt() {
    let mut attrs = BTreeMap::new();
    attrs.insert("x".to_string(), Value::Int(1));
    let value = Value::object(Point::TYPE_NAME, attrs);

    assert!(matches!(
        Point::from_value(value),
        Err(StashError::CorruptRecord(_))
    ));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_truncated_payload_is_corrupt() {
    let registry = TypeRegistry::new();
    let (tag, bytes) = codec::encode(&Value::Str("a fairly long string".into()), &registry).unwrap();

    let result = codec::decode(tag.as_byte(), &bytes[..bytes.len() - 3]);
    assert!(matches!(result, Err(StashError::CorruptRecord(_))));
}

#[test]
fn test_trailing_bytes_are_corrupt() {
    let registry = TypeRegistry::new();
    let (tag, mut bytes) = codec::encode(&Value::Int(7), &registry).unwrap();
    bytes.push(0);

    assert!(matches!(
        codec::decode(tag.as_byte(), &bytes),
        Err(StashError::CorruptRecord(_))
    ));
}

#[test]
fn test_tag_shape_disagreement_is_corrupt() {
    let registry = TypeRegistry::new();
    let (_, bytes) = codec::encode(&Value::Int(7), &registry).unwrap();

    assert!(matches!(
        codec::decode(TypeTag::Str.as_byte(), &bytes),
        Err(StashError::CorruptRecord(_))
    ));
}

#[test]
fn test_unknown_tag_is_corrupt() {
    assert!(matches!(
        codec::decode(0xee, &[]),
        Err(StashError::CorruptRecord(_))
    ));
}

// =============================================================================
// Typed Read Tests
// =============================================================================

#[test]
fn test_typed_read_wrong_shape() {
    assert!(matches!(
        String::from_value(Value::Int(1)),
        Err(StashError::TypeMismatch { expected: "string", found: "int" })
    ));
    assert!(matches!(
        <(i64, i64)>::from_value(Value::List(vec![Value::Int(1)])),
        Err(StashError::TypeMismatch { .. })
    ));
}
