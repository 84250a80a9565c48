#![cfg(feature = "serde")]

//! JSON round-trip tests for the value model.

use pretty_assertions::assert_eq;
use rookscript::Value;

#[test]
fn test_scalar_round_trip() {
    for v in [
        Value::Null,
        Value::Bool(true),
        Value::Int(-42),
        Value::Float(2.5),
        Value::from("text"),
    ] {
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}

#[test]
fn test_container_round_trip() {
    let v = Value::list(vec![
        Value::Int(1),
        Value::from("two"),
        Value::list(vec![Value::Bool(false)]),
    ]);
    let json = serde_json::to_string(&v).unwrap();
    assert_eq!(json, r#"[1,"two",[false]]"#);
    let back: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back, v);

    let m = Value::new_map();
    m.map_set("b", Value::Int(2));
    m.map_set("a", Value::Int(1));
    let json = serde_json::to_string(&m).unwrap();
    // Insertion order survives serialization.
    assert_eq!(json, r#"{"b":2,"a":1}"#);
    let back: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back, m);
}

#[test]
fn test_error_value_serializes_by_content() {
    let v = Value::error("OutOfRange", "offset 9 exceeds length 4");
    let json = serde_json::to_string(&v).unwrap();
    assert_eq!(
        json,
        r#"{"kind":"OutOfRange","message":"offset 9 exceeds length 4"}"#
    );
}

#[test]
fn test_opaque_values_do_not_serialize() {
    assert!(serde_json::to_string(&Value::object(7u8)).is_err());
    assert!(serde_json::to_string(&Value::make_iterator(Value::Int(1))).is_err());
}
