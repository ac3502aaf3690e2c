use std::collections::HashMap;

use serde_json::json;

use super::*;
use crate::{DecodeError, Error};

#[test]
fn test_flatten_nested_map() {
    let values = flatten(&json!({"a": {"b": "c"}})).expect("should flatten");
    assert_eq!(values, HashMap::from([("/a/b".to_string(), "c".to_string())]));
}

#[test]
fn test_flatten_scalar_sequence_is_index_keyed() {
    let values = flatten(&json!({"list": [1, true, null]})).expect("should flatten");
    assert_eq!(
        values,
        HashMap::from([
            ("/list/0".to_string(), "1".to_string()),
            ("/list/1".to_string(), "true".to_string()),
            ("/list/2".to_string(), "<nil>".to_string()),
        ])
    );
}

#[test]
fn test_flatten_mixed_document() {
    let document = json!({
        "remtest": [1, true, null],
        "premtest": {
            "database": {
                "url": 100,
                "user": false
            }
        }
    });
    let values = flatten(&document).expect("should flatten");
    assert_eq!(
        values,
        HashMap::from([
            ("/remtest/0".to_string(), "1".to_string()),
            ("/remtest/1".to_string(), "true".to_string()),
            ("/remtest/2".to_string(), "<nil>".to_string()),
            ("/premtest/database/url".to_string(), "100".to_string()),
            ("/premtest/database/user".to_string(), "false".to_string()),
        ])
    );
}

#[test]
fn test_flatten_sequence_of_maps() {
    let document = json!({
        "hosts": [
            {"name": "test1", "ip": "192.168.0.1", "size": 60},
            {"name": "test2", "ip": "192.168.0.2", "size": 80}
        ]
    });
    let values = flatten(&document).expect("should flatten");
    assert_eq!(values.len(), 6);
    assert_eq!(values["/hosts/0/name"], "test1");
    assert_eq!(values["/hosts/1/ip"], "192.168.0.2");
    assert_eq!(values["/hosts/1/size"], "80");
}

#[test]
fn test_flatten_one_entry_per_leaf() {
    let document = json!({
        "a": {"b": {"c": 1, "d": 2}},
        "e": [[3, 4], {"f": 5}]
    });
    let values = flatten(&document).expect("should flatten");
    assert_eq!(values.len(), 5);
}

#[test]
fn test_flatten_sequence_root() {
    let values = flatten(&json!(["x", "y"])).expect("should flatten");
    assert_eq!(values["/0"], "x");
    assert_eq!(values["/1"], "y");
}

#[test]
fn test_flatten_rejects_scalar_root() {
    let err = flatten(&json!("just a string")).unwrap_err();
    assert!(matches!(
        err,
        Error::Decode(DecodeError::UnsupportedRoot)
    ));
}

#[test]
fn test_flatten_float_keeps_decimal_text() {
    let values = flatten(&json!({"pi": 3.5})).expect("should flatten");
    assert_eq!(values["/pi"], "3.5");
}
