use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque passthrough value carried in `meta` lists and `aux` maps.
///
/// The engine never interprets these; it only needs to round-trip whatever
/// another client published, so the variants mirror the JSON value space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<TagValue>),
    Map(BTreeMap<String, TagValue>),
}

/// Forward-compatible auxiliary fields of an identity record.
pub type AuxMap = BTreeMap<String, TagValue>;

impl TagValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_json_shape() {
        let json = r#"[null, true, 7, 1.5, "x", [1], {"k": "v"}]"#;
        let values: Vec<TagValue> = serde_json::from_str(json).unwrap();
        assert_eq!(values[0], TagValue::Null);
        assert_eq!(values[1], TagValue::Bool(true));
        assert_eq!(values[2], TagValue::Integer(7));
        assert_eq!(values[3], TagValue::Float(1.5));
        assert_eq!(values[4], TagValue::text("x"));
        assert_eq!(values[5], TagValue::List(vec![TagValue::Integer(1)]));
        let TagValue::Map(map) = &values[6] else {
            panic!("expected map");
        };
        assert_eq!(map["k"].as_text(), Some("v"));
    }

    #[test]
    fn encodes_back_to_the_same_json() {
        let json = r#"{"a":[1,"two",null],"b":{"c":false}}"#;
        let aux: AuxMap = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_string(&aux).unwrap(), json);
    }
}
