use follow_types::{AuxMap, IdentityRecord, TagValue};
use serde_json::Value;

use crate::error::{SdkError, SdkResult};

/// A user edit of one field of the self identity.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldEdit {
    DisplayName(String),
    Avatar(String),
    Meta(Vec<TagValue>),
    Aux(AuxMap),
}

impl FieldEdit {
    /// Build an edit from a `(key, value)` pair as sent by a host.
    ///
    /// Keys are the wire names (`dn`, `av`, `meta`, `aux`); the long names
    /// `displayName` and `avatar` are accepted too. The value must have the
    /// field's JSON type.
    pub fn parse(key: &str, value: &Value) -> SdkResult<Self> {
        match key {
            "dn" | "displayName" => Ok(Self::DisplayName(expect_string(key, value)?)),
            "av" | "avatar" => Ok(Self::Avatar(expect_string(key, value)?)),
            "meta" => {
                if !value.is_array() {
                    return Err(SdkError::schema(key, format!("expected array, got {}", type_name(value))));
                }
                serde_json::from_value(value.clone())
                    .map(Self::Meta)
                    .map_err(|e| SdkError::schema(key, e.to_string()))
            }
            "aux" => {
                if !value.is_object() {
                    return Err(SdkError::schema(key, format!("expected object, got {}", type_name(value))));
                }
                serde_json::from_value(value.clone())
                    .map(Self::Aux)
                    .map_err(|e| SdkError::schema(key, e.to_string()))
            }
            "id" | "following" | "posts" | "ts" => {
                Err(SdkError::schema(key, "field is managed by the engine"))
            }
            _ => Err(SdkError::schema(key, "unknown field")),
        }
    }

    /// Wire name of the edited field.
    pub fn key(&self) -> &'static str {
        match self {
            Self::DisplayName(_) => "dn",
            Self::Avatar(_) => "av",
            Self::Meta(_) => "meta",
            Self::Aux(_) => "aux",
        }
    }

    pub fn apply(self, record: &mut IdentityRecord) {
        match self {
            Self::DisplayName(v) => record.display_name = v,
            Self::Avatar(v) => record.avatar = v,
            Self::Meta(v) => record.meta = v,
            Self::Aux(v) => record.aux = v,
        }
    }
}

fn expect_string(key: &str, value: &Value) -> SdkResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SdkError::schema(key, format!("expected string, got {}", type_name(value))))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
