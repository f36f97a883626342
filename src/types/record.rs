//! Harvested record representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier fields that name the account itself.
pub const PRIMARY_ID_FIELDS: &[&str] = &["username", "user_slug", "handle"];

/// Identifier fields that carry a human-facing name.
pub const SECONDARY_ID_FIELDS: &[&str] = &["real_name", "display_name", "name"];

/// Which identifier field family a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdField {
    Primary,
    Secondary,
}

/// One harvested row: an opaque JSON object.
///
/// Equality is structural. Only the identifier fields above are interpreted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value; anything other than an object yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Non-empty identifier values of one field family, in field order.
    pub fn identifiers(&self, field: IdField) -> impl Iterator<Item = &str> {
        let keys = match field {
            IdField::Primary => PRIMARY_ID_FIELDS,
            IdField::Secondary => SECONDARY_ID_FIELDS,
        };
        keys.iter()
            .filter_map(move |k| self.get_str(k))
            .filter(|s| !s.trim().is_empty())
    }

    /// First primary identifier, falling back to a secondary one.
    pub fn display_id(&self) -> Option<&str> {
        self.identifiers(IdField::Primary)
            .next()
            .or_else(|| self.identifiers(IdField::Secondary).next())
    }

    pub fn rank(&self) -> Option<u64> {
        self.get("rank").and_then(|v| v.as_u64())
    }

    pub fn score(&self) -> Option<f64> {
        self.get("score").and_then(|v| v.as_f64())
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
