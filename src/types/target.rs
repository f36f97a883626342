use serde::{Deserialize, Serialize};

/// A caller-supplied identity to look for in the harvested records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIdentity {
    /// Account identifier as the caller knows it.
    #[serde(alias = "leetcode_id", alias = "username")]
    pub id: String,
    /// Human-facing label used in reports.
    #[serde(default, alias = "display_name", alias = "name")]
    pub label: String,
}

impl TargetIdentity {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}
