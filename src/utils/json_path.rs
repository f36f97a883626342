//! Dot-notation path lookup into JSON documents
//!
//! Supports:
//! - Nested path access (e.g., "data.contestRanking.submissions")
//! - Array indexing (e.g., "pages[0].rows" or "pages.0.rows")
//! - A leading "$." JSONPath-style prefix, which is ignored

use serde_json::Value;

/// Path mapper for extracting values from JSON using dot-notation paths
pub struct PathMapper;

impl PathMapper {
    /// Get value from JSON using dot-notation path (supports array indexing)
    ///
    /// An empty path (or bare "$") addresses the document root.
    pub fn get_path<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
        let normalized = path.trim().trim_start_matches('$').trim_start_matches('.');
        if normalized.is_empty() {
            return Some(obj);
        }

        let mut current = obj;
        for part in normalized.split('.') {
            if part.is_empty() {
                return None;
            }

            // "rows[2]" style segment
            if let Some(bracket_pos) = part.find('[') {
                let key = &part[..bracket_pos];
                let idx_str = part[bracket_pos + 1..].trim_end_matches(']');

                if !key.is_empty() {
                    current = current.as_object()?.get(key)?;
                }
                let idx = idx_str.parse::<usize>().ok()?;
                current = current.as_array()?.get(idx)?;
            } else {
                current = match current {
                    Value::Object(map) => map.get(part)?,
                    Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
                    _ => return None,
                };
            }
        }

        Some(current)
    }

    /// Array at `path`, if the path resolves to one.
    pub fn get_array<'a>(obj: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
        Self::get_path(obj, path).and_then(|v| v.as_array())
    }

    /// Get string value from path (converts non-strings to their JSON text)
    pub fn get_string(obj: &Value, path: &str) -> Option<String> {
        Self::get_path(obj, path).and_then(|v| {
            if let Some(s) = v.as_str() {
                Some(s.to_string())
            } else {
                serde_json::to_string(v).ok()
            }
        })
    }
}
