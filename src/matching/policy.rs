use crate::types::IdField;
use serde::{Deserialize, Serialize};

pub const EXACT_PRIMARY_CONFIDENCE: f64 = 0.95;
pub const EXACT_SECONDARY_CONFIDENCE: f64 = 0.90;
pub const PARTIAL_CONFIDENCE: f64 = 0.75;
/// Target variations shorter than this never take part in containment matching.
pub const PARTIAL_MIN_LENGTH: usize = 5;
/// The shorter string must cover at least this share of the longer one.
pub const PARTIAL_MIN_COVERAGE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Partial,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Partial => "partial",
        }
    }
}

/// Threshold table for identity resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPolicy {
    pub exact_primary_confidence: f64,
    pub exact_secondary_confidence: f64,
    pub partial_confidence: f64,
    pub partial_min_length: usize,
    pub partial_min_coverage: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            exact_primary_confidence: EXACT_PRIMARY_CONFIDENCE,
            exact_secondary_confidence: EXACT_SECONDARY_CONFIDENCE,
            partial_confidence: PARTIAL_CONFIDENCE,
            partial_min_length: PARTIAL_MIN_LENGTH,
            partial_min_coverage: PARTIAL_MIN_COVERAGE,
        }
    }
}

impl MatchPolicy {
    pub fn exact_confidence(&self, field: IdField) -> f64 {
        match field {
            IdField::Primary => self.exact_primary_confidence,
            IdField::Secondary => self.exact_secondary_confidence,
        }
    }

    /// Containment in either direction with enough length coverage.
    pub fn is_partial(&self, variation: &str, candidate: &str) -> bool {
        let v_len = variation.chars().count();
        if v_len < self.partial_min_length || variation == candidate {
            return false;
        }
        let c_len = candidate.chars().count();
        let (shorter, longer, s_len, l_len) = if v_len <= c_len {
            (variation, candidate, v_len, c_len)
        } else {
            (candidate, variation, c_len, v_len)
        };
        if s_len == 0 || !longer.contains(shorter) {
            return false;
        }
        s_len as f64 >= l_len as f64 * self.partial_min_coverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        let p = MatchPolicy::default();
        assert_eq!(p.exact_confidence(IdField::Primary), 0.95);
        assert_eq!(p.exact_confidence(IdField::Secondary), 0.90);
        assert_eq!(p.partial_confidence, 0.75);
        assert_eq!(p.partial_min_length, 5);
        assert_eq!(p.partial_min_coverage, 0.8);
    }

    #[test]
    fn test_partial_rules() {
        let p = MatchPolicy::default();
        // 8 of 9 chars covered, both directions
        assert!(p.is_partial("johnsmith", "johnsmith1"));
        assert!(p.is_partial("johnsmith12", "johnsmith1"));
        // coverage too low: 8 / 15
        assert!(!p.is_partial("john_doe", "john_doe_backup"));
        // variation too short to be considered
        assert!(!p.is_partial("anna", "annaa"));
        // no containment
        assert!(!p.is_partial("johnsmith", "janesmith"));
        // identical strings are exact, not partial
        assert!(!p.is_partial("johnsmith", "johnsmith"));
    }

    #[test]
    fn test_coverage_boundary() {
        let p = MatchPolicy::default();
        // 8 / 10 = 0.8 exactly
        assert!(p.is_partial("abcdefgh", "abcdefghij"));
        // 8 / 11 < 0.8
        assert!(!p.is_partial("abcdefgh", "abcdefghijk"));
    }
}
