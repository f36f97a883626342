//! # Identity Matching
//!
//! Resolves caller-supplied target identities against harvested records.
//!
//! The index is built once over every record's identifier variations; each
//! target is then resolved by exact lookup across its own variations and,
//! failing that, by a bounded containment scan.
//!
//! ```rust
//! use resilient_harvest::matching::{IdentityMatcher, MatchType};
//! use resilient_harvest::types::{Record, TargetIdentity};
//!
//! let records = vec![
//!     Record::new().with("username", "john_doe"),
//!     Record::new().with("username", "john_doe_backup"),
//! ];
//! let matcher = IdentityMatcher::new(&records);
//! let target = TargetIdentity::new("john_doe", "John");
//! let hit = matcher.resolve(&target).unwrap();
//! assert_eq!(hit.match_type, MatchType::Exact);
//! assert_eq!(hit.record.get_str("username"), Some("john_doe"));
//! ```

pub mod normalize;
pub mod policy;

pub use normalize::{normalize, variations, VariationRule};
pub use policy::{MatchPolicy, MatchType};

use crate::store::{MatchReportDocument, MatchedEntry};
use crate::types::{IdField, Record, TargetIdentity};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    record: usize,
    field: IdField,
}

/// A resolved target.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    pub target: &'a TargetIdentity,
    pub record: &'a Record,
    pub match_type: MatchType,
    pub confidence: f64,
    /// The target variation that produced the hit.
    pub variation_used: String,
}

impl MatchResult<'_> {
    pub fn to_entry(&self) -> MatchedEntry {
        MatchedEntry {
            target: self.target.clone(),
            match_type: self.match_type.as_str().to_string(),
            confidence: self.confidence,
            variation: self.variation_used.clone(),
            record: self.record.clone(),
        }
    }
}

/// Outcome of resolving a batch of targets.
#[derive(Debug, Clone, Default)]
pub struct MatchReport<'a> {
    pub found: Vec<MatchResult<'a>>,
    pub unresolved: Vec<&'a TargetIdentity>,
    pub breakdown: BTreeMap<MatchType, usize>,
}

impl MatchReport<'_> {
    pub fn total_targets(&self) -> usize {
        self.found.len() + self.unresolved.len()
    }

    pub fn to_document(&self, source_id: &str) -> MatchReportDocument {
        MatchReportDocument {
            source_id: source_id.to_string(),
            matched_at: chrono::Utc::now(),
            total_targets: self.total_targets(),
            found: self.found.iter().map(MatchResult::to_entry).collect(),
            not_found: self.unresolved.iter().map(|t| (*t).clone()).collect(),
            match_types: self
                .breakdown
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect(),
        }
    }
}

pub struct IdentityMatcher<'a> {
    records: &'a [Record],
    policy: MatchPolicy,
    exact: HashMap<String, IndexEntry>,
    /// Same entries in insertion order, for a deterministic partial scan.
    ordered: Vec<(String, IndexEntry)>,
}

impl<'a> IdentityMatcher<'a> {
    pub fn new(records: &'a [Record]) -> Self {
        Self::with_policy(records, MatchPolicy::default())
    }

    pub fn with_policy(records: &'a [Record], policy: MatchPolicy) -> Self {
        let mut exact: HashMap<String, IndexEntry> = HashMap::new();
        let mut ordered = Vec::new();
        // All primary identifiers go in before any secondary one, so a shared
        // variation always resolves to the account field. First record wins.
        for field in [IdField::Primary, IdField::Secondary] {
            for (idx, record) in records.iter().enumerate() {
                for id in record.identifiers(field) {
                    for v in variations(id) {
                        if exact.contains_key(&v) {
                            continue;
                        }
                        let entry = IndexEntry { record: idx, field };
                        exact.insert(v.clone(), entry);
                        ordered.push((v, entry));
                    }
                }
            }
        }
        debug!(records = records.len(), keys = ordered.len(), "identity index built");
        Self {
            records,
            policy,
            exact,
            ordered,
        }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Number of distinct variations indexed.
    pub fn index_len(&self) -> usize {
        self.ordered.len()
    }

    /// Target variations: the identifier's first, then the label's.
    fn target_variations(target: &TargetIdentity) -> Vec<String> {
        let mut out = variations(&target.id);
        for v in variations(&target.label) {
            if !out.contains(&v) {
                out.push(v);
            }
        }
        out
    }

    pub fn resolve(&self, target: &'a TargetIdentity) -> Option<MatchResult<'a>> {
        let candidates = Self::target_variations(target);

        // Exact: the highest-confidence hit, earliest variation on ties.
        let mut best: Option<(f64, &String, IndexEntry)> = None;
        for v in &candidates {
            if let Some(entry) = self.exact.get(v) {
                let confidence = self.policy.exact_confidence(entry.field);
                if best.map(|(c, _, _)| confidence > c).unwrap_or(true) {
                    best = Some((confidence, v, *entry));
                }
            }
        }
        if let Some((confidence, v, entry)) = best {
            return Some(MatchResult {
                target,
                record: &self.records[entry.record],
                match_type: MatchType::Exact,
                confidence,
                variation_used: v.clone(),
            });
        }

        for v in &candidates {
            if let Some((_, entry)) = self
                .ordered
                .iter()
                .find(|(key, _)| self.policy.is_partial(v, key))
            {
                return Some(MatchResult {
                    target,
                    record: &self.records[entry.record],
                    match_type: MatchType::Partial,
                    confidence: self.policy.partial_confidence,
                    variation_used: v.clone(),
                });
            }
        }
        None
    }

    pub fn resolve_all(&self, targets: &'a [TargetIdentity]) -> MatchReport<'a> {
        let mut report = MatchReport::default();
        for target in targets {
            match self.resolve(target) {
                Some(hit) => {
                    debug!(
                        target = %target.id,
                        match_type = hit.match_type.as_str(),
                        confidence = hit.confidence,
                        "target resolved"
                    );
                    *report.breakdown.entry(hit.match_type).or_insert(0) += 1;
                    report.found.push(hit);
                }
                None => {
                    debug!(target = %target.id, "target unresolved");
                    report.unresolved.push(target);
                }
            }
        }
        info!(
            targets = targets.len(),
            found = report.found.len(),
            unresolved = report.unresolved.len(),
            "identity resolution finished"
        );
        report
    }
}
