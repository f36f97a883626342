//! On-disk document shapes for checkpoints, final results and match reports.

use crate::types::{Record, TargetIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// How a harvest run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Completion {
    /// The source reported its last page. The only clean ending.
    EndOfData,
    /// Stopped at the caller's page bound; more data may exist.
    MaxPagesReached,
    /// A page kept failing past its retry budget.
    RetryBudgetExhausted {
        page: u32,
        attempts: u32,
        last_error: String,
    },
    Cancelled,
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completion::EndOfData)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub pages: u32,
    pub requests: u32,
    pub errors: u32,
    pub circuit_trips: u32,
    pub persistence_failures: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl RunStats {
    /// Share of requests that did not error, in percent.
    pub fn success_rate(&self) -> Option<f64> {
        if self.requests == 0 {
            return None;
        }
        let ok = self.requests.saturating_sub(self.errors) as f64;
        Some(ok / self.requests as f64 * 100.0)
    }
}

/// Checkpoint and final-result file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestDocument {
    pub run_id: Uuid,
    pub source_id: String,
    pub scraped_at: DateTime<Utc>,
    pub page_size: u32,
    /// Last page whose records are included.
    pub current_page: u32,
    pub total_records: usize,
    /// `None` for in-progress checkpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
    pub stats: RunStats,
    pub records: Vec<Record>,
}

impl HarvestDocument {
    pub fn is_complete(&self) -> bool {
        self.completion
            .as_ref()
            .map(Completion::is_complete)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedEntry {
    pub target: TargetIdentity,
    pub match_type: String,
    pub confidence: f64,
    pub variation: String,
    pub record: Record,
}

/// Persisted outcome of resolving targets against a harvest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReportDocument {
    pub source_id: String,
    pub matched_at: DateTime<Utc>,
    pub total_targets: usize,
    pub found: Vec<MatchedEntry>,
    pub not_found: Vec<TargetIdentity>,
    pub match_types: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_tagging() {
        let c = Completion::RetryBudgetExhausted {
            page: 4,
            attempts: 3,
            last_error: "timeout".into(),
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["kind"], "retry_budget_exhausted");
        assert_eq!(v["page"], 4);
        assert!(!c.is_complete());
        assert!(Completion::EndOfData.is_complete());
    }

    #[test]
    fn test_document_field_names() {
        let doc = HarvestDocument {
            run_id: Uuid::nil(),
            source_id: "weekly-contest-460".into(),
            scraped_at: Utc::now(),
            page_size: 25,
            current_page: 1,
            total_records: 1,
            completion: None,
            stats: RunStats::default(),
            records: vec![Record::new().with("username", "a")],
        };
        let v = serde_json::to_value(&doc).unwrap();
        for key in ["sourceId", "scrapedAt", "totalRecords", "stats", "records", "runId"] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
        assert!(v.get("completion").is_none());
        assert!(!doc.is_complete());
    }

    #[test]
    fn test_success_rate() {
        let stats = RunStats {
            requests: 8,
            errors: 2,
            ..Default::default()
        };
        assert_eq!(stats.success_rate(), Some(75.0));
        assert_eq!(RunStats::default().success_rate(), None);
    }
}
