use crate::store::{Completion, HarvestDocument, RunStats};
use crate::types::Record;
use crate::{Error, Result};
use chrono::Utc;
use uuid::Uuid;

/// Accumulated state of one harvest run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSession {
    pub run_id: Uuid,
    pub source_id: String,
    /// Next page to request; once the run ends, one past the last page taken.
    pub current_page: u32,
    pub page_size: u32,
    pub records: Vec<Record>,
    pub has_more: bool,
    pub stats: RunStats,
    /// `None` while the run is in progress.
    pub completion: Option<Completion>,
}

impl FetchSession {
    pub fn new(source_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source_id: source_id.into(),
            current_page: 1,
            page_size,
            records: Vec::new(),
            has_more: true,
            stats: RunStats::default(),
            completion: None,
        }
    }

    /// Rebuild a session from a stored document.
    ///
    /// An incomplete document keeps only its full pages, so the trailing
    /// partial page is fetched again. Counters and the original start time
    /// carry over; a resumed run keeps adding to them.
    pub fn from_document(doc: HarvestDocument) -> Self {
        let page_size = doc.page_size.max(1);
        let done = doc.is_complete();
        let mut records = doc.records;
        let mut stats = doc.stats;
        let current_page = if done {
            doc.current_page + 1
        } else {
            let full_pages = (records.len() / page_size as usize) as u32;
            records.truncate(full_pages as usize * page_size as usize);
            stats.pages = stats.pages.min(full_pages);
            stats.finished_at = None;
            full_pages + 1
        };
        Self {
            run_id: doc.run_id,
            source_id: doc.source_id,
            current_page,
            page_size,
            records,
            has_more: !done,
            stats,
            completion: doc.completion.filter(Completion::is_complete),
        }
    }

    /// True only when the source itself signalled the end of its data.
    pub fn is_complete(&self) -> bool {
        self.completion
            .as_ref()
            .map(Completion::is_complete)
            .unwrap_or(false)
    }

    /// Surface a budget-exhausted ending as an error, for callers that treat
    /// it as fatal. Every other ending is `Ok`.
    pub fn check_budget(&self) -> Result<()> {
        match &self.completion {
            Some(Completion::RetryBudgetExhausted { page, attempts, .. }) => {
                Err(Error::RetryBudgetExhausted {
                    page: *page,
                    attempts: *attempts,
                })
            }
            _ => Ok(()),
        }
    }

    /// Last page whose records are held.
    pub fn last_page(&self) -> u32 {
        self.current_page.saturating_sub(1)
    }

    pub(crate) fn finish(&mut self, completion: Completion) {
        if matches!(completion, Completion::EndOfData) {
            self.has_more = false;
        }
        let now = Utc::now();
        self.stats.finished_at = Some(now);
        if let Some(started) = self.stats.started_at {
            self.stats.duration_ms = (now - started).num_milliseconds().max(0) as u64;
        }
        self.completion = Some(completion);
    }

    pub fn to_document(&self) -> HarvestDocument {
        HarvestDocument {
            run_id: self.run_id,
            source_id: self.source_id.clone(),
            scraped_at: Utc::now(),
            page_size: self.page_size,
            current_page: self.last_page(),
            total_records: self.records.len(),
            completion: self.completion.clone(),
            stats: self.stats.clone(),
            records: self.records.clone(),
        }
    }
}
