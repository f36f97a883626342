//! # Acquisition Pipeline
//!
//! Drives a [`SourceAdapter`] page by page under a circuit breaker and
//! adaptive pacing, checkpoints progress through a [`DurableStore`], and
//! returns everything it collected even when the run ends early.
//!
//! ## Page loop
//!
//! ```text
//!   cancelled? ──yes──▶ Cancelled
//!       │
//!   page > max? ──yes──▶ MaxPagesReached
//!       │
//!   gate.execute(fetch_page)
//!       ├─ Ok(full page)   ─▶ append, checkpoint every K, pace, next page
//!       ├─ Ok(short/last)  ─▶ append, EndOfData
//!       ├─ CircuitOpen     ─▶ fixed cooldown, same page, budget untouched
//!       └─ other error     ─▶ backoff, same page, until the budget runs out
//! ```
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`AcquisitionPipeline`] | The page loop |
//! | [`AcquisitionPipelineBuilder`] | Wiring of adapter, store and resilience settings |
//! | [`FetchSession`] | Records, stats and completion of one run |
//! | [`RetryPolicy`] | Per-page retry budget and backoff |
//! | [`SignalsSnapshot`] | Breaker and pacing state for observers |
//!
//! ## Example
//!
//! ```rust,no_run
//! use resilient_harvest::pipeline::AcquisitionPipeline;
//! use resilient_harvest::source::HttpPageSource;
//! use resilient_harvest::store::DurableStore;
//! use resilient_harvest::transport::{ChallengeClient, ClientConfig};
//! use std::sync::Arc;
//!
//! # async fn demo() -> resilient_harvest::Result<()> {
//! let client = Arc::new(ChallengeClient::new(ClientConfig::default())?);
//! let source = HttpPageSource::new(
//!     client,
//!     "https://leetcode.com/contest/api/ranking/{source}/?pagination={page}&region=global",
//! )?;
//! let pipeline = AcquisitionPipeline::builder()
//!     .source(Arc::new(source))
//!     .store(Arc::new(DurableStore::open("./output")?))
//!     .build()?;
//!
//! let session = pipeline.run("weekly-contest-460", 25, 1000).await?;
//! println!("{} records, complete: {}", session.records.len(), session.is_complete());
//! # Ok(())
//! # }
//! ```

pub mod retry;
pub mod session;


pub use retry::{Decision, RetryPolicy};
pub use session::FetchSession;

use crate::resilience::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot,
};
use crate::resilience::pacing::{PacingConfig, PacingController, PacingSnapshot};
use crate::source::SourceAdapter;
use crate::store::{Completion, DurableStore, HarvestDocument};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_CHECKPOINT_INTERVAL: u32 = 10;

/// Point-in-time view of the pipeline's resilience state.
///
/// Facts only; callers decide what to do with them.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalsSnapshot {
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub pacing: PacingSnapshot,
}

/// Name of the page-tagged checkpoint for `prefix`.
pub fn checkpoint_name(prefix: &str, page: u32) -> String {
    format!("{}-progress-page-{}.json", prefix, page)
}

/// Stable name of the final document for `prefix`.
pub fn final_name(prefix: &str) -> String {
    format!("{}-all-records.json", prefix)
}

pub struct AcquisitionPipelineBuilder {
    source: Option<Arc<dyn SourceAdapter>>,
    store: Option<Arc<DurableStore>>,
    pacing: PacingConfig,
    breaker: CircuitBreakerConfig,
    retry: RetryPolicy,
    checkpoint_interval: u32,
    file_prefix: Option<String>,
    cancel: Option<CancellationToken>,
}

impl AcquisitionPipelineBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            store: None,
            pacing: PacingConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            file_prefix: None,
            cancel: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn SourceAdapter>) -> Self {
        self.source = Some(source);
        self
    }

    /// Without a store the run keeps its results in memory only.
    pub fn store(mut self, store: Arc<DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn pacing(mut self, cfg: PacingConfig) -> Self {
        self.pacing = cfg;
        self
    }

    pub fn circuit_breaker(mut self, cfg: CircuitBreakerConfig) -> Self {
        self.breaker = cfg;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Persist a checkpoint every `pages` pages (minimum 1).
    pub fn checkpoint_every(mut self, pages: u32) -> Self {
        self.checkpoint_interval = pages.max(1);
        self
    }

    /// File name prefix for checkpoints and the final document.
    /// Defaults to the source id of each run.
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = Some(prefix.into());
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<AcquisitionPipeline> {
        let source = self.source.ok_or_else(|| {
            Error::configuration_with_context(
                "acquisition pipeline needs a source adapter",
                ErrorContext::new()
                    .with_field_path("source")
                    .with_source("pipeline_builder"),
            )
        })?;
        Ok(AcquisitionPipeline {
            source,
            store: self.store,
            gate: CircuitBreaker::new(self.breaker),
            pacing: PacingController::new(self.pacing),
            retry: self.retry,
            checkpoint_interval: self.checkpoint_interval,
            file_prefix: self.file_prefix,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

impl Default for AcquisitionPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AcquisitionPipeline {
    source: Arc<dyn SourceAdapter>,
    store: Option<Arc<DurableStore>>,
    gate: CircuitBreaker,
    pacing: PacingController,
    retry: RetryPolicy,
    checkpoint_interval: u32,
    file_prefix: Option<String>,
    cancel: CancellationToken,
}

impl AcquisitionPipeline {
    pub fn builder() -> AcquisitionPipelineBuilder {
        AcquisitionPipelineBuilder::new()
    }

    pub fn signals(&self) -> SignalsSnapshot {
        SignalsSnapshot {
            circuit_breaker: self.gate.snapshot(),
            pacing: self.pacing.snapshot(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn prefix_for<'a>(&'a self, source_id: &'a str) -> &'a str {
        self.file_prefix.as_deref().unwrap_or(source_id)
    }

    /// Harvest `source_id` from page 1.
    ///
    /// Only invalid arguments are reported as errors; every other ending is
    /// recorded in the returned session's completion.
    pub async fn run(&self, source_id: &str, page_size: u32, max_pages: u32) -> Result<FetchSession> {
        validate_bounds(page_size, max_pages)?;
        let session = FetchSession::new(source_id, page_size);
        Ok(self.drive(session, max_pages).await)
    }

    /// Continue an earlier, incomplete harvest.
    pub async fn resume(&self, previous: HarvestDocument, max_pages: u32) -> Result<FetchSession> {
        validate_bounds(previous.page_size, max_pages)?;
        let session = FetchSession::from_document(previous);
        if session.is_complete() {
            info!(source_id = %session.source_id, "stored harvest already complete");
            return Ok(session);
        }
        info!(
            source_id = %session.source_id,
            page = session.current_page,
            kept_records = session.records.len(),
            "resuming harvest"
        );
        Ok(self.drive(session, max_pages).await)
    }

    async fn drive(&self, mut session: FetchSession, max_pages: u32) -> FetchSession {
        session.stats.started_at.get_or_insert_with(chrono::Utc::now);
        let source_id = session.source_id.clone();
        let page_size = session.page_size as usize;
        let mut attempt: u32 = 0;

        info!(
            source_id = %source_id,
            run_id = %session.run_id,
            adapter = self.source.name(),
            start_page = session.current_page,
            max_pages,
            "harvest started"
        );

        let completion = loop {
            if self.cancel.is_cancelled() {
                break Completion::Cancelled;
            }
            let page = session.current_page;
            if page > max_pages {
                break Completion::MaxPagesReached;
            }

            let started = Instant::now();
            let outcome = self
                .gate
                .execute(|| self.source.fetch_page(&source_id, page))
                .await;

            match outcome {
                Ok(fetch) => {
                    session.stats.requests += 1;
                    self.pacing
                        .record_success(Some(fetch.response_time.unwrap_or_else(|| started.elapsed())));
                    attempt = 0;

                    let count = fetch.records.len();
                    let last = fetch.is_last_page || count < page_size;
                    session.records.extend(fetch.records);
                    session.current_page += 1;
                    if count > 0 {
                        session.stats.pages += 1;
                    }
                    debug!(
                        source_id = %source_id,
                        page,
                        records = count,
                        total = session.records.len(),
                        "page fetched"
                    );

                    if count > 0 && page % self.checkpoint_interval == 0 {
                        self.checkpoint(&mut session, page);
                    }
                    if last {
                        break Completion::EndOfData;
                    }
                    if session.current_page <= max_pages {
                        let delay = self.pacing.compute_delay();
                        self.pause(delay).await;
                    }
                }
                Err(e) => {
                    if !e.is_circuit_open() {
                        session.stats.requests += 1;
                        session.stats.errors += 1;
                        self.pacing.record_failure();
                        attempt += 1;
                    }
                    match self.retry.decide(&e, attempt) {
                        Decision::Cooldown { delay } => {
                            session.stats.circuit_trips += 1;
                            warn!(
                                source_id = %source_id,
                                page,
                                delay_ms = delay.as_millis() as u64,
                                "request gate open, cooling down"
                            );
                            self.pause(delay).await;
                        }
                        Decision::Retry { delay } => {
                            warn!(
                                source_id = %source_id,
                                page,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "page failed, retrying"
                            );
                            self.pause(delay).await;
                        }
                        Decision::Abort => {
                            warn!(
                                source_id = %source_id,
                                page,
                                attempts = attempt,
                                error = %e,
                                "retry budget exhausted, stopping with partial data"
                            );
                            break Completion::RetryBudgetExhausted {
                                page,
                                attempts: attempt,
                                last_error: e.to_string(),
                            };
                        }
                    }
                }
            }
        };

        session.finish(completion);
        self.persist_final(&mut session);
        info!(
            source_id = %source_id,
            records = session.records.len(),
            pages = session.stats.pages,
            requests = session.stats.requests,
            errors = session.stats.errors,
            circuit_trips = session.stats.circuit_trips,
            duration_ms = session.stats.duration_ms,
            completion = ?session.completion,
            "harvest finished"
        );
        session
    }

    /// Sleep unless cancelled first.
    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    fn checkpoint(&self, session: &mut FetchSession, page: u32) {
        let Some(store) = &self.store else {
            return;
        };
        let name = checkpoint_name(self.prefix_for(&session.source_id), page);
        if store.write(&name, &session.to_document()) {
            info!(source_id = %session.source_id, page, file = %name, "checkpoint saved");
        } else {
            session.stats.persistence_failures += 1;
            warn!(source_id = %session.source_id, page, file = %name, "checkpoint not saved, continuing");
        }
    }

    fn persist_final(&self, session: &mut FetchSession) {
        let Some(store) = &self.store else {
            return;
        };
        let name = final_name(self.prefix_for(&session.source_id));
        if !store.write(&name, &session.to_document()) {
            session.stats.persistence_failures += 1;
            warn!(source_id = %session.source_id, file = %name, "final document not saved");
        }
    }
}

fn validate_bounds(page_size: u32, max_pages: u32) -> Result<()> {
    if page_size == 0 {
        return Err(Error::configuration_with_context(
            "page size must be positive",
            ErrorContext::new().with_field_path("page_size"),
        ));
    }
    if max_pages == 0 {
        return Err(Error::configuration_with_context(
            "max pages must be positive",
            ErrorContext::new().with_field_path("max_pages"),
        ));
    }
    Ok(())
}
