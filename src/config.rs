//! Harvest configuration.
//!
//! A YAML document with one section per component. Every field has a default,
//! so an empty document (plus a source URL template) is a valid config.
//!
//! ```yaml
//! source:
//!   id: weekly-contest-460
//!   url_template: "https://leetcode.com/contest/api/ranking/{source}/?pagination={page}&region=global"
//!   referer_template: "https://leetcode.com/contest/{source}/ranking/"
//! page_size: 25
//! max_pages: 1000
//! output_dir: ./output
//! breaker:
//!   failure_threshold: 3
//!   timeout_secs: 120
//!   monitor_window_secs: 600
//! ```

use crate::pipeline::{AcquisitionPipeline, AcquisitionPipelineBuilder, RetryPolicy};
use crate::resilience::circuit_breaker::CircuitBreakerConfig;
use crate::resilience::pacing::PacingConfig;
use crate::source::{ExtractorChain, HttpPageSource};
use crate::store::DurableStore;
use crate::transport::{ChallengeClient, ClientConfig};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    pub id: String,
    pub url_template: String,
    pub referer_template: Option<String>,
    /// JSON paths tried in order; empty means the built-in chain.
    pub extraction_paths: Vec<String>,
    /// Fetched once before the run when set.
    pub probe_url: Option<String>,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            id: String::new(),
            url_template: String::new(),
            referer_template: None,
            extraction_paths: Vec::new(),
            probe_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSection {
    pub base_delay_ms: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for PacingSection {
    fn default() -> Self {
        let d = PacingConfig::default();
        Self {
            base_delay_ms: d.base_delay.as_millis() as u64,
            min_delay_ms: d.min_delay.as_millis() as u64,
            max_delay_ms: d.max_delay.as_millis() as u64,
            jitter_factor: d.jitter_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    pub failure_threshold: u32,
    pub timeout_secs: u64,
    pub monitor_window_secs: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        let d = CircuitBreakerConfig::default();
        Self {
            failure_threshold: d.failure_threshold,
            timeout_secs: d.timeout.as_secs(),
            monitor_window_secs: d.monitor_window.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub ceiling_ms: u64,
    pub circuit_cooldown_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let d = RetryPolicy::default();
        Self {
            max_retries: d.max_retries,
            base_delay_ms: d.base_delay.as_millis() as u64,
            ceiling_ms: d.ceiling.as_millis() as u64,
            circuit_cooldown_ms: d.circuit_cooldown.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub proxy_url: Option<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        let d = ClientConfig::default();
        Self {
            timeout_secs: d.timeout.as_secs(),
            max_redirects: d.max_redirects,
            proxy_url: d.proxy_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub source: SourceSection,
    pub page_size: u32,
    pub max_pages: u32,
    pub output_dir: PathBuf,
    /// Checkpoint/final file prefix; the source id when unset.
    pub file_prefix: Option<String>,
    pub checkpoint_interval: u32,
    pub pacing: PacingSection,
    pub breaker: BreakerSection,
    pub retry: RetrySection,
    pub http: HttpSection,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            source: SourceSection::default(),
            page_size: 25,
            max_pages: 1000,
            output_dir: PathBuf::from("output"),
            file_prefix: None,
            checkpoint_interval: crate::pipeline::DEFAULT_CHECKPOINT_INTERVAL,
            pacing: PacingSection::default(),
            breaker: BreakerSection::default(),
            retry: RetrySection::default(),
            http: HttpSection::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                format!("cannot parse {}", key),
                ErrorContext::new()
                    .with_field_path(key)
                    .with_details(raw)
                    .with_source("env"),
            )
        }),
    }
}

impl HarvestConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Self>(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid config: {}", e),
                ErrorContext::new().with_source("yaml"),
            )
        })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config: {}", e),
                ErrorContext::new().with_details(path.display().to_string()),
            )
        })?;
        debug!(path = %path.display(), "config loaded");
        Self::from_yaml_str(&content)
    }

    /// Apply `HARVEST_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_env(|k| std::env::var(k).ok())
    }

    /// Apply `HARVEST_*` overrides from an arbitrary lookup.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = parse_env(&lookup, "HARVEST_PAGE_SIZE")? {
            self.page_size = v;
        }
        if let Some(v) = parse_env(&lookup, "HARVEST_MAX_PAGES")? {
            self.max_pages = v;
        }
        if let Some(v) = parse_env(&lookup, "HARVEST_BREAKER_THRESHOLD")? {
            self.breaker.failure_threshold = v;
        }
        if let Some(v) = parse_env(&lookup, "HARVEST_BREAKER_TIMEOUT_SECS")? {
            self.breaker.timeout_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "HARVEST_HTTP_TIMEOUT_SECS")? {
            self.http.timeout_secs = v;
        }
        if let Some(v) = lookup("HARVEST_OUTPUT_DIR").filter(|s| !s.trim().is_empty()) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("HARVEST_PROXY_URL").filter(|s| !s.trim().is_empty()) {
            self.http.proxy_url = Some(v);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, msg: &str| {
            Err(Error::configuration_with_context(
                msg.to_string(),
                ErrorContext::new().with_field_path(field).with_source("validate"),
            ))
        };
        if self.source.id.trim().is_empty() {
            return invalid("source.id", "source id is required");
        }
        if !self.source.url_template.contains("{page}") {
            return invalid("source.url_template", "URL template must contain {page}");
        }
        if self.page_size == 0 {
            return invalid("page_size", "page size must be positive");
        }
        if self.max_pages == 0 {
            return invalid("max_pages", "max pages must be positive");
        }
        if self.breaker.failure_threshold == 0 {
            return invalid("breaker.failure_threshold", "failure threshold must be positive");
        }
        if self.pacing.min_delay_ms > self.pacing.max_delay_ms {
            return invalid("pacing", "min delay exceeds max delay");
        }
        Ok(())
    }

    pub fn prefix(&self) -> &str {
        self.file_prefix.as_deref().unwrap_or(&self.source.id)
    }

    pub fn pacing_config(&self) -> PacingConfig {
        PacingConfig::default()
            .with_base_delay(Duration::from_millis(self.pacing.base_delay_ms))
            .with_min_delay(Duration::from_millis(self.pacing.min_delay_ms))
            .with_max_delay(Duration::from_millis(self.pacing.max_delay_ms))
            .with_jitter_factor(self.pacing.jitter_factor)
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.breaker.failure_threshold)
            .with_timeout(Duration::from_secs(self.breaker.timeout_secs))
            .with_monitor_window(Duration::from_secs(self.breaker.monitor_window_secs))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.retry.max_retries)
            .with_base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_ceiling(Duration::from_millis(self.retry.ceiling_ms))
            .with_circuit_cooldown(Duration::from_millis(self.retry.circuit_cooldown_ms))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.http.timeout_secs.max(1)),
            max_redirects: self.http.max_redirects,
            proxy_url: self.http.proxy_url.clone(),
        }
    }

    pub fn build_source(&self, client: Arc<ChallengeClient>) -> Result<HttpPageSource> {
        let mut source = HttpPageSource::new(client, self.source.url_template.clone())?
            .with_timeout(Duration::from_secs(self.http.timeout_secs.max(1)));
        if let Some(referer) = &self.source.referer_template {
            source = source.with_referer_template(referer.clone());
        }
        if !self.source.extraction_paths.is_empty() {
            source = source.with_extractors(ExtractorChain::from_paths(
                self.source.extraction_paths.iter().cloned(),
            ));
        }
        Ok(source)
    }

    /// Pipeline builder with every resilience setting from this config applied.
    pub fn pipeline_builder(&self) -> AcquisitionPipelineBuilder {
        AcquisitionPipeline::builder()
            .pacing(self.pacing_config())
            .circuit_breaker(self.breaker_config())
            .retry_policy(self.retry_policy())
            .checkpoint_every(self.checkpoint_interval)
            .file_prefix(self.prefix().to_string())
    }

    pub fn open_store(&self) -> Result<DurableStore> {
        DurableStore::open(&self.output_dir)
    }
}
