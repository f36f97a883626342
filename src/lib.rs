//! # resilient-harvest
//!
//! Checkpointed, rate-aware harvesting of paginated remote datasets, plus
//! fuzzy resolution of known identities against the harvested records.
//!
//! ## Overview
//!
//! A harvest walks a remote source page by page. Each request goes through a
//! sliding-window circuit breaker and is spaced by an adaptive pacing
//! controller; progress is checkpointed atomically so that a run interrupted
//! at any point loses at most the pages since the last checkpoint. Once the
//! records are in hand, an [`matching::IdentityMatcher`] resolves
//! caller-supplied identities against them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resilient_harvest::{HarvestConfig, matching::IdentityMatcher};
//! use resilient_harvest::transport::ChallengeClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> resilient_harvest::Result<()> {
//!     let config = HarvestConfig::from_path("harvest.yaml").await?.with_env_overrides()?;
//!     config.validate()?;
//!
//!     let client = Arc::new(ChallengeClient::new(config.client_config())?);
//!     let pipeline = config
//!         .pipeline_builder()
//!         .source(Arc::new(config.build_source(client)?))
//!         .store(Arc::new(config.open_store()?))
//!         .build()?;
//!
//!     let session = pipeline
//!         .run(&config.source.id, config.page_size, config.max_pages)
//!         .await?;
//!     let matcher = IdentityMatcher::new(&session.records);
//!     println!("indexed {} identifier variations", matcher.index_len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | YAML configuration with environment overrides |
//! | [`transport`] | HTTP client with rotated browser fingerprints |
//! | [`source`] | Source adapters and response extraction strategies |
//! | [`resilience`] | Circuit breaker and adaptive pacing |
//! | [`pipeline`] | The page loop, retry policy and run sessions |
//! | [`store`] | Atomic, backed-up JSON persistence |
//! | [`matching`] | Identifier normalization and identity resolution |
//! | [`types`] | Records and target identities |

pub mod config;
pub mod matching;
pub mod pipeline;
pub mod resilience;
pub mod source;
pub mod store;
pub mod transport;
pub mod types;
pub mod utils;

pub use config::HarvestConfig;
pub use pipeline::{AcquisitionPipeline, FetchSession};
pub use store::{Completion, DurableStore};
pub use types::{Record, TargetIdentity};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
