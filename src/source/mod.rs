//! Source adapters: the pipeline's view of the remote dataset.
//!
//! The pipeline only knows `fetch_page(source_id, page)`. Everything about URL
//! shapes, response formats and status codes lives behind [`SourceAdapter`].
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SourceAdapter`] | One page per call, uniform records or an error |
//! | [`HttpPageSource`] | HTTP adapter over [`ChallengeClient`](crate::transport::ChallengeClient) |
//! | [`extract`] | Ordered extraction strategies for heterogeneous bodies |

pub mod extract;
pub mod http;

pub use extract::{
    EmbeddedScriptStrategy, ExtractStrategy, Extraction, ExtractorChain, JsonPathStrategy,
    ResponseBody,
};
pub use http::HttpPageSource;

use crate::types::Record;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One page worth of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageFetch {
    pub records: Vec<Record>,
    /// The adapter knows this is the final page regardless of its size.
    pub is_last_page: bool,
    /// Remote latency, when the adapter measured it.
    pub response_time: Option<Duration>,
}

impl PageFetch {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            is_last_page: false,
            response_time: None,
        }
    }

    pub fn last_page(mut self) -> Self {
        self.is_last_page = true;
        self
    }

    pub fn with_response_time(mut self, rt: Duration) -> Self {
        self.response_time = Some(rt);
        self
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_page(&self, source_id: &str, page: u32) -> Result<PageFetch>;

    fn name(&self) -> &str;
}
