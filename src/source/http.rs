use super::extract::{ExtractorChain, ResponseBody};
use super::{PageFetch, SourceAdapter};
use crate::transport::{ChallengeClient, ChallengeResponse, RequestOptions};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Markers of an interstitial bot-challenge page served with a 2xx status.
static CHALLENGE_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(cf-chl-|challenge-platform|<title>\s*just a moment|attention required)")
        .expect("static regex is valid")
});

/// Paginated HTTP source: one GET per page, records pulled out by an [`ExtractorChain`].
///
/// URL templates accept `{source}` and `{page}` placeholders.
pub struct HttpPageSource {
    client: Arc<ChallengeClient>,
    url_template: String,
    referer_template: Option<String>,
    extractors: ExtractorChain,
    timeout: Option<Duration>,
}

impl HttpPageSource {
    pub fn new(client: Arc<ChallengeClient>, url_template: impl Into<String>) -> Result<Self> {
        let url_template = url_template.into();
        if !url_template.contains("{page}") {
            return Err(Error::configuration_with_context(
                "URL template must contain a {page} placeholder",
                ErrorContext::new()
                    .with_field_path("source.url_template")
                    .with_details(url_template.clone())
                    .with_source("http_page_source"),
            ));
        }
        Ok(Self {
            client,
            url_template,
            referer_template: None,
            extractors: ExtractorChain::default_chain(),
            timeout: None,
        })
    }

    pub fn with_referer_template(mut self, template: impl Into<String>) -> Self {
        self.referer_template = Some(template.into());
        self
    }

    pub fn with_extractors(mut self, extractors: ExtractorChain) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Expand a template and check the result is an absolute URL.
    pub fn page_url(&self, source_id: &str, page: u32) -> Result<String> {
        let raw = render(&self.url_template, source_id, page);
        url::Url::parse(&raw).map(String::from).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid page URL: {}", e),
                ErrorContext::new()
                    .with_field_path("source.url_template")
                    .with_details(raw.clone())
                    .with_source("http_page_source"),
            )
        })
    }

    fn classify(&self, url: &str, resp: ChallengeResponse) -> Result<PageFetch> {
        if resp.is_blocked() {
            return Err(Error::ChallengeBlocked {
                status: resp.status,
                url: url.to_string(),
            });
        }
        if resp.is_throttled() {
            return Err(Error::RateLimited {
                url: url.to_string(),
                retry_after_ms: resp.retry_after_ms(),
            });
        }
        if !resp.is_success() {
            return Err(Error::Remote {
                status: resp.status,
                message: format!("unexpected status for {}", url),
                retryable: resp.status == 408,
            });
        }

        let body = ResponseBody::new(&resp.body);
        if body.json.is_none() && CHALLENGE_MARKERS.is_match(&resp.body) {
            return Err(Error::ChallengeBlocked {
                status: resp.status,
                url: url.to_string(),
            });
        }

        match self.extractors.extract(&body) {
            Some((strategy, records)) => {
                debug!(strategy, records = records.len(), url, "page extracted");
                Ok(PageFetch::new(records).with_response_time(resp.elapsed))
            }
            None => {
                warn!(url, "no extraction strategy matched, treating as end of data");
                Ok(PageFetch::new(Vec::new())
                    .last_page()
                    .with_response_time(resp.elapsed))
            }
        }
    }
}

fn render(template: &str, source_id: &str, page: u32) -> String {
    template
        .replace("{source}", source_id)
        .replace("{page}", &page.to_string())
}

#[async_trait]
impl SourceAdapter for HttpPageSource {
    async fn fetch_page(&self, source_id: &str, page: u32) -> Result<PageFetch> {
        let url = self.page_url(source_id, page)?;
        let mut options = RequestOptions::new();
        if let Some(t) = &self.referer_template {
            options = options.with_referer(render(t, source_id, page));
        }
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }
        let resp = self.client.fetch(&url, &options).await?;
        self.classify(&url, resp)
    }

    fn name(&self) -> &str {
        "http"
    }
}
