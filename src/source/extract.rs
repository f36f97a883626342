//! Ordered extraction strategies over heterogeneous response bodies.
//!
//! Each strategy either finds a record list or reports `NotFound`; a chain
//! tries them in order and stops at the first hit.

use crate::types::Record;
use crate::utils::json_path::PathMapper;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Outcome of one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Found(Vec<Record>),
    NotFound,
}

/// Raw response body plus its parsed JSON, when it parses.
pub struct ResponseBody<'a> {
    pub text: &'a str,
    pub json: Option<Value>,
}

impl<'a> ResponseBody<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            json: serde_json::from_str(text).ok(),
        }
    }
}

pub trait ExtractStrategy: Send + Sync {
    fn extract(&self, body: &ResponseBody<'_>) -> Extraction;
    fn name(&self) -> &str;
}

fn records_from(values: &[Value]) -> Vec<Record> {
    values.iter().cloned().filter_map(Record::from_value).collect()
}

/// Record array found at a dot-notation path of a JSON body.
pub struct JsonPathStrategy {
    path: String,
}

impl JsonPathStrategy {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl ExtractStrategy for JsonPathStrategy {
    fn extract(&self, body: &ResponseBody<'_>) -> Extraction {
        match body
            .json
            .as_ref()
            .and_then(|json| PathMapper::get_array(json, &self.path))
        {
            Some(arr) => Extraction::Found(records_from(arr)),
            None => Extraction::NotFound,
        }
    }

    fn name(&self) -> &str {
        &self.path
    }
}

static NEXT_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script[^>]*id="__NEXT_DATA__"[^>]*>(.*?)</script>"#)
        .expect("static regex is valid")
});

/// JSON embedded in an HTML `<script id="__NEXT_DATA__">` block.
pub struct EmbeddedScriptStrategy {
    path: String,
}

impl EmbeddedScriptStrategy {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl ExtractStrategy for EmbeddedScriptStrategy {
    fn extract(&self, body: &ResponseBody<'_>) -> Extraction {
        let embedded = NEXT_DATA
            .captures(body.text)
            .and_then(|c| c.get(1))
            .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok());
        match embedded
            .as_ref()
            .and_then(|json| PathMapper::get_array(json, &self.path))
        {
            Some(arr) => Extraction::Found(records_from(arr)),
            None => Extraction::NotFound,
        }
    }

    fn name(&self) -> &str {
        "embedded_script"
    }
}

/// Strategies tried in order; the first `Found` wins.
pub struct ExtractorChain {
    strategies: Vec<Box<dyn ExtractStrategy>>,
}

impl ExtractorChain {
    pub fn new(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { strategies }
    }

    /// Chain built from JSON paths, in order.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            paths
                .into_iter()
                .map(|p| Box::new(JsonPathStrategy::new(p)) as Box<dyn ExtractStrategy>)
                .collect(),
        )
    }

    /// Ranking API body, GraphQL body, bare array, then embedded page data.
    pub fn default_chain() -> Self {
        Self::new(vec![
            Box::new(JsonPathStrategy::new("submissions")),
            Box::new(JsonPathStrategy::new("total_rank")),
            Box::new(JsonPathStrategy::new("data.contestRanking.submissions")),
            Box::new(JsonPathStrategy::new("$")),
            Box::new(EmbeddedScriptStrategy::new("props.pageProps.submissions")),
        ])
    }

    pub fn push(&mut self, strategy: Box<dyn ExtractStrategy>) {
        self.strategies.push(strategy);
    }

    /// First hit plus the name of the strategy that produced it.
    pub fn extract(&self, body: &ResponseBody<'_>) -> Option<(&str, Vec<Record>)> {
        self.strategies.iter().find_map(|s| match s.extract(body) {
            Extraction::Found(records) => Some((s.name(), records)),
            Extraction::NotFound => None,
        })
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for ExtractorChain {
    fn default() -> Self {
        Self::default_chain()
    }
}
