use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "checkpoint.interval", "source.url_template")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., offending value, file path)
    pub details: Option<String>,
    /// Source of the error (e.g., "durable_store", "config_loader")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the harvester.
///
/// Variants map onto the failure classes the pipeline reacts to: remote
/// rejections and transport faults are retried, a local circuit short-circuit
/// is waited out, persistence problems are logged, and an exhausted retry
/// budget ends the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Challenge blocked: HTTP {status} from {url}")]
    ChallengeBlocked { status: u16, url: String },

    #[error("Rate limited: HTTP 429 from {url}{}", format_retry_after(.retry_after_ms))]
    RateLimited {
        url: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Circuit breaker open: next attempt in {}ms", .retry_in.as_millis())]
    CircuitOpen { retry_in: Duration },

    #[error("Remote error: HTTP {status}: {message}")]
    Remote {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Persistence failure: {message}{}", format_context(.context))]
    Persistence {
        message: String,
        context: ErrorContext,
    },

    #[error("Retry budget exhausted on page {page} after {attempts} attempts")]
    RetryBudgetExhausted { page: u32, attempts: u32 },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_retry_after(retry_after_ms: &Option<u64>) -> String {
    match retry_after_ms {
        Some(ms) => format!(" (retry after {}ms)", ms),
        None => String::new(),
    }
}

impl Error {
    /// Create a new persistence error with structured context
    pub fn persistence_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Persistence {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Persistence { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether retrying the same request later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ChallengeBlocked { .. }
            | Error::RateLimited { .. }
            | Error::Transport(_)
            | Error::CircuitOpen { .. } => true,
            Error::Remote { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }

    /// Server-provided or breaker-provided hint for how long to hold off.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            Error::CircuitOpen { retry_in } => Some(*retry_in),
            _ => None,
        }
    }
}
