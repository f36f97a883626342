//! Outbound HTTP with rotated browser identities.
//!
//! [`ChallengeClient`] issues one request at a time, returns any status below
//! 500 as data so callers can tell blocked (403), throttled (429) and success
//! (200) apart, and raises only for transport faults and hard server errors.

pub mod fingerprint;
pub mod http;

pub use fingerprint::{Fingerprint, FingerprintPool, SessionCookies};
pub use http::{ChallengeClient, ChallengeResponse, ClientConfig, RequestOptions};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Split the timeout and connect cases out of a reqwest error.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Http(e)
        }
    }
}
