//! Browser identity pool and synthetic session cookies.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One plausible browser identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub user_agent: String,
    pub accept_language: String,
}

impl Fingerprint {
    pub fn new(user_agent: impl Into<String>, accept_language: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept_language: accept_language.into(),
        }
    }
}

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:119.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0",
];

/// Fixed round-robin rotation of fingerprints.
pub struct FingerprintPool {
    entries: Vec<Fingerprint>,
    cursor: AtomicUsize,
}

impl FingerprintPool {
    /// Build a pool; an empty list falls back to the built-in identities.
    pub fn new(entries: Vec<Fingerprint>) -> Self {
        let entries = if entries.is_empty() {
            Self::default_entries()
        } else {
            entries
        };
        Self {
            entries,
            cursor: AtomicUsize::new(0),
        }
    }

    fn default_entries() -> Vec<Fingerprint> {
        DEFAULT_USER_AGENTS
            .iter()
            .map(|ua| Fingerprint::new(*ua, "en-US,en;q=0.9"))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next identity in rotation.
    pub fn next(&self) -> &Fingerprint {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.entries.len();
        &self.entries[idx]
    }
}

impl Default for FingerprintPool {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Cookie jar contents that look like a fresh browser session.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    pub session_id: String,
    pub csrf_token: String,
    pub ga: String,
    pub gid: String,
}

impl SessionCookies {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let now = chrono::Utc::now().timestamp();
        Self {
            session_id: random_token(&mut rng, 32),
            csrf_token: random_token(&mut rng, 40),
            ga: format!("GA1.2.{}.{}", rng.gen_range(0..1_000_000_000u64), now),
            gid: format!("GA1.2.{}.{}", rng.gen_range(0..1_000_000_000u64), now),
        }
    }

    /// `Cookie` header value.
    pub fn header_value(&self) -> String {
        format!(
            "sessionid={}; csrftoken={}; _ga={}; _gid={}",
            self.session_id, self.csrf_token, self.ga, self.gid
        )
    }
}

fn random_token<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}
