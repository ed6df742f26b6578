//! TTL-bounded response cache for step results.
//!
//! The cache is injectable: each pipeline instance owns (or shares via
//! `Arc`) one, so its lifecycle is tied to the hosting session rather
//! than the process. Entries are immutable once written; TTL is checked
//! on read and the oldest entry is evicted when an insert passes the
//! soft count cap.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::debug;

use atelier_core::StepKind;

use crate::types::ParsedArtifact;

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_ENTRIES: usize = 100;

/// A cached step result.
#[derive(Debug, Clone)]
pub struct CachedResult {
    pub content: String,
    pub artifacts: Vec<ParsedArtifact>,
}

#[derive(Debug)]
struct StoredEntry {
    result: CachedResult,
    created_at: Instant,
}

/// Fingerprint-keyed cache of step results.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, StoredEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Key identifying cache-equivalent step invocations.
    pub fn fingerprint(step: StepKind, input: &str, context_digest: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(step.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(input.as_bytes());
        hasher.update([0]);
        hasher.update(context_digest.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a fingerprint; expired entries are removed on read.
    pub fn get(&self, key: &str) -> Option<CachedResult> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                debug!("Cache hit for {}", &key[..12.min(key.len())]);
                Some(entry.result.clone())
            }
            Some(_) => {
                debug!("Cache entry expired for {}", &key[..12.min(key.len())]);
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a result, evicting the oldest entry past the count cap.
    /// Overwriting a present key does not grow the map and never evicts.
    pub fn insert(&self, key: impl Into<String>, content: impl Into<String>, artifacts: Vec<ParsedArtifact>) {
        let key = key.into();
        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone())
            {
                debug!("Evicting oldest cache entry");
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            StoredEntry {
                result: CachedResult {
                    content: content.into(),
                    artifacts,
                },
                created_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
