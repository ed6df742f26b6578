//! In-memory artifact store.
//!
//! Holds the artifacts accumulated over a workflow run and implements
//! the accept-or-replace-by-path sink contract. Persistence to a real
//! project store is a host concern; the CLI flushes this map to disk.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::types::ParsedArtifact;

/// What a merge did with one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    Added,
    Replaced,
    /// Path and content both matched an existing entry.
    Unchanged,
}

/// Artifact set keyed by normalized path.
///
/// BTreeMap keeps iteration deterministic, which the context
/// prioritizer and the cache digest rely on.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    files: BTreeMap<String, ParsedArtifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch, last writer wins by path.
    ///
    /// Re-merging an identical artifact is a no-op and reports
    /// [`MergeAction::Unchanged`].
    pub fn merge(&mut self, artifacts: &[ParsedArtifact]) -> Vec<(String, MergeAction)> {
        let mut actions = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let action = match self.files.get(&artifact.path) {
                Some(existing) if existing.content == artifact.content => MergeAction::Unchanged,
                Some(_) => {
                    self.files.insert(artifact.path.clone(), artifact.clone());
                    MergeAction::Replaced
                }
                None => {
                    self.files.insert(artifact.path.clone(), artifact.clone());
                    MergeAction::Added
                }
            };
            debug!("Artifact '{}': {:?}", artifact.path, action);
            actions.push((artifact.path.clone(), action));
        }
        actions
    }

    pub fn get(&self, path: &str) -> Option<&ParsedArtifact> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// All artifacts in path order.
    pub fn all(&self) -> Vec<ParsedArtifact> {
        self.files.values().cloned().collect()
    }

    /// All paths in order.
    pub fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Content digest over all artifacts, in path order.
    ///
    /// Stable across identical stores; feeds the cache fingerprint.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, artifact) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update([0]);
            hasher.update(artifact.content.as_bytes());
            hasher.update([0]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
