//! Publish-once corpus handle and background loading.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use earshot_fingerprint::ReferenceCorpus;
use tokio::task::JoinHandle;

use crate::{CorpusError, CorpusLoader, ReferenceSource, Result};

/// Holds the corpus once it is fully built.
///
/// Readers check the atomic flag before each use; a stale read only means one
/// more window on the energy heuristic. The corpus is never replaced.
#[derive(Debug, Default)]
pub struct CorpusHandle {
    ready: AtomicBool,
    corpus: OnceLock<ReferenceCorpus>,
}

impl CorpusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the corpus. Returns false if one was already published.
    pub fn publish(&self, corpus: ReferenceCorpus) -> bool {
        let entries = corpus.len();
        if self.corpus.set(corpus).is_err() {
            tracing::warn!("reference corpus already published, ignoring reload");
            return false;
        }
        self.ready.store(true, Ordering::Release);
        tracing::info!(entries, "reference corpus published");
        true
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn current(&self) -> Option<&ReferenceCorpus> {
        if !self.is_ready() {
            return None;
        }
        self.corpus.get()
    }
}

/// Decode and fingerprint `sources` on the blocking pool.
pub async fn load_corpus(
    loader: Arc<CorpusLoader>,
    sources: Vec<ReferenceSource>,
) -> Result<ReferenceCorpus> {
    tokio::task::spawn_blocking(move || loader.load(&sources))
        .await
        .map_err(|e| CorpusError::Task(e.to_string()))?
}

/// Load in the background and publish into `handle` when done.
///
/// Must be called from within a tokio runtime. On total failure the handle
/// stays unpublished and detectors keep using the energy heuristic. Aborting
/// the returned task discards a load that is still running.
pub fn spawn_corpus_load(
    handle: Arc<CorpusHandle>,
    loader: Arc<CorpusLoader>,
    sources: Vec<ReferenceSource>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match load_corpus(loader, sources).await {
            Ok(corpus) => {
                handle.publish(corpus);
            }
            Err(e) => {
                tracing::warn!(error = %e, "reference corpus unavailable, staying on energy heuristic");
            }
        }
    })
}
