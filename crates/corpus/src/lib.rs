//! Reference corpus loading.
//!
//! Bundled reference recordings are decoded, reduced to fingerprints and
//! frozen into a [`ReferenceCorpus`]. Loading happens once, on a background
//! worker, and the result is published through a [`CorpusHandle`] that the
//! detectors poll without locking.

mod decoder;
mod handle;
mod loader;

pub use decoder::{DecodedAudio, ReferenceDecoder, WavDecoder};
pub use handle::{load_corpus, spawn_corpus_load, CorpusHandle};
pub use loader::{CorpusLoader, ReferenceSource};

pub use earshot_fingerprint::ReferenceCorpus;

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("{0} contains no audio")]
    EmptyAudio(PathBuf),
    #[error("no reference could be loaded")]
    Empty,
    #[error("corpus load task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, CorpusError>;
