//! Spectral fingerprints for short acoustic events.
//!
//! A fingerprint is a fixed-size feature vector computed from one analysis
//! window. Reference fingerprints live in an immutable [`ReferenceCorpus`];
//! live windows are scored against it with [`match_fingerprint`].

mod corpus;
mod features;
mod matcher;

pub use corpus::{CorpusBuilder, Reference, ReferenceCorpus};
pub use features::{
    ExtractorConfig, FeatureExtractor, FeatureVector, CEPSTRAL_COEFFS, DEFAULT_SAMPLE_RATE,
    DEFAULT_WINDOW_SIZE, ENERGY_BANDS, LIVE_LABEL,
};
pub use matcher::{cosine_similarity, match_fingerprint, similarity, MatchResult};

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("invalid extractor config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FingerprintError>;
