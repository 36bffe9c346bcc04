//! Real-time detection of blow, sneeze and urination sounds.
//!
//! The capture path feeds raw samples and amplitude levels into a
//! [`DetectorService`]. Levels drive the amplitude debouncers directly;
//! samples land in a [`StreamingRingBuffer`] and are analyzed window by
//! window on a worker thread by [`AcousticDetector`]s, which score windows
//! with an energy heuristic until the reference corpus is loaded and with
//! fingerprint matching afterwards.

pub mod constants;
mod diagnostics;
mod facade;
mod ring_buffer;
mod service;
mod session;

pub use diagnostics::{describe_last_detection, DetectionHistory};
pub use facade::{AcousticDetector, WindowConfig, WindowSignal};
pub use ring_buffer::{Snapshot, StreamingRingBuffer};
pub use service::DetectorService;
pub use session::{DetectionSession, EventProfile, SessionConfig, Trigger};

pub use earshot_corpus::ReferenceSource;
pub use earshot_debounce::EventConfig;
pub use earshot_fingerprint::ExtractorConfig;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error(transparent)]
    Fingerprint(#[from] earshot_fingerprint::FingerprintError),
    #[error(transparent)]
    Debounce(#[from] earshot_debounce::DebounceError),
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
    #[error("match score is not finite")]
    NonFiniteScore,
    #[error("corpus loading needs a tokio runtime")]
    NoRuntime,
    #[error("failed to spawn analysis worker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DetectorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Blow,
    Sneeze,
    Urination,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Blow, EventKind::Sneeze, EventKind::Urination];

    /// Reference category matched against corpus entries.
    pub fn category(self) -> &'static str {
        match self {
            EventKind::Blow => "blow",
            EventKind::Sneeze => "sneeze",
            EventKind::Urination => "urination",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// What produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Amplitude level debouncer.
    Level,
    /// Window energy, used while no reference corpus is available.
    Heuristic,
    /// Fingerprint match against the reference corpus.
    Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub kind: EventKind,
    pub at_ms: u64,
    pub source: DetectionSource,
    /// Window score that triggered the detection, if window based.
    pub confidence: Option<f64>,
}

pub type DetectionCallback = Arc<dyn Fn(Detection) + Send + Sync + 'static>;

pub fn new_callback<F>(f: F) -> DetectionCallback
where
    F: Fn(Detection) + Send + Sync + 'static,
{
    Arc::new(f)
}
