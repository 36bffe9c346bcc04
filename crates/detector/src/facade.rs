//! Per-window detection for one event kind.
//!
//! Windows are scored with a mean-squared energy heuristic until the
//! reference corpus is published, then by fingerprint similarity. Either way
//! a positive must repeat for `consecutive_matches_required` windows.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use earshot_corpus::CorpusHandle;
use earshot_debounce::{ConsecutiveGate, GateConfig};
use earshot_fingerprint::{match_fingerprint, FeatureExtractor};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONSECUTIVE_MATCHES, DEFAULT_ENERGY_THRESHOLD, DEFAULT_MATCH_THRESHOLD,
    DEFAULT_WINDOW_COOLDOWN_MS, FULL_SCALE,
};
use crate::{DetectionSource, DetectorError, EventKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Minimum fingerprint similarity, in [0, 1].
    pub match_threshold: f64,
    pub consecutive_matches_required: u32,
    /// Minimum mean-squared amplitude (full scale = 1.0) for the heuristic.
    pub energy_threshold: f64,
    pub cooldown_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            consecutive_matches_required: DEFAULT_CONSECUTIVE_MATCHES,
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            cooldown_ms: DEFAULT_WINDOW_COOLDOWN_MS,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(DetectorError::InvalidConfig(format!(
                "match_threshold must be within [0, 1], got {}",
                self.match_threshold
            )));
        }
        if !self.energy_threshold.is_finite() || self.energy_threshold < 0.0 {
            return Err(DetectorError::InvalidConfig(format!(
                "energy_threshold must be finite and non-negative, got {}",
                self.energy_threshold
            )));
        }
        if self.consecutive_matches_required == 0 {
            return Err(DetectorError::InvalidConfig(
                "consecutive_matches_required must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn gate(&self) -> GateConfig {
        GateConfig {
            consecutive_required: self.consecutive_matches_required,
            cooldown_ms: self.cooldown_ms,
        }
    }
}

/// Score of one analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSignal {
    pub source: DetectionSource,
    /// Fingerprint similarity, or mean-squared energy for the heuristic.
    pub score: f64,
    /// Category of the best matching reference.
    pub category: Option<String>,
}

impl WindowSignal {
    pub fn heuristic(energy: f64) -> Self {
        Self {
            source: DetectionSource::Heuristic,
            score: energy,
            category: None,
        }
    }

    pub fn fingerprint(confidence: f64, category: Option<&str>) -> Self {
        Self {
            source: DetectionSource::Fingerprint,
            score: confidence,
            category: category.map(str::to_string),
        }
    }
}

/// Mean-squared normalized amplitude over a `window`-sample block.
///
/// Longer input is capped at `window`; shorter input counts as zero-padded.
pub fn window_energy(samples: &[i16], window: usize) -> f64 {
    let window = window.max(1);
    let sum: f64 = samples
        .iter()
        .take(window)
        .map(|&s| {
            let x = s as f64 / FULL_SCALE;
            x * x
        })
        .sum();
    sum / window as f64
}

pub struct AcousticDetector {
    kind: EventKind,
    config: WindowConfig,
    extractor: Arc<FeatureExtractor>,
    corpus: Arc<CorpusHandle>,
    gate: ConsecutiveGate,
}

impl std::fmt::Debug for AcousticDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcousticDetector")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("corpus_ready", &self.corpus.is_ready())
            .field("gate", &self.gate)
            .finish()
    }
}

impl AcousticDetector {
    pub fn new(
        kind: EventKind,
        config: WindowConfig,
        extractor: Arc<FeatureExtractor>,
        corpus: Arc<CorpusHandle>,
    ) -> Self {
        Self {
            kind,
            config,
            extractor,
            corpus,
            gate: ConsecutiveGate::new(config.gate()),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Source the next window will be scored with.
    ///
    /// Stays on the heuristic when the corpus holds no reference of this kind.
    pub fn active_source(&self) -> DetectionSource {
        match self.corpus.current() {
            Some(corpus) if corpus.count_category(self.kind.category()) > 0 => {
                DetectionSource::Fingerprint
            }
            _ => DetectionSource::Heuristic,
        }
    }

    pub fn evaluate_window(&self, samples: &[i16]) -> Result<WindowSignal> {
        if let Some(corpus) = self
            .corpus
            .current()
            .filter(|c| c.count_category(self.kind.category()) > 0)
        {
            let live = self.extractor.extract(samples);
            let result = match_fingerprint(&live, corpus);
            if !result.confidence.is_finite() {
                return Err(DetectorError::NonFiniteScore);
            }
            return Ok(WindowSignal::fingerprint(result.confidence, result.category()));
        }

        let energy = window_energy(samples, self.extractor.window_size());
        if !energy.is_finite() {
            return Err(DetectorError::NonFiniteScore);
        }
        Ok(WindowSignal::heuristic(energy))
    }

    pub fn is_positive(&self, signal: &WindowSignal) -> bool {
        match signal.source {
            DetectionSource::Fingerprint => {
                signal.score >= self.config.match_threshold
                    && signal.category.as_deref() == Some(self.kind.category())
            }
            DetectionSource::Heuristic | DetectionSource::Level => {
                signal.score >= self.config.energy_threshold
            }
        }
    }

    /// Score a window without debouncing.
    ///
    /// Errors and panics are logged and reported as `None`, which callers
    /// treat as no detection.
    pub fn score_window(&self, samples: &[i16]) -> Option<WindowSignal> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.evaluate_window(samples))) {
            Ok(Ok(signal)) => Some(signal),
            Ok(Err(e)) => {
                tracing::warn!(kind = %self.kind, error = %e, "window analysis failed");
                None
            }
            Err(payload) => {
                tracing::error!(
                    kind = %self.kind,
                    panic = panic_message(payload.as_ref()),
                    "window analysis panicked"
                );
                None
            }
        }
    }

    /// Feed one scored window through the consecutive-match gate.
    pub fn observe(&mut self, signal: &WindowSignal, at_ms: u64) -> bool {
        let positive = self.is_positive(signal);
        self.gate.observe(positive, at_ms)
    }

    pub fn in_cooldown(&self, at_ms: u64) -> bool {
        self.gate
            .last_fired_ms()
            .is_some_and(|fired| at_ms < fired.saturating_add(self.config.cooldown_ms))
    }

    /// Analyze one window; true exactly when the detector fires.
    pub fn process_window(&mut self, samples: &[i16], at_ms: u64) -> bool {
        self.process_window_signal(samples, at_ms).is_some()
    }

    /// Like [`Self::process_window`], returning the window that fired.
    pub fn process_window_signal(&mut self, samples: &[i16], at_ms: u64) -> Option<WindowSignal> {
        if self.in_cooldown(at_ms) {
            return None;
        }
        match self.score_window(samples) {
            Some(signal) => {
                if self.observe(&signal, at_ms) {
                    tracing::debug!(
                        kind = %self.kind,
                        at_ms,
                        source = ?signal.source,
                        score = signal.score,
                        "window detection"
                    );
                    Some(signal)
                } else {
                    None
                }
            }
            None => {
                self.gate.observe(false, at_ms);
                None
            }
        }
    }

    /// Clear the match streak and the cooldown timer.
    pub fn reset(&mut self) {
        self.gate.reset();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
