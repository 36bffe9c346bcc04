//! Configured set of detectors for one capture session.

use std::collections::HashSet;
use std::sync::Arc;

use earshot_corpus::{CorpusHandle, ReferenceSource};
use earshot_debounce::{EventConfig, EventDetector, Signal};
use earshot_fingerprint::{ExtractorConfig, FeatureExtractor};
use serde::{Deserialize, Serialize};

use crate::{
    AcousticDetector, Detection, DetectionSource, DetectorError, EventKind, Result, WindowConfig,
};

/// How an event kind is detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Trigger {
    /// Debounce the capture facility's amplitude levels.
    Level { event: EventConfig },
    /// Gate per-window scores on consecutive positives.
    Window { window: WindowConfig },
    /// Feed per-window positives as a match flag into the debouncer.
    MatchFlag {
        window: WindowConfig,
        event: EventConfig,
    },
}

impl Trigger {
    pub fn validate(&self) -> Result<()> {
        match self {
            Trigger::Level { event } => event.validate()?,
            Trigger::Window { window } => window.validate()?,
            Trigger::MatchFlag { window, event } => {
                window.validate()?;
                event.validate()?;
            }
        }
        Ok(())
    }

    pub fn uses_windows(&self) -> bool {
        !matches!(self, Trigger::Level { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventProfile {
    pub kind: EventKind,
    pub trigger: Trigger,
}

impl EventProfile {
    pub fn default_for(kind: EventKind) -> Self {
        let trigger = match kind {
            EventKind::Blow => Trigger::Level {
                event: EventConfig::blow(),
            },
            EventKind::Sneeze => Trigger::Level {
                event: EventConfig::sneeze(),
            },
            EventKind::Urination => Trigger::MatchFlag {
                window: WindowConfig::default(),
                event: EventConfig::urination(),
            },
        };
        Self { kind, trigger }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub extractor: ExtractorConfig,
    /// Samples between two window analyses.
    pub analysis_hop: usize,
    pub profiles: Vec<EventProfile>,
    pub references: Vec<ReferenceSource>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let extractor = ExtractorConfig::default();
        Self {
            analysis_hop: extractor.window_size / 2,
            extractor,
            profiles: EventKind::ALL.into_iter().map(EventProfile::default_for).collect(),
            references: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.analysis_hop == 0 {
            return Err(DetectorError::InvalidConfig(
                "analysis_hop must be at least 1".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for profile in &self.profiles {
            if !seen.insert(profile.kind) {
                return Err(DetectorError::InvalidConfig(format!(
                    "duplicate profile for {}",
                    profile.kind
                )));
            }
            profile.trigger.validate()?;
        }
        Ok(())
    }

    pub fn uses_windows(&self) -> bool {
        self.profiles.iter().any(|p| p.trigger.uses_windows())
    }

    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.profiles.iter().map(|p| p.kind)
    }
}

enum Slot {
    Level(EventDetector),
    Window(AcousticDetector),
    MatchFlag {
        window: AcousticDetector,
        machine: EventDetector,
    },
}

struct Channel {
    kind: EventKind,
    slot: Slot,
}

/// All detectors of a session, driven from a single thread.
///
/// Level inputs and analysis windows are routed to the detectors whose
/// trigger consumes them.
pub struct DetectionSession {
    channels: Vec<Channel>,
}

impl DetectionSession {
    pub fn new(
        config: &SessionConfig,
        extractor: Arc<FeatureExtractor>,
        corpus: Arc<CorpusHandle>,
    ) -> Result<Self> {
        config.validate()?;

        let channels = config
            .profiles
            .iter()
            .map(|profile| {
                let kind = profile.kind;
                let name = kind.category();
                let window = |config: &WindowConfig| {
                    AcousticDetector::new(kind, *config, Arc::clone(&extractor), Arc::clone(&corpus))
                };
                let slot = match &profile.trigger {
                    Trigger::Level { event } => Slot::Level(EventDetector::new(name, event.clone())),
                    Trigger::Window { window: config } => Slot::Window(window(config)),
                    Trigger::MatchFlag {
                        window: config,
                        event,
                    } => Slot::MatchFlag {
                        window: window(config),
                        machine: EventDetector::new(name, event.clone()),
                    },
                };
                Channel { kind, slot }
            })
            .collect();

        Ok(Self { channels })
    }

    pub fn on_level(&mut self, level: f64, at_ms: u64) -> Vec<Detection> {
        let mut detections = Vec::new();
        for channel in &mut self.channels {
            if let Slot::Level(machine) = &mut channel.slot {
                if machine.process(Signal::level(level, at_ms)) {
                    detections.push(Detection {
                        kind: channel.kind,
                        at_ms,
                        source: DetectionSource::Level,
                        confidence: None,
                    });
                }
            }
        }
        Self::log_detections(&detections);
        detections
    }

    pub fn on_window(&mut self, samples: &[i16], at_ms: u64) -> Vec<Detection> {
        let mut detections = Vec::new();
        for channel in &mut self.channels {
            let detection = match &mut channel.slot {
                Slot::Level(_) => None,
                Slot::Window(detector) => {
                    detector
                        .process_window_signal(samples, at_ms)
                        .map(|signal| Detection {
                            kind: channel.kind,
                            at_ms,
                            source: signal.source,
                            confidence: Some(signal.score),
                        })
                }
                Slot::MatchFlag { window, machine } => {
                    let cooling = machine
                        .last_fired_ms()
                        .is_some_and(|t| at_ms < t.saturating_add(machine.config().cooldown_ms));
                    if cooling {
                        None
                    } else {
                        let signal = window.score_window(samples);
                        let matched = signal.as_ref().is_some_and(|s| window.is_positive(s));
                        let fired = machine.process(Signal::flag(matched, at_ms));
                        fired.then(|| Detection {
                            kind: channel.kind,
                            at_ms,
                            source: signal
                                .as_ref()
                                .map_or_else(|| window.active_source(), |s| s.source),
                            confidence: signal.map(|s| s.score),
                        })
                    }
                }
            };
            detections.extend(detection);
        }
        Self::log_detections(&detections);
        detections
    }

    fn log_detections(detections: &[Detection]) {
        for detection in detections {
            tracing::info!(
                kind = %detection.kind,
                at_ms = detection.at_ms,
                source = ?detection.source,
                "detection"
            );
        }
    }

    pub fn uses_windows(&self) -> bool {
        self.channels.iter().any(|c| !matches!(c.slot, Slot::Level(_)))
    }

    /// Recalibrate: every detector restarts from idle, including its
    /// cooldown timer and startup grace period.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            match &mut channel.slot {
                Slot::Level(machine) => machine.reset(),
                Slot::Window(detector) => detector.reset(),
                Slot::MatchFlag { window, machine } => {
                    window.reset();
                    machine.reset();
                }
            }
        }
    }
}

impl std::fmt::Debug for DetectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<EventKind> = self.channels.iter().map(|c| c.kind).collect();
        f.debug_struct("DetectionSession")
            .field("kinds", &kinds)
            .finish()
    }
}
