use serde::{Deserialize, Serialize};

use crate::{DebounceError, Result};

/// Rejects events whose level fluctuates like speech while active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechGuard {
    /// Most recent active levels kept for the variance estimate.
    pub window: usize,
    /// Levels needed before the variance is trusted.
    pub min_samples: usize,
    /// Variance (level units squared) above which the event is discarded.
    pub variance_threshold: f64,
}

/// Thresholds and durations for one event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Level that must be exceeded to count as a hit.
    pub onset_threshold: f64,
    /// Release happens when the level drops below `onset_threshold * release_ratio`.
    pub release_ratio: f64,
    pub required_consecutive_hits: u32,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub cooldown_ms: u64,
    /// Onsets are rejected for this long after the first input.
    pub startup_grace_ms: u64,
    /// Largest plausible level change per second; faster hits are glitches.
    pub spike_ceiling: Option<f64>,
    /// Fire without waiting for release once the event has lasted this long.
    pub sustain_fire_ms: Option<u64>,
    pub speech_guard: Option<SpeechGuard>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self::blow()
    }
}

impl EventConfig {
    /// A forceful blow into the microphone: loud, steady, short.
    pub fn blow() -> Self {
        Self {
            onset_threshold: 7.0,
            release_ratio: 0.6,
            required_consecutive_hits: 2,
            min_duration_ms: 200,
            max_duration_ms: 2000,
            cooldown_ms: 3000,
            startup_grace_ms: 1000,
            spike_ceiling: Some(400.0),
            sustain_fire_ms: None,
            speech_guard: Some(SpeechGuard {
                window: 8,
                min_samples: 4,
                variance_threshold: 1.0,
            }),
        }
    }

    /// A sneeze: very loud burst, slightly looser steadiness requirement.
    pub fn sneeze() -> Self {
        Self {
            onset_threshold: 9.0,
            release_ratio: 0.5,
            required_consecutive_hits: 2,
            min_duration_ms: 250,
            max_duration_ms: 1500,
            cooldown_ms: 4000,
            startup_grace_ms: 1000,
            spike_ceiling: Some(500.0),
            sustain_fire_ms: None,
            speech_guard: Some(SpeechGuard {
                window: 8,
                min_samples: 3,
                variance_threshold: 1.5,
            }),
        }
    }

    /// Urination, driven by a binary fingerprint match flag (1.0 / 0.0).
    ///
    /// The sound is continuous, so it fires once held for three times the
    /// minimum duration instead of waiting for it to stop.
    pub fn urination() -> Self {
        Self {
            onset_threshold: 0.5,
            release_ratio: 1.0,
            required_consecutive_hits: 3,
            min_duration_ms: 300,
            max_duration_ms: 2000,
            cooldown_ms: 5000,
            startup_grace_ms: 1000,
            spike_ceiling: None,
            sustain_fire_ms: Some(900),
            speech_guard: None,
        }
    }

    pub fn release_threshold(&self) -> f64 {
        self.onset_threshold * self.release_ratio
    }

    pub fn validate(&self) -> Result<()> {
        if !self.onset_threshold.is_finite() {
            return Err(DebounceError::InvalidConfig(
                "onset threshold must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.release_ratio) {
            return Err(DebounceError::InvalidConfig(format!(
                "release ratio must be within [0, 1], got {}",
                self.release_ratio
            )));
        }
        if self.min_duration_ms > self.max_duration_ms {
            return Err(DebounceError::InvalidConfig(format!(
                "min duration {}ms exceeds max duration {}ms",
                self.min_duration_ms, self.max_duration_ms
            )));
        }
        if let Some(sustain) = self.sustain_fire_ms {
            if sustain < self.min_duration_ms || sustain > self.max_duration_ms {
                return Err(DebounceError::InvalidConfig(format!(
                    "sustain fire {sustain}ms must lie within [{}, {}]ms",
                    self.min_duration_ms, self.max_duration_ms
                )));
            }
        }
        if let Some(ceiling) = self.spike_ceiling {
            if ceiling <= 0.0 {
                return Err(DebounceError::InvalidConfig(
                    "spike ceiling must be positive".to_string(),
                ));
            }
        }
        if let Some(guard) = self.speech_guard {
            if guard.window == 0 || guard.min_samples == 0 || guard.min_samples > guard.window {
                return Err(DebounceError::InvalidConfig(format!(
                    "speech guard needs 0 < min_samples <= window, got {} / {}",
                    guard.min_samples, guard.window
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for config in [
            EventConfig::blow(),
            EventConfig::sneeze(),
            EventConfig::urination(),
        ] {
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_presets_within_tuning_ranges() {
        for config in [EventConfig::blow(), EventConfig::sneeze()] {
            assert!((5.5..=9.9).contains(&config.onset_threshold));
            assert!((200..=300).contains(&config.min_duration_ms));
            assert!((1500..=2000).contains(&config.max_duration_ms));
            assert!((3000..=5000).contains(&config.cooldown_ms));
            assert!((2..=3).contains(&config.required_consecutive_hits));
        }
    }

    #[test]
    fn test_rejects_inverted_durations() {
        let config = EventConfig {
            min_duration_ms: 3000,
            ..EventConfig::blow()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_release_threshold() {
        let config = EventConfig::blow();
        assert!((config.release_threshold() - 4.2).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: EventConfig =
            serde_json::from_str(r#"{"onset_threshold": 8.5, "cooldown_ms": 4500}"#).unwrap();
        assert_eq!(config.onset_threshold, 8.5);
        assert_eq!(config.cooldown_ms, 4500);
        assert_eq!(config.min_duration_ms, EventConfig::blow().min_duration_ms);
    }
}
