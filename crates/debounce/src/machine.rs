//! The shared onset/duration/cooldown state machine.
//!
//! `IDLE -> RISING -> (fire) -> COOLDOWN -> IDLE`. All timing comes from the
//! input timestamps, so the machine is a pure function of its inputs.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::EventConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Rising,
    Cooldown,
}

/// One input sample: an amplitude level, or a match flag as 1.0 / 0.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub level: f64,
    pub at_ms: u64,
}

impl Signal {
    pub fn level(level: f64, at_ms: u64) -> Self {
        Self { level, at_ms }
    }

    pub fn flag(matched: bool, at_ms: u64) -> Self {
        Self {
            level: if matched { 1.0 } else { 0.0 },
            at_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Dropped off before the minimum duration.
    TooShort,
    /// Held past the maximum duration.
    TooLong,
    /// Level fluctuated like speech.
    SpeechLike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    StartupGrace,
    Spike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing happening.
    Quiet,
    /// Counting consecutive hits toward an onset.
    Armed,
    Onset,
    /// Event in progress.
    Holding,
    Fired,
    Discarded(DiscardReason),
    Rejected(RejectReason),
    CoolingDown,
}

/// Per-detector state. Only [`transition`] changes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebounceState {
    phase: Phase,
    active_start_ms: Option<u64>,
    peak_amplitude: f64,
    consecutive_high_count: u32,
    last_fired_ms: Option<u64>,
    initialized_at_ms: Option<u64>,
    streak_start_ms: Option<u64>,
    last_input: Option<Signal>,
    active_levels: VecDeque<f64>,
    awaiting_release: bool,
}

impl DebounceState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active_start_ms(&self) -> Option<u64> {
        self.active_start_ms
    }

    pub fn peak_amplitude(&self) -> f64 {
        self.peak_amplitude
    }

    pub fn consecutive_high_count(&self) -> u32 {
        self.consecutive_high_count
    }

    pub fn last_fired_ms(&self) -> Option<u64> {
        self.last_fired_ms
    }

    pub fn initialized_at_ms(&self) -> Option<u64> {
        self.initialized_at_ms
    }

    fn clear_streak(&mut self) {
        self.consecutive_high_count = 0;
        self.streak_start_ms = None;
        self.peak_amplitude = 0.0;
        self.active_levels.clear();
    }

    fn record_active_level(&mut self, config: &EventConfig, level: f64) {
        let Some(guard) = config.speech_guard else {
            return;
        };
        self.active_levels.push_back(level);
        while self.active_levels.len() > guard.window {
            self.active_levels.pop_front();
        }
    }

    fn is_speech_like(&self, config: &EventConfig) -> bool {
        let Some(guard) = config.speech_guard else {
            return false;
        };
        if self.active_levels.len() < guard.min_samples {
            return false;
        }
        variance(&self.active_levels) > guard.variance_threshold
    }

    fn discard(mut self, reason: DiscardReason, still_high: bool) -> (Self, Outcome) {
        self.phase = Phase::Idle;
        self.active_start_ms = None;
        self.awaiting_release = still_high;
        self.clear_streak();
        (self, Outcome::Discarded(reason))
    }

    fn fire(mut self, config: &EventConfig, now: u64) -> (Self, Outcome) {
        self.last_fired_ms = Some(now);
        self.phase = if config.cooldown_ms > 0 {
            Phase::Cooldown
        } else {
            Phase::Idle
        };
        self.active_start_ms = None;
        self.awaiting_release = false;
        self.clear_streak();
        (self, Outcome::Fired)
    }
}

/// Advance the machine by one input.
pub fn transition(
    config: &EventConfig,
    mut state: DebounceState,
    signal: Signal,
) -> (DebounceState, Outcome) {
    let now = signal.at_ms;
    let level = if signal.level.is_finite() {
        signal.level
    } else {
        0.0
    };
    let initialized_at = *state.initialized_at_ms.get_or_insert(now);
    let previous = state.last_input.replace(Signal { level, at_ms: now });

    if let Some(fired) = state.last_fired_ms {
        if now < fired.saturating_add(config.cooldown_ms) {
            state.phase = Phase::Cooldown;
            return (state, Outcome::CoolingDown);
        }
    }
    if state.phase == Phase::Cooldown {
        state.phase = Phase::Idle;
    }

    let released = level < config.release_threshold();

    match state.phase {
        Phase::Idle | Phase::Cooldown => {
            if state.awaiting_release {
                if released {
                    state.awaiting_release = false;
                }
                return (state, Outcome::Quiet);
            }

            if level <= config.onset_threshold {
                state.clear_streak();
                return (state, Outcome::Quiet);
            }

            if let (Some(ceiling), Some(prev)) = (config.spike_ceiling, previous) {
                let dt_ms = now.saturating_sub(prev.at_ms).max(1) as f64;
                let rate = (level - prev.level).abs() * 1000.0 / dt_ms;
                if rate > ceiling {
                    state.clear_streak();
                    return (state, Outcome::Rejected(RejectReason::Spike));
                }
            }

            if state.consecutive_high_count == 0 {
                state.streak_start_ms = Some(now);
            }
            state.consecutive_high_count += 1;
            state.peak_amplitude = state.peak_amplitude.max(level);
            state.record_active_level(config, level);

            if state.consecutive_high_count < config.required_consecutive_hits {
                return (state, Outcome::Armed);
            }

            if now < initialized_at.saturating_add(config.startup_grace_ms) {
                state.clear_streak();
                return (state, Outcome::Rejected(RejectReason::StartupGrace));
            }

            state.phase = Phase::Rising;
            state.active_start_ms = state.streak_start_ms.or(Some(now));
            (state, Outcome::Onset)
        }
        Phase::Rising => {
            let start = state.active_start_ms.unwrap_or(now);
            let elapsed = now.saturating_sub(start);

            if released {
                if state.is_speech_like(config) {
                    return state.discard(DiscardReason::SpeechLike, false);
                }
                if elapsed < config.min_duration_ms {
                    return state.discard(DiscardReason::TooShort, false);
                }
                if elapsed > config.max_duration_ms {
                    return state.discard(DiscardReason::TooLong, false);
                }
                return state.fire(config, now);
            }

            // Levels between release and onset are a fading tail, not
            // speech-like fluctuation, and stay out of the variance.
            if level > config.onset_threshold {
                state.peak_amplitude = state.peak_amplitude.max(level);
                state.record_active_level(config, level);

                if state.is_speech_like(config) {
                    return state.discard(DiscardReason::SpeechLike, true);
                }
            }
            if elapsed > config.max_duration_ms {
                return state.discard(DiscardReason::TooLong, true);
            }
            if let Some(sustain) = config.sustain_fire_ms {
                if elapsed >= sustain {
                    return state.fire(config, now);
                }
            }
            (state, Outcome::Holding)
        }
    }
}

fn variance(levels: &VecDeque<f64>) -> f64 {
    if levels.is_empty() {
        return 0.0;
    }
    let n = levels.len() as f64;
    let mean = levels.iter().sum::<f64>() / n;
    levels.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// One event type's detector: an [`EventConfig`] plus its state.
#[derive(Debug, Clone)]
pub struct EventDetector {
    name: &'static str,
    config: EventConfig,
    state: DebounceState,
}

impl EventDetector {
    pub fn new(name: &'static str, config: EventConfig) -> Self {
        Self {
            name,
            config,
            state: DebounceState::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &EventConfig {
        &self.config
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    pub fn last_fired_ms(&self) -> Option<u64> {
        self.state.last_fired_ms
    }

    /// Feed one input; returns the machine's outcome.
    pub fn advance(&mut self, signal: Signal) -> Outcome {
        let state = std::mem::take(&mut self.state);
        let (next, outcome) = transition(&self.config, state, signal);
        self.state = next;

        match outcome {
            Outcome::Quiet | Outcome::Armed | Outcome::Holding | Outcome::CoolingDown => {}
            Outcome::Fired => {
                tracing::debug!(detector = self.name, at_ms = signal.at_ms, "event fired");
            }
            other => {
                tracing::debug!(detector = self.name, at_ms = signal.at_ms, outcome = ?other, "event transition");
            }
        }
        outcome
    }

    /// Feed one input; true exactly when the event fires.
    pub fn process(&mut self, signal: Signal) -> bool {
        self.advance(signal) == Outcome::Fired
    }

    /// Forget everything, including the cooldown timer. The startup grace
    /// period restarts at the next input.
    pub fn reset(&mut self) {
        self.state = DebounceState::default();
    }
}
