//! Debouncing for acoustic event signals.
//!
//! [`EventDetector`] turns a continuous amplitude (or binary match) signal into
//! single discrete firings: onset confirmation, duration bounds, glitch and
//! speech rejection, then a cooldown. Every event type shares the same machine
//! and differs only in its [`EventConfig`].
//!
//! [`ConsecutiveGate`] is the per-window variant: a positive must repeat for N
//! consecutive windows before it counts.

mod config;
mod gate;
mod machine;

pub use config::{EventConfig, SpeechGuard};
pub use gate::{ConsecutiveGate, GateConfig};
pub use machine::{
    transition, DebounceState, DiscardReason, EventDetector, Outcome, Phase, RejectReason, Signal,
};

#[derive(Debug, thiserror::Error)]
pub enum DebounceError {
    #[error("invalid event config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DebounceError>;
