/// Ring buffer capacity, in analysis windows.
pub const RING_WINDOWS: usize = 3;

/// Full-scale magnitude of a 16-bit sample.
pub const FULL_SCALE: f64 = 32768.0;

/// Fingerprint similarity needed for a positive window.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// Mean-squared amplitude (full scale = 1.0) for a positive heuristic window.
pub const DEFAULT_ENERGY_THRESHOLD: f64 = 0.02;

/// Consecutive positive windows before a window detector fires.
pub const DEFAULT_CONSECUTIVE_MATCHES: u32 = 2;

/// Minimum time between two firings of a window detector.
pub const DEFAULT_WINDOW_COOLDOWN_MS: u64 = 3000;
