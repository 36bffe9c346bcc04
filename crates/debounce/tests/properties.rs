//! Behavioral properties of the shared event state machine.

use earshot_debounce::{EventConfig, EventDetector, Signal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STEP_MS: u64 = 50;

fn fire_times(detector: &mut EventDetector, levels: &[f64]) -> Vec<u64> {
    levels
        .iter()
        .enumerate()
        .filter_map(|(i, level)| {
            let at_ms = i as u64 * STEP_MS;
            detector
                .process(Signal::level(*level, at_ms))
                .then_some(at_ms)
        })
        .collect()
}

/// Bursts of loud steady input separated by quiet gaps of random length.
fn random_bursts(rng: &mut StdRng, len: usize) -> Vec<f64> {
    let mut levels = Vec::with_capacity(len);
    while levels.len() < len {
        let quiet = rng.random_range(1..40);
        let loud = rng.random_range(1..30);
        let high = rng.random_range(7.5..9.9);
        levels.extend(std::iter::repeat_n(0.5, quiet));
        levels.extend((0..loud).map(|_| high + rng.random_range(-0.1..0.1)));
    }
    levels.truncate(len);
    levels
}

#[test]
fn firings_are_never_closer_than_cooldown() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    for config in [EventConfig::blow(), EventConfig::sneeze()] {
        for _ in 0..50 {
            let mut detector = EventDetector::new("prop", config.clone());
            let fired = fire_times(&mut detector, &random_bursts(&mut rng, 2000));
            for pair in fired.windows(2) {
                assert!(
                    pair[1] - pair[0] >= config.cooldown_ms,
                    "fired at {} and {} with cooldown {}",
                    pair[0],
                    pair[1],
                    config.cooldown_ms
                );
            }
        }
    }
}

#[test]
fn random_noise_respects_cooldown_and_monotonic_fire_time() {
    let mut rng = StdRng::seed_from_u64(42);
    let config = EventConfig {
        speech_guard: None,
        spike_ceiling: None,
        ..EventConfig::blow()
    };
    let mut detector = EventDetector::new("noise", config.clone());
    let mut last_fired = None;
    for i in 0..20_000u64 {
        let level = rng.random_range(0.0..10.0);
        detector.process(Signal::level(level, i * STEP_MS));
        let current = detector.last_fired_ms();
        if let (Some(prev), Some(now)) = (last_fired, current) {
            assert!(now >= prev);
            if now != prev {
                assert!(now - prev >= config.cooldown_ms);
            }
        }
        last_fired = current.or(last_fired);
    }
}

/// Syllable-like fluctuation: loud peaks with dips every few frames.
fn syllables(cycles: usize) -> Vec<f64> {
    let pattern = [7.3, 9.9, 7.6, 9.7, 3.0, 9.8, 7.4, 2.5];
    let mut levels = vec![0.5; 40];
    for _ in 0..cycles {
        levels.extend_from_slice(&pattern);
    }
    levels
}

/// Continuous oscillation between quiet and loud, period of six frames.
fn oscillation(frames: usize) -> Vec<f64> {
    let mut levels = vec![0.5; 40];
    levels.extend((0..frames).map(|i| {
        6.25 + 3.25 * (2.0 * std::f64::consts::PI * i as f64 / 6.0).sin()
    }));
    levels
}

#[test]
fn speech_like_input_never_fires_blow_or_sneeze() {
    for config in [EventConfig::blow(), EventConfig::sneeze()] {
        let mut detector = EventDetector::new("speech", config.clone());
        assert!(fire_times(&mut detector, &syllables(50)).is_empty());

        let mut detector = EventDetector::new("speech", config);
        assert!(fire_times(&mut detector, &oscillation(400)).is_empty());
    }
}

#[test]
fn steady_sneeze_fires_once() {
    let mut levels = vec![0.5; 40];
    levels.extend([9.4, 9.7, 9.9, 9.6, 9.5, 9.8]);
    levels.extend(std::iter::repeat_n(0.5, 100));
    let mut detector = EventDetector::new("sneeze", EventConfig::sneeze());
    assert_eq!(fire_times(&mut detector, &levels), vec![46 * STEP_MS]);
}
