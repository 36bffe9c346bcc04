use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    pub consecutive_required: u32,
    pub cooldown_ms: u64,
}

/// Requires a positive to repeat for N consecutive windows.
///
/// Firing consumes the streak, so the next detection needs a fresh run of
/// positives. Windows inside the cooldown are ignored.
#[derive(Debug, Clone)]
pub struct ConsecutiveGate {
    config: GateConfig,
    consecutive: u32,
    last_fired_ms: Option<u64>,
}

impl ConsecutiveGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            consecutive: 0,
            last_fired_ms: None,
        }
    }

    pub fn observe(&mut self, positive: bool, at_ms: u64) -> bool {
        if let Some(fired) = self.last_fired_ms {
            if at_ms < fired.saturating_add(self.config.cooldown_ms) {
                return false;
            }
        }

        if !positive {
            self.consecutive = 0;
            return false;
        }

        self.consecutive += 1;
        if self.consecutive < self.config.consecutive_required.max(1) {
            return false;
        }

        self.consecutive = 0;
        self.last_fired_ms = Some(at_ms);
        true
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn last_fired_ms(&self) -> Option<u64> {
        self.last_fired_ms
    }

    pub fn config(&self) -> GateConfig {
        self.config
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.last_fired_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_on_second_of_three_positives() {
        let mut gate = ConsecutiveGate::new(GateConfig {
            consecutive_required: 2,
            cooldown_ms: 0,
        });
        let results: Vec<bool> = (0..3).map(|i| gate.observe(true, i * 46)).collect();
        assert_eq!(results, vec![false, true, false]);
        assert_eq!(gate.consecutive(), 1);
    }

    #[test]
    fn test_negative_breaks_streak() {
        let mut gate = ConsecutiveGate::new(GateConfig {
            consecutive_required: 2,
            cooldown_ms: 0,
        });
        assert!(!gate.observe(true, 0));
        assert!(!gate.observe(false, 46));
        assert!(!gate.observe(true, 92));
        assert!(gate.observe(true, 138));
    }

    #[test]
    fn test_cooldown_ignores_windows() {
        let mut gate = ConsecutiveGate::new(GateConfig {
            consecutive_required: 1,
            cooldown_ms: 1000,
        });
        assert!(gate.observe(true, 0));
        assert!(!gate.observe(true, 500));
        assert!(!gate.observe(true, 999));
        assert!(gate.observe(true, 1000));
    }

    #[test]
    fn test_reset_clears_streak_and_cooldown() {
        let mut gate = ConsecutiveGate::new(GateConfig {
            consecutive_required: 1,
            cooldown_ms: 10_000,
        });
        assert!(gate.observe(true, 0));
        gate.reset();
        assert!(gate.observe(true, 10));
    }
}
