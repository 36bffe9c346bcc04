use std::collections::BTreeMap;

use crate::{Detection, EventKind};

/// Human-readable age of the last detection.
pub fn describe_last_detection(last_ms: Option<u64>, now_ms: u64) -> String {
    match last_ms {
        Some(at) => format!("last detection {}s ago", now_ms.saturating_sub(at) / 1000),
        None => "no detection yet".to_string(),
    }
}

/// Last detection time per event kind, for display only.
#[derive(Debug, Clone, Default)]
pub struct DetectionHistory {
    last: BTreeMap<EventKind, u64>,
}

impl DetectionHistory {
    pub fn record(&mut self, detection: &Detection) {
        let entry = self.last.entry(detection.kind).or_insert(detection.at_ms);
        *entry = (*entry).max(detection.at_ms);
    }

    pub fn last_detection_ms(&self, kind: EventKind) -> Option<u64> {
        self.last.get(&kind).copied()
    }

    pub fn describe(&self, kind: EventKind, now_ms: u64) -> String {
        format!(
            "{kind}: {}",
            describe_last_detection(self.last_detection_ms(kind), now_ms)
        )
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }
}
