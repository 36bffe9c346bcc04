//! Rolling sample window shared by the capture and analysis paths.
//!
//! One lock guards the ring. It is held only for the append or the copy,
//! never while a window is being analyzed.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

use crate::constants::RING_WINDOWS;

/// Copy of the most recent window plus the sample clock at copy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub samples: Vec<i16>,
    /// Samples pushed since creation or the last clear.
    pub total_pushed: u64,
}

struct Inner {
    ring: HeapRb<i16>,
    total_pushed: u64,
}

/// Fixed-capacity FIFO of samples (three analysis windows).
pub struct StreamingRingBuffer {
    window: usize,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for StreamingRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingRingBuffer")
            .field("window", &self.window)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl StreamingRingBuffer {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        let capacity = window * RING_WINDOWS;
        Self {
            window,
            capacity,
            inner: Mutex::new(Inner {
                ring: HeapRb::new(capacity),
                total_pushed: 0,
            }),
        }
    }

    // Ring contents are plain samples, valid after any interrupted push.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append samples, evicting the oldest on overflow.
    pub fn push(&self, samples: &[i16]) {
        // Anything older than the last `capacity` samples would be evicted anyway.
        let tail = &samples[samples.len().saturating_sub(self.capacity)..];
        let mut inner = self.lock();
        for sample in tail {
            inner.ring.push_overwrite(*sample);
        }
        inner.total_pushed += samples.len() as u64;
    }

    /// The most recent `window` samples, zero-padded at the front.
    pub fn snapshot_window(&self) -> Vec<i16> {
        self.snapshot().samples
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        let len = inner.ring.occupied_len();
        let take = len.min(self.window);

        let mut samples = Vec::with_capacity(self.window);
        samples.resize(self.window - take, 0);
        samples.extend(inner.ring.iter().skip(len - take).copied());

        Snapshot {
            samples,
            total_pushed: inner.total_pushed,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window_size(&self) -> usize {
        self.window
    }

    pub fn total_pushed(&self) -> u64 {
        self.lock().total_pushed
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.ring.clear();
        inner.total_pushed = 0;
    }
}
