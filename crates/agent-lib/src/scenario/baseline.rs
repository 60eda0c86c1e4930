//! Sliding-window baseline
//!
//! Keeps the most recent readings of one signal and derives an adaptive
//! threshold as `mean(window) - margin`.

use std::collections::VecDeque;

use crate::models::Reading;

/// Default number of readings retained per signal
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// Fixed-capacity FIFO of recent readings for one signal
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create an empty window holding at most `capacity` readings
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a reading, evicting the oldest one once full.
    ///
    /// Absent readings are ignored: they neither enter the window nor
    /// evict an entry.
    pub fn observe(&mut self, value: Reading) {
        let Some(value) = value else {
            return;
        };
        if self.capacity == 0 {
            return;
        }

        while self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean of the window, `None` when empty
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Dynamic threshold `mean - margin`, `None` when empty
    pub fn threshold(&self, margin: f64) -> Option<f64> {
        self.mean().map(|mean| mean - margin)
    }

    /// Readings in observation order, oldest first
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}
