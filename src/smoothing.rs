// src/smoothing.rs - Moving-average filter for the overlay anchor
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 5;

/// Fixed-window moving average over 2D canvas points.
///
/// Inputs are not validated: a NaN or infinite coordinate propagates into every
/// output until it leaves the window (or `reset` is called).
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    history: VecDeque<(f64, f64)>,
    capacity: usize,
}

impl SmoothingFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn smooth(&mut self, x: f64, y: f64) -> (f64, f64) {
        self.history.push_back((x, y));
        if self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let n = self.history.len() as f64;
        let (sum_x, sum_y) = self
            .history
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (px, py)| (sx + px, sy + py));

        (sum_x / n, sum_y / n)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
