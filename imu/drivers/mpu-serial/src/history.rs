use imu_traits::{Float, Reading};
use std::collections::VecDeque;

/// Bounded, insertion-ordered sample buffer. The oldest sample is evicted
/// once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct History<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        History {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: T) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }
}

/// Linearly increasing weights from `start` (oldest sample) to `end`
/// (newest sample).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSchedule {
    pub start: Float,
    pub end: Float,
}

impl Default for WeightSchedule {
    fn default() -> Self {
        WeightSchedule {
            start: 0.4,
            end: 1.0,
        }
    }
}

impl WeightSchedule {
    pub fn new(start: Float, end: Float) -> Self {
        WeightSchedule { start, end }
    }

    /// `n` evenly spaced weights, normalized to sum to 1.
    pub fn weights(&self, n: usize) -> Vec<Float> {
        let raw: Vec<Float> = match n {
            0 => return Vec::new(),
            1 => vec![self.start],
            _ => {
                let step = (self.end - self.start) / (n - 1) as Float;
                (0..n).map(|i| self.start + step * i as Float).collect()
            }
        };

        let total: Float = raw.iter().sum();
        if total <= 0.0 {
            // All-zero schedule degrades to a plain mean.
            return vec![1.0 / n as Float; n];
        }
        raw.into_iter().map(|w| w / total).collect()
    }
}

impl History<Reading> {
    /// Weighted mean of the buffered readings, `None` when empty.
    pub fn weighted_mean(&self, schedule: &WeightSchedule) -> Option<Reading> {
        if self.is_empty() {
            return None;
        }

        let weights = schedule.weights(self.len());
        let (x, y) = self
            .iter()
            .zip(weights)
            .fold((0.0, 0.0), |(x, y), (r, w)| (x + r.x * w, y + r.y * w));
        Some(Reading::new(x, y))
    }
}
