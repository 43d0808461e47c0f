use std::collections::VecDeque;
use std::time::Duration;

/// Time-bounded moving average over recent raw pressure values.
///
/// Entries older than `duration` (relative to the newest insert) are evicted
/// on every push, and a hard `capacity` caps the buffer should samples
/// arrive faster than planned. The mean is kept as a running sum, so each
/// push is O(1) amortized and memory never depends on uptime.
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    entries: VecDeque<(f64, f64)>,
    duration_secs: f64,
    capacity: usize,
    sum: f64,
    pushes_since_resum: usize,
}

impl SmoothingWindow {
    pub fn new(duration: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::new(),
            duration_secs: duration.as_secs_f64(),
            capacity,
            sum: 0.0,
            pushes_since_resum: 0,
        }
    }

    /// Capacity for `duration` sampled every `interval`, with room for jitter.
    pub fn capacity_for(duration: Duration, interval: Duration) -> usize {
        let interval = interval.as_secs_f64().max(0.001);
        let expected = ((duration.as_secs_f64() / interval).ceil() as usize).saturating_add(1);
        expected.saturating_mul(2)
    }

    /// Insert `value` observed at `at` (monotonic seconds) and return the new mean.
    pub fn push(&mut self, at: f64, value: f64) -> f64 {
        let cutoff = at - self.duration_secs;
        while let Some(&(t, v)) = self.entries.front() {
            if t >= cutoff && self.entries.len() < self.capacity {
                break;
            }
            self.entries.pop_front();
            self.sum -= v;
        }

        self.entries.push_back((at, value));
        self.sum += value;

        // Subtracting floats forever drifts; rebuild the sum now and then.
        self.pushes_since_resum += 1;
        if self.pushes_since_resum >= self.capacity {
            self.sum = self.entries.iter().map(|&(_, v)| v).sum();
            self.pushes_since_resum = 0;
        }

        self.mean().unwrap_or(value)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        Some((self.sum / self.entries.len() as f64).clamp(0.0, 100.0))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sum = 0.0;
        self.pushes_since_resum = 0;
    }
}
