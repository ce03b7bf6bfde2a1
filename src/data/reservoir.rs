use super::Snapshot;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// The percentiles computed over the retained sample, with their labels.
const PERCENTILES: [(&str, u8); 3] = [("p50", 50), ("p90", 90), ("p99", 99)];

/// A single generation of sampled values.
///
/// Holds up to `capacity` values.  Past that point, every new value replaces a random slot with a
/// probability of `capacity / count`, so the retained items are always a uniform sample of
/// everything recorded.  Count, min and max are tracked over every recorded value.
pub(crate) struct Reservoir {
    inner: Mutex<State>,
}

struct State {
    items: Vec<f64>,
    capacity: usize,
    count: u64,
    min: f64,
    max: f64,
    rng: SmallRng,
}

impl Reservoir {
    pub(crate) fn new(capacity: usize, seed: u64) -> Reservoir {
        Reservoir {
            inner: Mutex::new(State {
                items: Vec::with_capacity(capacity),
                capacity,
                count: 0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
                rng: SmallRng::seed_from_u64(seed),
            }),
        }
    }

    pub(crate) fn record(&self, value: f64) {
        // Nothing can leave the state half-written, so a poisoned lock is still usable.
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.record(value);
    }

    /// Computes the statistics for this generation.
    ///
    /// Returns an empty snapshot if nothing was recorded.
    pub(crate) fn read(&self) -> Snapshot {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.read()
    }

    #[cfg(test)]
    pub(crate) fn retained(&self) -> Vec<f64> {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.items.clone()
    }
}

impl State {
    fn record(&mut self, value: f64) {
        self.count += 1;

        if self.items.len() < self.capacity {
            self.items.push(value);
        } else {
            let i = self.rng.gen_range(0..self.count);
            if i < self.capacity as u64 {
                self.items[i as usize] = value;
            }
        }

        if value < self.min {
            self.min = value;
        }

        if value > self.max {
            self.max = value;
        }
    }

    fn read(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        if self.count == 0 || self.items.is_empty() {
            return snapshot;
        }

        let mut items = self.items.clone();
        items.sort_by(f64::total_cmp);

        snapshot.insert("count", self.count as f64);
        snapshot.insert("p00", self.min);
        for &(label, p) in PERCENTILES.iter() {
            snapshot.insert(label, items[percentile_index(items.len(), p)]);
        }
        snapshot.insert("pmx", self.max);

        snapshot
    }
}

/// Nearest-rank index of the `p`th percentile in a sorted sample of `n` items.
///
/// The index is computed in single precision and truncated, which keeps the output identical to
/// what existing dashboards have been fed.
pub(crate) fn percentile_index(n: usize, p: u8) -> usize {
    let index = (n as f32) / 100.0 * f32::from(p);
    (index as usize).min(n - 1)
}

#[cfg(test)]
mod tests {
    use super::{percentile_index, Reservoir};

    #[test]
    fn test_reservoir_empty_read() {
        let reservoir = Reservoir::new(10, 1);
        assert!(reservoir.read().is_empty());
    }

    #[test]
    fn test_reservoir_exact_retention_below_capacity() {
        let reservoir = Reservoir::new(100, 1);
        let values = [3.0, -1.5, 7.25, 0.0, 42.0];
        for v in values.iter() {
            reservoir.record(*v);
        }

        assert_eq!(reservoir.retained(), values.to_vec());

        let snapshot = reservoir.read();
        assert_eq!(snapshot.get("count"), Some(5.0));
        assert_eq!(snapshot.get("p00"), Some(-1.5));
        assert_eq!(snapshot.get("pmx"), Some(42.0));
    }

    #[test]
    fn test_reservoir_bounded_memory() {
        let reservoir = Reservoir::new(100, 7);
        for i in 0..10_000 {
            reservoir.record(f64::from(i));
        }

        let retained = reservoir.retained();
        assert_eq!(retained.len(), 100);
        assert!(retained.iter().all(|v| *v >= 0.0 && *v < 10_000.0));
        assert_eq!(reservoir.read().get("count"), Some(10_000.0));
    }

    #[test]
    fn test_reservoir_sampling_replaces_items() {
        let reservoir = Reservoir::new(10, 3);
        for i in 0..10_000 {
            reservoir.record(f64::from(i));
        }

        // With 10k values offered to 10 slots, the odds of every original slot surviving are nil.
        let retained = reservoir.retained();
        assert!(retained.iter().any(|v| *v >= 10.0));
    }

    #[test]
    fn test_reservoir_min_max_over_all_values() {
        let reservoir = Reservoir::new(10, 11);
        for i in 0..10_000 {
            reservoir.record(f64::from(i) - 5_000.0);
        }

        let snapshot = reservoir.read();
        assert_eq!(snapshot.get("p00"), Some(-5_000.0));
        assert_eq!(snapshot.get("pmx"), Some(4_999.0));
        assert_eq!(snapshot.get("count"), Some(10_000.0));
    }

    #[test]
    fn test_reservoir_negative_max() {
        let reservoir = Reservoir::new(10, 1);
        reservoir.record(-3.0);
        reservoir.record(-2.0);

        let snapshot = reservoir.read();
        assert_eq!(snapshot.get("pmx"), Some(-2.0));
        assert_eq!(snapshot.get("p00"), Some(-3.0));
    }

    #[test]
    fn test_reservoir_percentiles() {
        let reservoir = Reservoir::new(10, 1);
        for i in (1..=10).rev() {
            reservoir.record(f64::from(i));
        }

        let snapshot = reservoir.read();
        assert_eq!(snapshot.len(), 6);
        assert_eq!(snapshot.get("count"), Some(10.0));
        assert_eq!(snapshot.get("p00"), Some(1.0));
        assert_eq!(snapshot.get("p50"), Some(6.0));
        assert_eq!(snapshot.get("p90"), Some(10.0));
        assert_eq!(snapshot.get("p99"), Some(10.0));
        assert_eq!(snapshot.get("pmx"), Some(10.0));
    }

    #[test]
    fn test_reservoir_nan_sorts_last() {
        let reservoir = Reservoir::new(100, 1);
        for i in 1..=10 {
            reservoir.record(f64::from(i));
            if i % 2 == 0 {
                reservoir.record(f64::NAN);
            }
        }

        // 15 retained values: 1..=10 followed by five NaNs once sorted.
        let snapshot = reservoir.read();
        assert_eq!(snapshot.get("count"), Some(15.0));
        assert_eq!(snapshot.get("p00"), Some(1.0));
        assert_eq!(snapshot.get("p50"), Some(8.0));
        assert!(snapshot.get("p90").unwrap().is_nan());
        assert_eq!(snapshot.get("pmx"), Some(10.0));
    }

    #[test]
    fn test_reservoir_deterministic_for_seed() {
        let a = Reservoir::new(5, 99);
        let b = Reservoir::new(5, 99);
        for i in 0..1_000 {
            a.record(f64::from(i));
            b.record(f64::from(i));
        }

        assert_eq!(a.retained(), b.retained());
    }

    #[test]
    fn test_percentile_index() {
        assert_eq!(percentile_index(10, 50), 5);
        assert_eq!(percentile_index(10, 90), 9);
        assert_eq!(percentile_index(10, 99), 9);
        assert_eq!(percentile_index(1, 99), 0);
        assert_eq!(percentile_index(1000, 50), 500);
        assert_eq!(percentile_index(1000, 99), 990);
        assert_eq!(percentile_index(3, 50), 1);
    }
}
