use super::{reservoir::Reservoir, Snapshot};
use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Used when a `Distribution` is created without an explicit size.
pub const DEFAULT_DISTRIBUTION_SIZE: usize = 1000;

/// Aggregates a metric over a distribution of values.
///
/// `record` will keep up to `capacity` values, after which new values are randomly sampled with
/// a probability that depends on the number of values recorded.  This keeps the memory footprint
/// of a distribution constant, and recording never allocates once the current generation exists.
///
/// `read_meter` computes percentiles over the sampled values, along with the count, min and max
/// over every value recorded since the previous read, and then starts over with an empty
/// generation.
///
/// `Distribution` is safe to share between any number of threads.  Writers only ever contend with
/// writers of the same generation: swapping generations on read is a single atomic exchange, and a
/// write that raced the exchange lands in the generation that was just detached.
pub struct Distribution {
    capacity: usize,
    sampling_seed: AtomicU64,
    state: Atomic<Reservoir>,
}

impl Distribution {
    /// Creates an empty `Distribution` holding up to `DEFAULT_DISTRIBUTION_SIZE` values.
    pub fn new() -> Distribution { Distribution::with_capacity(DEFAULT_DISTRIBUTION_SIZE) }

    /// Creates an empty `Distribution` holding up to `capacity` values per generation.
    ///
    /// A capacity of zero falls back to `DEFAULT_DISTRIBUTION_SIZE`.
    pub fn with_capacity(capacity: usize) -> Distribution {
        let capacity = if capacity == 0 { DEFAULT_DISTRIBUTION_SIZE } else { capacity };

        Distribution {
            capacity,
            sampling_seed: AtomicU64::new(0),
            state: Atomic::null(),
        }
    }

    /// Sets the initial seed used for sampling.
    ///
    /// Every generation is seeded with the next value after this one, so two distributions built
    /// with the same seed and fed the same values sample identically.
    pub fn with_seed(self, seed: u64) -> Distribution {
        self.sampling_seed.store(seed, Ordering::Relaxed);
        self
    }

    /// Maximum number of values retained per generation.
    pub fn capacity(&self) -> usize { self.capacity }

    /// Adds the given value to the distribution.
    pub fn record(&self, value: f64) {
        let guard = &epoch::pin();
        let mut current = self.state.load(Ordering::Acquire, guard);

        if current.is_null() {
            let fresh = Owned::new(self.new_reservoir());
            current = match self
                .state
                .compare_exchange(Shared::null(), fresh, Ordering::AcqRel, Ordering::Acquire, guard)
            {
                Ok(installed) => installed,
                Err(e) => e.current,
            };
        }

        // SAFETY: `current` is non-null and was loaded under `guard`.  Generations are only ever
        // destroyed through the epoch collector, so it stays alive until the guard is dropped.
        unsafe { current.deref() }.record(value);
    }

    /// Convenience wrapper around `record` for durations, recorded in nanoseconds.
    pub fn record_duration(&self, duration: Duration) { self.record(duration.as_nanos() as f64) }

    /// Computes `count`, `p00`, `p50`, `p90`, `p99` and `pmx` over the current generation and
    /// discards it.
    ///
    /// Percentiles are computed over the sampled values, while the count, min (`p00`) and max
    /// (`pmx`) cover every value recorded.  Returns an empty snapshot if nothing was recorded.
    pub fn read_meter(&self) -> Snapshot {
        let guard = &epoch::pin();
        let fresh = Owned::new(self.new_reservoir());
        let previous = self.state.swap(fresh, Ordering::AcqRel, guard);

        if previous.is_null() {
            return Snapshot::new();
        }

        // SAFETY: `previous` was detached by the swap above, so no new writer can observe it.
        // Writers that loaded it earlier are pinned, and destruction waits for them.
        unsafe {
            let snapshot = previous.deref().read();
            guard.defer_destroy(previous);
            snapshot
        }
    }

    fn new_reservoir(&self) -> Reservoir {
        let seed = self.sampling_seed.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        Reservoir::new(self.capacity, seed)
    }

    #[cfg(test)]
    fn retained(&self) -> Vec<f64> {
        let guard = &epoch::pin();
        let current = self.state.load(Ordering::Acquire, guard);
        match unsafe { current.as_ref() } {
            Some(reservoir) => reservoir.retained(),
            None => Vec::new(),
        }
    }
}

impl Default for Distribution {
    fn default() -> Distribution { Distribution::new() }
}

impl Drop for Distribution {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can be holding a reference into the state.
        unsafe {
            let guard = epoch::unprotected();
            let current = self.state.swap(Shared::null(), Ordering::AcqRel, guard);
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Distribution, DEFAULT_DISTRIBUTION_SIZE};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_distribution_default_capacity() {
        assert_eq!(Distribution::new().capacity(), DEFAULT_DISTRIBUTION_SIZE);
        assert_eq!(Distribution::with_capacity(0).capacity(), DEFAULT_DISTRIBUTION_SIZE);
        assert_eq!(Distribution::with_capacity(12).capacity(), 12);
    }

    #[test]
    fn test_distribution_read_without_records() {
        let dist = Distribution::new();
        assert!(dist.read_meter().is_empty());
        assert!(dist.read_meter().is_empty());
    }

    #[test]
    fn test_distribution_reset_on_read() {
        let dist = Distribution::with_capacity(10);
        dist.record(1.0);
        dist.record(2.0);

        let first = dist.read_meter();
        assert_eq!(first.get("count"), Some(2.0));
        assert!(dist.read_meter().is_empty());

        dist.record(5.0);
        let third = dist.read_meter();
        assert_eq!(third.get("count"), Some(1.0));
        assert_eq!(third.get("p00"), Some(5.0));
        assert_eq!(third.get("pmx"), Some(5.0));
    }

    #[test]
    fn test_distribution_exact_retention_below_capacity() {
        let dist = Distribution::with_capacity(100);
        for i in 0..50 {
            dist.record(f64::from(i));
        }

        let mut retained = dist.retained();
        retained.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected: Vec<f64> = (0..50).map(f64::from).collect();
        assert_eq!(retained, expected);

        let snapshot = dist.read_meter();
        assert_eq!(snapshot.get("count"), Some(50.0));
        assert_eq!(snapshot.get("p50"), Some(25.0));
    }

    #[test]
    fn test_distribution_bounded_memory() {
        let dist = Distribution::with_capacity(64);
        for i in 0..100_000 {
            dist.record(f64::from(i));
        }

        assert_eq!(dist.retained().len(), 64);

        let snapshot = dist.read_meter();
        assert_eq!(snapshot.get("count"), Some(100_000.0));
        assert_eq!(snapshot.get("p00"), Some(0.0));
        assert_eq!(snapshot.get("pmx"), Some(99_999.0));
    }

    #[test]
    fn test_distribution_percentile_formula() {
        let dist = Distribution::with_capacity(10);
        for i in &[7.0, 3.0, 10.0, 1.0, 5.0, 9.0, 2.0, 8.0, 4.0, 6.0] {
            dist.record(*i);
        }

        let snapshot = dist.read_meter();
        assert_eq!(snapshot.get("p00"), Some(1.0));
        assert_eq!(snapshot.get("p50"), Some(6.0));
        assert_eq!(snapshot.get("p90"), Some(10.0));
        assert_eq!(snapshot.get("p99"), Some(10.0));
        assert_eq!(snapshot.get("pmx"), Some(10.0));
    }

    #[test]
    fn test_distribution_record_duration() {
        let dist = Distribution::new();
        dist.record_duration(Duration::from_micros(3));

        let snapshot = dist.read_meter();
        assert_eq!(snapshot.get("p50"), Some(3_000.0));
    }

    #[test]
    fn test_distribution_seeded_generations_are_reproducible() {
        let a = Distribution::with_capacity(8).with_seed(42);
        let b = Distribution::with_capacity(8).with_seed(42);

        for _ in 0..3 {
            for i in 0..1_000 {
                a.record(f64::from(i));
                b.record(f64::from(i));
            }
            assert_eq!(a.read_meter(), b.read_meter());
        }
    }

    #[test]
    fn test_distribution_concurrent_record() {
        let dist = Arc::new(Distribution::with_capacity(100));
        let writers = 8;
        let per_writer = 10_000;

        let handles: Vec<_> = (0..writers)
            .map(|w| {
                let dist = dist.clone();
                thread::spawn(move || {
                    for i in 0..per_writer {
                        dist.record(f64::from(w * per_writer + i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = dist.read_meter();
        assert_eq!(snapshot.get("count"), Some(f64::from(writers * per_writer)));
        assert_eq!(snapshot.get("p00"), Some(0.0));
        assert_eq!(snapshot.get("pmx"), Some(f64::from(writers * per_writer - 1)));
    }

    #[test]
    fn test_distribution_concurrent_record_and_read() {
        let dist = Arc::new(Distribution::with_capacity(16));
        let writers = 4;
        let per_writer = 50_000;

        let handles: Vec<_> = (0..writers)
            .map(|_| {
                let dist = dist.clone();
                thread::spawn(move || {
                    for _ in 0..per_writer {
                        dist.record(1.0);
                    }
                })
            })
            .collect();

        let mut total = 0.0;
        for _ in 0..100 {
            total += dist.read_meter().get("count").unwrap_or(0.0);
            thread::yield_now();
        }

        for handle in handles {
            handle.join().unwrap();
        }
        total += dist.read_meter().get("count").unwrap_or(0.0);

        // Writes racing a swap may land in a detached generation after it was read, so only an
        // upper bound holds here.
        assert!(total <= f64::from(writers * per_writer));
        assert!(total > 0.0);
    }
}
