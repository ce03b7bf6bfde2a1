use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use std::iter::FromIterator;

pub mod distribution;
pub mod reservoir;

pub use self::distribution::{Distribution, DEFAULT_DISTRIBUTION_SIZE};

/// A point-in-time view of metric data.
///
/// Maps a metric name to its value for a single flush.  Snapshots are produced by
/// [`Distribution::read_meter`], merged together by whoever owns the metrics, and handed whole to
/// a reporter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    values: HashMap<String, f64, FnvBuildHasher>,
}

impl Snapshot {
    /// Creates an empty `Snapshot`.
    pub fn new() -> Snapshot { Snapshot::default() }

    /// Stores a value for the given metric key, replacing any previous value.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: f64) { self.values.insert(key.into(), value); }

    /// Gets the value for the given metric key.
    ///
    /// Returns `None` if the metric key has no value in this snapshot.
    pub fn get(&self, key: &str) -> Option<f64> { self.values.get(key).cloned() }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Iterates over every metric in this snapshot, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> { self.values.iter().map(|(k, v)| (k.as_str(), *v)) }

    /// Folds `other` into this snapshot under the given scope.
    ///
    /// Scoping controls the resulting metric name: merging a distribution's snapshot under
    /// `db.query` yields `db.query.count`, `db.query.p50` and so on.  An empty scope keeps the
    /// original names.  Values already present under the same name are overwritten.
    pub fn merge(&mut self, scope: &str, other: Snapshot) {
        for (key, value) in other.values {
            let fkey = if scope.is_empty() {
                key
            } else {
                format!("{}.{}", scope, key)
            };
            self.values.insert(fkey, value);
        }
    }
}

impl FromIterator<(String, f64)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Snapshot {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, f64);
    type IntoIter = hashbrown::hash_map::IntoIter<String, f64>;

    fn into_iter(self) -> Self::IntoIter { self.values.into_iter() }
}
