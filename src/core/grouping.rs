//! Grouped aggregation and broadcast join
//!
//! Every pass of the accessibility pipeline has the same shape: sum a value
//! over the edges sharing a key, then attach the per-key result back to each
//! of those edges. `KeyGroups` stores the edge indices per key once, so the
//! sums can run per key in parallel while each key is still summed in edge
//! order. That keeps results bit-identical across runs regardless of how
//! rayon schedules the work.

use std::hash::Hash;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Per-key aggregate produced by [`KeyGroups::sum`]
pub type Aggregate<K> = FxHashMap<K, f64>;

/// Edge indices grouped by key, keys in first-seen order
#[derive(Debug, Clone)]
pub struct KeyGroups<K> {
    keys: Vec<K>,
    members: Vec<Vec<usize>>,
    position: FxHashMap<K, usize>,
}

impl<K> KeyGroups<K>
where
    K: Copy + Eq + Hash + Send + Sync,
{
    /// Group `rows` by `key`
    pub fn build<T, F>(rows: &[T], key: F) -> Self
    where
        F: Fn(&T) -> K,
    {
        let mut keys = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        let mut position = FxHashMap::default();

        for (i, row) in rows.iter().enumerate() {
            let k = key(row);
            let slot = *position.entry(k).or_insert_with(|| {
                keys.push(k);
                members.push(Vec::new());
                keys.len() - 1
            });
            members[slot].push(i);
        }

        Self {
            keys,
            members,
            position,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Edge indices for one key
    pub fn members(&self, key: &K) -> Option<&[usize]> {
        self.position.get(key).map(|&slot| self.members[slot].as_slice())
    }

    /// Iterate `(key, member indices)` in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (K, &[usize])> + '_ {
        self.keys
            .iter()
            .copied()
            .zip(self.members.iter().map(Vec::as_slice))
    }

    /// Number of rows per key
    pub fn counts(&self) -> FxHashMap<K, usize> {
        self.iter().map(|(k, m)| (k, m.len())).collect()
    }

    /// Sum `value` over each key's rows
    ///
    /// `rows` must be the same slice (or a stage derived from it with order
    /// preserved) the groups were built from.
    pub fn sum<T, F>(&self, rows: &[T], value: F) -> Aggregate<K>
    where
        T: Sync,
        F: Fn(&T) -> f64 + Sync,
    {
        self.keys
            .par_iter()
            .zip(self.members.par_iter())
            .map(|(&k, idx)| (k, idx.iter().map(|&i| value(&rows[i])).sum::<f64>()))
            .collect()
    }
}

/// Divide with the zero guard applied at every ratio in the pipeline
///
/// A zero (or non-finite) denominator yields `0.0` instead of infinity or NaN.
#[inline]
pub fn guarded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}
