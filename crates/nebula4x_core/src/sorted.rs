//! Sorted-key iteration: the sole determinism primitive for anything that walks a
//! hash-keyed container and does something observable (emits an event, mutates a
//! second map, accumulates floating point). `HashMap`/`ahash` iteration order is not
//! part of this engine's contract; every pass that matters sorts first.

use ahash::AHashMap;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Returns the map's keys in ascending order.
pub fn sorted_keys<K, V>(map: &HashMap<K, V>) -> Vec<K>
where
    K: Ord + Copy + Eq + Hash,
{
    let mut keys: Vec<K> = map.keys().copied().collect();
    keys.sort_unstable();
    keys
}

/// Same as [`sorted_keys`] but for `ahash::AHashMap`.
pub fn sorted_keys_ahash<K, V>(map: &AHashMap<K, V>) -> Vec<K>
where
    K: Ord + Copy + Eq + Hash,
{
    let mut keys: Vec<K> = map.keys().copied().collect();
    keys.sort_unstable();
    keys
}

/// Returns a set's members in ascending order.
pub fn sorted_set<K>(set: &HashSet<K>) -> Vec<K>
where
    K: Ord + Copy + Eq + Hash,
{
    let mut items: Vec<K> = set.iter().copied().collect();
    items.sort_unstable();
    items
}

/// Stable, extended-precision sum over `(key, value)` pairs in ascending key order.
/// Accumulates in `f64` even when the caller's working type is narrower, matching
/// the engine-wide "stable numeric reduction" discipline for non-negative sums.
pub fn stable_sum_by_key<K, V, F>(map: &HashMap<K, V>, mut project: F) -> f64
where
    K: Ord + Copy + Eq + Hash,
    F: FnMut(&K, &V) -> f64,
{
    let mut keys = sorted_keys(map);
    keys.sort_unstable();
    let mut acc = 0.0_f64;
    for k in keys {
        if let Some(v) = map.get(&k) {
            acc += project(&k, v);
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_keys_ascending() {
        let mut m = HashMap::new();
        m.insert(5, "e");
        m.insert(1, "a");
        m.insert(3, "c");
        assert_eq!(sorted_keys(&m), vec![1, 3, 5]);
    }

    #[test]
    fn stable_sum_matches_naive_sum_for_small_sets() {
        let mut m = HashMap::new();
        for i in 0..20 {
            m.insert(i, i as f64 * 0.5);
        }
        let total = stable_sum_by_key(&m, |_, v| *v);
        let expected: f64 = (0..20).map(|i| i as f64 * 0.5).sum();
        assert!((total - expected).abs() < 1e-9);
    }
}
