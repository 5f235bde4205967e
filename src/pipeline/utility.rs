use std::collections::BTreeMap;

/// Groups items by an extracted key, preserving input order within each
/// group. The `BTreeMap` gives canonical key order, so downstream output is
/// deterministic regardless of input row order.
pub fn group_by_key<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}

/// Arithmetic mean over present values, skipping `None`. Returns `None` when
/// every value is absent, keeping "no data" distinct from zero.
pub fn mean_present(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values.into_iter().flatten() {
        sum += v;
        n += 1;
    }
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Rounds to a fixed number of decimal places for presentation columns.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
