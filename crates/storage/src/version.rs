//! Plugin version gate.

use std::cmp::Ordering;

/// Compare dot-separated versions component-wise.
///
/// The shorter version is padded with zero components, and components that
/// are not numbers count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Whether a plugin at `current` can read data written by `recorded`.
pub fn check_version(current: &str, recorded: &str) -> bool {
    compare_versions(current, recorded) != Ordering::Less
}
