//!
//! src/partition.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Splits a pass' work items into one contiguous shard per credential
//!

/// Items permanently bound to one credential for a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkShard<T> {
    pub index: usize,
    pub items: Vec<T>
}

/// Contiguous split into `n` shards whose sizes differ by at most one;
/// the first `len % n` shards carry the extra item
pub fn partition<T>(items: Vec<T>, n: usize) -> Vec<WorkShard<T>> {
    if n == 0 {
        return Vec::new();
    }
    let base = items.len() / n;
    let extra = items.len() % n;

    let mut rest = items.into_iter();
    (0..n)
        .map(|index| {
            let size = base + usize::from(index < extra);
            WorkShard { index, items: rest.by_ref().take(size).collect() }
        })
        .collect()
}
