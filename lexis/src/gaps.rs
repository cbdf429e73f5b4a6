//! Delta-encoded sorted sets
//!
//! `gaps[0]` is absolute, every later entry is the distance to its predecessor.
//! Postings lists and wildcard entries are kept in this form before they are
//! varbyte encoded.

/// Insert `id` keeping the set sorted. Returns `false` if it was already present.
pub fn insert(gaps: &mut Vec<u64>, id: u64) -> bool {
    let mut previous = 0u64;
    for i in 0..gaps.len() {
        let current = previous + gaps[i];
        if current == id {
            return false;
        }
        if id < current {
            gaps[i] = current - id;
            gaps.insert(i, id - previous);
            return true;
        }
        previous = current;
    }
    gaps.push(id - previous);
    true
}

/// Remove `id`. Returns `false` if it was not present.
pub fn remove(gaps: &mut Vec<u64>, id: u64) -> bool {
    let mut previous = 0u64;
    for i in 0..gaps.len() {
        let current = previous + gaps[i];
        if current == id {
            let removed = gaps.remove(i);
            if let Some(next) = gaps.get_mut(i) {
                *next += removed;
            }
            return true;
        }
        if current > id {
            return false;
        }
        previous = current;
    }
    false
}

pub fn to_gaps(sorted: &[u64]) -> Vec<u64> {
    let mut previous = 0u64;
    sorted
        .iter()
        .map(|&value| {
            let gap = value - previous;
            previous = value;
            gap
        })
        .collect()
}

pub fn from_gaps(gaps: &[u64]) -> Vec<u64> {
    let mut running = 0u64;
    gaps.iter()
        .map(|&gap| {
            running += gap;
            running
        })
        .collect()
}
