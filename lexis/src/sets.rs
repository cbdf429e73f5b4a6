//! Set algebra over result lists and token streams.
//!
//! Result lists are plain vectors whose identity is given by a key
//! extractor; merges decide what survives when both sides carry a key.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Stable de-duplication, first occurrence wins.
pub fn unique_by<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

/// Elements of `a` (deduplicated) whose key also appears in `b`, merged with
/// the first matching element of `b`. A merge returning `None` drops the entry.
pub fn intersect_by<T, K, F, M>(a: Vec<T>, b: &[T], key: F, mut merge: M) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    M: FnMut(T, &T) -> Option<T>,
{
    let mut lookup: HashMap<K, usize> = HashMap::with_capacity(b.len());
    for (i, item) in b.iter().enumerate() {
        lookup.entry(key(item)).or_insert(i);
    }

    unique_by(a, &key)
        .into_iter()
        .filter_map(|item| {
            let other = *lookup.get(&key(&item))?;
            merge(item, &b[other])
        })
        .collect()
}

/// One entry per distinct key across `a` then `b`, in first-seen order.
/// Keys present on both sides go through `merge`.
pub fn union_by<T, K, F, M>(a: Vec<T>, b: Vec<T>, key: F, mut merge: M) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    M: FnMut(T, T) -> Option<T>,
{
    let mut right: Vec<Option<T>> = unique_by(b, &key).into_iter().map(Some).collect();
    let mut lookup: HashMap<K, usize> = HashMap::with_capacity(right.len());
    for (i, item) in right.iter().enumerate() {
        if let Some(item) = item {
            lookup.insert(key(item), i);
        }
    }

    let mut out = Vec::new();
    for item in unique_by(a, &key) {
        let matched = lookup.get(&key(&item)).and_then(|&i| right[i].take());
        match matched {
            Some(other) => out.extend(merge(item, other)),
            None => out.push(item),
        }
    }
    out.extend(right.into_iter().flatten());
    out
}

/// Elements of `a` whose key is absent from `b`.
pub fn minus_by<T, K, F>(a: Vec<T>, b: &[T], key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let excluded: HashSet<K> = b.iter().map(&key).collect();
    a.into_iter().filter(|item| !excluded.contains(&key(item))).collect()
}

/// Start index of the first contiguous occurrence of `needle` in `hay`.
pub fn contains<A, B, C>(hay: &[A], needle: &[B], cmp: C) -> Option<usize>
where
    C: Fn(&A, &B) -> bool,
{
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&start| {
        needle
            .iter()
            .enumerate()
            .all(|(offset, wanted)| cmp(&hay[start + offset], wanted))
    })
}

fn first_index<A, B, C>(all: &[A], needle: &B, cmp: &C) -> Option<usize>
where
    C: Fn(&A, &B) -> bool,
{
    all.iter().position(|item| cmp(item, needle))
}

/// True if some element of `before` first occurs in `all` at or before the
/// first occurrence of some element of `after`.
pub fn ordered<A, B, C>(all: &[A], before: &[B], after: &[B], cmp: C) -> bool
where
    C: Fn(&A, &B) -> bool,
{
    let latest_after = after.iter().filter_map(|y| first_index(all, y, &cmp)).max();
    let earliest_before = before.iter().filter_map(|x| first_index(all, x, &cmp)).min();
    matches!((earliest_before, latest_after), (Some(b), Some(a)) if b <= a)
}

/// True if the gaps between the first occurrences of `needles` in `all` sum
/// to less than `max_span`. Needles that never occur are ignored.
pub fn proximity<A, B, C>(all: &[A], needles: &[B], max_span: u64, cmp: C) -> bool
where
    C: Fn(&A, &B) -> bool,
{
    let mut positions: Vec<usize> = needles
        .iter()
        .filter_map(|needle| first_index(all, needle, &cmp))
        .collect();
    positions.sort_unstable();
    positions.dedup();

    let span: u64 = positions
        .windows(2)
        .map(|pair| (pair[1] - pair[0] - 1) as u64)
        .sum();
    span < max_span
}

/// True if at least `n` of `needles` occur somewhere in `all`.
pub fn quorum<A, B, C>(all: &[A], needles: &[B], n: usize, cmp: C) -> bool
where
    C: Fn(&A, &B) -> bool,
{
    if n == 0 {
        return true;
    }
    needles
        .iter()
        .filter(|needle| first_index(all, *needle, &cmp).is_some())
        .take(n)
        .count()
        >= n
}
