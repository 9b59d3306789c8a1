//! Bounded edit distance for fuzzy token lookups.
//!
//! Distances are counted over bytes: an insertion, deletion or
//! substitution of one byte costs one edit. With that unit a token within
//! `k` edits never differs in length by more than `k`, which is what lets
//! the reader restrict a fuzzy scan to `2k + 1` length buckets.
//!
//! A non-ASCII character takes several bytes, so replacing one costs more
//! than one edit: `cafe` and `café` are two edits apart, not one.

/// Levenshtein distance between `a` and `b` if it is at most `max`.
///
/// Only the diagonal band of width `2 * max + 1` is evaluated and the
/// computation stops as soon as a whole row exceeds `max`.
pub fn bounded_distance(a: &[u8], b: &[u8], max: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        return Some(a.len().max(b.len()));
    }

    // Cells outside the band act as "too far"
    let over = max.saturating_add(1);
    let width = b.len() + 1;
    let mut prev: Vec<usize> = (0..width).map(|j| j.min(over)).collect();
    let mut curr = vec![over; width];

    for i in 1..=a.len() {
        let lo = i.saturating_sub(max).max(1);
        let hi = i.saturating_add(max).min(b.len());

        curr.fill(over);
        curr[0] = i.min(over);
        let mut row_min = curr[0];

        for j in lo..=hi {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let value = (prev[j - 1] + cost)
                .min(prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(over);
            curr[j] = value;
            row_min = row_min.min(value);
        }

        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[b.len()];
    (distance <= max).then_some(distance)
}

/// Whether `a` and `b` are at most `max` edits apart
#[inline]
pub fn within_distance(a: &[u8], b: &[u8], max: usize) -> bool {
    if max == 0 {
        return a == b;
    }
    bounded_distance(a, b, max).is_some()
}
