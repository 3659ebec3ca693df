//! Contiguous range decomposition of orphaned ids

use super::OwnerRef;
use serde::Serialize;

/// Inclusive contiguous id interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct IdRange {
    pub start: OwnerRef,
    pub end: OwnerRef,
}

impl IdRange {
    pub fn single(id: OwnerRef) -> Self {
        Self { start: id, end: id }
    }

    /// Number of ids covered
    pub fn span(&self) -> u64 {
        (self.end as i128 - self.start as i128 + 1) as u64
    }

    pub fn contains(&self, id: OwnerRef) -> bool {
        self.start <= id && id <= self.end
    }

    /// True when `next` starts right after this range ends, or overlaps it
    fn touches(&self, next: &IdRange) -> bool {
        match self.end.checked_add(1) {
            Some(after) => next.start <= after,
            None => true,
        }
    }
}

impl std::fmt::Display for IdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Split ids into sorted, non-overlapping, non-adjacent ranges
pub fn decompose(ids: impl IntoIterator<Item = OwnerRef>) -> Vec<IdRange> {
    let mut sorted: Vec<OwnerRef> = ids.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();
    merge_ranges(sorted.into_iter().map(IdRange::single))
}

/// Merge any ranges that overlap or touch. Merging an already merged list
/// returns it unchanged.
pub fn merge_ranges(ranges: impl IntoIterator<Item = IdRange>) -> Vec<IdRange> {
    let mut ranges: Vec<IdRange> = ranges.into_iter().collect();
    ranges.sort_unstable();

    let mut merged: Vec<IdRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.touches(&range) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Range statistics over the orphaned id set.
///
/// `appears_sequential` is a heuristic, not a proof: few long runs of
/// consecutive ids suggest one bulk deletion (wipe, migration, cleanup
/// script) rather than players leaving over time.
#[derive(Debug, Clone, Serialize)]
pub struct IdPatternReport {
    pub ranges: Vec<IdRange>,
    pub orphaned_count: usize,
    pub range_count: usize,
    pub min_id: Option<OwnerRef>,
    pub max_id: Option<OwnerRef>,
    pub appears_sequential: bool,
    /// Ratio the decision was made with
    pub sequential_range_ratio: f64,
}

impl IdPatternReport {
    /// First `n` ranges, for display
    pub fn leading_ranges(&self, n: usize) -> &[IdRange] {
        &self.ranges[..self.ranges.len().min(n)]
    }
}

/// Decompose the orphaned ids and flag a likely mass deletion when
/// `range_count < orphaned_count * ratio`
pub fn analyze_patterns(
    ids: impl IntoIterator<Item = OwnerRef>,
    sequential_range_ratio: f64,
) -> IdPatternReport {
    let ranges = decompose(ids);
    let orphaned_count: usize = ranges.iter().map(|r| r.span() as usize).sum();
    let range_count = ranges.len();

    IdPatternReport {
        min_id: ranges.first().map(|r| r.start),
        max_id: ranges.last().map(|r| r.end),
        appears_sequential: (range_count as f64) < orphaned_count as f64 * sequential_range_ratio,
        orphaned_count,
        range_count,
        ranges,
        sequential_range_ratio,
    }
}
