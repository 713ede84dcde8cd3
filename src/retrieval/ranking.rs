//! Merge and ranking of per-tier results

use crate::memory::MemoryRecord;
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

/// A retrieved record with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub record: MemoryRecord,
    pub score: f32,
}

/// Total order: score descending, then newest `created_at`, then id.
fn compare(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.record.created_at().cmp(&a.record.created_at()))
        .then_with(|| a.record.id().cmp(&b.record.id()))
}

/// Merge results from all tiers, drop duplicate ids (keeping the best
/// score), sort, and truncate to `cap`.
pub fn rank(results: Vec<ScoredResult>, cap: usize) -> Vec<ScoredResult> {
    let mut best: HashMap<Uuid, ScoredResult> = HashMap::with_capacity(results.len());
    for result in results {
        let id = result.record.id();
        let keep_existing = best
            .get(&id)
            .map(|existing| compare(existing, &result) != Ordering::Greater)
            .unwrap_or(false);
        if !keep_existing {
            best.insert(id, result);
        }
    }

    let mut merged: Vec<ScoredResult> = best.into_values().collect();
    merged.sort_by(compare);
    merged.truncate(cap);
    merged
}
