//! Target Matching
//!
//! Partitions a frozen network log by caller-supplied URL patterns. Matching
//! is exact, case-sensitive substring containment against the event URL - a
//! deliberately simple, auditable rule rather than URL-semantic comparison.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capture::{NetworkEvent, NetworkLog};

/// Verification outcome for one target pattern
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResult {
    /// Whether any captured request matched the pattern
    pub found: bool,
    /// Matching events keyed by their unique request id. Two requests racing
    /// to the same URL stay distinct because their ids differ.
    pub matching_requests: BTreeMap<String, NetworkEvent>,
}

impl MatchResult {
    fn record(&mut self, event: &NetworkEvent) {
        self.matching_requests
            .insert(event.id.clone(), event.clone());
        self.found = true;
    }
}

/// Match every pattern against the full log.
///
/// The log is scanned once and reused for all patterns, so every pattern is
/// evaluated against the same page render and cross-target comparisons are
/// meaningful. A pattern with zero matches yields `found = false` with an
/// empty map - a normal, reportable outcome, not an error. No early exit: a
/// target may legitimately be requested more than once.
pub fn match_targets<I, S>(log: &NetworkLog, patterns: I) -> BTreeMap<String, MatchResult>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut results: BTreeMap<String, MatchResult> = patterns
        .into_iter()
        .map(|p| (p.into(), MatchResult::default()))
        .collect();

    for event in log.iter() {
        for (pattern, result) in results.iter_mut() {
            if event.url.contains(pattern.as_str()) {
                result.record(event);
            }
        }
    }

    results
}

/// Match a single pattern against the log
pub fn match_target(log: &NetworkLog, pattern: &str) -> MatchResult {
    match_targets(log, [pattern])
        .remove(pattern)
        .unwrap_or_default()
}
