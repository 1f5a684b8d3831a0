//! Verification entry points
//!
//! Composes a browser session with the target matcher: one page render, one
//! frozen log, one report. The report owns copies of the matched events; no
//! session-scoped browser resource ever reaches the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matcher::{match_target, match_targets, MatchResult};
use crate::session::run_session;
use crate::CaptureConfig;

/// Per-target verification results for one checked website
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// The website that was rendered
    pub website_url: String,
    /// One result per requested target pattern
    pub results: BTreeMap<String, MatchResult>,
}

impl VerificationReport {
    /// Result for one pattern, if it was part of this report
    pub fn result(&self, pattern: &str) -> Option<&MatchResult> {
        self.results.get(pattern)
    }

    /// Patterns that were found on the page
    pub fn found(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, r)| r.found)
            .map(|(p, _)| p.as_str())
    }

    /// Patterns that were not found on the page
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, r)| !r.found)
            .map(|(p, _)| p.as_str())
    }
}

/// Check whether a single target URL pattern loads on `website_url`.
///
/// Thin wrapper over the batch path: one browser session, one pattern.
pub async fn check_single(website_url: &str, pattern: &str, headless: bool) -> Result<MatchResult> {
    let config = CaptureConfig {
        headless,
        ..Default::default()
    };
    check_single_with_config(website_url, pattern, &config).await
}

/// `check_single` with full control over the capture configuration
pub async fn check_single_with_config(
    website_url: &str,
    pattern: &str,
    config: &CaptureConfig,
) -> Result<MatchResult> {
    let log = run_session(website_url, config).await?;
    Ok(match_target(&log, pattern))
}

/// Check a whole set of target URL patterns against `website_url`.
///
/// Runs exactly ONE browser session for the whole set and matches every
/// pattern against the same page render, so results are comparable across
/// targets and the page is never re-navigated per pattern.
pub async fn check_batch<I, S>(
    website_url: &str,
    patterns: I,
    headless: bool,
) -> Result<VerificationReport>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let config = CaptureConfig {
        headless,
        ..Default::default()
    };
    check_batch_with_config(website_url, patterns, &config).await
}

/// `check_batch` with full control over the capture configuration
pub async fn check_batch_with_config<I, S>(
    website_url: &str,
    patterns: I,
    config: &CaptureConfig,
) -> Result<VerificationReport>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let log = run_session(website_url, config).await?;
    Ok(VerificationReport {
        website_url: website_url.to_string(),
        results: match_targets(&log, patterns),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{InitiatorType, NetworkEvent, NetworkLog};

    fn log_with(urls: &[&str]) -> NetworkLog {
        NetworkLog::from_events(
            urls.iter()
                .enumerate()
                .map(|(i, url)| NetworkEvent {
                    id: format!("r{}", i),
                    url: url.to_string(),
                    method: "GET".to_string(),
                    status: Some(200),
                    status_text: Some("OK".to_string()),
                    error: None,
                    blocked_reason: None,
                    initiator_type: InitiatorType::Script,
                    initiator_url: None,
                    call_stack: vec![],
                    sequence_number: i as u64,
                })
                .collect(),
        )
    }

    #[test]
    fn report_partitions_found_and_missing() {
        let log = log_with(&[
            "https://js.stripe.com/v3/",
            "https://cdn.example.com/app.js",
        ]);
        let report = VerificationReport {
            website_url: "https://shop.example/".to_string(),
            results: match_targets(&log, ["js.stripe.com", "widget.example"]),
        };

        assert_eq!(report.found().collect::<Vec<_>>(), vec!["js.stripe.com"]);
        assert_eq!(report.missing().collect::<Vec<_>>(), vec!["widget.example"]);
        assert!(report.result("js.stripe.com").unwrap().found);
    }
}
