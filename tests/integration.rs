//! Integration tests for loadproof
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test integration -- --ignored

use std::time::Duration;

use loadproof::{check_batch, check_single, run_session, CaptureConfig};

/// Check if Chrome is available
fn chrome_available() -> bool {
    loadproof::cdp::find_chrome().is_ok()
}

#[tokio::test]
#[ignore = "requires Chrome and network access"]
async fn session_captures_page_traffic() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let config = CaptureConfig::default();
    let log = run_session("https://example.com/", &config)
        .await
        .expect("session should complete");

    // At minimum the document itself is requested
    assert!(!log.is_empty());
    assert!(log.iter().any(|e| e.url.contains("example.com")));
}

#[tokio::test]
#[ignore = "requires Chrome and network access"]
async fn check_single_finds_the_document() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let result = check_single("https://example.com/", "example.com", true)
        .await
        .expect("check should complete");

    assert!(result.found);
    assert!(!result.matching_requests.is_empty());
}

#[tokio::test]
#[ignore = "requires Chrome and network access"]
async fn batch_check_uses_one_render_for_all_patterns() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let report = check_batch(
        "https://example.com/",
        ["example.com", "definitely-not-on-this-page.example"],
        true,
    )
    .await
    .expect("check should complete");

    assert!(report.result("example.com").unwrap().found);
    assert!(!report
        .result("definitely-not-on-this-page.example")
        .unwrap()
        .found);
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn unreachable_host_is_a_navigation_failure() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let config = CaptureConfig {
        idle_timeout: Duration::from_secs(10),
        ..Default::default()
    };
    let result = run_session("https://does-not-resolve.invalid/", &config).await;

    assert!(matches!(result, Err(loadproof::Error::Navigation(_))));
}
