//! # Loadproof
//!
//! Verify that third-party scripts actually load on a live page.
//!
//! Loadproof drives a real headless Chrome page load over a custom CDP
//! (Chrome DevTools Protocol) implementation, records every network request
//! the render generates together with its triggering call stack, and matches
//! your target URL patterns against the captured traffic. Static code
//! inspection can show that an integration *should* load; loadproof shows
//! whether it *did*, and which code or markup pulled it in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use loadproof::{check_batch, format_call_stack};
//!
//! #[tokio::main]
//! async fn main() -> loadproof::Result<()> {
//!     // One page render, every pattern checked against the same traffic
//!     let report = check_batch(
//!         "https://shop.example/",
//!         ["js.stripe.com/v3", "widget.intercom.io"],
//!         true,
//!     )
//!     .await?;
//!
//!     for (pattern, result) in &report.results {
//!         println!("{}: found = {}", pattern, result.found);
//!         for event in result.matching_requests.values() {
//!             println!("  {} {:?}", event.url, event.status);
//!             println!("{}", format_call_stack(&event.call_stack));
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use loadproof::{check_batch_with_config, CaptureConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> loadproof::Result<()> {
//! let config = CaptureConfig {
//!     headless: true,
//!     idle_timeout: Duration::from_secs(60),
//!     ..Default::default()
//! };
//!
//! let report =
//!     check_batch_with_config("https://shop.example/", ["js.stripe.com"], &config).await?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod cdp;
pub mod error;
pub mod matcher;
pub mod services;
pub mod session;
pub mod stack;
pub mod verify;

use std::time::Duration;

// Re-exports
pub use capture::{FrameRecord, InitiatorType, NetworkEvent, NetworkLog};
pub use error::{Error, Result};
pub use matcher::{match_target, match_targets, MatchResult};
pub use services::{DiscoveredIntegration, ExtractedUrl, ExtractorClient, QaClient};
pub use session::{run_session, run_session_with, ChromeDriver, PageDriver};
pub use stack::{format_call_stack, NO_STACK_SENTINEL};
pub use verify::{
    check_batch, check_batch_with_config, check_single, check_single_with_config,
    VerificationReport,
};

/// Configuration for one capture session
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Headless mode
    pub headless: bool,
    /// Path to Chrome/Chromium binary (None = auto-discover)
    pub chrome_path: Option<String>,
    /// Custom user agent (None = Chrome's default)
    pub user_agent: Option<String>,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Give up waiting for network idle after this long; the events captured
    /// so far are still returned
    pub idle_timeout: Duration,
    /// Quiet window with no in-flight requests that counts as network idle
    pub idle_window: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: None,
            viewport_width: 1920,
            viewport_height: 1080,
            idle_timeout: Duration::from_secs(30),
            idle_window: Duration::from_millis(500),
        }
    }
}

impl CaptureConfig {
    /// Create a visible (non-headless) config, useful for debugging a check
    pub fn visible() -> Self {
        Self {
            headless: false,
            ..Default::default()
        }
    }
}
