//! Browser Session Management
//!
//! One session is one launch -> navigate -> idle/timeout -> teardown cycle.
//! The session manager presents the browser's asynchronous event stream as a
//! single blocking call that resumes with a completed [`NetworkLog`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::capture::{LogCollector, NetworkLog};
use crate::cdp::transport::{find_chrome, launch_chrome, CdpMessage, Transport};
use crate::cdp::{CdpSession, Connection};
use crate::error::{Error, Result};
use crate::CaptureConfig;

/// Global counter for unique user data directories
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Chrome arguments for a capture session.
/// Background networking is disabled so Chrome's own traffic (component
/// updates, safe-browsing) stays out of the capture.
fn browser_args(config: &CaptureConfig) -> Vec<String> {
    let mut args = vec![
        "--no-first-run".into(),
        "--no-default-browser-check".into(),
        "--no-sandbox".into(),
        "--disable-dev-shm-usage".into(),
        "--disable-background-networking".into(),
        "--disable-component-update".into(),
        "--disable-default-apps".into(),
        "--disable-extensions".into(),
        "--disable-sync".into(),
        "--disable-translate".into(),
        "--metrics-recording-only".into(),
        "--mute-audio".into(),
        format!(
            "--window-size={},{}",
            config.viewport_width, config.viewport_height
        ),
    ];

    if let Some(ref user_agent) = config.user_agent {
        args.push(format!("--user-agent={}", user_agent));
    }

    if config.headless {
        args.push("--headless=new".into());
    }

    args
}

/// The browser side of one capture session.
///
/// This is the seam between the session loop and the real browser: production
/// uses [`ChromeDriver`], tests substitute a scripted fake to exercise the
/// teardown and timeout paths without a Chrome install.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate the page to `url`. The driver's event stream must already be
    /// live when this is called, or early requests are lost.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Next raw browser message, `None` when the stream has ended.
    async fn next_event(&mut self) -> Option<CdpMessage>;

    /// Release the browser. Called exactly once per session, on every path.
    async fn teardown(&mut self) -> Result<()>;
}

/// Real CDP driver: one Chrome process, one page target
pub struct ChromeDriver {
    connection: Connection,
    page: CdpSession,
    user_data_dir: PathBuf,
    closed: bool,
}

impl ChromeDriver {
    /// Launch Chrome and prepare a page with network capture enabled.
    ///
    /// Network events are enabled before any navigation happens, so the
    /// capture sees the very first request of the page load.
    pub async fn launch(config: &CaptureConfig) -> Result<Self> {
        let instance_id = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "loadproof-session-{}-{}",
            std::process::id(),
            instance_id
        ));

        // Clean up any stale data
        let _ = std::fs::remove_dir_all(&user_data_dir);
        std::fs::create_dir_all(&user_data_dir)?;

        let chrome_path = match &config.chrome_path {
            Some(p) => PathBuf::from(p),
            None => find_chrome()?,
        };

        let mut args = browser_args(config);
        args.push(format!("--user-data-dir={}", user_data_dir.display()));

        tracing::info!("Launching Chrome from {:?}", chrome_path);
        let (child, ws_url) = launch_chrome(&chrome_path, &args)?;

        let transport = Transport::new(child, &ws_url)?;
        let connection = Connection::new(transport);

        let version = connection.version().await?;
        tracing::info!("Connected to Chrome: {}", version.product);

        let target_id = connection.create_target("about:blank").await?;
        let page = connection.attach_to_target(&target_id).await?;

        page.page_enable().await?;
        page.network_enable().await?;

        Ok(Self {
            connection,
            page,
            user_data_dir,
            closed: false,
        })
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        tracing::info!("Navigating to {}", url);
        let result = self.page.navigate(url).await?;
        if let Some(error) = result.error_text {
            return Err(Error::Navigation(error));
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<CdpMessage> {
        self.connection.transport().recv_event().await
    }

    async fn teardown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.connection.close().await;
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
        result
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        // The Transport's Drop impl kills the Chrome process if teardown
        // never ran; the profile directory still needs sweeping here.
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
    }
}

/// Run one capture session against `website_url` with a freshly launched
/// Chrome. Returns the frozen log of everything the page loaded.
pub async fn run_session(website_url: &str, config: &CaptureConfig) -> Result<NetworkLog> {
    let driver = ChromeDriver::launch(config).await?;
    run_session_with(driver, website_url, config.idle_timeout, config.idle_window).await
}

/// Drive one session over any [`PageDriver`].
///
/// Waits until the network is quiet for `idle_window` or `idle_timeout`
/// elapses. The timeout is soft: whatever was captured up to that point is
/// still returned. Teardown runs exactly once on every exit path; a
/// navigation failure is fatal for the session but still tears down.
pub async fn run_session_with<D: PageDriver>(
    mut driver: D,
    website_url: &str,
    idle_timeout: Duration,
    idle_window: Duration,
) -> Result<NetworkLog> {
    let mut collector = LogCollector::new();

    if let Err(e) = driver.navigate(website_url).await {
        let _ = driver.teardown().await;
        return Err(e);
    }

    let deadline = Instant::now() + idle_timeout;

    loop {
        if collector.is_idle(idle_window) {
            tracing::debug!("Network idle after {} events", collector.recorded());
            break;
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(
                "Page did not reach network idle within {:?}; keeping {} captured events",
                idle_timeout,
                collector.recorded()
            );
            break;
        }

        let remaining = deadline - now;
        let wait = if collector.in_flight() == 0 {
            idle_window
                .saturating_sub(collector.since_last_activity())
                .min(remaining)
        } else {
            remaining
        };
        let wait = wait.max(Duration::from_millis(5));

        match tokio::time::timeout(wait, driver.next_event()).await {
            Ok(Some(msg)) => {
                collector.observe(&msg);
            }
            Ok(None) => {
                tracing::debug!("Browser event stream ended");
                break;
            }
            Err(_) => {
                // Quiet window elapsed with nothing in flight, or the
                // deadline is near; the loop head decides which.
            }
        }
    }

    if let Err(e) = driver.teardown().await {
        tracing::warn!("Browser teardown reported an error: {}", e);
    }

    Ok(collector.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeDriver {
        events: VecDeque<CdpMessage>,
        teardowns: Arc<AtomicUsize>,
        fail_navigation: bool,
        hang_after_events: bool,
    }

    impl FakeDriver {
        fn new(events: Vec<CdpMessage>, teardowns: Arc<AtomicUsize>) -> Self {
            Self {
                events: events.into(),
                teardowns,
                fail_navigation: false,
                hang_after_events: true,
            }
        }
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            if self.fail_navigation {
                return Err(Error::Navigation("net::ERR_NAME_NOT_RESOLVED".into()));
            }
            Ok(())
        }

        async fn next_event(&mut self) -> Option<CdpMessage> {
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
            if self.hang_after_events {
                std::future::pending::<()>().await;
            }
            None
        }

        async fn teardown(&mut self) -> Result<()> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn network_event(method: &str, params: serde_json::Value) -> CdpMessage {
        CdpMessage::Event {
            method: method.to_string(),
            params,
            session_id: None,
        }
    }

    fn completed_request(id: &str, url: &str) -> Vec<CdpMessage> {
        vec![
            network_event(
                "Network.requestWillBeSent",
                json!({
                    "requestId": id,
                    "request": {"url": url, "method": "GET", "headers": {}},
                    "timestamp": 1.0,
                    "type": "Script",
                    "initiator": {"type": "script"}
                }),
            ),
            network_event(
                "Network.responseReceived",
                json!({
                    "requestId": id,
                    "response": {"url": url, "status": 200, "statusText": "OK", "headers": {}}
                }),
            ),
            network_event(
                "Network.loadingFinished",
                json!({"requestId": id, "timestamp": 2.0, "encodedDataLength": 64}),
            ),
        ]
    }

    #[tokio::test]
    async fn session_captures_events_and_tears_down_once() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let driver = FakeDriver::new(
            completed_request("r1", "https://cdn.example.com/widget.js"),
            Arc::clone(&teardowns),
        );

        let log = run_session_with(
            driver,
            "https://shop.example/",
            Duration::from_secs(5),
            Duration::from_millis(20),
        )
        .await
        .expect("session should succeed");

        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].url, "https://cdn.example.com/widget.js");
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn navigation_failure_is_fatal_but_still_tears_down() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let mut driver = FakeDriver::new(vec![], Arc::clone(&teardowns));
        driver.fail_navigation = true;

        let result = run_session_with(
            driver,
            "https://unreachable.example/",
            Duration::from_secs(1),
            Duration::from_millis(20),
        )
        .await;

        assert!(matches!(result, Err(Error::Navigation(_))));
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_timeout_returns_partial_log() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        // A request that never completes keeps the network busy forever
        let driver = FakeDriver::new(
            vec![network_event(
                "Network.requestWillBeSent",
                json!({
                    "requestId": "r1",
                    "request": {"url": "https://cdn.example.com/slow.js", "method": "GET", "headers": {}},
                    "timestamp": 1.0,
                    "type": "Script",
                    "initiator": {"type": "script"}
                }),
            )],
            Arc::clone(&teardowns),
        );

        let log = run_session_with(
            driver,
            "https://shop.example/",
            Duration::from_millis(150),
            Duration::from_millis(20),
        )
        .await
        .expect("soft timeout must not fail the session");

        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].status, None);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ended_event_stream_finishes_the_session() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let mut driver = FakeDriver::new(
            completed_request("r1", "https://cdn.example.com/widget.js"),
            Arc::clone(&teardowns),
        );
        driver.hang_after_events = false;

        let log = run_session_with(
            driver,
            "https://shop.example/",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .await
        .expect("ended stream should still produce a log");

        assert_eq!(log.len(), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }
}
