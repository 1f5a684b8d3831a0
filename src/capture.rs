//! Network Capture
//!
//! Folds the browser's raw network notifications into an append-only,
//! time-ordered log of [`NetworkEvent`]s for one page session. The collector
//! is single-writer for the duration of the session; the frozen [`NetworkLog`]
//! it produces is immutable and safe to share.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cdp::transport::CdpMessage;
use crate::cdp::types::{
    Initiator, NetworkLoadingFailedEvent, NetworkLoadingFinishedEvent,
    NetworkRequestWillBeSentEvent, NetworkResponseReceivedEvent, StackTrace,
};

/// One stack frame from the browser's initiator metadata for a request.
/// Line and column numbers are 0-based, exactly as the browser reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub function_name: Option<String>,
    pub source_url: String,
    pub line: Option<i64>,
    pub column: Option<i64>,
}

/// What kind of code or markup triggered a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiatorType {
    /// Script execution (including inline scripts)
    Script,
    /// The HTML parser (tags, preloads discovered in markup)
    Parser,
    /// A fetch() or XMLHttpRequest call
    FetchXhr,
    /// Anything else (navigation, workers, unknown)
    Other,
}

impl InitiatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitiatorType::Script => "script",
            InitiatorType::Parser => "parser",
            InitiatorType::FetchXhr => "fetch_xhr",
            InitiatorType::Other => "other",
        }
    }
}

/// One captured request/response, immutable once the session ends.
///
/// HTTP failures, blocked loads and aborts are recorded here as data; they are
/// facts about what happened on the page, not errors of the capture itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEvent {
    /// Unique within a session: the browser request id, suffixed with the
    /// sequence number for redirect hops that reuse the id
    pub id: String,
    pub url: String,
    pub method: String,
    /// Response status, `None` if no response arrived before the session ended
    pub status: Option<i32>,
    pub status_text: Option<String>,
    /// Loading error text (e.g. `net::ERR_ABORTED`), if the request failed
    pub error: Option<String>,
    /// Why the browser blocked the request, if it did
    pub blocked_reason: Option<String>,
    pub initiator_type: InitiatorType,
    /// The document or script that triggered the request, when known
    pub initiator_url: Option<String>,
    /// Triggering call stack, innermost frame first. Legitimately empty for
    /// parser-initiated and preloaded resources.
    pub call_stack: Vec<FrameRecord>,
    /// Position in the session's arrival order, strictly increasing
    pub sequence_number: u64,
}

/// Frozen, time-ordered record of every request one page session generated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkLog {
    events: Vec<NetworkEvent>,
}

impl NetworkLog {
    /// Build a log directly from events (synthetic logs for tests, replays)
    pub fn from_events(events: Vec<NetworkEvent>) -> Self {
        Self { events }
    }

    /// All captured events in recorded order
    pub fn events(&self) -> &[NetworkEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NetworkEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Flatten a CDP stack trace (including async parents) into frame records
fn flatten_stack(stack: &StackTrace) -> Vec<FrameRecord> {
    let mut frames = Vec::new();
    let mut current = Some(stack);
    while let Some(trace) = current {
        for frame in &trace.call_frames {
            frames.push(FrameRecord {
                function_name: if frame.function_name.is_empty() {
                    None
                } else {
                    Some(frame.function_name.clone())
                },
                source_url: frame.url.clone(),
                line: Some(frame.line_number),
                column: Some(frame.column_number),
            });
        }
        current = trace.parent.as_deref();
    }
    frames
}

/// Classify a request's initiator. The resource type wins for fetch/XHR
/// traffic because the raw initiator of those is reported as "script".
fn classify_initiator(initiator: Option<&Initiator>, resource_type: Option<&str>) -> InitiatorType {
    if matches!(resource_type, Some("XHR") | Some("Fetch")) {
        return InitiatorType::FetchXhr;
    }
    match initiator.map(|i| i.r#type.as_str()) {
        Some("script") => InitiatorType::Script,
        Some("parser") | Some("preload") => InitiatorType::Parser,
        _ => InitiatorType::Other,
    }
}

/// Session-scoped accumulator that folds raw CDP messages into the log.
///
/// Append-only and single-writer: only the session's event loop feeds it.
/// `finish` freezes the result; the collector itself never outlives a session.
pub(crate) struct LogCollector {
    events: Vec<NetworkEvent>,
    /// Browser request id -> index of its latest hop in `events`
    index: HashMap<String, usize>,
    /// Request ids currently in flight
    open: HashSet<String>,
    next_seq: u64,
    last_activity: Instant,
}

impl LogCollector {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            index: HashMap::new(),
            open: HashSet::new(),
            next_seq: 0,
            last_activity: Instant::now(),
        }
    }

    /// Process one CDP message.
    /// Returns true if it was a network event this collector consumed.
    pub fn observe(&mut self, msg: &CdpMessage) -> bool {
        let CdpMessage::Event { method, params, .. } = msg else {
            return false;
        };

        match method.as_str() {
            "Network.requestWillBeSent" => {
                if let Ok(e) =
                    serde_json::from_value::<NetworkRequestWillBeSentEvent>(params.clone())
                {
                    self.on_request_will_be_sent(e);
                    return true;
                }
            }
            "Network.responseReceived" => {
                if let Ok(e) =
                    serde_json::from_value::<NetworkResponseReceivedEvent>(params.clone())
                {
                    self.on_response_received(e);
                    return true;
                }
            }
            "Network.loadingFinished" => {
                if let Ok(e) = serde_json::from_value::<NetworkLoadingFinishedEvent>(params.clone())
                {
                    self.on_loading_finished(e);
                    return true;
                }
            }
            "Network.loadingFailed" => {
                if let Ok(e) = serde_json::from_value::<NetworkLoadingFailedEvent>(params.clone()) {
                    self.on_loading_failed(e);
                    return true;
                }
            }
            _ => {}
        }
        false
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn on_request_will_be_sent(&mut self, event: NetworkRequestWillBeSentEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;

        // Redirect hops reuse the browser's request id; the prior hop gets its
        // status from redirectResponse and the new hop gets a synthesized id.
        let id = if let Some(&prev) = self.index.get(&event.request_id) {
            if let Some(redirect) = &event.redirect_response {
                let prior = &mut self.events[prev];
                prior.status = Some(redirect.status);
                prior.status_text = Some(redirect.status_text.clone());
            }
            format!("{}#{}", event.request_id, seq)
        } else {
            self.open.insert(event.request_id.clone());
            event.request_id.clone()
        };

        let initiator = event.initiator.as_ref();
        let call_stack = initiator
            .and_then(|i| i.stack.as_ref())
            .map(flatten_stack)
            .unwrap_or_default();
        let initiator_url = initiator
            .and_then(|i| i.url.clone())
            .or_else(|| call_stack.first().map(|f| f.source_url.clone()));

        self.events.push(NetworkEvent {
            id,
            url: event.request.url.clone(),
            method: event.request.method.clone(),
            status: None,
            status_text: None,
            error: None,
            blocked_reason: None,
            initiator_type: classify_initiator(initiator, event.r#type.as_deref()),
            initiator_url,
            call_stack,
            sequence_number: seq,
        });
        self.index.insert(event.request_id, self.events.len() - 1);
        self.touch();
    }

    fn on_response_received(&mut self, event: NetworkResponseReceivedEvent) {
        if let Some(&i) = self.index.get(&event.request_id) {
            self.events[i].status = Some(event.response.status);
            self.events[i].status_text = Some(event.response.status_text);
        }
        self.touch();
    }

    fn on_loading_finished(&mut self, event: NetworkLoadingFinishedEvent) {
        self.open.remove(&event.request_id);
        self.touch();
    }

    fn on_loading_failed(&mut self, event: NetworkLoadingFailedEvent) {
        if let Some(&i) = self.index.get(&event.request_id) {
            self.events[i].error = Some(event.error_text);
            self.events[i].blocked_reason = event.blocked_reason;
        }
        self.open.remove(&event.request_id);
        self.touch();
    }

    /// Number of requests still awaiting completion
    pub fn in_flight(&self) -> usize {
        self.open.len()
    }

    /// Number of events recorded so far
    pub fn recorded(&self) -> usize {
        self.events.len()
    }

    pub fn since_last_activity(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Network-idle: nothing in flight and no event for at least `quiet`
    pub fn is_idle(&self, quiet: Duration) -> bool {
        self.open.is_empty() && self.last_activity.elapsed() >= quiet
    }

    /// Freeze the collected events into an immutable log
    pub fn finish(self) -> NetworkLog {
        NetworkLog {
            events: self.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(method: &str, params: serde_json::Value) -> CdpMessage {
        CdpMessage::Event {
            method: method.to_string(),
            params,
            session_id: None,
        }
    }

    fn request_sent(id: &str, url: &str) -> CdpMessage {
        event(
            "Network.requestWillBeSent",
            json!({
                "requestId": id,
                "request": {"url": url, "method": "GET", "headers": {}},
                "timestamp": 1.0,
                "type": "Script",
                "initiator": {
                    "type": "script",
                    "stack": {
                        "callFrames": [
                            {"functionName": "loadWidget", "url": "https://shop.example/app.js", "lineNumber": 41, "columnNumber": 12}
                        ]
                    }
                }
            }),
        )
    }

    fn response_received(id: &str, status: i32) -> CdpMessage {
        event(
            "Network.responseReceived",
            json!({
                "requestId": id,
                "response": {"url": "ignored", "status": status, "statusText": "OK", "headers": {}}
            }),
        )
    }

    fn loading_finished(id: &str) -> CdpMessage {
        event(
            "Network.loadingFinished",
            json!({"requestId": id, "timestamp": 2.0, "encodedDataLength": 128}),
        )
    }

    #[test]
    fn folds_request_and_response_into_one_event() {
        let mut collector = LogCollector::new();
        assert!(collector.observe(&request_sent("r1", "https://cdn.example.com/widget.js")));
        assert_eq!(collector.in_flight(), 1);

        assert!(collector.observe(&response_received("r1", 200)));
        assert!(collector.observe(&loading_finished("r1")));
        assert_eq!(collector.in_flight(), 0);

        let log = collector.finish();
        assert_eq!(log.len(), 1);
        let ev = &log.events()[0];
        assert_eq!(ev.id, "r1");
        assert_eq!(ev.url, "https://cdn.example.com/widget.js");
        assert_eq!(ev.status, Some(200));
        assert_eq!(ev.initiator_type, InitiatorType::Script);
        assert_eq!(ev.initiator_url.as_deref(), Some("https://shop.example/app.js"));
        assert_eq!(ev.call_stack.len(), 1);
        assert_eq!(ev.call_stack[0].function_name.as_deref(), Some("loadWidget"));
    }

    #[test]
    fn request_without_response_keeps_status_none() {
        let mut collector = LogCollector::new();
        collector.observe(&request_sent("r1", "https://cdn.example.com/slow.js"));
        let log = collector.finish();
        assert_eq!(log.events()[0].status, None);
        assert_eq!(log.events()[0].error, None);
    }

    #[test]
    fn loading_failed_records_error_and_blocked_reason() {
        let mut collector = LogCollector::new();
        collector.observe(&request_sent("r1", "https://ads.example/track.js"));
        collector.observe(&event(
            "Network.loadingFailed",
            json!({
                "requestId": "r1",
                "errorText": "net::ERR_BLOCKED_BY_CLIENT",
                "canceled": false,
                "blockedReason": "inspector"
            }),
        ));

        assert_eq!(collector.in_flight(), 0);
        let log = collector.finish();
        let ev = &log.events()[0];
        assert_eq!(ev.error.as_deref(), Some("net::ERR_BLOCKED_BY_CLIENT"));
        assert_eq!(ev.blocked_reason.as_deref(), Some("inspector"));
    }

    #[test]
    fn redirect_hops_get_unique_ids_and_redirect_status() {
        let mut collector = LogCollector::new();
        collector.observe(&request_sent("r1", "https://short.example/w"));
        collector.observe(&event(
            "Network.requestWillBeSent",
            json!({
                "requestId": "r1",
                "request": {"url": "https://cdn.example.com/widget.js", "method": "GET", "headers": {}},
                "timestamp": 1.5,
                "type": "Script",
                "redirectResponse": {"url": "https://short.example/w", "status": 302, "statusText": "Found", "headers": {}}
            }),
        ));
        collector.observe(&response_received("r1", 200));
        collector.observe(&loading_finished("r1"));

        let log = collector.finish();
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].id, "r1");
        assert_eq!(log.events()[0].status, Some(302));
        assert_eq!(log.events()[1].id, "r1#1");
        assert_eq!(log.events()[1].status, Some(200));
        // Ids stay unique within the session
        assert_ne!(log.events()[0].id, log.events()[1].id);
    }

    #[test]
    fn sequence_numbers_increase_in_recorded_order() {
        let mut collector = LogCollector::new();
        collector.observe(&request_sent("a", "https://x.example/1.js"));
        collector.observe(&request_sent("b", "https://x.example/2.js"));
        collector.observe(&request_sent("c", "https://x.example/3.js"));

        let log = collector.finish();
        let seqs: Vec<u64> = log.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn fetch_resource_type_wins_over_script_initiator() {
        let mut collector = LogCollector::new();
        collector.observe(&event(
            "Network.requestWillBeSent",
            json!({
                "requestId": "r1",
                "request": {"url": "https://api.example/v1/session", "method": "POST", "headers": {}},
                "timestamp": 1.0,
                "type": "Fetch",
                "initiator": {"type": "script"}
            }),
        ));
        let log = collector.finish();
        assert_eq!(log.events()[0].initiator_type, InitiatorType::FetchXhr);
        assert!(log.events()[0].call_stack.is_empty());
    }

    #[test]
    fn parser_initiated_request_has_empty_stack() {
        let mut collector = LogCollector::new();
        collector.observe(&event(
            "Network.requestWillBeSent",
            json!({
                "requestId": "r1",
                "request": {"url": "https://cdn.example.com/style.css", "method": "GET", "headers": {}},
                "timestamp": 1.0,
                "type": "Stylesheet",
                "initiator": {"type": "parser", "url": "https://shop.example/", "lineNumber": 12.0}
            }),
        ));
        let log = collector.finish();
        let ev = &log.events()[0];
        assert_eq!(ev.initiator_type, InitiatorType::Parser);
        assert_eq!(ev.initiator_url.as_deref(), Some("https://shop.example/"));
        assert!(ev.call_stack.is_empty());
    }

    #[test]
    fn non_network_events_are_ignored() {
        let mut collector = LogCollector::new();
        assert!(!collector.observe(&event("Page.loadEventFired", json!({"timestamp": 1.0}))));
        assert!(collector.finish().is_empty());
    }

    #[test]
    fn idle_requires_empty_in_flight() {
        let mut collector = LogCollector::new();
        collector.observe(&request_sent("r1", "https://x.example/app.js"));
        assert!(!collector.is_idle(Duration::ZERO));

        collector.observe(&loading_finished("r1"));
        assert!(collector.is_idle(Duration::ZERO));
        assert!(!collector.is_idle(Duration::from_secs(60)));
    }
}
