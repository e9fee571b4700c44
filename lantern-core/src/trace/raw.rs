//! The captured page load as it comes out of the browser.
//!
//! Only the fields the normalizer reads are modelled, everything else in
//! the JSON is ignored.

use crate::record::{InitiatorType, Priority, ResourceType};
use serde::Deserialize;

/// A page load capture: the trace of the renderer and the DevTools
/// network log.
///
/// ```
/// # use lantern_core::trace::RawCapture;
/// let capture: RawCapture = serde_json::from_str(r#"{
///     "traceEvents": [
///         { "name": "navigationStart", "ph": "R", "ts": 1000, "pid": 1, "tid": 1 }
///     ],
///     "networkEvents": [
///         { "method": "Network.loadingFinished",
///           "params": { "requestId": "1", "timestamp": 0.5, "encodedDataLength": 42 } }
///     ]
/// }"#).unwrap();
/// assert_eq!(capture.trace_events.len(), 1);
/// assert_eq!(capture.network_events.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCapture {
    #[serde(default)]
    pub trace_events: Vec<TraceEvent>,
    #[serde(default)]
    pub network_events: Vec<NetworkEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    #[serde(default)]
    pub cat: String,
    pub ph: String,
    /// microseconds on the browser's monotonic clock
    pub ts: f64,
    /// microseconds, complete (`X`) events only
    #[serde(default)]
    pub dur: Option<f64>,
    #[serde(default)]
    pub pid: u64,
    #[serde(default)]
    pub tid: u64,
    #[serde(default)]
    pub args: TraceArgs,
}

impl TraceEvent {
    pub fn end(&self) -> f64 {
        self.ts + self.dur.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceArgs {
    #[serde(default)]
    pub data: Option<EventData>,
    #[serde(default)]
    pub begin_data: Option<EventData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub url: Option<String>,
    pub style_sheet_url: Option<String>,
    pub request_id: Option<String>,
    /// a number in recent traces, a string in older ones
    pub timer_id: Option<serde_json::Value>,
    #[serde(default)]
    pub stack_trace: Vec<CallFrame>,
    pub ready_state: Option<u8>,
    pub document_loader_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallFrame {
    #[serde(default)]
    pub url: String,
}

/// One message of the DevTools network domain.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum NetworkEvent {
    #[serde(rename = "Network.requestWillBeSent")]
    RequestWillBeSent(RequestWillBeSent),
    #[serde(rename = "Network.responseReceived")]
    ResponseReceived(ResponseReceived),
    #[serde(rename = "Network.dataReceived")]
    DataReceived(DataReceived),
    #[serde(rename = "Network.loadingFinished")]
    LoadingFinished(LoadingFinished),
    #[serde(rename = "Network.loadingFailed")]
    LoadingFailed(LoadingFailed),
}

impl NetworkEvent {
    pub fn request_id(&self) -> &str {
        match self {
            Self::RequestWillBeSent(event) => &event.request_id,
            Self::ResponseReceived(event) => &event.request_id,
            Self::DataReceived(event) => &event.request_id,
            Self::LoadingFinished(event) => &event.request_id,
            Self::LoadingFailed(event) => &event.request_id,
        }
    }

    /// seconds on the same clock as the trace events
    pub fn timestamp(&self) -> f64 {
        match self {
            Self::RequestWillBeSent(event) => event.timestamp,
            Self::ResponseReceived(event) => event.timestamp,
            Self::DataReceived(event) => event.timestamp,
            Self::LoadingFinished(event) => event.timestamp,
            Self::LoadingFailed(event) => event.timestamp,
        }
    }

    /// Order of the events of one request sharing a timestamp.
    pub fn phase(&self) -> u8 {
        match self {
            Self::RequestWillBeSent(_) => 0,
            Self::ResponseReceived(_) => 1,
            Self::DataReceived(_) => 2,
            Self::LoadingFinished(_) | Self::LoadingFailed(_) => 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
    pub request_id: String,
    pub timestamp: f64,
    pub request: Request,
    #[serde(default, rename = "type")]
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub initiator: Option<RawInitiator>,
    #[serde(default)]
    pub redirect_response: Option<Response>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub initial_priority: Option<Priority>,
    #[serde(default)]
    pub is_link_preload: bool,
}

fn default_method() -> String {
    "GET".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInitiator {
    #[serde(rename = "type")]
    pub kind: InitiatorType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub stack: Option<StackTrace>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
    #[serde(default)]
    pub parent: Option<Box<StackTrace>>,
}

impl StackTrace {
    /// Call frame URLs of this stack and all its parents, innermost first.
    pub fn urls(&self) -> Vec<String> {
        let mut urls = Vec::new();
        let mut stack = Some(self);
        while let Some(current) = stack {
            urls.extend(current.call_frames.iter().map(|frame| frame.url.clone()));
            stack = current.parent.as_deref();
        }
        urls
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
    pub request_id: String,
    pub timestamp: f64,
    #[serde(default, rename = "type")]
    pub resource_type: Option<ResourceType>,
    pub response: Response,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub connection_id: Option<f64>,
    #[serde(default)]
    pub connection_reused: bool,
    #[serde(default)]
    pub from_disk_cache: bool,
    #[serde(default)]
    pub encoded_data_length: Option<f64>,
    #[serde(default)]
    pub timing: Option<ResourceTiming>,
}

/// Connection phases relative to `request_time` (milliseconds, `-1` when
/// the phase did not happen).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTiming {
    /// seconds
    pub request_time: f64,
    #[serde(default = "not_applicable")]
    pub dns_start: f64,
    #[serde(default = "not_applicable")]
    pub dns_end: f64,
    #[serde(default = "not_applicable")]
    pub connect_start: f64,
    #[serde(default = "not_applicable")]
    pub connect_end: f64,
    #[serde(default = "not_applicable")]
    pub ssl_start: f64,
    #[serde(default = "not_applicable")]
    pub ssl_end: f64,
    #[serde(default = "not_applicable")]
    pub send_start: f64,
    #[serde(default = "not_applicable")]
    pub send_end: f64,
    #[serde(default = "not_applicable")]
    pub receive_headers_end: f64,
}

fn not_applicable() -> f64 {
    -1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataReceived {
    pub request_id: String,
    pub timestamp: f64,
    #[serde(default)]
    pub data_length: u64,
    #[serde(default)]
    pub encoded_data_length: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinished {
    pub request_id: String,
    pub timestamp: f64,
    #[serde(default)]
    pub encoded_data_length: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailed {
    pub request_id: String,
    pub timestamp: f64,
    #[serde(default)]
    pub error_text: String,
    #[serde(default)]
    pub canceled: bool,
}
