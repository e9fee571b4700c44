//! Normalization of a captured page load.
//!
//! A [`RawCapture`] is what the browser hands over: trace events on a
//! microsecond clock and DevTools network messages in seconds. The
//! normalizer re-bases everything on the `navigationStart` marker and
//! produces a [`PageCapture`]: ordered [`NetworkRecord`]s, the nested
//! tasks of the main thread and the paint and load markers.
//!
//! ```
//! use lantern_core::trace::PageCapture;
//!
//! let capture = PageCapture::from_json(r#"{
//!     "traceEvents": [
//!         { "name": "navigationStart", "ph": "R", "ts": 1000000, "pid": 1, "tid": 1 },
//!         { "name": "firstContentfulPaint", "ph": "R", "ts": 1800000, "pid": 1, "tid": 1 }
//!     ],
//!     "networkEvents": []
//! }"#).unwrap();
//!
//! assert_eq!(capture.markers.first_contentful_paint.as_millis(), 800);
//! assert!(capture.records.is_empty());
//! ```

mod network;
mod raw;
mod timeline;

pub use self::raw::{
    CallFrame, DataReceived, EventData, LoadingFailed, LoadingFinished, NetworkEvent, RawCapture,
    RawInitiator, Request, RequestWillBeSent, ResourceTiming, Response, ResponseReceived,
    StackTrace, TraceArgs, TraceEvent,
};
use crate::{
    record::{NetworkRecord, ResourceType},
    task::Task,
};
use fnv::FnvHasher;
use std::{
    hash::{Hash, Hasher},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvalidTraceError {
    #[error("malformed capture")]
    Malformed(#[from] serde_json::Error),
    #[error("no navigationStart marker among {events} trace events")]
    NoNavigationStart { events: usize },
    #[error("no first paint marker after navigation start ({navigation_start_us}µs)")]
    NoFirstPaint { navigation_start_us: f64 },
}

/// Paint and load markers, relative to navigation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Markers {
    pub first_paint: Option<Duration>,
    /// falls back to the first paint when the trace has no contentful
    /// paint marker
    pub first_contentful_paint: Duration,
    /// the last candidate of the trace
    pub largest_contentful_paint: Option<Duration>,
    pub dom_content_loaded: Option<Duration>,
    pub load: Option<Duration>,
    /// end of the last event of the trace
    pub trace_end: Duration,
}

impl Markers {
    pub fn new(first_contentful_paint: Duration, trace_end: Duration) -> Self {
        Self {
            first_paint: Some(first_contentful_paint),
            first_contentful_paint,
            trace_end,
            ..Self::default()
        }
    }
}

/// A normalized page load.
#[derive(Debug, Clone)]
pub struct PageCapture {
    /// ordered by start time, then request id
    pub records: Vec<Arc<NetworkRecord>>,
    /// top level tasks of the main thread, ordered by start time
    pub tasks: Vec<Arc<Task>>,
    pub markers: Markers,
    /// URL of the main document, after redirects
    pub main_document_url: Option<String>,
}

impl PageCapture {
    /// Assemble a capture from already normalized parts.
    ///
    /// The main document is the first `Document` request, followed
    /// through its redirects.
    pub fn new(
        mut records: Vec<Arc<NetworkRecord>>,
        mut tasks: Vec<Arc<Task>>,
        markers: Markers,
    ) -> Self {
        records.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        tasks.sort_by_key(|task| (task.start, task.id));
        let main_document_url = find_main_document(&records).map(|record| record.url.clone());

        Self {
            records,
            tasks,
            markers,
            main_document_url,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, InvalidTraceError> {
        let raw: RawCapture = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawCapture) -> Result<Self, InvalidTraceError> {
        let origin = timeline::find_navigation_start(&raw.trace_events)?;
        let markers = timeline::markers(&raw.trace_events, &origin)?;
        let tasks = timeline::main_thread_tasks(&raw.trace_events, &origin);
        let records = network::normalize(raw.network_events, origin.ts);

        tracing::debug!(
            records = records.len(),
            tasks = tasks.len(),
            fcp = ?markers.first_contentful_paint,
            trace_end = ?markers.trace_end,
            "normalized capture"
        );

        let mut capture = Self::new(records, tasks.into_iter().map(Arc::new).collect(), markers);
        // the renderer knows better which document it committed
        if let Some(url) = origin.document_url
            && capture.records.iter().any(|record| record.url == url)
        {
            capture.main_document_url = Some(url);
        }
        Ok(capture)
    }

    /// The main document request, after redirects.
    pub fn main_document(&self) -> Option<&Arc<NetworkRecord>> {
        let url = self.main_document_url.as_deref()?;
        self.records.iter().find(|record| record.url == url)
    }

    /// A stable hash of everything the capture holds, used to identify it
    /// in caches.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        self.records.len().hash(&mut hasher);
        for record in &self.records {
            record.fingerprint_into(&mut hasher);
        }
        self.tasks.hash(&mut hasher);
        self.markers.hash(&mut hasher);
        self.main_document_url.hash(&mut hasher);
        hasher.finish()
    }
}

fn find_main_document(records: &[Arc<NetworkRecord>]) -> Option<&Arc<NetworkRecord>> {
    let first = records
        .iter()
        .find(|record| record.resource_type == ResourceType::Document)?;
    let base = first.request_id.base();
    records
        .iter()
        .filter(|record| record.request_id.base() == base)
        .max_by_key(|record| record.redirect_index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RequestId;

    #[test]
    fn malformed_json() {
        assert!(matches!(
            PageCapture::from_json("{ not json"),
            Err(InvalidTraceError::Malformed(_))
        ));
    }

    #[test]
    fn main_document_follows_redirects() {
        let first = Arc::new(NetworkRecord {
            resource_type: ResourceType::Document,
            ..NetworkRecord::new(RequestId::new("1"), "http://a.com/")
        });
        let second = Arc::new(NetworkRecord {
            resource_type: ResourceType::Document,
            start_time: Duration::from_millis(100),
            redirect_source: Some(Arc::clone(&first)),
            ..NetworkRecord::new(first.request_id.redirected(), "https://a.com/")
        });
        let script = Arc::new(NetworkRecord {
            resource_type: ResourceType::Script,
            start_time: Duration::from_millis(300),
            ..NetworkRecord::new(RequestId::new("2"), "https://a.com/app.js")
        });

        let capture = PageCapture::new(
            vec![script, second, first],
            Vec::new(),
            Markers::new(Duration::from_millis(500), Duration::from_secs(1)),
        );
        assert_eq!(capture.main_document_url.as_deref(), Some("https://a.com/"));
        assert_eq!(capture.records[0].url, "http://a.com/");
        assert_eq!(capture.main_document().map(|r| r.redirect_index()), Some(1));
    }

    #[test]
    fn fingerprint_is_stable() {
        let markers = Markers::new(Duration::from_millis(500), Duration::from_secs(1));
        let record = Arc::new(NetworkRecord::new(RequestId::new("1"), "https://a.com/"));
        let a = PageCapture::new(vec![Arc::clone(&record)], Vec::new(), markers);
        let b = PageCapture::new(vec![record], Vec::new(), markers);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = PageCapture::new(Vec::new(), Vec::new(), markers);
        assert_ne!(a.fingerprint(), c.fingerprint());

        let parsed = Arc::new(NetworkRecord {
            initiator: crate::record::Initiator::parser("https://a.com/"),
            resource_type: ResourceType::Script,
            ..NetworkRecord::new(RequestId::new("2"), "https://a.com/app.js")
        });
        let unattributed = Arc::new(NetworkRecord {
            initiator: Default::default(),
            ..(*parsed).clone()
        });
        let d = PageCapture::new(vec![parsed], Vec::new(), markers);
        let e = PageCapture::new(vec![unattributed], Vec::new(), markers);
        assert_ne!(d.fingerprint(), e.fingerprint());
    }
}
