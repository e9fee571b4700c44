//! Normalized network requests.
//!
//! A [`NetworkRecord`] is one hop of a request as the browser observed
//! it: timestamps relative to navigation start, sizes, protocol and what
//! initiated it. Records are produced by the [`trace`] normalizer (or by
//! hand in tests) and are immutable afterwards; they are shared through
//! [`Arc`] between the dependency graph and every simulation run.
//!
//! [`trace`]: crate::trace

mod id;

pub use self::id::RequestId;
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Duration,
};

/// What kind of resource the browser thought it was fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    TextTrack,
    #[serde(rename = "XHR")]
    Xhr,
    Fetch,
    EventSource,
    WebSocket,
    Manifest,
    Ping,
    Preflight,
    #[default]
    #[serde(other)]
    Other,
}

/// The fetch priority the browser assigned to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
pub enum Priority {
    VeryLow,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl Priority {
    #[inline]
    pub fn is_high(self) -> bool {
        matches!(self, Priority::High | Priority::VeryHigh)
    }
}

/// Why the request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InitiatorType {
    /// discovered by the HTML or CSS parser
    Parser,
    /// requested from a script
    Script,
    Preload,
    Redirect,
    #[default]
    #[serde(other)]
    Other,
}

/// The initiator of a request, with the URLs that can be matched against
/// other records to find its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Initiator {
    pub kind: InitiatorType,
    pub url: Option<String>,
    /// every call frame URL of the initiating stack, parents included
    pub stack_urls: Vec<String>,
}

impl Initiator {
    pub fn parser(url: impl Into<String>) -> Self {
        Self {
            kind: InitiatorType::Parser,
            url: Some(url.into()),
            stack_urls: Vec::new(),
        }
    }

    pub fn script<I, S>(stack_urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: InitiatorType::Script,
            url: None,
            stack_urls: stack_urls.into_iter().map(Into::into).collect(),
        }
    }

    /// The URLs of the resources that caused this request.
    ///
    /// An explicit initiator URL wins; script initiators otherwise
    /// contribute every distinct URL of their call stack, in order.
    pub fn urls(&self) -> Vec<&str> {
        if let Some(url) = self.url.as_deref() {
            return vec![url];
        }

        if self.kind != InitiatorType::Script {
            return Vec::new();
        }

        let mut seen = BTreeSet::new();
        self.stack_urls
            .iter()
            .map(String::as_str)
            .filter(|url| !url.is_empty() && seen.insert(*url))
            .collect()
    }
}

/// Connection phases as observed by the browser, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObservedTiming {
    pub dns_ms: Option<f64>,
    pub connect_ms: Option<f64>,
    pub ssl_ms: Option<f64>,
    pub send_ms: Option<f64>,
    /// time between the request being sent and the response headers
    /// arriving: the server response time plus one round trip
    pub wait_ms: Option<f64>,
}

/// One network request (one hop of a redirect chain).
#[derive(Debug, Clone)]
pub struct NetworkRecord {
    pub request_id: RequestId,
    pub url: String,
    /// `http/1.1`, `h2`, `h3`, `data`, ...
    pub protocol: String,
    pub method: String,
    pub resource_type: ResourceType,
    pub priority: Priority,
    pub mime_type: String,
    pub status_code: u16,

    pub start_time: Duration,
    pub response_headers_end_time: Duration,
    pub end_time: Duration,

    /// bytes on the wire, headers included
    pub transfer_size: u64,
    /// decoded size of the body
    pub resource_size: u64,

    pub failed: bool,
    pub finished: bool,
    pub from_disk_cache: bool,
    pub is_link_preload: bool,

    pub initiator: Initiator,
    /// the previous hop when this request is the target of a redirect
    pub redirect_source: Option<Arc<NetworkRecord>>,

    pub connection_id: Option<u64>,
    pub connection_reused: bool,
    pub timing: Option<ObservedTiming>,
}

impl NetworkRecord {
    /// A finished `GET` with a `200` status, no size and no timing. Meant
    /// to be completed with struct update syntax.
    pub fn new(request_id: RequestId, url: impl Into<String>) -> Self {
        Self {
            request_id,
            url: url.into(),
            protocol: "http/1.1".to_owned(),
            method: "GET".to_owned(),
            resource_type: ResourceType::Other,
            priority: Priority::Medium,
            mime_type: String::new(),
            status_code: 200,
            start_time: Duration::ZERO,
            response_headers_end_time: Duration::ZERO,
            end_time: Duration::ZERO,
            transfer_size: 0,
            resource_size: 0,
            failed: false,
            finished: true,
            from_disk_cache: false,
            is_link_preload: false,
            initiator: Initiator::default(),
            redirect_source: None,
            connection_id: None,
            connection_reused: false,
            timing: None,
        }
    }

    #[inline]
    pub fn redirect_index(&self) -> u32 {
        self.request_id.redirect_index()
    }

    /// The hops that led to this request, oldest first.
    pub fn redirect_chain(&self) -> Vec<&NetworkRecord> {
        let mut chain = Vec::new();
        let mut source = self.redirect_source.as_deref();
        while let Some(record) = source {
            chain.push(record);
            source = record.redirect_source.as_deref();
        }
        chain.reverse();
        chain
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.end_time.saturating_sub(self.start_time)
    }

    /// `scheme://host[:port]`, or the scheme followed by `:` for URLs
    /// without an authority (`data:`, `blob:`).
    pub fn origin(&self) -> &str {
        origin(&self.url)
    }

    pub fn host(&self) -> &str {
        host(&self.url)
    }

    pub fn scheme(&self) -> &str {
        scheme(&self.url)
    }

    /// `true` when the request never touches the network.
    pub fn is_non_network(&self) -> bool {
        matches!(self.scheme(), "data" | "blob" | "file" | "about" | "chrome")
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.scheme(), "https" | "wss")
    }

    /// `true` when requests to this origin are multiplexed on one
    /// connection.
    pub fn is_multiplexed(&self) -> bool {
        matches!(self.protocol.as_str(), "h2" | "h3" | "quic" | "spdy")
    }

    /// Feed every field of the record to `state`. Two records with the
    /// same fingerprint simulate the same way.
    pub fn fingerprint_into<H: Hasher>(&self, state: &mut H) {
        self.request_id.hash(state);
        self.url.hash(state);
        self.protocol.hash(state);
        self.method.hash(state);
        self.resource_type.hash(state);
        self.priority.hash(state);
        self.mime_type.hash(state);
        self.status_code.hash(state);
        self.start_time.hash(state);
        self.response_headers_end_time.hash(state);
        self.end_time.hash(state);
        self.transfer_size.hash(state);
        self.resource_size.hash(state);
        self.failed.hash(state);
        self.finished.hash(state);
        self.from_disk_cache.hash(state);
        self.is_link_preload.hash(state);
        self.initiator.hash(state);
        self.redirect_source
            .as_ref()
            .map(|source| &source.request_id)
            .hash(state);
        self.connection_id.hash(state);
        self.connection_reused.hash(state);

        let timing = self.timing.map(|timing| {
            [
                timing.dns_ms,
                timing.connect_ms,
                timing.ssl_ms,
                timing.send_ms,
                timing.wait_ms,
            ]
            .map(|phase| phase.map(f64::to_bits))
        });
        timing.hash(state);
    }

    /// A request that should count as network activity when looking for
    /// quiet periods.
    pub fn is_countable_activity(&self) -> bool {
        self.finished
            && !self.failed
            && (200..300).contains(&self.status_code)
            && self.method == "GET"
    }
}

fn scheme(url: &str) -> &str {
    url.split_once(':').map(|(scheme, _)| scheme).unwrap_or("")
}

fn authority(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// The origin part of `url`. See [`NetworkRecord::origin`].
pub fn origin(url: &str) -> &str {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
            &url[..scheme.len() + 3 + end]
        }
        None => match url.find(':') {
            Some(index) => &url[..=index],
            None => url,
        },
    }
}

/// The host part of `url`, without user info nor port.
pub fn host(url: &str) -> &str {
    let Some(authority) = authority(url) else {
        return "";
    };
    let authority = authority
        .rsplit_once('@')
        .map(|(_, host)| host)
        .unwrap_or(authority);
    if authority.starts_with('[') {
        // ipv6 literal
        return authority
            .find(']')
            .map(|end| &authority[..=end])
            .unwrap_or(authority);
    }
    authority
        .split_once(':')
        .map(|(host, _)| host)
        .unwrap_or(authority)
}
