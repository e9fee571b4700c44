use crate::defaults::DNS_RESOLUTION_RTT_MULTIPLIER;
use std::collections::BTreeMap;

/// Host names resolved during a simulation run.
///
/// The first lookup of a host costs [`DNS_RESOLUTION_RTT_MULTIPLIER`]
/// round trips. Later requests wait for that lookup if it is still in
/// flight, and pay nothing once it is done.
#[derive(Debug, Clone)]
pub struct DnsCache {
    rtt: f64,
    resolved_at: BTreeMap<String, f64>,
}

impl DnsCache {
    pub fn new(rtt: f64) -> Self {
        Self {
            rtt,
            resolved_at: BTreeMap::new(),
        }
    }

    /// Time (milliseconds) a request made at `requested_at` waits for
    /// `host` to be resolved.
    pub fn time_until_resolution(&self, host: &str, requested_at: f64) -> f64 {
        let lookup = self.rtt * DNS_RESOLUTION_RTT_MULTIPLIER;
        match self.resolved_at.get(host) {
            Some(&resolved_at) => (resolved_at - requested_at).max(0.0).min(lookup),
            None => lookup,
        }
    }

    /// Same as [`time_until_resolution`](Self::time_until_resolution),
    /// remembering when the host will be resolved.
    pub fn resolve(&mut self, host: &str, requested_at: f64) -> f64 {
        let time = self.time_until_resolution(host, requested_at);
        let resolved_at = requested_at + time;
        self.resolved_at
            .entry(host.to_owned())
            .and_modify(|current| *current = current.min(resolved_at))
            .or_insert(resolved_at);
        time
    }
}
