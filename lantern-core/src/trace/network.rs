//! Turn the DevTools network log into [`NetworkRecord`]s.

use super::raw::{NetworkEvent, RequestWillBeSent, Response};
use crate::{
    record::{Initiator, NetworkRecord, ObservedTiming, RequestId},
    time,
};
use std::{collections::BTreeMap, sync::Arc, time::Duration};

/// A request being reconstructed from its events.
struct Hop {
    record: NetworkRecord,
    has_response: bool,
}

/// Rebuild the records of `events`.
///
/// `navigation_start_us` is the time origin of the records. Requests that
/// started before it, or never finished nor failed, are dropped. The
/// result is ordered by start time, then request id.
pub(super) fn normalize(
    mut events: Vec<NetworkEvent>,
    navigation_start_us: f64,
) -> Vec<Arc<NetworkRecord>> {
    events.sort_by(|a, b| {
        a.timestamp()
            .total_cmp(&b.timestamp())
            .then(a.phase().cmp(&b.phase()))
    });

    let relative = |seconds: f64| -> Option<Duration> {
        let ms = (seconds * 1_000_000.0 - navigation_start_us) / 1_000.0;
        (ms >= 0.0).then(|| time::from_millis_f64(ms))
    };

    let mut open: BTreeMap<String, Hop> = BTreeMap::new();
    // closed hops keyed by request id (redirect suffixes included)
    let mut closed: BTreeMap<RequestId, Arc<NetworkRecord>> = BTreeMap::new();

    for event in events {
        let base = event.request_id().to_owned();
        let Some(timestamp) = relative(event.timestamp()) else {
            tracing::debug!(request_id = %base, "network event before navigation start, ignoring");
            continue;
        };

        match event {
            NetworkEvent::RequestWillBeSent(sent) => {
                let redirect_source = match (open.remove(&base), &sent.redirect_response) {
                    (Some(mut hop), Some(response)) => {
                        apply_response(&mut hop.record, response, timestamp, navigation_start_us);
                        hop.record.end_time = timestamp;
                        hop.record.finished = true;
                        let record = Arc::new(hop.record);
                        closed.insert(record.request_id.clone(), Arc::clone(&record));
                        Some(record)
                    }
                    (Some(hop), None) => {
                        tracing::trace!(request_id = %base, "duplicated request, ignoring");
                        open.insert(base, hop);
                        continue;
                    }
                    (None, _) => None,
                };

                let request_id = match &redirect_source {
                    Some(source) => source.request_id.redirected(),
                    None => RequestId::new(&base),
                };
                if closed.contains_key(&request_id) {
                    tracing::trace!(%request_id, "request already completed, ignoring");
                    continue;
                }
                open.insert(
                    base,
                    Hop {
                        record: new_record(request_id, &sent, timestamp, redirect_source),
                        has_response: false,
                    },
                );
            }
            NetworkEvent::ResponseReceived(received) => {
                let Some(hop) = open.get_mut(&base) else {
                    tracing::trace!(request_id = %base, "response for an unknown request");
                    continue;
                };
                if hop.has_response {
                    continue;
                }
                if let Some(resource_type) = received.resource_type {
                    hop.record.resource_type = resource_type;
                }
                apply_response(
                    &mut hop.record,
                    &received.response,
                    timestamp,
                    navigation_start_us,
                );
                hop.has_response = true;
            }
            NetworkEvent::DataReceived(data) => {
                if let Some(hop) = open.get_mut(&base) {
                    hop.record.resource_size += data.data_length;
                    hop.record.transfer_size += data.encoded_data_length;
                }
            }
            NetworkEvent::LoadingFinished(finished) => {
                let Some(mut hop) = open.remove(&base) else {
                    continue;
                };
                if finished.encoded_data_length > 0.0 {
                    hop.record.transfer_size = finished.encoded_data_length as u64;
                }
                if !hop.has_response {
                    hop.record.response_headers_end_time = timestamp;
                }
                hop.record.end_time = timestamp;
                hop.record.finished = true;
                let record = Arc::new(hop.record);
                closed.insert(record.request_id.clone(), record);
            }
            NetworkEvent::LoadingFailed(failed) => {
                let Some(mut hop) = open.remove(&base) else {
                    continue;
                };
                tracing::debug!(
                    request_id = %hop.record.request_id,
                    error = %failed.error_text,
                    canceled = failed.canceled,
                    "request failed"
                );
                if !hop.has_response {
                    hop.record.response_headers_end_time = timestamp;
                }
                hop.record.end_time = timestamp;
                hop.record.failed = true;
                hop.record.finished = true;
                let record = Arc::new(hop.record);
                closed.insert(record.request_id.clone(), record);
            }
        }
    }

    for (base, hop) in open {
        tracing::debug!(
            request_id = %base,
            url = %hop.record.url,
            "request never completed, dropping"
        );
    }

    let mut records: Vec<_> = closed.into_values().collect();
    records.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.request_id.cmp(&b.request_id))
    });
    records
}

fn new_record(
    request_id: RequestId,
    sent: &RequestWillBeSent,
    start: Duration,
    redirect_source: Option<Arc<NetworkRecord>>,
) -> NetworkRecord {
    let initiator = match &sent.initiator {
        Some(raw) => Initiator {
            kind: raw.kind,
            url: raw.url.clone(),
            stack_urls: raw.stack.as_ref().map(|s| s.urls()).unwrap_or_default(),
        },
        None => Initiator::default(),
    };

    NetworkRecord {
        method: sent.request.method.clone(),
        resource_type: sent.resource_type.unwrap_or_default(),
        priority: sent.request.initial_priority.unwrap_or_default(),
        start_time: start,
        response_headers_end_time: start,
        end_time: start,
        finished: false,
        is_link_preload: sent.request.is_link_preload,
        initiator,
        redirect_source,
        ..NetworkRecord::new(request_id, sent.request.url.clone())
    }
}

fn apply_response(
    record: &mut NetworkRecord,
    response: &Response,
    received: Duration,
    navigation_start_us: f64,
) {
    record.status_code = response.status;
    record.mime_type = response.mime_type.clone();
    if let Some(protocol) = &response.protocol {
        record.protocol = protocol.to_ascii_lowercase();
    }
    record.connection_id = response.connection_id.map(|id| id as u64);
    record.connection_reused = response.connection_reused;
    record.from_disk_cache = response.from_disk_cache;
    if let Some(length) = response.encoded_data_length {
        record.transfer_size = length.max(0.0) as u64;
    }

    record.response_headers_end_time = received;
    if let Some(timing) = response.timing {
        let phase = |start: f64, end: f64| (start >= 0.0 && end >= start).then_some(end - start);
        record.timing = Some(ObservedTiming {
            dns_ms: phase(timing.dns_start, timing.dns_end),
            connect_ms: phase(timing.connect_start, timing.connect_end),
            ssl_ms: phase(timing.ssl_start, timing.ssl_end),
            send_ms: phase(timing.send_start, timing.send_end),
            wait_ms: phase(timing.send_end, timing.receive_headers_end),
        });

        if timing.receive_headers_end >= 0.0 {
            let headers_end_ms = (timing.request_time * 1_000_000.0 - navigation_start_us) / 1_000.0
                + timing.receive_headers_end;
            if headers_end_ms.is_finite() && headers_end_ms >= 0.0 {
                let headers_end = time::from_millis_f64(headers_end_ms);
                let latest = received.max(record.start_time);
                record.response_headers_end_time = headers_end.clamp(record.start_time, latest);
            }
        }
    }
}
