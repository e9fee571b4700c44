use crate::{defaults::DEFAULT_SERVER_RESPONSE_TIME_MS, record::NetworkRecord};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

/// Per-origin network conditions observed in a capture.
///
/// Round trips are sampled from the TCP handshake of every request that
/// opened a connection (TLS excluded). Server response time is what is left
/// of the time to first byte once the origin's round trip is removed.
///
/// ```
/// use lantern_core::simulator::{NetworkAnalysis, SimulationOptions};
///
/// let analysis = NetworkAnalysis::from_records(&[]);
/// let options = SimulationOptions::default().set_origin_timings(
///     analysis.additional_rtt_by_origin.clone(),
///     analysis.server_response_time_by_origin.clone(),
/// );
/// assert!(options.additional_rtt_by_origin.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NetworkAnalysis {
    /// smallest handshake sample of all origins, milliseconds
    pub rtt: Option<f64>,
    /// round trip of an origin above [`rtt`](Self::rtt)
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    pub server_response_time_by_origin: BTreeMap<String, f64>,
}

impl NetworkAnalysis {
    pub fn from_records(records: &[Arc<NetworkRecord>]) -> Self {
        let mut rtt_samples: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for record in records {
            if record.connection_reused || record.is_non_network() || record.from_disk_cache {
                continue;
            }
            let Some(timing) = record.timing else { continue };
            let Some(connect) = timing.connect_ms.filter(|ms| *ms > 0.0) else {
                continue;
            };
            let tls = timing.ssl_ms.filter(|ms| *ms > 0.0).unwrap_or(0.0);
            let sample = connect - tls;
            if sample > 0.0 {
                rtt_samples.entry(record.origin()).or_default().push(sample);
            }
        }

        let origin_rtt: BTreeMap<&str, f64> = rtt_samples
            .iter()
            .map(|(origin, samples)| {
                (
                    *origin,
                    samples.iter().copied().fold(f64::INFINITY, f64::min),
                )
            })
            .collect();
        let rtt = origin_rtt.values().copied().reduce(f64::min);

        let additional_rtt_by_origin = match rtt {
            Some(rtt) => origin_rtt
                .iter()
                .map(|(origin, sample)| ((*origin).to_owned(), sample - rtt))
                .collect(),
            None => BTreeMap::new(),
        };

        let mut response_samples: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for record in records {
            if record.is_non_network() || record.from_disk_cache {
                continue;
            }
            let Some(wait) = record.timing.and_then(|timing| timing.wait_ms) else {
                continue;
            };
            let origin = record.origin();
            let round_trip = origin_rtt.get(origin).copied().or(rtt).unwrap_or(0.0);
            response_samples
                .entry(origin)
                .or_default()
                .push((wait - round_trip).max(0.0));
        }

        let server_response_time_by_origin: BTreeMap<String, f64> = response_samples
            .into_iter()
            .filter_map(|(origin, samples)| Some((origin.to_owned(), median(samples)?)))
            .collect();

        debug!(
            rtt = ?rtt,
            origins = additional_rtt_by_origin.len(),
            "network analysis"
        );

        Self {
            rtt,
            additional_rtt_by_origin,
            server_response_time_by_origin,
        }
    }

    /// Server response time of `origin`, the default when the capture said
    /// nothing about it.
    pub fn server_response_time(&self, origin: &str) -> f64 {
        self.server_response_time_by_origin
            .get(origin)
            .copied()
            .unwrap_or(DEFAULT_SERVER_RESPONSE_TIME_MS)
    }
}

fn median(mut samples: Vec<f64>) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    let middle = samples.len() / 2;
    if samples.len() % 2 == 0 {
        Some((samples[middle - 1] + samples[middle]) / 2.0)
    } else {
        Some(samples[middle])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ObservedTiming, RequestId};

    fn record(id: &str, url: &str, timing: ObservedTiming, reused: bool) -> Arc<NetworkRecord> {
        Arc::new(NetworkRecord {
            timing: Some(timing),
            connection_reused: reused,
            ..NetworkRecord::new(RequestId::new(id), url)
        })
    }

    fn handshake(connect: f64, ssl: f64, wait: f64) -> ObservedTiming {
        ObservedTiming {
            connect_ms: Some(connect),
            ssl_ms: Some(ssl),
            wait_ms: Some(wait),
            ..ObservedTiming::default()
        }
    }

    #[test]
    fn median_of_samples() {
        assert_eq!(median(vec![]), None);
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn additional_rtt() {
        let records = vec![
            record("1", "https://a.com/", handshake(150.0, 50.0, 150.0), false),
            record("2", "https://a.com/x", handshake(0.0, 0.0, 130.0), true),
            record("3", "https://cdn.com/y", handshake(160.0, 0.0, 200.0), false),
        ];
        let analysis = NetworkAnalysis::from_records(&records);

        assert_eq!(analysis.rtt, Some(100.0));
        assert_eq!(analysis.additional_rtt_by_origin["https://a.com"], 0.0);
        assert_eq!(analysis.additional_rtt_by_origin["https://cdn.com"], 60.0);

        // a.com: 50 and 30 after the 100ms round trip
        assert_eq!(analysis.server_response_time_by_origin["https://a.com"], 40.0);
        assert_eq!(analysis.server_response_time_by_origin["https://cdn.com"], 40.0);
    }

    #[test]
    fn unknown_origin() {
        let analysis = NetworkAnalysis::from_records(&[]);
        assert_eq!(analysis.rtt, None);
        assert_eq!(analysis.server_response_time("https://a.com"), 30.0);
    }

    #[test]
    fn response_time_never_negative() {
        let records = vec![record("1", "http://a.com/", handshake(100.0, 0.0, 20.0), false)];
        let analysis = NetworkAnalysis::from_records(&records);
        assert_eq!(analysis.server_response_time("http://a.com"), 0.0);
    }
}
