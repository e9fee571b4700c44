use crate::Error;
use fnv::FnvHasher;
use lantern_core::{
    measure::ThrottlingProfile,
    simulator::{NetworkAnalysis, SimulationOptions},
    trace::PageCapture,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    hash::{Hash as _, Hasher as _},
};

/// Where the metric values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottlingMethod {
    /// simulate the capture under [`Settings::throttling`]
    #[default]
    Simulate,
    /// the capture was recorded under the target conditions, report what
    /// was observed
    Provided,
}

/// Per-origin timings known ahead of time, replacing the ones estimated
/// from the capture.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OriginTimings {
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    pub server_response_time_by_origin: BTreeMap<String, f64>,
}

/// How metrics are computed for a capture.
///
/// ## Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | Throttling method | simulate |
/// | Throttling | [`ThrottlingProfile::mobile_slow_4g`] |
/// | Connections per origin | 6 |
/// | Origin timings | estimated from the capture |
///
/// ```
/// use lantern::{Settings, ThrottlingMethod};
///
/// let settings: Settings = serde_json::from_str(r#"{
///     "throttlingMethod": "simulate",
///     "throttling": {
///         "rtt": "40ms",
///         "throughput": "10mbps",
///         "cpuSlowdown": 1.0
///     },
///     "maxConnectionsPerOrigin": 4
/// }"#).unwrap();
///
/// assert_eq!(settings.throttling_method, ThrottlingMethod::Simulate);
/// assert_eq!(settings.throttling.rtt.to_string(), "40ms");
/// assert_eq!(settings.max_connections_per_origin, Some(4));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub throttling_method: ThrottlingMethod,
    pub throttling: ThrottlingProfile,
    pub max_connections_per_origin: Option<usize>,
    pub origin_timings: Option<OriginTimings>,
}

impl Settings {
    /// Raw throttling numbers, as `rttMs`, `throughputKbps` and
    /// `cpuSlowdownMultiplier` appear in a configuration.
    pub fn from_values(
        rtt_ms: f64,
        throughput_kbps: f64,
        cpu_slowdown_multiplier: f64,
    ) -> Result<Self, Error> {
        Ok(Self {
            throttling: ThrottlingProfile::from_values(
                rtt_ms,
                throughput_kbps,
                cpu_slowdown_multiplier,
            )?,
            ..Self::default()
        })
    }

    pub fn set_throttling_method(mut self, method: ThrottlingMethod) -> Self {
        self.throttling_method = method;
        self
    }

    pub fn set_max_connections_per_origin(mut self, max: usize) -> Self {
        self.max_connections_per_origin = Some(max);
        self
    }

    pub fn set_origin_timings(mut self, timings: OriginTimings) -> Self {
        self.origin_timings = Some(timings);
        self
    }

    /// The simulator options for `capture`.
    pub fn simulation_options(&self, capture: &PageCapture) -> SimulationOptions {
        let mut options = SimulationOptions::new(self.throttling);
        if let Some(max) = self.max_connections_per_origin {
            options = options.set_max_connections_per_origin(max);
        }

        match &self.origin_timings {
            Some(timings) => options.set_origin_timings(
                timings.additional_rtt_by_origin.clone(),
                timings.server_response_time_by_origin.clone(),
            ),
            None => {
                let analysis = NetworkAnalysis::from_records(&capture.records);
                options.set_origin_timings(
                    analysis.additional_rtt_by_origin,
                    analysis.server_response_time_by_origin,
                )
            }
        }
    }

    /// A stable hash of the settings, part of the key of cached
    /// simulations.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        self.throttling_method.hash(&mut hasher);
        self.throttling.rtt.hash(&mut hasher);
        self.throttling.throughput.hash(&mut hasher);
        self.throttling.cpu_slowdown.value().to_bits().hash(&mut hasher);
        self.max_connections_per_origin.hash(&mut hasher);
        if let Some(timings) = &self.origin_timings {
            for by_origin in [
                &timings.additional_rtt_by_origin,
                &timings.server_response_time_by_origin,
            ] {
                by_origin.len().hash(&mut hasher);
                for (origin, value) in by_origin {
                    origin.hash(&mut hasher);
                    value.to_bits().hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::measure::{CpuSlowdown, Latency};

    #[test]
    fn defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.throttling, ThrottlingProfile::mobile_slow_4g());
        assert_eq!(settings.throttling_method, ThrottlingMethod::Simulate);
    }

    #[test]
    fn from_values() {
        let settings = Settings::from_values(40.0, 10_240.0, 1.0).unwrap();
        assert_eq!(settings.throttling.rtt, Latency::from_millis(40));
        assert_eq!(settings.throttling.cpu_slowdown, CpuSlowdown::NONE);

        assert!(matches!(
            Settings::from_values(40.0, 10_240.0, 0.0),
            Err(Error::InvalidSettings(_))
        ));
    }

    #[test]
    fn fingerprint_follows_the_settings() {
        let settings = Settings::default();
        assert_eq!(settings.fingerprint(), Settings::default().fingerprint());
        assert_ne!(
            settings.fingerprint(),
            settings.clone().set_max_connections_per_origin(2).fingerprint()
        );
        assert_ne!(
            settings.fingerprint(),
            settings
                .clone()
                .set_throttling_method(ThrottlingMethod::Provided)
                .fingerprint()
        );
    }

    #[test]
    fn fingerprint_tells_origin_timings_apart() {
        let timings = BTreeMap::from([("https://a.com".to_owned(), 20.0)]);
        let rtt = Settings::default().set_origin_timings(OriginTimings {
            additional_rtt_by_origin: timings.clone(),
            ..OriginTimings::default()
        });
        let server = Settings::default().set_origin_timings(OriginTimings {
            server_response_time_by_origin: timings,
            ..OriginTimings::default()
        });
        assert_ne!(rtt.fingerprint(), server.fingerprint());
    }

    #[test]
    fn provided_origin_timings_win() {
        let capture = PageCapture::new(Vec::new(), Vec::new(), Default::default());
        let timings = OriginTimings {
            additional_rtt_by_origin: BTreeMap::from([("https://a.com".to_owned(), 20.0)]),
            ..OriginTimings::default()
        };
        let options = Settings::default()
            .set_max_connections_per_origin(2)
            .set_origin_timings(timings)
            .simulation_options(&capture);

        assert_eq!(options.max_connections_per_origin, 2);
        assert_eq!(options.additional_rtt_by_origin["https://a.com"], 20.0);
    }
}
