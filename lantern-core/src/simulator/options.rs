use crate::{
    defaults::{DEFAULT_LAYOUT_TASK_MULTIPLIER, DEFAULT_MAX_CONNECTIONS_PER_ORIGIN},
    measure::ThrottlingProfile,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Everything a simulation run needs to know about the simulated device.
///
/// ## Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | Profile | [`ThrottlingProfile::mobile_slow_4g`] |
/// | Connections per origin | 6 |
/// | Layout task multiplier | 0.5 |
/// | Additional RTT per origin | none |
/// | Server response time per origin | 30ms when unknown |
///
/// ## Example
///
/// ```
/// use lantern_core::{measure::ThrottlingProfile, simulator::SimulationOptions};
///
/// let options = SimulationOptions::new(ThrottlingProfile::desktop_dense_4g())
///     .set_max_connections_per_origin(2)
///     .set_additional_rtt("https://cdn.example.com", 30.0);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    pub profile: ThrottlingProfile,
    pub max_connections_per_origin: usize,
    /// fraction of the CPU slowdown paid by tasks that performed layout,
    /// when the estimate strategy grants the discount
    pub layout_task_multiplier: f64,
    /// extra round trip time of an origin, in milliseconds
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    /// time the server of an origin takes to respond, in milliseconds
    pub server_response_time_by_origin: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidOptionsError {
    #[error("at least one connection per origin is required")]
    NoConnections,
    #[error("throughput must be positive")]
    NoThroughput,
    #[error("layout task multiplier must be a positive finite number, got {0}")]
    LayoutTaskMultiplier(f64),
    #[error("invalid timing for origin {origin}: {value}ms")]
    OriginTiming { origin: String, value: f64 },
}

impl SimulationOptions {
    pub fn new(profile: ThrottlingProfile) -> Self {
        Self {
            profile,
            max_connections_per_origin: DEFAULT_MAX_CONNECTIONS_PER_ORIGIN,
            layout_task_multiplier: DEFAULT_LAYOUT_TASK_MULTIPLIER,
            additional_rtt_by_origin: BTreeMap::new(),
            server_response_time_by_origin: BTreeMap::new(),
        }
    }

    pub fn set_max_connections_per_origin(mut self, max: usize) -> Self {
        self.max_connections_per_origin = max;
        self
    }

    pub fn set_layout_task_multiplier(mut self, multiplier: f64) -> Self {
        self.layout_task_multiplier = multiplier;
        self
    }

    pub fn set_additional_rtt(mut self, origin: impl Into<String>, ms: f64) -> Self {
        self.additional_rtt_by_origin.insert(origin.into(), ms);
        self
    }

    pub fn set_server_response_time(mut self, origin: impl Into<String>, ms: f64) -> Self {
        self.server_response_time_by_origin.insert(origin.into(), ms);
        self
    }

    /// Replace the per-origin adjustments, typically with the estimates
    /// of a [`NetworkAnalysis`](super::NetworkAnalysis).
    pub fn set_origin_timings(
        mut self,
        additional_rtt_by_origin: BTreeMap<String, f64>,
        server_response_time_by_origin: BTreeMap<String, f64>,
    ) -> Self {
        self.additional_rtt_by_origin = additional_rtt_by_origin;
        self.server_response_time_by_origin = server_response_time_by_origin;
        self
    }

    /// Reject options no simulation can run with.
    pub fn validate(&self) -> Result<(), InvalidOptionsError> {
        if self.max_connections_per_origin == 0 {
            return Err(InvalidOptionsError::NoConnections);
        }
        if self.profile.throughput.bits_per_second() == 0 {
            return Err(InvalidOptionsError::NoThroughput);
        }
        let multiplier = self.layout_task_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(InvalidOptionsError::LayoutTaskMultiplier(multiplier));
        }

        let timings = self
            .additional_rtt_by_origin
            .iter()
            .chain(self.server_response_time_by_origin.iter());
        for (origin, &value) in timings {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidOptionsError::OriginTiming {
                    origin: origin.clone(),
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self::new(ThrottlingProfile::default())
    }
}
