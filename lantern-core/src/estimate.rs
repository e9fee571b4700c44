//! Optimistic and pessimistic readings of the same page load.
//!
//! The simulator has a single entry point; the strategies only change the
//! [`ResourceAssumptions`] it runs with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How generous the simulator is with connections and the main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceAssumptions {
    /// once a request to a host completed, every connection opened to
    /// that host starts warm
    pub warm_hosts: bool,
    /// every request negotiates a new TCP (and TLS) connection
    pub fresh_connection_per_request: bool,
    /// tasks that performed layout pay the layout multiplier instead of
    /// the full CPU slowdown
    pub layout_discount: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStrategy {
    Optimistic,
    Pessimistic,
}

impl EstimateStrategy {
    pub const ALL: [Self; 2] = [Self::Optimistic, Self::Pessimistic];

    pub fn assumptions(self) -> ResourceAssumptions {
        match self {
            Self::Optimistic => ResourceAssumptions {
                warm_hosts: true,
                fresh_connection_per_request: false,
                layout_discount: true,
            },
            Self::Pessimistic => ResourceAssumptions {
                warm_hosts: false,
                fresh_connection_per_request: true,
                layout_discount: false,
            },
        }
    }
}

/// The two simulated bounds of one metric, in milliseconds.
///
/// The two runs share throughput among different sets of in-flight
/// requests: an optimistic run whose tasks end early can have more
/// downloads competing at once and finish after the pessimistic run. The
/// pessimistic bound is raised to the optimistic one when that happens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateBounds {
    pub optimistic_ms: f64,
    pub pessimistic_ms: f64,
}

impl EstimateBounds {
    pub fn new(optimistic_ms: f64, pessimistic_ms: f64) -> Self {
        Self {
            optimistic_ms,
            pessimistic_ms: pessimistic_ms.max(optimistic_ms),
        }
    }

    /// Never negative.
    pub fn gap_ms(&self) -> f64 {
        self.pessimistic_ms - self.optimistic_ms
    }
}

impl fmt::Display for EstimateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimistic => f.write_str("optimistic"),
            Self::Pessimistic => f.write_str("pessimistic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies() {
        let optimistic = EstimateStrategy::Optimistic.assumptions();
        assert!(optimistic.warm_hosts && optimistic.layout_discount);
        assert!(!optimistic.fresh_connection_per_request);

        let pessimistic = EstimateStrategy::Pessimistic.assumptions();
        assert!(pessimistic.fresh_connection_per_request);
        assert!(!pessimistic.warm_hosts && !pessimistic.layout_discount);

        assert_eq!(
            ResourceAssumptions::default(),
            ResourceAssumptions {
                warm_hosts: false,
                fresh_connection_per_request: false,
                layout_discount: false,
            }
        );
    }

    #[test]
    fn pessimistic_bound_is_raised_to_optimistic() {
        let bounds = EstimateBounds::new(3288.0, 3216.0);
        assert_eq!(bounds.optimistic_ms, 3288.0);
        assert_eq!(bounds.pessimistic_ms, 3288.0);
        assert_eq!(bounds.gap_ms(), 0.0);

        let bounds = EstimateBounds::new(1200.0, 1800.0);
        assert_eq!(bounds.pessimistic_ms, 1800.0);
        assert_eq!(bounds.gap_ms(), 600.0);
    }

    #[test]
    fn display() {
        assert_eq!(EstimateStrategy::Optimistic.to_string(), "optimistic");
        assert_eq!(EstimateStrategy::Pessimistic.to_string(), "pessimistic");
    }
}
