use lantern_core::{
    graph::GraphConstructionError,
    measure::CpuSlowdownError,
    quiet::NoQuietPeriodError,
    simulator::SimulationError,
    trace::InvalidTraceError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid trace")]
    InvalidTrace(#[from] InvalidTraceError),
    #[error("Failed to build the dependency graph")]
    GraphConstruction(#[from] GraphConstructionError),
    #[error("Simulation failed")]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    NoQuietPeriod(#[from] NoQuietPeriodError),
    #[error("Invalid throttling settings")]
    InvalidSettings(#[from] CpuSlowdownError),
    #[error("The capture has no {marker} marker")]
    MissingMarker { marker: &'static str },
}

impl Error {
    /// The metric cannot be computed for this capture, the others still
    /// can.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoQuietPeriod(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::quiet::QuietPeriodKind;

    #[test]
    fn only_quiet_periods_are_recoverable() {
        let quiet = Error::from(NoQuietPeriodError {
            kind: QuietPeriodKind::NoCpuIdlePeriod,
            reference_ms: 3_000.0,
            trace_end_ms: 12_000.0,
        });
        assert!(quiet.is_recoverable());
        assert_eq!(
            quiet.to_string(),
            "No CPU idle period after 3000ms, trace ends at 12000ms"
        );

        let graph = Error::from(GraphConstructionError::MissingMainDocument { records: 3 });
        assert!(!graph.is_recoverable());
        assert!(!Error::MissingMarker { marker: "largestContentfulPaint" }.is_recoverable());
    }
}
