use super::{Coefficients, Extras, Metric, paint_graph};
use crate::{Error, Settings};
use lantern_core::{
    estimate::EstimateStrategy,
    graph::DependencyGraph,
    simulator::SimulationResult,
    trace::PageCapture,
};
use std::sync::Arc;

const COEFFICIENTS: Coefficients = Coefficients::new(-250.0, 1.4, 0.65);
/// used when the round trip time is too short for the regression to hold
const LOW_RTT_COEFFICIENTS: Coefficients = Coefficients::new(0.0, 0.5, 0.5);

/// Speed Index, approximated by when layouts happen.
///
/// Every CPU node that performed layout weighs its end time by the log of
/// its duration; the estimate is the weighted average of those times,
/// never before the first contentful paint of the same bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedIndex;

impl Metric for SpeedIndex {
    const NAME: &'static str = "speed-index";

    /// The regression coefficients hold from 150ms of round trip time and
    /// fade to an even blend as it gets down to 30ms.
    fn coefficients(&self, settings: &Settings) -> Coefficients {
        let rtt = settings.throttling.rtt.as_millis_f64();
        let ratio = ((rtt - 30.0) / 120.0).clamp(0.0, 1.0);
        let interpolate = |low: f64, high: f64| low * (1.0 - ratio) + high * ratio;

        Coefficients::new(
            interpolate(LOW_RTT_COEFFICIENTS.intercept, COEFFICIENTS.intercept),
            interpolate(LOW_RTT_COEFFICIENTS.optimistic, COEFFICIENTS.optimistic),
            interpolate(LOW_RTT_COEFFICIENTS.pessimistic, COEFFICIENTS.pessimistic),
        )
    }

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error> {
        paint_graph(graph, capture.markers.first_contentful_paint, |network| {
            network.is_render_blocking()
        })
    }

    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        _capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error> {
        Ok(Arc::clone(graph))
    }

    fn estimate(
        &self,
        graph: &DependencyGraph,
        simulation: &SimulationResult,
        strategy: EstimateStrategy,
        extras: &Extras<'_>,
    ) -> f64 {
        let fcp = extras.first_contentful_paint(strategy);

        let mut total_weight = 0.0;
        let mut weighted_time = 0.0;
        for (id, cpu) in graph.cpu_nodes() {
            if !cpu.performs_layout() {
                continue;
            }
            let Some(timing) = simulation.timing(id) else {
                continue;
            };
            let weight = timing.duration_ms.log2().max(0.0);
            total_weight += weight;
            weighted_time += timing.end_ms * weight;
        }

        if total_weight == 0.0 {
            return fcp;
        }
        (weighted_time / total_weight).max(fcp)
    }
}
