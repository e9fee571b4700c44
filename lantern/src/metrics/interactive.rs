use super::{Coefficients, Extras, Metric};
use crate::{Error, Settings};
use lantern_core::{
    defaults::LONG_TASK_THRESHOLD,
    estimate::EstimateStrategy,
    graph::{DependencyGraph, NodeKind},
    simulator::SimulationResult,
    time::as_millis_f64,
    trace::PageCapture,
};
use std::{sync::Arc, time::Duration};

/// CPU nodes shorter than this are left out of the optimistic graph.
const MINIMUM_CPU_TASK_DURATION: Duration = Duration::from_millis(20);

/// Time to Interactive: the end of the last long task of the main thread,
/// never before the first contentful paint of the same bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interactive;

impl Metric for Interactive {
    const NAME: &'static str = "interactive";

    fn coefficients(&self, _settings: &Settings) -> Coefficients {
        Coefficients::new(0.0, 0.45, 0.55)
    }

    /// The main thread work that matters and the requests that feed it:
    /// scripts and high priority requests, never images.
    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        _capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error> {
        let graph = graph.filtered(|node| match node.kind() {
            NodeKind::Cpu(cpu) => cpu.task.duration > MINIMUM_CPU_TASK_DURATION,
            NodeKind::Network(network) => {
                !network.is_image() && (network.is_script() || network.record.priority.is_high())
            }
        })?;
        Ok(Arc::new(graph))
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
        let long_task = as_millis_f64(LONG_TASK_THRESHOLD);
        let last_long_task_end = graph
            .cpu_nodes()
            .filter_map(|(id, _)| simulation.timing(id))
            .filter(|timing| timing.duration_ms > long_task)
            .map(|timing| timing.end_ms)
            .fold(0.0, f64::max);

        last_long_task_end.max(extras.first_contentful_paint(strategy))
    }
}
