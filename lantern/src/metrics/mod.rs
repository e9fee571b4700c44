//! Metric estimates from simulated page loads.
//!
//! Every metric picks the part of the dependency graph it depends on, once
//! for an optimistic and once for a pessimistic estimate, simulates both
//! with the matching [`EstimateStrategy`] and blends the two into a single
//! timing with its own [`Coefficients`].

mod fcp;
mod interactive;
mod lcp;
mod speed_index;

pub use self::{
    fcp::FirstContentfulPaint, interactive::Interactive, lcp::LargestContentfulPaint,
    speed_index::SpeedIndex,
};
use crate::{ComputeCache, Error, Settings};
use lantern_core::{
    estimate::{EstimateBounds, EstimateStrategy},
    graph::{DependencyGraph, NetworkNode, NodeId, NodeKind},
    simulator::{NodeTiming, SimulationResult},
    trace::PageCapture,
};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tracing::debug;

/// `intercept + optimistic × a + pessimistic × b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coefficients {
    pub intercept: f64,
    pub optimistic: f64,
    pub pessimistic: f64,
}

impl Coefficients {
    pub const fn new(intercept: f64, optimistic: f64, pessimistic: f64) -> Self {
        Self {
            intercept,
            optimistic,
            pessimistic,
        }
    }

    #[inline]
    pub fn blend(&self, optimistic: f64, pessimistic: f64) -> f64 {
        self.intercept + self.optimistic * optimistic + self.pessimistic * pessimistic
    }
}

/// One bound of a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub time_in_ms: f64,
    pub node_timings: BTreeMap<NodeId, NodeTiming>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEstimate {
    pub timing_ms: f64,
    pub optimistic_estimate: Estimate,
    pub pessimistic_estimate: Estimate,
    #[serde(skip)]
    pub optimistic_graph: Arc<DependencyGraph>,
    #[serde(skip)]
    pub pessimistic_graph: Arc<DependencyGraph>,
    /// how far apart the two bounds are
    pub bounds_gap_ms: f64,
}

impl MetricEstimate {
    pub fn estimate(&self, strategy: EstimateStrategy) -> &Estimate {
        match strategy {
            EstimateStrategy::Optimistic => &self.optimistic_estimate,
            EstimateStrategy::Pessimistic => &self.pessimistic_estimate,
        }
    }
}

/// Estimates of other metrics a metric builds on.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extras<'a> {
    pub first_contentful_paint: Option<&'a MetricEstimate>,
}

impl Extras<'_> {
    /// The first contentful paint estimate of the same bound, 0 when
    /// unknown.
    pub(crate) fn first_contentful_paint(&self, strategy: EstimateStrategy) -> f64 {
        self.first_contentful_paint
            .map(|fcp| fcp.estimate(strategy).time_in_ms)
            .unwrap_or(0.0)
    }
}

pub trait Metric {
    const NAME: &'static str;

    fn coefficients(&self, settings: &Settings) -> Coefficients;

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error>;

    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        capture: &PageCapture,
    ) -> Result<Arc<DependencyGraph>, Error>;

    /// The metric value of one simulated bound. Defaults to the end of the
    /// simulation.
    fn estimate(
        &self,
        _graph: &DependencyGraph,
        simulation: &SimulationResult,
        _strategy: EstimateStrategy,
        _extras: &Extras<'_>,
    ) -> f64 {
        simulation.time_in_ms
    }

    fn compute(
        &self,
        capture: &PageCapture,
        settings: &Settings,
        cache: &ComputeCache,
        extras: &Extras<'_>,
    ) -> Result<MetricEstimate, Error>
    where
        Self: Sized,
    {
        let graph = cache.graph(capture)?;
        let optimistic_graph = self.optimistic_graph(&graph, capture)?;
        let pessimistic_graph = self.pessimistic_graph(&graph, capture)?;

        let bound = |graph: &DependencyGraph,
                     strategy: EstimateStrategy|
         -> Result<Estimate, Error> {
            let simulation = cache.simulate(graph, capture, settings, strategy)?;
            Ok(Estimate {
                time_in_ms: self.estimate(graph, &simulation, strategy, extras),
                node_timings: simulation.node_timings.clone(),
            })
        };
        let optimistic_estimate = bound(&optimistic_graph, EstimateStrategy::Optimistic)?;
        let mut pessimistic_estimate = bound(&pessimistic_graph, EstimateStrategy::Pessimistic)?;

        let bounds = EstimateBounds::new(
            optimistic_estimate.time_in_ms,
            pessimistic_estimate.time_in_ms,
        );
        pessimistic_estimate.time_in_ms = bounds.pessimistic_ms;

        let timing_ms = self
            .coefficients(settings)
            .blend(bounds.optimistic_ms, bounds.pessimistic_ms);
        let bounds_gap_ms = bounds.gap_ms();

        debug!(
            metric = Self::NAME,
            timing_ms,
            optimistic = optimistic_estimate.time_in_ms,
            pessimistic = pessimistic_estimate.time_in_ms,
            "metric estimated"
        );

        Ok(MetricEstimate {
            timing_ms,
            optimistic_estimate,
            pessimistic_estimate,
            optimistic_graph,
            pessimistic_graph,
            bounds_gap_ms,
        })
    }
}

/// The part of `graph` that ran before a paint at `cutoff`: the network
/// nodes accepted by `include_network` and every CPU node, as long as they
/// started and ended by the cutoff.
pub(crate) fn paint_graph<F>(
    graph: &DependencyGraph,
    cutoff: Duration,
    include_network: F,
) -> Result<Arc<DependencyGraph>, Error>
where
    F: Fn(&NetworkNode) -> bool,
{
    let graph = graph.filtered(|node| {
        if node.start_time() > cutoff || node.end_time() > cutoff {
            return false;
        }
        match node.kind() {
            NodeKind::Network(network) => include_network(network),
            NodeKind::Cpu(_) => true,
        }
    })?;
    Ok(Arc::new(graph))
}
