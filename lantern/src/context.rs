use crate::{Error, Settings};
use fnv::FnvHashMap;
use lantern_core::{
    estimate::EstimateStrategy,
    graph::DependencyGraph,
    simulator::{SimulationResult, simulate},
    trace::PageCapture,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SimulationKey {
    graph: u64,
    /// origin timings are derived from the capture
    capture: u64,
    settings: u64,
    strategy: EstimateStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Artifacts computed while measuring a capture.
///
/// Graphs are keyed by the fingerprint of the capture they come from and
/// simulations by the fingerprints of the graph, the capture and the
/// [`Settings`], plus the estimate strategy. Inputs never change once built, so entries are
/// never invalidated; drop the cache (or [`clear`](Self::clear) it) to
/// free them.
///
/// The cache can be shared between threads.
#[derive(Debug, Default)]
pub struct ComputeCache {
    graphs: Mutex<FnvHashMap<u64, Arc<DependencyGraph>>>,
    simulations: Mutex<FnvHashMap<SimulationKey, Arc<SimulationResult>>>,
    stats: Mutex<CacheStats>,
}

impl ComputeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, hit: bool) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
    }

    /// The dependency graph of `capture`.
    pub fn graph(&self, capture: &PageCapture) -> Result<Arc<DependencyGraph>, Error> {
        let key = capture.fingerprint();
        if let Some(graph) = self
            .graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            self.record(true);
            return Ok(Arc::clone(graph));
        }

        let graph = Arc::new(DependencyGraph::from_capture(capture)?);
        self.record(false);
        trace!(capture = key, nodes = graph.len(), "dependency graph cached");
        self.graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&graph));
        Ok(graph)
    }

    /// Simulate `graph` for the capture the options are derived from.
    pub fn simulate(
        &self,
        graph: &DependencyGraph,
        capture: &PageCapture,
        settings: &Settings,
        strategy: EstimateStrategy,
    ) -> Result<Arc<SimulationResult>, Error> {
        let key = SimulationKey {
            graph: graph.fingerprint(),
            capture: capture.fingerprint(),
            settings: settings.fingerprint(),
            strategy,
        };
        if let Some(result) = self
            .simulations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            self.record(true);
            return Ok(Arc::clone(result));
        }

        let options = settings.simulation_options(capture);
        let result = Arc::new(simulate(graph, &options, strategy.assumptions())?);
        self.record(false);
        self.simulations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&result));
        Ok(result)
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clear(&self) {
        self.graphs.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.simulations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
