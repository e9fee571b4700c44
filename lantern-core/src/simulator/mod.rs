//! Replay a [`DependencyGraph`] under simulated network and CPU
//! conditions.
//!
//! The simulation is a discrete event loop. Every step starts the nodes
//! whose dependencies are complete (as long as a connection or the main
//! thread is available), estimates how long every node in progress still
//! needs, then moves the clock to the earliest completion. Nodes in
//! progress make progress for that period; the ones whose estimate
//! matched the period complete.
//!
//! ```
//! use lantern_core::{
//!     estimate::EstimateStrategy,
//!     graph::GraphBuilder,
//!     record::{NetworkRecord, RequestId},
//!     simulator::{simulate, SimulationOptions},
//! };
//! use std::sync::Arc;
//!
//! let document = NetworkRecord {
//!     transfer_size: 10_000,
//!     ..NetworkRecord::new(RequestId::new("1"), "https://a.com/")
//! };
//! let mut builder = GraphBuilder::new();
//! let root = builder.add_network(Arc::new(document));
//! let graph = builder.build(root).unwrap();
//!
//! let result = simulate(
//!     &graph,
//!     &SimulationOptions::default(),
//!     EstimateStrategy::Pessimistic.assumptions(),
//! )
//! .unwrap();
//! // DNS, TCP and TLS handshakes, request and server response
//! assert_eq!(result.time_in_ms, 300.0 + 225.0 + 150.0 + 30.0 + 75.0);
//! ```

mod analyzer;
mod connection;
mod dns;
mod options;
mod pool;
mod result;

pub use self::{
    analyzer::NetworkAnalysis,
    connection::{Download, DownloadLimits, TcpConnection},
    dns::DnsCache,
    options::{InvalidOptionsError, SimulationOptions},
    pool::ConnectionPool,
    result::{NodeTiming, SimulationResult, SimulationStats},
};
use crate::{
    defaults::{
        DEFAULT_DISK_CACHE_MS_PER_MIB, DEFAULT_DISK_CACHE_TIME_MS,
        DEFAULT_MAXIMUM_CPU_TASK_DURATION_MS, DEFAULT_NON_NETWORK_TIME_MS,
        MAXIMUM_SIMULATION_ITERATIONS,
    },
    estimate::ResourceAssumptions,
    graph::{CpuNode, DependencyGraph, NetworkNode, NodeId, NodeKind},
    record::NetworkRecord,
    time::as_millis_f64,
};
use std::{cmp::Reverse, collections::BTreeSet};
use thiserror::Error;
use tracing::{debug, trace};

const MIB: f64 = 1_024.0 * 1_024.0;

#[derive(Debug, Error)]
#[error("Nodes {nodes:?} never completed")]
pub struct UnreachableNodeError {
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Unreachable(#[from] UnreachableNodeError),
    #[error(transparent)]
    InvalidOptions(#[from] InvalidOptionsError),
    #[error("Simulation did not settle after {iterations} iterations")]
    DepthExceeded { iterations: usize },
    #[error("Node ({node}) has no finite time remaining at {time_ms}ms")]
    NonFiniteEstimate { node: NodeId, time_ms: f64 },
}

/// Simulate the page load of `graph`.
///
/// Both estimates go through here, `assumptions` is what sets them apart
/// (see [`EstimateStrategy`](crate::estimate::EstimateStrategy)).
///
/// # Errors
///
/// - [`SimulationError::InvalidOptions`] before anything runs;
/// - [`SimulationError::Unreachable`] if some nodes never complete;
/// - [`SimulationError::DepthExceeded`] if the loop does not settle.
pub fn simulate(
    graph: &DependencyGraph,
    options: &SimulationOptions,
    assumptions: ResourceAssumptions,
) -> Result<SimulationResult, SimulationError> {
    options.validate()?;
    Simulation::new(graph, options, assumptions).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotReady,
    Ready,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    start_ms: f64,
    end_ms: f64,
    time_elapsed: f64,
    /// time spent past the end of the previous period, deducted from the
    /// next one
    time_elapsed_overshoot: f64,
    bytes_downloaded: f64,
    dns_resolution_time: f64,
    estimated_time_elapsed: f64,
}

struct Simulation<'a> {
    graph: &'a DependencyGraph,
    options: &'a SimulationOptions,
    assumptions: ResourceAssumptions,
    pool: ConnectionPool,
    dns: DnsCache,

    state: Vec<State>,
    remaining_dependencies: Vec<usize>,
    progress: Vec<Progress>,
    ready: BTreeSet<NodeId>,
    in_progress: BTreeSet<NodeId>,
    cpu_busy: bool,

    now: f64,
    stats: SimulationStats,
}

impl<'a> Simulation<'a> {
    fn new(
        graph: &'a DependencyGraph,
        options: &'a SimulationOptions,
        assumptions: ResourceAssumptions,
    ) -> Self {
        let len = graph.len();
        Self {
            graph,
            options,
            assumptions,
            pool: ConnectionPool::new(graph, options, assumptions),
            dns: DnsCache::new(options.profile.rtt.as_millis_f64()),
            state: vec![State::NotReady; len],
            remaining_dependencies: graph
                .nodes()
                .map(|node| graph.dependency_edges(node.id()).len())
                .collect(),
            progress: vec![Progress::default(); len],
            ready: BTreeSet::new(),
            in_progress: BTreeSet::new(),
            cpu_busy: false,
            now: 0.0,
            stats: SimulationStats::default(),
        }
    }

    fn run(mut self) -> Result<SimulationResult, SimulationError> {
        debug!(
            nodes = self.graph.len(),
            profile = %self.options.profile,
            assumptions = ?self.assumptions,
            "simulation started"
        );

        // anything not reachable from the root never becomes ready
        let root = self.graph.root();
        if self.remaining_dependencies[root.index()] == 0 {
            self.mark_ready(root);
        }

        while !self.ready.is_empty() || !self.in_progress.is_empty() {
            self.stats.iterations += 1;
            if self.stats.iterations > MAXIMUM_SIMULATION_ITERATIONS {
                return Err(SimulationError::DepthExceeded {
                    iterations: MAXIMUM_SIMULATION_ITERATIONS,
                });
            }

            self.start_ready_nodes();
            if self.in_progress.is_empty() {
                break;
            }
            self.share_network_capacity();

            let mut minimum = f64::INFINITY;
            for node in self.in_progress.clone() {
                let estimate = self.estimate_time_remaining(node);
                if !estimate.is_finite() {
                    return Err(SimulationError::NonFiniteEstimate {
                        node,
                        time_ms: self.now,
                    });
                }
                minimum = minimum.min(estimate);
            }

            self.now += minimum;
            for node in self.in_progress.clone() {
                self.update_progress(node, minimum);
            }
        }

        self.finish()
    }

    fn finish(self) -> Result<SimulationResult, SimulationError> {
        let unreachable: Vec<NodeId> = self
            .state
            .iter()
            .enumerate()
            .filter(|(_, state)| **state != State::Complete)
            .map(|(index, _)| NodeId::from_index(index))
            .collect();
        if !unreachable.is_empty() {
            return Err(UnreachableNodeError { nodes: unreachable }.into());
        }

        let node_timings: std::collections::BTreeMap<_, _> = self
            .progress
            .iter()
            .enumerate()
            .map(|(index, progress)| {
                (
                    NodeId::from_index(index),
                    NodeTiming::new(progress.start_ms, progress.end_ms),
                )
            })
            .collect();
        let time_in_ms = node_timings
            .values()
            .map(|timing| timing.end_ms)
            .fold(0.0, f64::max);

        let mut stats = self.stats;
        stats.connections_opened = self.pool.connections_opened;
        stats.cold_handshakes = self.pool.cold_handshakes;

        debug!(
            time_in_ms,
            iterations = stats.iterations,
            connections = stats.connections_opened,
            "simulation complete"
        );

        Ok(SimulationResult {
            time_in_ms,
            node_timings,
            stats,
        })
    }

    fn mark_ready(&mut self, node: NodeId) {
        self.state[node.index()] = State::Ready;
        self.ready.insert(node);
    }

    fn start_ready_nodes(&mut self) {
        let mut ready: Vec<NodeId> = self.ready.iter().copied().collect();
        ready.sort_by_key(|&id| {
            let node = self.graph.node(id);
            let warm = node
                .as_network()
                .is_some_and(|network| self.pool.has_warm_idle(&network.record));
            (Reverse(warm), node.start_time(), id)
        });

        for id in ready {
            let graph = self.graph;
            let started = match graph.node(id).kind() {
                NodeKind::Cpu(_) => {
                    if self.cpu_busy {
                        false
                    } else {
                        self.cpu_busy = true;
                        true
                    }
                }
                NodeKind::Network(network) => self.start_network(id, &network.record),
            };
            if started {
                self.ready.remove(&id);
                self.state[id.index()] = State::InProgress;
                self.in_progress.insert(id);
                self.progress[id.index()].start_ms = self.now;
                trace!(node = %id, at = self.now, "node started");
            }
        }
    }

    fn start_network(&mut self, id: NodeId, record: &NetworkRecord) -> bool {
        if is_connectionless(record) {
            return true;
        }
        if self.pool.acquire(id, record).is_none() {
            return false;
        }
        let dns_resolution_time = self.dns.resolve(record.host(), self.now);
        self.progress[id.index()].dns_resolution_time = dns_resolution_time;
        true
    }

    fn share_network_capacity(&mut self) {
        let in_flight = self
            .in_progress
            .iter()
            .filter(|id| self.graph.node(**id).is_network())
            .count();
        self.pool.share_throughput(in_flight);
    }

    fn cpu_time(&self, cpu: &CpuNode) -> f64 {
        let slowdown = self.options.profile.cpu_slowdown.value();
        let multiplier = if self.assumptions.layout_discount && cpu.performs_layout() {
            slowdown * self.options.layout_task_multiplier
        } else {
            slowdown
        };
        let duration = as_millis_f64(cpu.task.duration) * multiplier;
        duration.round().min(DEFAULT_MAXIMUM_CPU_TASK_DURATION_MS)
    }

    fn estimate_time_remaining(&mut self, id: NodeId) -> f64 {
        let graph = self.graph;
        let progress = self.progress[id.index()];
        let estimate = match graph.node(id).kind() {
            NodeKind::Cpu(cpu) => self.cpu_time(cpu) - progress.time_elapsed,
            NodeKind::Network(network) if is_connectionless(&network.record) => {
                connectionless_time(&network.record) - progress.time_elapsed
            }
            NodeKind::Network(network) => match self.pool.get(id) {
                Some(connection) => {
                    let download = connection.simulate_download_until(
                        bytes_remaining(network, &progress),
                        DownloadLimits {
                            time_already_elapsed: progress.time_elapsed,
                            maximum_time_to_elapse: f64::INFINITY,
                            dns_resolution_time: progress.dns_resolution_time,
                        },
                    );
                    download.time_elapsed + progress.time_elapsed_overshoot
                }
                None => f64::INFINITY,
            },
        };
        let estimate = estimate.max(0.0);
        self.progress[id.index()].estimated_time_elapsed = estimate;
        estimate
    }

    fn update_progress(&mut self, id: NodeId, period: f64) {
        let graph = self.graph;
        let progress = self.progress[id.index()];
        let finished = progress.estimated_time_elapsed == period;

        if let NodeKind::Network(network) = graph.node(id).kind()
            && let Some(connection) = self.pool.get_mut(id)
        {
            let download = connection.simulate_download_until(
                bytes_remaining(network, &progress),
                DownloadLimits {
                    time_already_elapsed: progress.time_elapsed,
                    maximum_time_to_elapse: period - progress.time_elapsed_overshoot,
                    dns_resolution_time: progress.dns_resolution_time,
                },
            );
            connection.set_congestion_window(download.congestion_window);
            connection.set_h2_overflow_bytes(download.extra_bytes_downloaded);

            if !finished {
                let progress = &mut self.progress[id.index()];
                progress.time_elapsed += download.time_elapsed;
                progress.time_elapsed_overshoot += download.time_elapsed - period;
                progress.bytes_downloaded += download.bytes_downloaded;
                return;
            }
        }

        if finished {
            self.complete(id);
        } else {
            self.progress[id.index()].time_elapsed += period;
        }
    }

    fn complete(&mut self, id: NodeId) {
        let graph = self.graph;
        let node = graph.node(id);
        let progress = &mut self.progress[id.index()];
        progress.end_ms = self.now;

        match node.kind() {
            NodeKind::Cpu(_) => {
                self.cpu_busy = false;
                self.stats.cpu_busy_ms += progress.end_ms - progress.start_ms;
            }
            NodeKind::Network(_) => self.pool.release(id),
        }
        self.in_progress.remove(&id);
        self.state[id.index()] = State::Complete;
        trace!(node = %id, at = self.now, "node complete");

        for dependent in graph.dependents(id) {
            let remaining = &mut self.remaining_dependencies[dependent.index()];
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 && self.state[dependent.index()] == State::NotReady {
                self.mark_ready(dependent);
            }
        }
    }
}

/// Requests answered without a connection: disk cache hits and
/// non-network schemes.
fn is_connectionless(record: &NetworkRecord) -> bool {
    record.from_disk_cache || record.is_non_network()
}

fn connectionless_time(record: &NetworkRecord) -> f64 {
    if record.from_disk_cache {
        DEFAULT_DISK_CACHE_TIME_MS
            + DEFAULT_DISK_CACHE_MS_PER_MIB * record.resource_size as f64 / MIB
    } else {
        DEFAULT_NON_NETWORK_TIME_MS
    }
}

fn bytes_remaining(network: &NetworkNode, progress: &Progress) -> f64 {
    network.record.transfer_size as f64 - progress.bytes_downloaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        estimate::EstimateStrategy,
        graph::GraphBuilder,
        measure::{CpuSlowdown, Latency, Throughput, ThrottlingProfile},
        record::RequestId,
        task::Task,
    };
    use std::{sync::Arc, time::Duration};

    fn profile() -> ThrottlingProfile {
        // 1000 segments per round trip, never the bottleneck in these tests
        ThrottlingProfile::new(
            Latency::from_millis(100),
            Throughput::new(116_800_000),
            CpuSlowdown::NONE,
        )
    }

    fn options() -> SimulationOptions {
        SimulationOptions::new(profile())
    }

    fn request(id: &str, url: &str, start_ms: u64, transfer_size: u64) -> Arc<NetworkRecord> {
        Arc::new(NetworkRecord {
            start_time: Duration::from_millis(start_ms),
            transfer_size,
            ..NetworkRecord::new(RequestId::new(id), url)
        })
    }

    fn task(start_ms: u64, duration_ms: u64, layout: bool) -> Arc<Task> {
        let mut tasks = Task::forest(vec![crate::task::TaskEvent::new(
            "RunTask",
            Duration::from_millis(start_ms),
            Duration::from_millis(duration_ms),
        )]);
        let mut task = tasks.remove(0);
        task.performs_layout = layout;
        Arc::new(task)
    }

    #[test]
    fn single_request() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_network(request("1", "http://a.com/", 0, 1_000));
        let graph = builder.build(root).unwrap();

        let result = simulate(&graph, &options(), ResourceAssumptions::default()).unwrap();
        // DNS 200, handshake and request 150, server 30, response 50
        assert_eq!(result.time_in_ms, 430.0);
        assert_eq!(result.timing(root).unwrap().start_ms, 0.0);
        assert_eq!(result.stats.connections_opened, 1);
        assert_eq!(result.stats.cold_handshakes, 1);
    }

    #[test]
    fn chain_reuses_warm_connection() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_network(request("1", "http://a.com/", 0, 1_000));
        let script = builder.add_network(request("2", "http://a.com/app.js", 10, 1_000));
        builder.add_dependency(script, root);
        let graph = builder.build(root).unwrap();

        let result = simulate(&graph, &options(), ResourceAssumptions::default()).unwrap();
        let timing = result.timing(script).unwrap();
        assert_eq!(timing.start_ms, 430.0);
        // request 50, server 30, response 50
        assert_eq!(timing.end_ms, 560.0);
        assert_eq!(result.stats.connections_opened, 1);

        let pessimistic = simulate(
            &graph,
            &options(),
            EstimateStrategy::Pessimistic.assumptions(),
        )
        .unwrap();
        // DNS is cached, the handshake is paid again
        assert_eq!(pessimistic.timing(script).unwrap().end_ms, 430.0 + 230.0);
        assert_eq!(pessimistic.stats.cold_handshakes, 2);
    }

    #[test]
    fn cpu_runs_one_task_at_a_time() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_network(request("1", "http://a.com/", 0, 1_000));
        let parse = builder.add_cpu(task(500, 40, false));
        let layout = builder.add_cpu(task(600, 40, true));
        builder.add_dependency(parse, root);
        builder.add_dependency(layout, root);
        let graph = builder.build(root).unwrap();

        let options = SimulationOptions::new(ThrottlingProfile {
            cpu_slowdown: CpuSlowdown::new(2.0).unwrap(),
            ..profile()
        });

        let result = simulate(&graph, &options, ResourceAssumptions::default()).unwrap();
        assert_eq!(result.timing(parse).unwrap().end_ms, 510.0);
        assert_eq!(result.timing(layout).unwrap().start_ms, 510.0);
        assert_eq!(result.timing(layout).unwrap().end_ms, 590.0);
        assert_eq!(result.stats.cpu_busy_ms, 160.0);

        let optimistic =
            simulate(&graph, &options, EstimateStrategy::Optimistic.assumptions()).unwrap();
        assert_eq!(optimistic.timing(layout).unwrap().end_ms, 550.0);
    }

    #[test]
    fn cpu_time_is_capped() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_cpu(task(0, 8_000, false));
        let graph = builder.build(root).unwrap();

        let result = simulate(
            &graph,
            &SimulationOptions::default(),
            ResourceAssumptions::default(),
        )
        .unwrap();
        assert_eq!(result.time_in_ms, 10_000.0);
    }

    #[test]
    fn connectionless_requests() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_network(request("1", "data:image/png;base64,AAAA", 0, 0));
        let cached = builder.add_network(Arc::new(NetworkRecord {
            from_disk_cache: true,
            resource_size: 2 * 1_024 * 1_024,
            ..NetworkRecord::new(RequestId::new("2"), "http://a.com/logo.png")
        }));
        builder.add_dependency(cached, root);
        let graph = builder.build(root).unwrap();

        let result = simulate(&graph, &options(), ResourceAssumptions::default()).unwrap();
        assert_eq!(result.timing(root).unwrap().end_ms, 2.0);
        assert_eq!(result.timing(cached).unwrap().duration_ms, 48.0);
        assert_eq!(result.stats.connections_opened, 0);
    }

    #[test]
    fn connections_per_origin_are_bounded() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_network(request("0", "http://a.com/", 0, 1_000));
        let images: Vec<_> = (1..=3)
            .map(|i| {
                let image = builder.add_network(request(
                    &i.to_string(),
                    &format!("http://b.com/{i}.png"),
                    10,
                    1_000,
                ));
                builder.add_dependency(image, root);
                image
            })
            .collect();
        let graph = builder.build(root).unwrap();
        let options = options().set_max_connections_per_origin(1);

        let result = simulate(&graph, &options, ResourceAssumptions::default()).unwrap();
        let ends: Vec<f64> = images
            .iter()
            .map(|image| result.timing(*image).unwrap().end_ms)
            .collect();
        // cold request to b.com, then two warm ones queued on the same connection
        assert_eq!(ends, vec![860.0, 990.0, 1_120.0]);
        assert_eq!(result.stats.connections_opened, 2);
    }

    #[test]
    fn invalid_options() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_network(request("1", "http://a.com/", 0, 1_000));
        let graph = builder.build(root).unwrap();
        let options = options().set_max_connections_per_origin(0);

        assert!(matches!(
            simulate(&graph, &options, ResourceAssumptions::default()),
            Err(SimulationError::InvalidOptions(InvalidOptionsError::NoConnections))
        ));
    }

    #[test]
    fn nodes_off_the_root_are_unreachable() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_network(request("1", "http://a.com/", 0, 1_000));
        let script = builder.add_network(request("2", "http://a.com/app.js", 10, 1_000));
        let orphan = builder.add_network(request("3", "http://b.com/beacon", 20, 100));
        let eval = builder.add_cpu(task(900, 30, false));
        builder.add_dependency(script, root);
        builder.add_dependency(eval, orphan);
        let graph = builder.build(root).unwrap();

        match simulate(&graph, &options(), ResourceAssumptions::default()) {
            Err(SimulationError::Unreachable(error)) => {
                assert_eq!(error.nodes, vec![orphan, eval]);
            }
            other => panic!("expected unreachable nodes, got {other:?}"),
        }
    }

    #[test]
    fn starts_after_dependencies() {
        let mut builder = GraphBuilder::new();
        let root = builder.add_network(request("1", "https://a.com/", 0, 20_000));
        let css = builder.add_network(request("2", "https://a.com/a.css", 10, 5_000));
        let js = builder.add_network(request("3", "https://cdn.com/a.js", 20, 80_000));
        let eval = builder.add_cpu(task(900, 30, false));
        builder.add_dependency(css, root);
        builder.add_dependency(js, root);
        builder.add_dependency(eval, js);
        builder.add_dependency(eval, css);
        let graph = builder.build(root).unwrap();

        for strategy in EstimateStrategy::ALL {
            let result =
                simulate(&graph, &SimulationOptions::default(), strategy.assumptions()).unwrap();
            for node in graph.nodes() {
                let timing = result.timing(node.id()).unwrap();
                assert!(timing.start_ms <= timing.end_ms);
                for dependency in graph.dependencies(node.id()) {
                    assert!(timing.start_ms >= result.timing(dependency).unwrap().end_ms);
                }
            }
        }
    }
}
