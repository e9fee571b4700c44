use super::{SimulationOptions, TcpConnection};
use crate::{
    defaults::DEFAULT_SERVER_RESPONSE_TIME_MS,
    estimate::ResourceAssumptions,
    graph::{DependencyGraph, NodeId},
    record::NetworkRecord,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    origin: usize,
    connection: usize,
}

#[derive(Debug)]
struct Origin {
    tls: bool,
    h2: bool,
    rtt: f64,
    server_response_time: f64,
    /// a request to this origin completed
    warmed: bool,
    connections: Vec<TcpConnection>,
    in_use: Vec<bool>,
}

impl Origin {
    /// A new connection to this origin would skip the handshake.
    fn opens_warm(&self, assumptions: &ResourceAssumptions) -> bool {
        self.warmed
            && (assumptions.warm_hosts || self.h2)
            && !assumptions.fresh_connection_per_request
    }

    fn idle(&self) -> impl Iterator<Item = (usize, &TcpConnection)> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.in_use[*index])
    }
}

/// The connections of a simulation run, at most a fixed number per
/// origin.
///
/// Connections are opened on demand. A request takes the idle connection
/// with the largest congestion window (warm first on ties) and opens a
/// new one only when every existing connection is busy.
#[derive(Debug)]
pub struct ConnectionPool {
    assumptions: ResourceAssumptions,
    max_per_origin: usize,
    throughput: f64,
    origins: Vec<Origin>,
    by_origin: BTreeMap<String, usize>,
    by_node: BTreeMap<NodeId, Slot>,

    pub(super) connections_opened: usize,
    pub(super) cold_handshakes: usize,
}

impl ConnectionPool {
    pub fn new(
        graph: &DependencyGraph,
        options: &SimulationOptions,
        assumptions: ResourceAssumptions,
    ) -> Self {
        let rtt = options.profile.rtt.as_millis_f64();
        let mut pool = Self {
            assumptions,
            max_per_origin: options.max_connections_per_origin,
            throughput: options.profile.throughput.bits_per_second() as f64,
            origins: Vec::new(),
            by_origin: BTreeMap::new(),
            by_node: BTreeMap::new(),
            connections_opened: 0,
            cold_handshakes: 0,
        };

        for (_, node) in graph.network_nodes() {
            let record = &node.record;
            let origin = record.origin();
            if record.is_non_network()
                || record.from_disk_cache
                || pool.by_origin.contains_key(origin)
            {
                continue;
            }
            let additional_rtt = options
                .additional_rtt_by_origin
                .get(origin)
                .copied()
                .unwrap_or(0.0);
            let server_response_time = options
                .server_response_time_by_origin
                .get(origin)
                .copied()
                .unwrap_or(DEFAULT_SERVER_RESPONSE_TIME_MS);

            pool.by_origin.insert(origin.to_owned(), pool.origins.len());
            pool.origins.push(Origin {
                tls: record.is_secure(),
                h2: record.is_multiplexed(),
                rtt: rtt + additional_rtt,
                server_response_time,
                warmed: false,
                connections: Vec::new(),
                in_use: Vec::new(),
            });
        }
        pool
    }

    /// `true` when a request to `record`'s origin would start on a warm
    /// connection right now.
    pub fn has_warm_idle(&self, record: &NetworkRecord) -> bool {
        let Some(origin) = self.by_origin.get(record.origin()).map(|&i| &self.origins[i]) else {
            return false;
        };
        origin.idle().any(|(_, connection)| connection.is_warm())
            || (origin.connections.len() < self.max_per_origin
                && origin.opens_warm(&self.assumptions))
    }

    /// Reserve a connection for `node`, `None` if every connection of the
    /// origin is busy.
    pub fn acquire(&mut self, node: NodeId, record: &NetworkRecord) -> Option<&mut TcpConnection> {
        if self.by_node.contains_key(&node) {
            return self.get_mut(node);
        }
        let origin_index = *self.by_origin.get(record.origin())?;
        let origin = &mut self.origins[origin_index];

        let best = origin
            .idle()
            .max_by(|(a_index, a), (b_index, b)| {
                a.congestion_window()
                    .total_cmp(&b.congestion_window())
                    .then(a.is_warm().cmp(&b.is_warm()))
                    .then(b_index.cmp(a_index))
            })
            .map(|(index, _)| index);

        let connection = match best {
            Some(index) => index,
            None if origin.connections.len() < self.max_per_origin => {
                let mut connection = TcpConnection::new(
                    origin.rtt,
                    self.throughput,
                    origin.server_response_time,
                    origin.tls,
                    origin.h2,
                );
                connection.set_warm(origin.opens_warm(&self.assumptions));
                origin.connections.push(connection);
                origin.in_use.push(false);
                self.connections_opened += 1;
                origin.connections.len() - 1
            }
            None => return None,
        };

        origin.in_use[connection] = true;
        if !origin.connections[connection].is_warm() {
            self.cold_handshakes += 1;
        }
        self.by_node.insert(
            node,
            Slot {
                origin: origin_index,
                connection,
            },
        );
        Some(&mut origin.connections[connection])
    }

    pub fn get(&self, node: NodeId) -> Option<&TcpConnection> {
        let slot = self.by_node.get(&node)?;
        self.origins[slot.origin].connections.get(slot.connection)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut TcpConnection> {
        let slot = self.by_node.get(&node)?;
        self.origins[slot.origin].connections.get_mut(slot.connection)
    }

    /// Give the connection of a completed request back to the pool.
    pub fn release(&mut self, node: NodeId) {
        let Some(slot) = self.by_node.remove(&node) else {
            return;
        };
        let fresh = self.assumptions.fresh_connection_per_request;
        let origin = &mut self.origins[slot.origin];
        origin.in_use[slot.connection] = false;
        origin.warmed = true;

        let connection = &mut origin.connections[slot.connection];
        if fresh {
            connection.reset();
        } else {
            connection.set_warm(true);
        }
    }

    /// Split the throughput evenly between `in_flight` requests.
    pub fn share_throughput(&mut self, in_flight: usize) {
        if in_flight == 0 {
            return;
        }
        let share = self.throughput / in_flight as f64;
        for slot in self.by_node.values() {
            self.origins[slot.origin].connections[slot.connection].set_throughput(share);
        }
    }
}
