use lantern_core::{
    graph::{DependencyGraph, GraphBuilder, NodeId},
    record::{NetworkRecord, RequestId},
    task::{Task, TaskEvent},
};
use rand_chacha::ChaChaRng;
use rand_core::{Rng, SeedableRng as _};
use std::{sync::Arc, time::Duration};

const ORIGINS: [&str; 3] = ["http://a.com", "http://b.com", "https://c.com"];

pub fn request(
    index: usize,
    origin: &str,
    start_ms: u64,
    transfer_size: u64,
) -> Arc<NetworkRecord> {
    Arc::new(NetworkRecord {
        start_time: Duration::from_millis(start_ms),
        end_time: Duration::from_millis(start_ms + 100),
        transfer_size,
        ..NetworkRecord::new(RequestId::new(index.to_string()), format!("{origin}/{index}"))
    })
}

pub fn task(start_ms: u64, duration_ms: u64, performs_layout: bool) -> Arc<Task> {
    let event = TaskEvent::new(
        "RunTask",
        Duration::from_millis(start_ms),
        Duration::from_millis(duration_ms),
    );
    let mut task = Task::forest(vec![event]).remove(0);
    task.performs_layout = performs_layout;
    Arc::new(task)
}

/// Shape of the dependencies of a generated graph.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// every node depends on the one before
    Chain,
    /// every node depends on one or two random earlier nodes
    Dag,
}

/// A random page load of `size` nodes (at least the root document),
/// the same for the same `seed`.
pub fn builder(seed: u64, size: usize, shape: Shape) -> (GraphBuilder, NodeId) {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    let mut builder = GraphBuilder::new();
    let root = builder.add_network(request(0, ORIGINS[0], 0, 20_000));
    let mut nodes = vec![root];

    for index in 1..size.max(1) {
        let start_ms = index as u64 * 10;
        let node = if rng.next_u64() % 10 < 7 {
            let origin = ORIGINS[rng.next_u64() as usize % ORIGINS.len()];
            let transfer_size = rng.next_u64() % 200_000;
            builder.add_network(request(index, origin, start_ms, transfer_size))
        } else {
            let duration_ms = rng.next_u64() % 200;
            builder.add_cpu(task(start_ms, duration_ms, rng.next_u64() % 2 == 0))
        };

        match shape {
            Shape::Chain => {
                builder.add_dependency(node, nodes[index - 1]);
            }
            Shape::Dag => {
                let dependencies = 1 + rng.next_u64() % 2;
                for _ in 0..dependencies {
                    let dependency = rng.next_u64() as usize % index;
                    builder.add_dependency(node, nodes[dependency]);
                }
            }
        }
        nodes.push(node);
    }
    (builder, root)
}

pub fn graph(seed: u64, size: usize, shape: Shape) -> DependencyGraph {
    let (builder, root) = builder(seed, size, shape);
    builder.build(root).expect("generated graphs are acyclic")
}
