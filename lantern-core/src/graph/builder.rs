//! Discovery of the dependencies of a captured page load.

use super::{DependencyGraph, EdgeKind, GraphBuilder, GraphConstructionError, NodeId};
use crate::{record::NetworkRecord, task::Task, trace::PageCapture};
use std::{collections::BTreeMap, sync::Arc, time::Duration};

/// Network nodes indexed the ways the edge rules look them up.
#[derive(Default)]
struct NetworkIndex<'a> {
    by_url: BTreeMap<&'a str, Vec<(NodeId, &'a NetworkRecord)>>,
    by_request_id: BTreeMap<&'a str, NodeId>,
    /// first hop of each request, keyed by the id the browser used
    by_base_id: BTreeMap<&'a str, NodeId>,
}

impl<'a> NetworkIndex<'a> {
    fn insert(&mut self, id: NodeId, record: &'a NetworkRecord) {
        self.by_url
            .entry(record.url.as_str())
            .or_default()
            .push((id, record));
        self.by_request_id.insert(record.request_id.as_str(), id);
        self.by_base_id
            .entry(record.request_id.base())
            .or_insert(id);
    }

    /// The latest request for `url` that started no later than `time`.
    fn initiator(&self, url: &str, time: Duration, except: NodeId) -> Option<NodeId> {
        self.by_url
            .get(url)?
            .iter()
            .filter(|(id, record)| *id != except && record.start_time <= time)
            .max_by_key(|(id, record)| (record.start_time, *id))
            .map(|(id, _)| *id)
    }

    /// The latest request for `url` that ended no later than `time`,
    /// otherwise the earliest one.
    fn resource(&self, url: &str, time: Duration) -> Option<NodeId> {
        let candidates = self.by_url.get(url)?;
        candidates
            .iter()
            .filter(|(_, record)| record.end_time <= time)
            .max_by_key(|(id, record)| (record.end_time, *id))
            .or_else(|| {
                candidates
                    .iter()
                    .min_by_key(|(id, record)| (record.start_time, *id))
            })
            .map(|(id, _)| *id)
    }
}

impl DependencyGraph {
    /// Build the graph of a normalized page load.
    ///
    /// The root is the first hop of the main document. Requests and tasks
    /// that started before it are left out; the significant top level
    /// tasks of the main thread become CPU nodes.
    ///
    /// # Errors
    ///
    /// [`GraphConstructionError::MissingMainDocument`] when the capture
    /// has no main document.
    pub fn from_capture(capture: &PageCapture) -> Result<Self, GraphConstructionError> {
        let missing = || GraphConstructionError::MissingMainDocument {
            records: capture.records.len(),
        };
        let document = capture.main_document().ok_or_else(missing)?;
        let root_record = document
            .redirect_chain()
            .first()
            .copied()
            .unwrap_or(document.as_ref());
        let root_start = root_record.start_time;

        let mut builder = GraphBuilder::new();
        let mut index = NetworkIndex::default();
        let mut root = None;

        for record in &capture.records {
            if record.start_time < root_start {
                tracing::debug!(
                    request_id = %record.request_id,
                    url = %record.url,
                    "request started before the main document, dropping"
                );
                continue;
            }
            let id = builder.add_network(Arc::clone(record));
            index.insert(id, record);
            if record.request_id == root_record.request_id {
                root = Some(id);
            }
        }
        let root = root.ok_or_else(missing)?;
        let document_node = index
            .by_request_id
            .get(document.request_id.as_str())
            .copied()
            .unwrap_or(root);

        let mut cpu_nodes: Vec<(NodeId, &Task)> = Vec::new();
        for task in &capture.tasks {
            if !task.is_significant() {
                continue;
            }
            if task.start < root_start {
                tracing::debug!(
                    name = %task.name,
                    start = ?task.start,
                    "task started before the main document, dropping"
                );
                continue;
            }
            cpu_nodes.push((builder.add_cpu(Arc::clone(task)), &**task));
        }

        link_network(&mut builder, &index, root);
        link_cpu(&mut builder, &index, &cpu_nodes, document_node);
        builder.link_main_thread();

        // everything else hangs from the root
        for position in 0..builder.len() {
            let id = NodeId::from_index(position);
            if id != root && !builder.has_dependencies(id) {
                builder.add_edge_checked(id, root, EdgeKind::Causal);
            }
        }

        let graph = builder.build(root)?;
        tracing::debug!(
            nodes = graph.len(),
            network = graph.network_nodes().count(),
            cpu = graph.cpu_nodes().count(),
            "dependency graph built"
        );
        Ok(graph)
    }
}

fn link_network(builder: &mut GraphBuilder, index: &NetworkIndex<'_>, root: NodeId) {
    for entries in index.by_url.values() {
        for &(id, record) in entries {
            if id == root {
                continue;
            }

            if let Some(source) = &record.redirect_source {
                if let Some(&source_id) = index.by_request_id.get(source.request_id.as_str()) {
                    builder.add_edge_checked(id, source_id, EdgeKind::Causal);
                }
                continue;
            }

            for url in record.initiator.urls() {
                if let Some(initiator) = index.initiator(url, record.start_time, id) {
                    builder.add_edge_checked(id, initiator, EdgeKind::Causal);
                }
            }
        }
    }
}

fn link_cpu(
    builder: &mut GraphBuilder,
    index: &NetworkIndex<'_>,
    cpu_nodes: &[(NodeId, &Task)],
    document: NodeId,
) {
    let mut timer_installers: BTreeMap<&str, (NodeId, Duration)> = BTreeMap::new();

    for &(id, task) in cpu_nodes {
        for url in &task.urls {
            if let Some(resource) = index.resource(url, task.start) {
                builder.add_edge_checked(id, resource, EdgeKind::Causal);
            }
        }
        if task.parses_html {
            builder.add_edge_checked(id, document, EdgeKind::Causal);
        }

        for request_id in &task.sent_request_ids {
            let Some(&request) = index.by_base_id.get(request_id.as_str()) else {
                continue;
            };
            if builder_start(builder, request) > task.start {
                builder.add_edge_checked(request, id, EdgeKind::Causal);
            }
        }

        for timer in &task.timers_fired {
            if let Some(&(installer, installer_end)) = timer_installers.get(timer.as_str())
                && installer_end <= task.start
            {
                builder.add_edge_checked(id, installer, EdgeKind::Causal);
            }
        }
        for timer in &task.timers_installed {
            timer_installers.insert(timer.as_str(), (id, task.end()));
        }
    }
}

fn builder_start(builder: &GraphBuilder, id: NodeId) -> Duration {
    builder
        .node(id)
        .map(|node| node.start_time())
        .unwrap_or_default()
}

impl GraphBuilder {
    pub(crate) fn node(&self, id: NodeId) -> Option<&super::Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn has_dependencies(&self, id: NodeId) -> bool {
        self.edges
            .range((id, NodeId::ZERO)..=(id, NodeId::new(u32::MAX)))
            .next()
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        record::{Initiator, RequestId, ResourceType},
        task::{
            EVALUATE_SCRIPT, PARSE_HTML, RESOURCE_SEND_REQUEST, TIMER_FIRE, TIMER_INSTALL,
            TaskEvent,
        },
        trace::Markers,
    };

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn record(id: &str, url: &str, start: u64, end: u64) -> NetworkRecord {
        NetworkRecord {
            start_time: ms(start),
            response_headers_end_time: ms(start),
            end_time: ms(end),
            ..NetworkRecord::new(RequestId::new(id), url)
        }
    }

    fn capture(records: Vec<NetworkRecord>, events: Vec<TaskEvent>) -> PageCapture {
        PageCapture::new(
            records.into_iter().map(Arc::new).collect(),
            Task::forest(events).into_iter().map(Arc::new).collect(),
            Markers::new(ms(1_000), ms(5_000)),
        )
    }

    fn deps(graph: &DependencyGraph, id: NodeId) -> Vec<NodeId> {
        graph.dependencies(id).collect()
    }

    fn find(graph: &DependencyGraph, url: &str) -> NodeId {
        graph
            .network_nodes()
            .find(|(_, node)| node.record.url == url)
            .map(|(id, _)| id)
            .unwrap()
    }

    const DOC: &str = "https://a.com/";
    const APP: &str = "https://a.com/app.js";
    const STYLE: &str = "https://a.com/style.css";

    fn document() -> NetworkRecord {
        NetworkRecord {
            resource_type: ResourceType::Document,
            ..record("1", DOC, 0, 200)
        }
    }

    #[test]
    fn missing_main_document() {
        let capture = capture(vec![record("1", APP, 0, 10)], Vec::new());
        assert!(matches!(
            DependencyGraph::from_capture(&capture),
            Err(GraphConstructionError::MissingMainDocument { records: 1 })
        ));
    }

    #[test]
    fn parser_and_script_initiators() {
        let app = NetworkRecord {
            initiator: Initiator::parser(DOC),
            ..record("2", APP, 100, 300)
        };
        let style = NetworkRecord {
            initiator: Initiator::script([APP]),
            ..record("3", STYLE, 400, 500)
        };
        let orphan = record("4", "https://b.com/beacon", 450, 460);

        let graph =
            DependencyGraph::from_capture(&capture(
                vec![document(), app, style, orphan],
                Vec::new(),
            ))
                .unwrap();
        let root = graph.root();
        assert_eq!(graph.len(), 4);
        assert_eq!(find(&graph, DOC), root);
        assert_eq!(deps(&graph, find(&graph, APP)), vec![root]);
        assert_eq!(deps(&graph, find(&graph, STYLE)), vec![find(&graph, APP)]);
        assert_eq!(deps(&graph, find(&graph, "https://b.com/beacon")), vec![root]);
    }

    #[test]
    fn redirect_chain_is_linear() {
        let first = Arc::new(NetworkRecord {
            resource_type: ResourceType::Document,
            ..record("1", "http://a.com/", 0, 50)
        });
        let second = NetworkRecord {
            resource_type: ResourceType::Document,
            redirect_source: Some(Arc::clone(&first)),
            ..record("1:redirect", DOC, 50, 200)
        };
        let capture = PageCapture::new(
            vec![first, Arc::new(second)],
            Vec::new(),
            Markers::new(ms(1_000), ms(5_000)),
        );
        let graph = DependencyGraph::from_capture(&capture).unwrap();
        assert_eq!(find(&graph, "http://a.com/"), graph.root());
        assert_eq!(deps(&graph, find(&graph, DOC)), vec![graph.root()]);
    }

    #[test]
    fn early_requests_dropped() {
        let early = record("0", "https://a.com/sw.js", 0, 10);
        let document = NetworkRecord {
            resource_type: ResourceType::Document,
            ..record("1", DOC, 5, 200)
        };
        let graph =
            DependencyGraph::from_capture(&capture(vec![early, document], Vec::new())).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn cpu_edges() {
        let app = NetworkRecord {
            initiator: Initiator::parser(DOC),
            ..record("2", APP, 100, 300)
        };
        let xhr = record("9", "https://api.a.com/data", 450, 600);
        let events = vec![
            TaskEvent::new(PARSE_HTML, ms(200), ms(20)).with_url(DOC),
            TaskEvent::new(EVALUATE_SCRIPT, ms(400), ms(100)).with_url(APP),
            TaskEvent::new(RESOURCE_SEND_REQUEST, ms(420), ms(0)).with_request_id("9"),
            TaskEvent::new(TIMER_INSTALL, ms(430), ms(0)).with_timer_id("1"),
            TaskEvent::new(TIMER_FIRE, ms(800), ms(30)).with_timer_id("1"),
            // too short to matter
            TaskEvent::new("RunTask", ms(900), ms(2)),
        ];

        let graph =
            DependencyGraph::from_capture(&capture(vec![document(), app, xhr], events)).unwrap();
        let root = graph.root();
        let cpu: Vec<NodeId> = graph.cpu_nodes().map(|(id, _)| id).collect();
        assert_eq!(cpu.len(), 3);
        let [parse, evaluate, timer] = [cpu[0], cpu[1], cpu[2]];

        assert_eq!(deps(&graph, parse), vec![root]);
        assert_eq!(deps(&graph, evaluate), vec![find(&graph, APP), parse]);
        assert_eq!(deps(&graph, find(&graph, "https://api.a.com/data")), vec![evaluate]);
        assert_eq!(deps(&graph, timer), vec![evaluate]);
        assert_eq!(
            graph.dependency_edges(timer)[0].kind,
            EdgeKind::Causal,
            "timer edge outranks the main thread order"
        );
    }
}
