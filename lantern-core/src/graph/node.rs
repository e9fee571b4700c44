use super::NodeId;
use crate::{
    record::{NetworkRecord, Priority, ResourceType},
    task::Task,
};
use std::{fmt, sync::Arc, time::Duration};

/// A network request of the graph.
#[derive(Debug, Clone)]
pub struct NetworkNode {
    pub record: Arc<NetworkRecord>,
}

impl NetworkNode {
    /// Requests the browser must finish before it renders anything:
    /// the document, stylesheets and high priority scripts.
    pub fn is_render_blocking(&self) -> bool {
        let record = &self.record;
        match record.resource_type {
            ResourceType::Document | ResourceType::Stylesheet => true,
            ResourceType::Script => record.priority.is_high() && !record.is_link_preload,
            _ => record.priority == Priority::VeryHigh,
        }
    }

    #[inline]
    pub fn is_image(&self) -> bool {
        self.record.resource_type == ResourceType::Image
    }

    #[inline]
    pub fn is_script(&self) -> bool {
        self.record.resource_type == ResourceType::Script
    }
}

/// A top level task of the main thread.
#[derive(Debug, Clone)]
pub struct CpuNode {
    pub task: Arc<Task>,
}

impl CpuNode {
    #[inline]
    pub fn performs_layout(&self) -> bool {
        self.task.performs_layout
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Network(NetworkNode),
    Cpu(CpuNode),
}

/// A unit of work of the page load.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Self { id, kind }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// When the work started in the captured page load.
    pub fn start_time(&self) -> Duration {
        match &self.kind {
            NodeKind::Network(node) => node.record.start_time,
            NodeKind::Cpu(node) => node.task.start,
        }
    }

    /// When the work ended in the captured page load.
    pub fn end_time(&self) -> Duration {
        match &self.kind {
            NodeKind::Network(node) => node.record.end_time,
            NodeKind::Cpu(node) => node.task.end(),
        }
    }

    pub fn as_network(&self) -> Option<&NetworkNode> {
        match &self.kind {
            NodeKind::Network(node) => Some(node),
            NodeKind::Cpu(_) => None,
        }
    }

    pub fn as_cpu(&self) -> Option<&CpuNode> {
        match &self.kind {
            NodeKind::Cpu(node) => Some(node),
            NodeKind::Network(_) => None,
        }
    }

    #[inline]
    pub fn is_network(&self) -> bool {
        matches!(self.kind, NodeKind::Network(_))
    }

    #[inline]
    pub fn is_cpu(&self) -> bool {
        matches!(self.kind, NodeKind::Cpu(_))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Network(node) => write!(f, "{} network {}", self.id, node.record.url),
            NodeKind::Cpu(node) => write!(f, "{} cpu {}", self.id, node.task.name),
        }
    }
}
