use anyhow::anyhow;
use std::{fmt, str};

/// The identifier of a node in a [`DependencyGraph`].
///
/// Identifiers are dense: the nodes of a graph of `n` nodes are numbered
/// `0..n`, in the order they were added.
///
/// [`DependencyGraph`]: super::DependencyGraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub const ZERO: Self = NodeId::new(0);

    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl str::FromStr for NodeId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|error| anyhow!("{error}"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
