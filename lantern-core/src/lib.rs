//! Deterministic page load simulation.
//!
//! A captured page load ([`trace::PageCapture`]) is turned into a
//! [`graph::DependencyGraph`] of network requests and main-thread tasks,
//! which is then replayed by [`simulator::simulate`] under a
//! [`measure::ThrottlingProfile`]. The same graph is simulated twice, with
//! the [`estimate::ResourceAssumptions`] of an optimistic and a
//! pessimistic [`estimate::EstimateStrategy`].
//!
//! ```
//! use lantern_core::{
//!     estimate::{EstimateBounds, EstimateStrategy},
//!     graph::DependencyGraph,
//!     simulator::{simulate, SimulationOptions},
//!     trace::PageCapture,
//! };
//!
//! # fn run(capture: &PageCapture) -> anyhow::Result<()> {
//! let graph = DependencyGraph::from_capture(capture)?;
//! let options = SimulationOptions::default();
//!
//! let optimistic = simulate(&graph, &options, EstimateStrategy::Optimistic.assumptions())?;
//! let pessimistic = simulate(&graph, &options, EstimateStrategy::Pessimistic.assumptions())?;
//! let bounds = EstimateBounds::new(optimistic.time_in_ms, pessimistic.time_in_ms);
//! assert!(bounds.optimistic_ms <= bounds.pessimistic_ms);
//! # Ok(())
//! # }
//! ```

pub mod defaults;
pub mod estimate;
pub mod graph;
pub mod measure;
pub mod quiet;
pub mod record;
pub mod simulator;
pub mod task;
pub mod time;
pub mod trace;
