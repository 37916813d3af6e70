//! wikigraph - force-directed layout engine for exploring article link graphs.
//!
//! The graph lives on the host in a [`GraphStore`]. A [`SimulationDriver`]
//! mirrors it into a [`ComputeBackend`] that relaxes every node in parallel
//! against a double-buffered state texture, and folds the results back once
//! they are ready. The [`Explorer`] grows the graph one article at a time from
//! any [`LinkFetcher`].

pub mod config;
pub mod driver;
pub mod error;
pub mod explorer;
pub mod graph;
pub mod links;
pub mod physics;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use config::{ExplorerConfig, PhysicsConfig, Settings};
pub use driver::{ComputeBackend, DriverPhase, RenderConsumer, SimulationDriver, TickReport};
pub use error::{GraphError, GraphResult};
pub use explorer::{ExpansionReport, ExpansionTicket, Explorer};
pub use graph::{AdjacencyIndex, Connection, DirtyFlags, GraphStore, Node};
pub use links::{LinkFetcher, StaticLinks};
pub use physics::CpuBackend;
