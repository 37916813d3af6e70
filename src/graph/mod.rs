//! Incremental graph data model
//!
//! - [`store`]: append-only node and connection storage
//! - [`matrix`]: triangular pair addressing for O(1) connectivity tests
//! - [`adjacency`]: sorted edges with per-node stride chains for kernels

pub mod adjacency;
pub mod matrix;
pub mod store;

pub use adjacency::{AdjacencyIndex, EdgeRecord, Incident, NO_EDGE, incident};
pub use matrix::{ConnectivityMatrix, matrix_address, triangular_sum};
pub use store::{Connection, DirtyFlags, GraphStore, IdAllocator, Node, NodeId};
