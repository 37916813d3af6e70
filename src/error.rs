//! Error taxonomy for the graph core
//!
//! Geometry degeneracies and capacity growth are handled in place and never
//! surface here. `ReadbackDiverged` is only ever built to be logged.

use thiserror::Error;

/// Errors that can occur while mutating or simulating the graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// A node index outside the live node range
    #[error("node index {index} out of range (node count {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A second expansion was requested while one is still running
    #[error("expansion of '{title}' is still in flight")]
    ExpansionInFlight { title: String },

    /// The link source failed; the graph was left untouched
    #[error("link fetch failed: {0}")]
    Fetch(String),

    /// An expansion ticket that does not match the active expansion
    #[error("expansion ticket does not match the active expansion")]
    UnknownTicket,

    /// Kernel readback covers a different node count than the store holds
    #[error("readback diverged: store has {store} nodes, kernel ran on {kernel}")]
    ReadbackDiverged { store: usize, kernel: usize },

    /// The compute backend could not allocate or execute
    #[error("compute backend error: {0}")]
    Backend(String),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
