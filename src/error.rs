//! Error types for graph construction and solving.
//!
//! Bad input (unknown or stale vertices, malformed edge lists) is reported through
//! [`GraphError`]. Internal invariant violations (contracting a loop, clearing a vertex
//! twice, multiplicity overflow) are bugs in the caller and panic instead. The solver
//! never contracts its way into an overflow: it widens the table up front or returns
//! [`SolveError::CapacityExceeded`].

use std::time::Duration;
use thiserror::Error;

/// Errors raised by [`crate::graph::Multigraph`] operations and the edge-list parser.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A vertex id outside `0..domain`.
    #[error("vertex {vertex} is outside the domain 0..{domain}")]
    VertexOutOfRange {
        /// The offending vertex id.
        vertex: usize,
        /// Domain size of the graph.
        domain: usize,
    },
    /// A vertex that was already removed from the graph.
    #[error("vertex {vertex} has been removed from the graph")]
    StaleVertex {
        /// The removed vertex id.
        vertex: usize,
    },
    /// Tried to remove an edge that does not exist.
    #[error("no edge between {u} and {v}")]
    MissingEdge {
        /// First endpoint.
        u: usize,
        /// Second endpoint.
        v: usize,
    },
    /// Malformed edge-list text.
    #[error("edge list parse error: {0}")]
    Parse(String),
}

/// Errors raised while computing a Tutte polynomial.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SolveError {
    /// A graph operation failed on caller-supplied structure.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The graph has more edges than even a [`crate::table::DenseTable`] cell can hold,
    /// so contraction could overflow.
    #[error("graph has {edges} edges, more than the cell capacity {capacity}")]
    CapacityExceeded {
        /// Edge count of the input graph.
        edges: usize,
        /// Largest multiplicity the widest table can store.
        capacity: u32,
    },
    /// The configured deadline passed before the computation finished.
    #[error("computation aborted after {elapsed:?}")]
    Aborted {
        /// Time spent before the deadline check fired.
        elapsed: Duration,
    },
}
