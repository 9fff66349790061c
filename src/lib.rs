//! GAUS: configurational metrics for spatial networks.
//!
//! Nodes are spatial features (points or lines) and edges their geometric adjacency, as
//! built by an external collaborator. For every live node acting as source the crate
//! runs a Dijkstra traversal with tie tracking over an indexed binary heap, then a
//! Brandes-style backward pass that accumulates accessibility, betweenness,
//! Freeman-Krafta centrality, reach, opportunity, convergence and polarity in one go.

pub mod centrality;
pub mod common;
pub mod graph;
pub mod heap;
pub mod paths;
#[cfg(feature = "python")]
mod python;

pub use centrality::{
    Metric, MetricConfig, MetricSet, MetricsResult, Normalization, PathFlowTotals, Radius,
};
pub use graph::{DistanceMode, EdgePayload, NetworkStructure, NodeAttributes, NodePayload};
pub use heap::IndexedMinHeap;
pub use paths::ShortestPathTree;

/// Error types for the library.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("No node exists for index {0}.")]
    InvalidNode(usize),

    #[error("Invalid {field} ({value}) for edge between nodes {start} and {end}: must be finite and non-negative.")]
    InvalidEdgeWeight {
        start: usize,
        end: usize,
        field: &'static str,
        value: f64,
    },

    #[error("Adjacency is not symmetric between nodes {start} and {end}.")]
    AsymmetricEdge { start: usize, end: usize },

    #[error("Nodes {start} and {end} are already connected.")]
    DuplicateEdge { start: usize, end: usize },

    #[error("Node {0} cannot be connected to itself.")]
    SelfLoop(usize),

    #[error("Invalid {field} ({value}) for node {node}: must be finite.")]
    InvalidAttribute {
        node: usize,
        field: &'static str,
        value: f64,
    },

    #[error("NetworkStructure contains no nodes.")]
    EmptyNetwork,

    #[error("At least one metric must be selected.")]
    NoMetricsSelected,

    #[error("Analysis radius ({0}) must be finite and non-negative.")]
    InvalidRadius(f64),

    #[error("Computation was cancelled.")]
    Cancelled,
}

/// Result type for the library.
pub type Result<T> = std::result::Result<T, Error>;
