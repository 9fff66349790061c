use crate::common;
use crate::{Error, Result};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// How edge weights are derived from edge payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMode {
    /// Every hop costs its impedance factor (1 when no impedance is given).
    #[default]
    Topological,
    /// Every hop costs its measured length times its impedance factor.
    Geodetic,
}

impl DistanceMode {
    /// Single-letter prefix used in result column names.
    pub fn code(&self) -> &'static str {
        match self {
            DistanceMode::Topological => "T",
            DistanceMode::Geodetic => "G",
        }
    }
}

/// Numeric weights of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeAttributes {
    pub load: f64,
    pub supply: f64,
    pub demand: f64,
}

impl NodeAttributes {
    pub fn new(load: f64, supply: f64, demand: f64) -> Self {
        Self {
            load,
            supply,
            demand,
        }
    }

    /// Load, supply and demand all set to 1.
    pub fn uniform() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    /// Sums each group of attribute fields. Missing values are skipped and a group with
    /// no selected fields falls back to 1.
    pub fn from_fields(
        load_fields: &[Option<f64>],
        supply_fields: &[Option<f64>],
        demand_fields: &[Option<f64>],
    ) -> Self {
        Self::new(
            common::sum_fields(load_fields, 1.0),
            common::sum_fields(supply_fields, 1.0),
            common::sum_fields(demand_fields, 1.0),
        )
    }
}

impl Default for NodeAttributes {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Payload for a network node.
#[derive(Debug, Clone)]
pub struct NodePayload {
    pub node_key: String,
    pub live: bool,
    pub attributes: NodeAttributes,
}

impl NodePayload {
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), (&'static str, f64)> {
        let NodeAttributes {
            load,
            supply,
            demand,
        } = self.attributes;
        for (field, value) in [("load", load), ("supply", supply), ("demand", demand)] {
            if !value.is_finite() {
                return Err((field, value));
            }
        }
        Ok(())
    }
}

/// Payload for a network edge.
#[derive(Debug, Clone, Copy)]
pub struct EdgePayload {
    pub length: f64,
    pub imp_factor: f64,
}

impl EdgePayload {
    /// Traversal cost of the edge under `mode`.
    #[inline]
    pub fn cost(&self, mode: DistanceMode) -> f64 {
        match mode {
            DistanceMode::Topological => self.imp_factor,
            DistanceMode::Geodetic => self.length * self.imp_factor,
        }
    }

    #[inline]
    pub fn validate(&self) -> std::result::Result<(), (&'static str, f64)> {
        for (field, value) in [("length", self.length), ("imp_factor", self.imp_factor)] {
            if !value.is_finite() || value < 0.0 {
                return Err((field, value));
            }
        }
        Ok(())
    }
}

/// Weighted undirected network handed over by the graph builder.
#[derive(Debug, Clone)]
pub struct NetworkStructure {
    pub graph: UnGraph<NodePayload, EdgePayload>,
    pub progress: Arc<AtomicUsize>,
    pub cancelled: Arc<AtomicBool>,
}

impl Default for NetworkStructure {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkStructure {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::<NodePayload, EdgePayload>::default(),
            progress: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builds a network from symmetric adjacency lists of `(neighbour, weight)` pairs.
    /// Weights are stored as edge lengths with unit impedance, so they are honoured by
    /// [`DistanceMode::Geodetic`]; topological analysis counts hops.
    ///
    /// Every entry must be mirrored by the same number of `(start, weight)` entries in
    /// the neighbour's list.
    pub fn from_adjacency(adjacency: &[Vec<(usize, f64)>]) -> Result<Self> {
        let mut ns = Self::new();
        for node_idx in 0..adjacency.len() {
            ns.add_node(node_idx.to_string(), NodeAttributes::uniform());
        }
        for (start, neighbours) in adjacency.iter().enumerate() {
            for &(end, weight) in neighbours {
                if end >= adjacency.len() {
                    return Err(Error::InvalidNode(end));
                }
                if end == start {
                    return Err(Error::SelfLoop(start));
                }
                let forward = neighbours
                    .iter()
                    .filter(|&&(nb, nb_weight)| nb == end && nb_weight == weight)
                    .count();
                let backward = adjacency[end]
                    .iter()
                    .filter(|&&(back, back_weight)| back == start && back_weight == weight)
                    .count();
                if forward != backward {
                    return Err(Error::AsymmetricEdge { start, end });
                }
                // each mirrored pair is added once, from its lower end
                if end > start {
                    ns.add_edge(start, end, weight, None)?;
                }
            }
        }
        Ok(ns)
    }

    #[inline]
    pub fn progress_init(&self) {
        self.progress.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Requests cancellation of a running computation. Checked once per source.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }

    pub fn add_node(&mut self, node_key: String, attributes: NodeAttributes) -> usize {
        let new_node_idx = self.graph.add_node(NodePayload {
            node_key,
            live: true,
            attributes,
        });
        new_node_idx.index()
    }

    /// Nodes that are not live still act as destinations but never as sources.
    pub fn set_node_live(&mut self, node_idx: usize, live: bool) -> Result<()> {
        let payload = self
            .graph
            .node_weight_mut(NodeIndex::new(node_idx))
            .ok_or(Error::InvalidNode(node_idx))?;
        payload.live = live;
        Ok(())
    }

    #[inline]
    pub fn attributes(&self, node_idx: usize) -> NodeAttributes {
        self.graph[NodeIndex::new(node_idx)].attributes
    }

    #[inline]
    pub fn is_node_live(&self, node_idx: usize) -> bool {
        self.graph[NodeIndex::new(node_idx)].live
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_indices(&self) -> Vec<usize> {
        self.graph.node_indices().map(|node| node.index()).collect()
    }

    pub fn node_keys(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|node| self.graph[node].node_key.clone())
            .collect()
    }

    /// Adds an undirected edge. `imp_factor` defaults to 1.
    ///
    /// Self-loops and a second edge between the same pair of nodes are rejected, so
    /// every neighbour appears exactly once in a node's adjacency.
    pub fn add_edge(
        &mut self,
        start_nd_idx: usize,
        end_nd_idx: usize,
        length: f64,
        imp_factor: Option<f64>,
    ) -> Result<usize> {
        for node_idx in [start_nd_idx, end_nd_idx] {
            if node_idx >= self.node_count() {
                return Err(Error::InvalidNode(node_idx));
            }
        }
        if start_nd_idx == end_nd_idx {
            return Err(Error::SelfLoop(start_nd_idx));
        }
        if self
            .graph
            .find_edge(NodeIndex::new(start_nd_idx), NodeIndex::new(end_nd_idx))
            .is_some()
        {
            return Err(Error::DuplicateEdge {
                start: start_nd_idx,
                end: end_nd_idx,
            });
        }
        let payload = EdgePayload {
            length,
            imp_factor: imp_factor.unwrap_or(1.0),
        };
        if let Err((field, value)) = payload.validate() {
            return Err(Error::InvalidEdgeWeight {
                start: start_nd_idx,
                end: end_nd_idx,
                field,
                value,
            });
        }
        let new_edge_idx = self.graph.add_edge(
            NodeIndex::new(start_nd_idx),
            NodeIndex::new(end_nd_idx),
            payload,
        );
        Ok(new_edge_idx.index())
    }

    /// Neighbours of `node_idx` with the edge cost under `mode`.
    pub fn neighbours(
        &self,
        node_idx: usize,
        mode: DistanceMode,
    ) -> impl Iterator<Item = (usize, f64)> + '_ {
        let node = NodeIndex::new(node_idx);
        self.graph.edges(node).map(move |edge_ref| {
            let nb_nd_idx = if edge_ref.source() == node {
                edge_ref.target()
            } else {
                edge_ref.source()
            };
            (nb_nd_idx.index(), edge_ref.weight().cost(mode))
        })
    }

    /// Length of the node's adjacency list, i.e. its number of distinct neighbours.
    pub fn degree(&self, node_idx: usize) -> usize {
        self.graph.edges(NodeIndex::new(node_idx)).count()
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_count() == 0 {
            return Err(Error::EmptyNetwork);
        }
        for node_idx in self.graph.node_indices() {
            if let Err((field, value)) = self.graph[node_idx].validate() {
                return Err(Error::InvalidAttribute {
                    node: node_idx.index(),
                    field,
                    value,
                });
            }
        }
        for edge_ref in self.graph.edge_references() {
            if let Err((field, value)) = edge_ref.weight().validate() {
                return Err(Error::InvalidEdgeWeight {
                    start: edge_ref.source().index(),
                    end: edge_ref.target().index(),
                    field,
                    value,
                });
            }
        }
        if self.edge_count() == 0 {
            log::warn!("NetworkStructure contains no edges; only self terms will be computed.");
        }
        Ok(())
    }
}
