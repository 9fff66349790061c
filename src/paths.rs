use crate::graph::{DistanceMode, NetworkStructure};
use crate::heap::IndexedMinHeap;
use crate::{Error, Result};

/// Analysis radius. A configured radius of zero means global analysis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Radius {
    #[default]
    Global,
    Bounded(f64),
}

impl Radius {
    /// Maps a user supplied radius to a policy: zero is global, anything else bounds.
    pub fn from_value(radius: f64) -> Result<Self> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(Error::InvalidRadius(radius));
        }
        if radius == 0.0 {
            Ok(Radius::Global)
        } else {
            Ok(Radius::Bounded(radius))
        }
    }

    /// Whether a path of cost `cost` falls within the radius.
    #[inline]
    pub fn accepts(&self, cost: f64) -> bool {
        match *self {
            Radius::Global => true,
            Radius::Bounded(radius) => cost <= radius,
        }
    }

    /// The configured value, zero for global analysis.
    pub fn value(&self) -> f64 {
        match *self {
            Radius::Global => 0.0,
            Radius::Bounded(radius) => radius,
        }
    }
}

/// Output of one single-source traversal.
///
/// `preds[v]` holds every node through which a minimum-cost path reaches `v`. Direct
/// neighbours of the source are seeded at their edge cost without a predecessor; the
/// source share of their path count is tracked by `direct[v]` instead.
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    pub src_idx: usize,
    pub cost: Vec<f64>,
    pub num_short_paths: Vec<f64>,
    pub preds: Vec<Vec<usize>>,
    pub level: Vec<u32>,
    /// The direct edge from the source is (one of) the shortest paths to this node.
    pub direct: Vec<bool>,
    /// Some shortest path from the source to this node, both ends included, passes a
    /// node with positive supply.
    pub offer_mark: Vec<bool>,
    /// Reached nodes in non-decreasing cost order, source first.
    pub order: Vec<usize>,
}

impl ShortestPathTree {
    fn new(src_idx: usize, node_count: usize) -> Self {
        let mut tree = ShortestPathTree {
            src_idx,
            cost: vec![f64::INFINITY; node_count],
            num_short_paths: vec![0.0; node_count],
            preds: vec![Vec::new(); node_count],
            level: vec![0; node_count],
            direct: vec![false; node_count],
            offer_mark: vec![false; node_count],
            order: Vec::with_capacity(node_count),
        };
        tree.cost[src_idx] = 0.0;
        tree.num_short_paths[src_idx] = 1.0;
        tree
    }

    #[inline]
    pub fn is_reached(&self, node_idx: usize) -> bool {
        self.cost[node_idx].is_finite()
    }
}

impl NetworkStructure {
    /// Dijkstra from `src_idx` with tie tracking for multiple shortest paths.
    ///
    /// Candidates outside `radius` are never accepted, so such nodes keep an infinite
    /// cost. Nodes left with an infinite cost are not part of [`ShortestPathTree::order`].
    pub fn shortest_path_tree(
        &self,
        src_idx: usize,
        mode: DistanceMode,
        radius: Radius,
    ) -> ShortestPathTree {
        let node_count = self.node_count();
        let mut tree = ShortestPathTree::new(src_idx, node_count);
        let has_supply = |node_idx: usize| self.attributes(node_idx).supply > 0.0;
        tree.offer_mark[src_idx] = has_supply(src_idx);
        // seed direct neighbours at their edge cost
        for (nb_nd_idx, edge_cost) in self.neighbours(src_idx, mode) {
            if !radius.accepts(edge_cost) {
                continue;
            }
            tree.cost[nb_nd_idx] = edge_cost;
            tree.level[nb_nd_idx] = 1;
            tree.num_short_paths[nb_nd_idx] = 1.0;
            tree.direct[nb_nd_idx] = true;
            tree.offer_mark[nb_nd_idx] = tree.offer_mark[src_idx] || has_supply(nb_nd_idx);
        }
        let mut active = IndexedMinHeap::build(node_count, &tree.cost);
        // nodes left in the unreached pool are never settled
        while active.finite_len() > 0 {
            let Some(node_idx) = active.extract_min(&tree.cost) else {
                break;
            };
            tree.order.push(node_idx);
            for (nb_nd_idx, edge_cost) in self.neighbours(node_idx, mode) {
                if !active.contains(nb_nd_idx) {
                    continue;
                }
                let total_cost = tree.cost[node_idx] + edge_cost;
                if !radius.accepts(total_cost) {
                    continue;
                }
                if total_cost < tree.cost[nb_nd_idx] {
                    tree.cost[nb_nd_idx] = total_cost;
                    tree.level[nb_nd_idx] = tree.level[node_idx] + 1;
                    tree.preds[nb_nd_idx].clear();
                    tree.preds[nb_nd_idx].push(node_idx);
                    tree.num_short_paths[nb_nd_idx] = tree.num_short_paths[node_idx];
                    tree.direct[nb_nd_idx] = false;
                    tree.offer_mark[nb_nd_idx] =
                        tree.offer_mark[node_idx] || has_supply(nb_nd_idx);
                    active.decrease_key(nb_nd_idx, &tree.cost);
                } else if node_idx != src_idx && total_cost == tree.cost[nb_nd_idx] {
                    tree.preds[nb_nd_idx].push(node_idx);
                    tree.num_short_paths[nb_nd_idx] += tree.num_short_paths[node_idx];
                    tree.offer_mark[nb_nd_idx] |= tree.offer_mark[node_idx];
                }
            }
        }
        tree
    }
}
