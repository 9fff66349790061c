use crate::common::{self, MetricResult, PROGRESS_UPDATE_INTERVAL};
use crate::graph::{DistanceMode, NetworkStructure};
use crate::paths::ShortestPathTree;
use crate::{Error, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::Ordering as AtomicOrdering;

pub use crate::paths::Radius;

/// Metrics the engine can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Accessibility,
    Betweenness,
    /// Freeman-Krafta centrality.
    Centrality,
    Opportunity,
    Convergence,
    Polarity,
    Reach,
    Connectivity,
    AverageDistance,
    Agglomeration,
    /// Load-weighted shortest paths through each node, both ends included.
    ShortestPathFlow,
    /// Shortest path flow as a percentage of the network's total pair flow.
    PathShare,
    /// Supply as a percentage of the network's total supply.
    SupplyShare,
    /// Supply share times path share.
    Contact,
}

impl Metric {
    pub const COUNT: usize = 14;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Accessibility,
        Metric::Betweenness,
        Metric::Centrality,
        Metric::Opportunity,
        Metric::Convergence,
        Metric::Polarity,
        Metric::Reach,
        Metric::Connectivity,
        Metric::AverageDistance,
        Metric::Agglomeration,
        Metric::ShortestPathFlow,
        Metric::PathShare,
        Metric::SupplyShare,
        Metric::Contact,
    ];

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accessibility => "accessibility",
            Metric::Betweenness => "betweenness",
            Metric::Centrality => "centrality",
            Metric::Opportunity => "opportunity",
            Metric::Convergence => "convergence",
            Metric::Polarity => "polarity",
            Metric::Reach => "reach",
            Metric::Connectivity => "connectivity",
            Metric::AverageDistance => "average_distance",
            Metric::Agglomeration => "agglomeration",
            Metric::ShortestPathFlow => "shortest_path_flow",
            Metric::PathShare => "path_share",
            Metric::SupplyShare => "supply_share",
            Metric::Contact => "contact",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|metric| metric.name() == name)
    }

    /// Three-letter code used in attribute column names.
    pub fn code(&self) -> &'static str {
        match self {
            Metric::Accessibility => "Acc",
            Metric::Betweenness => "Btw",
            Metric::Centrality => "Cen",
            Metric::Opportunity => "Opp",
            Metric::Convergence => "Cvg",
            Metric::Polarity => "Pol",
            Metric::Reach => "Rea",
            Metric::Connectivity => "Cnc",
            Metric::AverageDistance => "AvD",
            Metric::Agglomeration => "Agl",
            Metric::ShortestPathFlow => "Spf",
            Metric::PathShare => "PSh",
            Metric::SupplyShare => "SSh",
            Metric::Contact => "Ctc",
        }
    }

    /// Attribute column name, e.g. `Tg` + `Btw` for global topological betweenness or
    /// `G1500Acc` for geodetic accessibility within 1500 units. Radii are truncated to
    /// their integer part and at most five characters.
    pub fn column_name(&self, mode: DistanceMode, radius: Radius) -> String {
        let scope = match radius {
            Radius::Global => "g".to_string(),
            Radius::Bounded(value) => {
                let digits = format!("{}", value.trunc() as i64);
                digits.chars().take(5).collect()
            }
        };
        format!("{}{}{}", mode.code(), scope, self.code())
    }

    /// Connectivity and supply share are read straight off the graph; everything else
    /// needs traversals.
    #[inline]
    pub fn needs_traversal(&self) -> bool {
        !matches!(self, Metric::Connectivity | Metric::SupplyShare)
    }
}

/// Static set of requested metrics, resolved once before the source loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricSet {
    flags: [bool; Metric::COUNT],
}

impl MetricSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            flags: [true; Metric::COUNT],
        }
    }

    pub fn from_metrics(metrics: impl IntoIterator<Item = Metric>) -> Self {
        let mut set = Self::empty();
        for metric in metrics {
            set.insert(metric);
        }
        set
    }

    pub fn with(mut self, metric: Metric) -> Self {
        self.insert(metric);
        self
    }

    #[inline]
    pub fn insert(&mut self, metric: Metric) {
        self.flags[metric.index()] = true;
    }

    #[inline]
    pub fn contains(&self, metric: Metric) -> bool {
        self.flags[metric.index()]
    }

    pub fn is_empty(&self) -> bool {
        !self.flags.iter().any(|&flag| flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL
            .into_iter()
            .filter(move |metric| self.contains(*metric))
    }

    pub fn needs_traversal(&self) -> bool {
        self.iter().any(|metric| metric.needs_traversal())
    }
}

/// Post-processing applied to every metric once all sources are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    #[default]
    None,
    /// Each value as a percentage of the metric's total over all nodes.
    PercentOfTotal,
}

/// Parameters of a metrics run.
#[derive(Debug, Clone, Default)]
pub struct MetricConfig {
    pub metrics: MetricSet,
    pub distance_mode: DistanceMode,
    pub radius: Radius,
    pub normalization: Normalization,
}

impl MetricConfig {
    pub fn new(metrics: MetricSet) -> Self {
        Self {
            metrics,
            ..Default::default()
        }
    }

    pub fn with_distance_mode(mut self, distance_mode: DistanceMode) -> Self {
        self.distance_mode = distance_mode;
        self
    }

    pub fn with_radius(mut self, radius: Radius) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(Error::NoMetricsSelected);
        }
        if let Radius::Bounded(value) = self.radius {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidRadius(value));
            }
        }
        Ok(())
    }
}

/// Per-node metric values of a finished run, indexed by [`Metric`].
#[derive(Debug, Clone)]
pub struct MetricsResult {
    pub node_keys: Vec<String>,
    pub distance_mode: DistanceMode,
    pub radius: Radius,
    metrics: MetricSet,
    values: Vec<Option<Vec<f64>>>,
    path_flow: Option<PathFlowTotals>,
}

/// Network-wide sums of the pair flows behind [`Metric::ShortestPathFlow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathFlowTotals {
    /// Sum over all reached origin-destination pairs of `load * load * shortest paths`.
    pub total: f64,
    /// The part of `total` whose destination is reached through a supplied node.
    pub offer_marked: f64,
}

impl PathFlowTotals {
    /// Percentage of the pair flow that passes a node with positive supply.
    pub fn offer_share(&self) -> f64 {
        100.0 * common::guarded_ratio(self.offer_marked, self.total)
    }
}

impl MetricsResult {
    /// Flow totals, present when any path flow metric was computed.
    pub fn path_flow(&self) -> Option<PathFlowTotals> {
        self.path_flow
    }

    pub fn metrics(&self) -> MetricSet {
        self.metrics
    }

    pub fn node_count(&self) -> usize {
        self.node_keys.len()
    }

    pub fn values(&self, metric: Metric) -> Option<&[f64]> {
        self.values[metric.index()].as_deref()
    }

    pub fn value(&self, metric: Metric, node_idx: usize) -> Option<f64> {
        self.values(metric)
            .and_then(|vals| vals.get(node_idx).copied())
    }

    pub fn node_values(&self, node_idx: usize) -> Vec<(Metric, f64)> {
        self.metrics
            .iter()
            .filter_map(|metric| self.value(metric, node_idx).map(|val| (metric, val)))
            .collect()
    }

    pub fn column_name(&self, metric: Metric) -> String {
        metric.column_name(self.distance_mode, self.radius)
    }

    /// Node key -> column name -> value, ready for an attribute table writer.
    pub fn to_node_map(&self) -> HashMap<String, HashMap<String, f64>> {
        let columns: Vec<(Metric, String)> = self
            .metrics
            .iter()
            .map(|metric| (metric, self.column_name(metric)))
            .collect();
        self.node_keys
            .iter()
            .enumerate()
            .map(|(node_idx, node_key)| {
                let row = columns
                    .iter()
                    .filter_map(|(metric, column)| {
                        self.value(*metric, node_idx)
                            .map(|val| (column.clone(), val))
                    })
                    .collect();
                (node_key.clone(), row)
            })
            .collect()
    }
}

/// Shared output accumulators for the metrics filled during traversal.
struct Accumulators {
    access: Option<MetricResult>,
    betweenness: Option<MetricResult>,
    centrality: Option<MetricResult>,
    opportunity: Option<MetricResult>,
    convergence: Option<MetricResult>,
    polarity: Option<MetricResult>,
    reach: Option<MetricResult>,
    distance_sum: Option<MetricResult>,
    path_flow: Option<MetricResult>,
    /// Slot 0 holds the total pair flow, slot 1 the offer-marked part.
    flow_totals: Option<MetricResult>,
}

const TOTAL_FLOW: usize = 0;
const OFFER_FLOW: usize = 1;

impl Accumulators {
    fn new(metrics: &MetricSet, len: usize) -> Self {
        let slot = |selected: bool| selected.then(|| MetricResult::new(len, 0.0));
        let spread = metrics.contains(Metric::AverageDistance)
            || metrics.contains(Metric::Agglomeration);
        let flow = metrics.contains(Metric::ShortestPathFlow)
            || metrics.contains(Metric::PathShare)
            || metrics.contains(Metric::Contact);
        Accumulators {
            access: slot(metrics.contains(Metric::Accessibility)),
            betweenness: slot(metrics.contains(Metric::Betweenness)),
            centrality: slot(metrics.contains(Metric::Centrality)),
            opportunity: slot(metrics.contains(Metric::Opportunity)),
            convergence: slot(metrics.contains(Metric::Convergence)),
            polarity: slot(metrics.contains(Metric::Polarity)),
            // average distance divides by reach
            reach: slot(metrics.contains(Metric::Reach) || spread),
            distance_sum: slot(spread),
            path_flow: slot(flow),
            flow_totals: flow.then(|| MetricResult::new(2, 0.0)),
        }
    }
}

#[inline]
fn add_to(res: &Option<MetricResult>, node_idx: usize, val: f64) {
    if let Some(res) = res {
        res.add(node_idx, val);
    }
}

impl NetworkStructure {
    /// Backward pass over one source's traversal, farthest node first.
    ///
    /// Accessibility, reach, opportunity and the distance sum are credited to the source.
    /// Betweenness, centrality, convergence, polarity and shortest path flow propagate
    /// dependencies along the predecessor DAG and are credited to the node being popped.
    fn accumulate_source(&self, tree: &ShortestPathTree, radius: Radius, acc: &Accumulators) {
        let src_idx = tree.src_idx;
        let src = self.attributes(src_idx);
        let node_count = self.node_count();
        let temp = |needed: bool| if needed { vec![0.0; node_count] } else { Vec::new() };
        let do_btw = acc.betweenness.is_some();
        let do_cent = acc.centrality.is_some();
        let do_cvg = acc.convergence.is_some() || acc.polarity.is_some();
        let do_flow = acc.path_flow.is_some();
        let mut btw_temp = temp(do_btw);
        let mut cent_temp = temp(do_cent);
        let mut cvg_temp = temp(do_cvg);
        let mut flow_temp = temp(do_flow);

        for &to_idx in tree.order.iter().rev() {
            let cost = tree.cost[to_idx];
            if !radius.accepts(cost) {
                continue;
            }
            let to = self.attributes(to_idx);
            let is_src = to_idx == src_idx;
            if !is_src && cost > 0.0 {
                add_to(&acc.access, src_idx, to.load / cost);
            }
            add_to(&acc.reach, src_idx, to.load);
            if src.demand > 0.0 {
                add_to(&acc.opportunity, src_idx, to.supply / (cost + 1.0));
            }
            if !is_src {
                add_to(&acc.distance_sum, src_idx, to.load * cost);
            }

            let level_div = (tree.level[to_idx] + 1) as f64;
            let pot = src.load * to.load / level_div;
            let tension = src.supply * to.demand / level_div;
            let sp_to = tree.num_short_paths[to_idx];
            let btw_carry = if do_btw { 1.0 + btw_temp[to_idx] } else { 0.0 };
            let cent_carry = if do_cent { pot + cent_temp[to_idx] } else { 0.0 };
            let cvg_carry = if do_cvg { tension + cvg_temp[to_idx] } else { 0.0 };
            let pair_flow = if is_src {
                0.0
            } else {
                src.load * to.load * sp_to
            };
            let flow_carry = if do_flow { pair_flow + flow_temp[to_idx] } else { 0.0 };
            for &pred_idx in &tree.preds[to_idx] {
                let ratio = tree.num_short_paths[pred_idx] / sp_to;
                if do_btw {
                    btw_temp[pred_idx] += ratio * btw_carry;
                }
                if do_cent {
                    cent_temp[pred_idx] += ratio * cent_carry;
                }
                if do_cvg {
                    cvg_temp[pred_idx] += ratio * cvg_carry;
                }
                if do_flow {
                    flow_temp[pred_idx] += ratio * flow_carry;
                }
            }
            // the source is the implicit predecessor of nodes reached by their direct edge
            if tree.direct[to_idx] {
                let ratio = 1.0 / sp_to;
                if do_cent {
                    cent_temp[src_idx] += ratio * cent_carry;
                }
                if do_cvg {
                    cvg_temp[src_idx] += ratio * cvg_carry;
                }
                if do_flow {
                    flow_temp[src_idx] += ratio * flow_carry;
                }
            }

            if !is_src {
                if do_btw {
                    add_to(&acc.betweenness, to_idx, btw_temp[to_idx] / 2.0);
                }
                if do_cent {
                    cent_temp[to_idx] += pot;
                }
            }
            if do_cent {
                add_to(&acc.centrality, to_idx, cent_temp[to_idx] / 2.0);
            }
            if do_cvg {
                cvg_temp[to_idx] += tension;
                if to.supply > 0.0 {
                    add_to(&acc.convergence, to_idx, cvg_temp[to_idx]);
                }
                add_to(&acc.polarity, to_idx, cvg_temp[to_idx]);
            }
            if do_flow {
                // the source keeps only what flowed back to it
                add_to(&acc.path_flow, to_idx, flow_carry);
                if !is_src {
                    add_to(&acc.flow_totals, TOTAL_FLOW, pair_flow);
                    if tree.offer_mark[to_idx] {
                        add_to(&acc.flow_totals, OFFER_FLOW, pair_flow);
                    }
                }
            }
        }
    }

    /// Computes the configured metrics for every node.
    ///
    /// Every live node acts as a source once. Sources are processed in parallel and
    /// merge into shared atomic accumulators, so values are reproducible up to
    /// floating-point summation order.
    pub fn compute_metrics(&self, config: &MetricConfig) -> Result<MetricsResult> {
        self.validate()?;
        config.validate()?;
        let node_count = self.node_count();
        let acc = Accumulators::new(&config.metrics, node_count);
        self.progress_init();
        log::info!(
            "Computing {} metric(s) for {} nodes ({:?}, radius {}).",
            config.metrics.iter().count(),
            node_count,
            config.distance_mode,
            config.radius.value()
        );

        if config.metrics.needs_traversal() {
            let node_indices = self.node_indices();
            node_indices.par_iter().for_each(|src_idx| {
                if self.is_cancelled() {
                    return;
                }
                if self.is_node_live(*src_idx) {
                    let tree =
                        self.shortest_path_tree(*src_idx, config.distance_mode, config.radius);
                    self.accumulate_source(&tree, config.radius, &acc);
                }
                let done = self.progress.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                if done % PROGRESS_UPDATE_INTERVAL == 0 {
                    log::debug!("Processed {} of {} sources.", done, node_count);
                }
            });
            if self.is_cancelled() {
                log::warn!(
                    "Computation cancelled after {} of {} sources.",
                    self.progress(),
                    node_count
                );
                return Err(Error::Cancelled);
            }
        }

        let mut values: Vec<Option<Vec<f64>>> = vec![None; Metric::COUNT];
        let load = |res: &Option<MetricResult>| res.as_ref().map(MetricResult::load);
        let reach = load(&acc.reach);
        let average_distance = load(&acc.distance_sum).zip(reach.as_ref()).map(
            |(distance_sum, reach)| {
                // the source's own load is part of its reach but not of its distance sum
                distance_sum
                    .iter()
                    .zip(reach)
                    .enumerate()
                    .map(|(node_idx, (sum, reach))| {
                        let others = reach - self.attributes(node_idx).load;
                        if others > 0.0 {
                            sum / others
                        } else {
                            0.0
                        }
                    })
                    .collect::<Vec<f64>>()
            },
        );
        let path_flow = acc.flow_totals.as_ref().map(|totals| {
            let totals = totals.load();
            PathFlowTotals {
                total: totals[TOTAL_FLOW],
                offer_marked: totals[OFFER_FLOW],
            }
        });
        let flow = load(&acc.path_flow);
        let path_share = flow.as_ref().zip(path_flow).map(|(flow, totals)| {
            flow.iter()
                .map(|val| 100.0 * common::guarded_ratio(*val, totals.total))
                .collect::<Vec<f64>>()
        });
        let supply_share = (config.metrics.contains(Metric::SupplyShare)
            || config.metrics.contains(Metric::Contact))
        .then(|| {
            let supply: Vec<f64> = (0..node_count)
                .map(|node_idx| self.attributes(node_idx).supply)
                .collect();
            let total_supply: f64 = supply.iter().sum();
            supply
                .iter()
                .map(|val| 100.0 * common::guarded_ratio(*val, total_supply))
                .collect::<Vec<f64>>()
        });
        for metric in config.metrics.iter() {
            let metric_values = match metric {
                Metric::Accessibility => load(&acc.access),
                Metric::Betweenness => load(&acc.betweenness),
                Metric::Centrality => load(&acc.centrality),
                Metric::Opportunity => load(&acc.opportunity),
                Metric::Convergence => load(&acc.convergence),
                Metric::Polarity => load(&acc.polarity),
                Metric::Reach => reach.clone(),
                Metric::Connectivity => Some(
                    (0..node_count)
                        .map(|node_idx| self.degree(node_idx) as f64)
                        .collect(),
                ),
                Metric::AverageDistance => average_distance.clone(),
                Metric::Agglomeration => average_distance.as_ref().map(|avg| {
                    avg.iter()
                        .map(|&avg| if avg > 0.0 { 1.0 / avg } else { 0.0 })
                        .collect()
                }),
                Metric::ShortestPathFlow => flow.clone(),
                Metric::PathShare => path_share.clone(),
                Metric::SupplyShare => supply_share.clone(),
                Metric::Contact => supply_share.as_ref().zip(path_share.as_ref()).map(
                    |(supply_share, path_share)| {
                        supply_share
                            .iter()
                            .zip(path_share)
                            .map(|(supply, path)| supply * path)
                            .collect()
                    },
                ),
            };
            values[metric.index()] = metric_values.map(|vals| match config.normalization {
                Normalization::None => vals,
                Normalization::PercentOfTotal => percent_of_total(metric, vals),
            });
        }

        log::info!("Finished computing metrics for {} nodes.", node_count);
        Ok(MetricsResult {
            node_keys: self.node_keys(),
            distance_mode: config.distance_mode,
            radius: config.radius,
            metrics: config.metrics,
            values,
            path_flow,
        })
    }
}

fn percent_of_total(metric: Metric, vals: Vec<f64>) -> Vec<f64> {
    let total: f64 = vals.iter().sum();
    if total == 0.0 || !total.is_finite() {
        log::warn!(
            "Total {} is {}; normalised values set to zero.",
            metric.name(),
            total
        );
    }
    vals.into_iter()
        .map(|val| 100.0 * common::guarded_ratio(val, total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeAttributes;

    const EPS: f64 = 1e-9;

    fn unit_network(node_count: usize, edges: &[(usize, usize)]) -> NetworkStructure {
        let mut ns = NetworkStructure::new();
        for node_idx in 0..node_count {
            ns.add_node(node_idx.to_string(), NodeAttributes::uniform());
        }
        for &(a, b) in edges {
            ns.add_edge(a, b, 1.0, None).unwrap();
        }
        ns
    }

    fn run(ns: &NetworkStructure, metrics: &[Metric]) -> MetricsResult {
        let config = MetricConfig::new(MetricSet::from_metrics(metrics.iter().copied()));
        ns.compute_metrics(&config).unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < EPS, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_star_betweenness() {
        let k = 4;
        let edges: Vec<(usize, usize)> = (1..=k).map(|leaf| (0, leaf)).collect();
        let ns = unit_network(k + 1, &edges);
        let res = run(&ns, &[Metric::Betweenness]);
        let btw = res.values(Metric::Betweenness).unwrap();
        assert!((btw[0] - (k * (k - 1) / 2) as f64).abs() < EPS);
        assert!(btw[1..].iter().all(|val| val.abs() < EPS));
    }

    #[test]
    fn test_path_betweenness() {
        let ns = unit_network(4, &[(0, 1), (1, 2), (2, 3)]);
        let res = run(&ns, &[Metric::Betweenness]);
        assert_close(res.values(Metric::Betweenness).unwrap(), &[0.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_grid_betweenness_splits_ties() {
        // 0 - 1
        // |   |
        // 2 - 3
        let ns = unit_network(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let res = run(&ns, &[Metric::Betweenness]);
        // each diagonal pair routes half its path through each corner
        assert_close(res.values(Metric::Betweenness).unwrap(), &[0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_accessibility_reach_opportunity() {
        let ns = unit_network(3, &[(0, 1), (1, 2)]);
        let res = run(
            &ns,
            &[Metric::Accessibility, Metric::Reach, Metric::Opportunity],
        );
        assert_close(res.values(Metric::Accessibility).unwrap(), &[1.5, 2.0, 1.5]);
        assert_close(res.values(Metric::Reach).unwrap(), &[3.0, 3.0, 3.0]);
        let end = 1.0 + 1.0 / 2.0 + 1.0 / 3.0;
        assert_close(res.values(Metric::Opportunity).unwrap(), &[end, 2.0, end]);
    }

    #[test]
    fn test_opportunity_requires_demand() {
        let mut ns = unit_network(2, &[]);
        ns.graph[petgraph::graph::NodeIndex::new(0)].attributes = NodeAttributes::new(1.0, 1.0, 0.0);
        ns.add_edge(0, 1, 1.0, None).unwrap();
        let res = run(&ns, &[Metric::Opportunity]);
        assert_close(res.values(Metric::Opportunity).unwrap(), &[0.0, 1.5]);
    }

    #[test]
    fn test_centrality_on_path() {
        let ns = unit_network(3, &[(0, 1), (1, 2)]);
        let res = run(&ns, &[Metric::Centrality]);
        assert_close(
            res.values(Metric::Centrality).unwrap(),
            &[5.0 / 6.0, 4.0 / 3.0, 5.0 / 6.0],
        );
    }

    #[test]
    fn test_convergence_and_polarity() {
        let mut ns = unit_network(2, &[(0, 1)]);
        let res = run(&ns, &[Metric::Convergence, Metric::Polarity]);
        assert_close(res.values(Metric::Convergence).unwrap(), &[2.0, 2.0]);
        assert_close(res.values(Metric::Polarity).unwrap(), &[2.0, 2.0]);
        // nodes without supply keep polarity but get no convergence
        ns.graph[petgraph::graph::NodeIndex::new(1)].attributes = NodeAttributes::new(1.0, 0.0, 1.0);
        let res = run(&ns, &[Metric::Convergence, Metric::Polarity]);
        // source 0: node 1 folds 0.5 back, then holds 0.5; source 0 holds 1.5
        // source 1: supply is zero so every tension term vanishes
        assert_close(res.values(Metric::Convergence).unwrap(), &[1.5, 0.0]);
        assert_close(res.values(Metric::Polarity).unwrap(), &[1.5, 0.5]);
    }

    #[test]
    fn test_connectivity_ignores_radius() {
        let ns = unit_network(4, &[(0, 1), (0, 2), (0, 3), (1, 2)]);
        let config = MetricConfig::new(MetricSet::empty().with(Metric::Connectivity))
            .with_radius(Radius::Bounded(0.5));
        let res = ns.compute_metrics(&config).unwrap();
        assert_close(res.values(Metric::Connectivity).unwrap(), &[3.0, 2.0, 2.0, 1.0]);
        assert_eq!(ns.progress(), 0);
    }

    #[test]
    fn test_average_distance_and_agglomeration() {
        let ns = unit_network(3, &[(0, 1), (1, 2)]);
        let res = run(&ns, &[Metric::AverageDistance, Metric::Agglomeration]);
        assert_close(res.values(Metric::AverageDistance).unwrap(), &[1.5, 1.0, 1.5]);
        assert_close(
            res.values(Metric::Agglomeration).unwrap(),
            &[2.0 / 3.0, 1.0, 2.0 / 3.0],
        );
        assert!(res.values(Metric::Reach).is_none());
    }

    #[test]
    fn test_average_distance_excludes_own_load() {
        // loads 1, 2, 1 on the path 0 - 1 - 2
        let mut ns = NetworkStructure::new();
        for load in [1.0, 2.0, 1.0] {
            ns.add_node(load.to_string(), NodeAttributes::new(load, 1.0, 1.0));
        }
        ns.add_edge(0, 1, 1.0, None).unwrap();
        ns.add_edge(1, 2, 1.0, None).unwrap();
        let res = run(&ns, &[Metric::Reach, Metric::AverageDistance]);
        assert_close(res.values(Metric::Reach).unwrap(), &[4.0, 4.0, 4.0]);
        // node 1 sees 1 + 1 load-weighted hops over the other nodes' load of 2
        assert_close(
            res.values(Metric::AverageDistance).unwrap(),
            &[4.0 / 3.0, 1.0, 4.0 / 3.0],
        );
    }

    #[test]
    fn test_shortest_path_flow_on_path() {
        let ns = unit_network(3, &[(0, 1), (1, 2)]);
        let res = run(
            &ns,
            &[
                Metric::ShortestPathFlow,
                Metric::PathShare,
                Metric::SupplyShare,
                Metric::Contact,
            ],
        );
        assert_close(res.values(Metric::ShortestPathFlow).unwrap(), &[4.0, 6.0, 4.0]);
        let totals = res.path_flow().unwrap();
        assert_eq!(totals.total, 6.0);
        let (end, mid) = (400.0 / 6.0, 100.0);
        assert_close(res.values(Metric::PathShare).unwrap(), &[end, mid, end]);
        let third = 100.0 / 3.0;
        assert_close(res.values(Metric::SupplyShare).unwrap(), &[third; 3]);
        assert_close(
            res.values(Metric::Contact).unwrap(),
            &[third * end, third * mid, third * end],
        );
    }

    #[test]
    fn test_shortest_path_flow_splits_ties() {
        // 0 - 1
        // |   |
        // 2 - 3
        let ns = unit_network(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let res = run(&ns, &[Metric::ShortestPathFlow]);
        // each node keeps 4 as source and carries 2 for every other source
        assert_close(res.values(Metric::ShortestPathFlow).unwrap(), &[10.0; 4]);
        // the diagonal pairs count both of their shortest paths
        assert_eq!(res.path_flow().unwrap().total, 16.0);
    }

    #[test]
    fn test_shortest_path_flow_weights_and_radius() {
        let mut ns = NetworkStructure::new();
        ns.add_node("a".to_string(), NodeAttributes::new(2.0, 1.0, 1.0));
        ns.add_node("b".to_string(), NodeAttributes::new(3.0, 1.0, 1.0));
        ns.add_edge(0, 1, 1.0, None).unwrap();
        let res = run(&ns, &[Metric::ShortestPathFlow]);
        assert_close(res.values(Metric::ShortestPathFlow).unwrap(), &[12.0, 12.0]);

        let ns = unit_network(3, &[(0, 1), (1, 2)]);
        let config = MetricConfig::new(MetricSet::empty().with(Metric::ShortestPathFlow))
            .with_radius(Radius::Bounded(1.0));
        let res = ns.compute_metrics(&config).unwrap();
        assert_close(res.values(Metric::ShortestPathFlow).unwrap(), &[2.0, 4.0, 2.0]);
        assert_eq!(res.path_flow().unwrap().total, 4.0);
    }

    #[test]
    fn test_offer_marked_flow() {
        // supply only at node 0 of the path 0 - 1 - 2
        let mut ns = NetworkStructure::new();
        for supply in [1.0, 0.0, 0.0] {
            ns.add_node(supply.to_string(), NodeAttributes::new(1.0, supply, 1.0));
        }
        ns.add_edge(0, 1, 1.0, None).unwrap();
        ns.add_edge(1, 2, 1.0, None).unwrap();
        let res = run(&ns, &[Metric::Contact]);
        let totals = res.path_flow().unwrap();
        // both pairs from node 0, and the pairs from nodes 1 and 2 that end at node 0
        assert_eq!(totals.offer_marked, 4.0);
        assert!((totals.offer_share() - 400.0 / 6.0).abs() < EPS);
        assert_close(
            res.values(Metric::Contact).unwrap(),
            &[100.0 * 400.0 / 6.0, 0.0, 0.0],
        );
        assert!(res.values(Metric::PathShare).is_none());

        let res = run(&ns, &[Metric::SupplyShare]);
        assert_close(res.values(Metric::SupplyShare).unwrap(), &[100.0, 0.0, 0.0]);
        assert!(res.path_flow().is_none());
        assert_eq!(ns.progress(), 0);
    }

    #[test]
    fn test_radius_limits_reach() {
        let ns = unit_network(4, &[(0, 1), (1, 2), (2, 3)]);
        let config = MetricConfig::new(MetricSet::empty().with(Metric::Reach))
            .with_radius(Radius::Bounded(1.0));
        let res = ns.compute_metrics(&config).unwrap();
        assert_close(res.values(Metric::Reach).unwrap(), &[2.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn test_disconnected_nodes_contribute_nothing() {
        let ns = unit_network(4, &[(0, 1)]);
        let res = run(&ns, &[Metric::Accessibility, Metric::Reach, Metric::Betweenness]);
        assert_close(res.values(Metric::Accessibility).unwrap(), &[1.0, 1.0, 0.0, 0.0]);
        assert_close(res.values(Metric::Reach).unwrap(), &[2.0, 2.0, 1.0, 1.0]);
        assert_close(res.values(Metric::Betweenness).unwrap(), &[0.0; 4]);
    }

    #[test]
    fn test_percent_of_total() {
        let ns = unit_network(3, &[(0, 1), (1, 2)]);
        let config = MetricConfig::new(
            MetricSet::empty()
                .with(Metric::Accessibility)
                .with(Metric::Betweenness),
        )
        .with_normalization(Normalization::PercentOfTotal);
        let res = ns.compute_metrics(&config).unwrap();
        assert_close(res.values(Metric::Accessibility).unwrap(), &[30.0, 40.0, 30.0]);
        assert_close(res.values(Metric::Betweenness).unwrap(), &[0.0, 100.0, 0.0]);
        // a star of two leaves has no betweenness anywhere: zero total is guarded
        let ns = unit_network(2, &[(0, 1)]);
        let res = ns.compute_metrics(&config).unwrap();
        assert_close(res.values(Metric::Betweenness).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_live_flag_skips_sources() {
        let mut ns = unit_network(3, &[(0, 1), (1, 2)]);
        ns.set_node_live(0, false).unwrap();
        let res = run(&ns, &[Metric::Reach, Metric::Betweenness]);
        assert_close(res.values(Metric::Reach).unwrap(), &[0.0, 3.0, 3.0]);
        // only the pair starting at node 2 routes through node 1
        assert_close(res.values(Metric::Betweenness).unwrap(), &[0.0, 0.5, 0.0]);
        assert_eq!(ns.progress(), 3);
    }

    #[test]
    fn test_config_errors() {
        let ns = unit_network(2, &[(0, 1)]);
        assert_eq!(
            ns.compute_metrics(&MetricConfig::default()).err(),
            Some(Error::NoMetricsSelected)
        );
        let config = MetricConfig::new(MetricSet::all()).with_radius(Radius::Bounded(-2.0));
        assert_eq!(
            ns.compute_metrics(&config).err(),
            Some(Error::InvalidRadius(-2.0))
        );
        assert_eq!(
            NetworkStructure::new()
                .compute_metrics(&MetricConfig::new(MetricSet::all()))
                .err(),
            Some(Error::EmptyNetwork)
        );
    }

    #[test]
    fn test_cancelled_run() {
        let ns = unit_network(3, &[(0, 1), (1, 2)]);
        ns.cancel();
        let config = MetricConfig::new(MetricSet::all());
        assert_eq!(ns.compute_metrics(&config).err(), Some(Error::Cancelled));
        ns.reset_cancel();
        assert!(ns.compute_metrics(&config).is_ok());
    }

    #[test]
    fn test_column_names() {
        assert_eq!(
            Metric::Betweenness.column_name(DistanceMode::Topological, Radius::Global),
            "TgBtw"
        );
        assert_eq!(
            Metric::Accessibility.column_name(DistanceMode::Geodetic, Radius::Bounded(1500.7)),
            "G1500Acc"
        );
        assert_eq!(
            Metric::Reach.column_name(DistanceMode::Geodetic, Radius::Bounded(1234567.0)),
            "G12345Rea"
        );
        assert_eq!(
            Metric::Contact.column_name(DistanceMode::Topological, Radius::Bounded(3.0)),
            "T3Ctc"
        );
        assert_eq!(Metric::from_name("polarity"), Some(Metric::Polarity));
        assert_eq!(Metric::from_name("path_share"), Some(Metric::PathShare));
        assert_eq!(Metric::from_name("nope"), None);
    }

    #[test]
    fn test_result_views() {
        let ns = unit_network(2, &[(0, 1)]);
        let res = run(&ns, &[Metric::Reach, Metric::Connectivity]);
        assert_eq!(
            res.node_values(1),
            vec![(Metric::Reach, 2.0), (Metric::Connectivity, 1.0)]
        );
        assert_eq!(res.value(Metric::Betweenness, 0), None);
        let map = res.to_node_map();
        assert_eq!(map["0"]["TgRea"], 2.0);
        assert_eq!(map["1"]["TgCnc"], 1.0);
    }
}
