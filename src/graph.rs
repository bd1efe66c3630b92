use std::collections::{HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};

use crate::error::AppError;
use crate::matrix::PairMatrix;

/// Cutoffs for turning a correlation/p-value matrix pair into a graph.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub pvalue_cutoff: f64,
    pub corr_cutoff: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            pvalue_cutoff: 0.05,
            corr_cutoff: 0.6,
        }
    }
}

/// Undirected weighted graph over entity ids; edge weight = |correlation|.
#[derive(Debug, Clone, Default)]
pub struct CorrGraph {
    graph: UnGraph<String, f64>,
    nodes: HashMap<String, NodeIndex>,
}

impl CorrGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(&i), Some(&j)) => self.graph.find_edge(i, j).is_some(),
            _ => false,
        }
    }

    pub fn edge_weight(&self, a: &str, b: &str) -> Option<f64> {
        let i = *self.nodes.get(a)?;
        let j = *self.nodes.get(b)?;
        let edge = self.graph.find_edge(i, j)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Node names in insertion order.
    pub fn node_names(&self) -> Vec<String> {
        self.graph.node_indices().map(|i| self.graph[i].clone()).collect()
    }

    pub fn neighbors(&self, name: &str) -> Vec<String> {
        match self.nodes.get(name) {
            Some(&i) => self
                .graph
                .neighbors(i)
                .map(|j| self.graph[j].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn degree(&self, name: &str) -> usize {
        match self.nodes.get(name) {
            Some(&i) => self.graph.neighbors(i).count(),
            None => 0,
        }
    }

    /// All edges as (a, b, weight) triples, in insertion order.
    pub fn edges(&self) -> Vec<(String, String, f64)> {
        self.graph
            .edge_indices()
            .map(|e| {
                let (i, j) = self.graph.edge_endpoints(e).expect("edge endpoints");
                (self.graph[i].clone(), self.graph[j].clone(), self.graph[e])
            })
            .collect()
    }

    pub fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&i) = self.nodes.get(name) {
            return i;
        }
        let i = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), i);
        i
    }

    /// Add (or overwrite) an undirected weighted edge, creating its endpoints.
    pub fn add_edge(&mut self, a: &str, b: &str, weight: f64) {
        let i = self.ensure_node(a);
        let j = self.ensure_node(b);
        self.graph.update_edge(i, j, weight);
    }

    /// Rebuild without the given nodes (and without their edges), keeping
    /// the remaining insertion order. The original is untouched.
    pub fn without_nodes(&self, remove: &HashSet<String>) -> CorrGraph {
        let mut out = CorrGraph::new();
        for name in self.node_names() {
            if !remove.contains(&name) {
                out.ensure_node(&name);
            }
        }
        for (a, b, w) in self.edges() {
            if !remove.contains(&a) && !remove.contains(&b) {
                out.add_edge(&a, &b, w);
            }
        }
        out
    }
}

/// Threshold a correlation/p-value matrix pair into a graph.
///
/// Keeps unordered pairs with p <= pvalue_cutoff, |r| >= corr_cutoff and
/// r >= 0; negative associations are excluded because they do not compose
/// into multi-entity modules. NaN cells (unpopulated or degenerate pairs)
/// are treated as insufficient evidence and skipped. Nodes without a
/// retained edge do not appear.
pub fn build_corr_graph(
    corr: &PairMatrix,
    pvalues: &PairMatrix,
    config: &GraphConfig,
) -> Result<CorrGraph, AppError> {
    if corr.labels() != pvalues.labels() {
        return Err(AppError::LayerMismatch(format!(
            "correlation matrix has {} labels but the p-value matrix has {}",
            corr.len(),
            pvalues.len()
        )));
    }

    let labels = corr.labels();
    let mut graph = CorrGraph::new();
    for i in 0..labels.len() {
        for j in i + 1..labels.len() {
            let p = pvalues.value_between_indices(i, j);
            let r = corr.value_between_indices(i, j);
            if p.is_nan() || r.is_nan() || p > config.pvalue_cutoff {
                continue;
            }
            let magnitude = r.abs();
            if magnitude < config.corr_cutoff || r < 0.0 {
                continue;
            }
            graph.add_edge(&labels[i], &labels[j], magnitude);
        }
    }
    Ok(graph)
}

/// Remove isolates and mutually-isolated dyads (two nodes connected only to
/// each other), then drop any nodes orphaned by the dyad removal. Returns a
/// pruned copy; the input graph is never mutated.
pub fn prune_pair_isolates(graph: &CorrGraph) -> CorrGraph {
    let mut to_remove: HashSet<String> = HashSet::new();
    for node in graph.node_names() {
        if to_remove.contains(&node) {
            continue;
        }
        let neighbors = graph.neighbors(&node);
        if neighbors.is_empty() {
            to_remove.insert(node);
        } else if neighbors.len() == 1 {
            let back = graph.neighbors(&neighbors[0]);
            if back.len() == 1 && back[0] == node {
                to_remove.insert(node);
                to_remove.insert(neighbors[0].clone());
            }
        }
    }

    let pruned = graph.without_nodes(&to_remove);

    // Dyad removal can orphan further nodes
    let isolates: HashSet<String> = pruned
        .node_names()
        .into_iter()
        .filter(|n| pruned.degree(n) == 0)
        .collect();
    pruned.without_nodes(&isolates)
}

/// Intersect graphs across layers: nodes present in every layer, edges whose
/// endpoints are joined in every layer (weights taken from the first layer;
/// weights are not required to agree numerically). Nodes left without any
/// common edge are dropped.
pub fn intersect_graphs(graphs: &[CorrGraph]) -> CorrGraph {
    let mut result = CorrGraph::new();
    let first = match graphs.first() {
        Some(g) => g,
        None => return result,
    };

    for (a, b, w) in first.edges() {
        let shared = graphs[1..]
            .iter()
            .all(|g| g.has_node(&a) && g.has_node(&b) && g.has_edge(&a, &b));
        if shared {
            result.add_edge(&a, &b, w);
        }
    }
    result
}
