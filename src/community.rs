use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::graph::CorrGraph;

/// Node partition produced by modularity maximization.
///
/// Community ids are dense integers from 0, ordered by each community's
/// first member in graph node order. Every node of the input graph appears
/// in exactly one community.
#[derive(Debug, Clone)]
pub struct CommunityPartition {
    pub assignment: HashMap<String, usize>,
    pub members: Vec<Vec<String>>,
}

impl CommunityPartition {
    pub fn empty() -> Self {
        Self {
            assignment: HashMap::new(),
            members: Vec::new(),
        }
    }

    pub fn community_of(&self, name: &str) -> Option<usize> {
        self.assignment.get(name).copied()
    }

    pub fn community_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// Adjacency lists with self-loops stored once; a self-loop of weight w
// contributes 2w to the node degree.
type Adjacency = Vec<Vec<(usize, f64)>>;

/// Louvain community detection (greedy modularity: local moving + graph
/// aggregation, resolution 1).
///
/// Visit order is shuffled per pass. With `seed = Some(s)` the partition is
/// reproducible; with `None` ties in modularity gain make the result
/// non-deterministic across runs.
pub fn louvain_communities(graph: &CorrGraph, seed: Option<u64>) -> CommunityPartition {
    let names = graph.node_names();
    let n = names.len();
    if n == 0 {
        return CommunityPartition::empty();
    }

    let index: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut adj: Adjacency = vec![Vec::new(); n];
    let mut m = 0.0;
    for (a, b, w) in graph.edges() {
        let i = index[a.as_str()];
        let j = index[b.as_str()];
        adj[i].push((j, w));
        if i != j {
            adj[j].push((i, w));
        }
        m += w;
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    // Edgeless graph: modularity is undefined, every node stands alone
    if m <= 0.0 {
        return partition_from_labels(&names, &(0..n).collect::<Vec<usize>>());
    }

    // node -> community of the current aggregation level, tracked through levels
    let mut node_to_final: Vec<usize> = (0..n).collect();
    loop {
        let (community, improved) = local_moving(&adj, m, &mut rng);
        let (relabeled, n_communities) = renumber(&community);
        for label in node_to_final.iter_mut() {
            *label = relabeled[*label];
        }
        if !improved || n_communities == adj.len() {
            break;
        }
        adj = aggregate(&adj, &relabeled, n_communities);
    }

    partition_from_labels(&names, &node_to_final)
}

fn degrees(adj: &Adjacency) -> Vec<f64> {
    adj.iter()
        .enumerate()
        .map(|(i, edges)| {
            edges
                .iter()
                .map(|&(j, w)| if j == i { 2.0 * w } else { w })
                .sum()
        })
        .collect()
}

/// One level of local moving. Returns the node -> community labels and
/// whether any node changed community.
fn local_moving(adj: &Adjacency, m: f64, rng: &mut StdRng) -> (Vec<usize>, bool) {
    let n = adj.len();
    let k = degrees(adj);
    let mut community: Vec<usize> = (0..n).collect();
    let mut tot = k.clone();

    let mut order: Vec<usize> = (0..n).collect();
    let mut improved = false;
    loop {
        order.shuffle(rng);
        let mut moved = false;
        for &node in &order {
            let current = community[node];

            // Weight from this node to each neighboring community
            let mut link: HashMap<usize, f64> = HashMap::new();
            for &(nb, w) in &adj[node] {
                if nb != node {
                    *link.entry(community[nb]).or_insert(0.0) += w;
                }
            }

            tot[current] -= k[node];
            let gain_of = |c: usize, w_c: f64| w_c - tot[c] * k[node] / (2.0 * m);

            // Sorted candidate order keeps tie-breaking independent of map
            // iteration order, so a fixed seed reproduces the partition
            let mut candidates: Vec<(usize, f64)> = link.into_iter().collect();
            candidates.sort_by_key(|&(c, _)| c);

            let own_link = candidates
                .iter()
                .find(|&&(c, _)| c == current)
                .map_or(0.0, |&(_, w)| w);
            let mut best = current;
            let mut best_gain = gain_of(current, own_link);
            for &(c, w_c) in &candidates {
                if c == current {
                    continue;
                }
                let gain = gain_of(c, w_c);
                if gain > best_gain {
                    best = c;
                    best_gain = gain;
                }
            }

            community[node] = best;
            tot[best] += k[node];
            if best != current {
                moved = true;
                improved = true;
            }
        }
        if !moved {
            break;
        }
    }
    (community, improved)
}

/// Relabel community ids densely from 0 (order of first appearance).
fn renumber(community: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    let mut relabeled = Vec::with_capacity(community.len());
    for &c in community {
        let next = mapping.len();
        let dense = *mapping.entry(c).or_insert(next);
        relabeled.push(dense);
    }
    (relabeled, mapping.len())
}

/// Collapse each community into a super-node; intra-community weight becomes
/// a self-loop.
fn aggregate(adj: &Adjacency, community: &[usize], n_communities: usize) -> Adjacency {
    let mut weights: Vec<HashMap<usize, f64>> = vec![HashMap::new(); n_communities];
    for (i, edges) in adj.iter().enumerate() {
        for &(j, w) in edges {
            if j < i {
                continue; // each undirected edge visited once
            }
            let ci = community[i];
            let cj = community[j];
            let (lo, hi) = if ci <= cj { (ci, cj) } else { (cj, ci) };
            *weights[lo].entry(hi).or_insert(0.0) += w;
        }
    }

    let mut out: Adjacency = vec![Vec::new(); n_communities];
    for (lo, row) in weights.into_iter().enumerate() {
        for (hi, w) in row {
            out[lo].push((hi, w));
            if hi != lo {
                out[hi].push((lo, w));
            }
        }
    }
    // Deterministic neighbor order regardless of map iteration order
    for edges in out.iter_mut() {
        edges.sort_by(|a, b| a.0.cmp(&b.0));
    }
    out
}

fn partition_from_labels(names: &[String], labels: &[usize]) -> CommunityPartition {
    // Dense ids ordered by first member in graph node order
    let mut dense: HashMap<usize, usize> = HashMap::new();
    let mut assignment = HashMap::new();
    let mut members: Vec<Vec<String>> = Vec::new();
    for (name, &label) in names.iter().zip(labels.iter()) {
        let next = dense.len();
        let id = *dense.entry(label).or_insert(next);
        if id == members.len() {
            members.push(Vec::new());
        }
        members[id].push(name.clone());
        assignment.insert(name.clone(), id);
    }
    CommunityPartition { assignment, members }
}
