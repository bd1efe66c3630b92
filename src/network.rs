use crate::community::{louvain_communities, CommunityPartition};
use crate::error::AppError;
use crate::graph::{
    build_corr_graph, intersect_graphs, prune_pair_isolates, CorrGraph, GraphConfig,
};
use crate::matrix::PairMatrix;

/// Build one correlation graph per omics layer, intersect them, prune
/// degenerate substructures and partition the result into communities.
///
/// `configs` supplies the cutoffs: one entry shared by all layers, or one
/// entry per layer for independently tuned layers. The returned graph is the
/// pruned intersection; the partition covers exactly its nodes.
pub fn build_intersection_network(
    correlations: &[PairMatrix],
    pvalues: &[PairMatrix],
    configs: &[GraphConfig],
    seed: Option<u64>,
) -> Result<(CorrGraph, CommunityPartition), AppError> {
    if correlations.len() != pvalues.len() {
        return Err(AppError::LayerMismatch(format!(
            "{} correlation matrices but {} p-value matrices",
            correlations.len(),
            pvalues.len()
        )));
    }
    if configs.len() != 1 && configs.len() != correlations.len() {
        return Err(AppError::LayerMismatch(format!(
            "{} cutoff configs for {} layers (expected 1 shared or one per layer)",
            configs.len(),
            correlations.len()
        )));
    }
    if correlations.is_empty() {
        return Ok((CorrGraph::new(), CommunityPartition::empty()));
    }

    let mut graphs = Vec::with_capacity(correlations.len());
    for (layer, (corr, pval)) in correlations.iter().zip(pvalues.iter()).enumerate() {
        let config = if configs.len() == 1 {
            &configs[0]
        } else {
            &configs[layer]
        };
        graphs.push(build_corr_graph(corr, pval, config)?);
    }

    let intersection = intersect_graphs(&graphs);
    let pruned = prune_pair_isolates(&intersection);
    let partition = louvain_communities(&pruned, seed);
    Ok((pruned, partition))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(entries: &[(&str, &str, f64, f64)], labels: &[&str]) -> (PairMatrix, PairMatrix) {
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let mut corr = PairMatrix::new(labels.clone());
        let mut pval = PairMatrix::new(labels);
        for (a, b, r, p) in entries {
            corr.set(a, b, *r).unwrap();
            pval.set(a, b, *p).unwrap();
        }
        (corr, pval)
    }

    #[test]
    fn test_intersection_network_keeps_shared_module() {
        let labels = ["a", "b", "c", "d", "e"];
        // Both layers support the a-b-c triangle; only layer 1 links d-e
        let (corr1, pval1) = layer(
            &[
                ("a", "b", 0.9, 0.01),
                ("b", "c", 0.8, 0.01),
                ("a", "c", 0.85, 0.01),
                ("d", "e", 0.95, 0.01),
            ],
            &labels,
        );
        let (corr2, pval2) = layer(
            &[
                ("a", "b", 0.7, 0.02),
                ("b", "c", 0.75, 0.02),
                ("a", "c", 0.65, 0.02),
            ],
            &labels,
        );

        let (graph, partition) = build_intersection_network(
            &[corr1, corr2],
            &[pval1, pval2],
            &[GraphConfig::default()],
            Some(5),
        )
        .unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(!graph.has_node("d"));

        // The whole surviving triangle is one community
        assert_eq!(partition.community_count(), 1);
        for node in ["a", "b", "c"] {
            assert_eq!(partition.community_of(node), Some(0));
        }
        assert!(partition.community_of("d").is_none());
    }

    #[test]
    fn test_partition_matches_pruned_node_set_exactly() {
        let labels = ["a", "b", "c", "x", "y"];
        // Triangle plus a dyad: the dyad is pruned away before partitioning
        let (corr, pval) = layer(
            &[
                ("a", "b", 0.9, 0.01),
                ("b", "c", 0.8, 0.01),
                ("a", "c", 0.85, 0.01),
                ("x", "y", 0.99, 0.001),
            ],
            &labels,
        );

        let (graph, partition) =
            build_intersection_network(&[corr], &[pval], &[GraphConfig::default()], Some(1))
                .unwrap();

        let nodes: std::collections::HashSet<String> = graph.node_names().into_iter().collect();
        let assigned: std::collections::HashSet<String> =
            partition.assignment.keys().cloned().collect();
        assert_eq!(nodes, assigned);
        assert!(!nodes.contains("x"));
    }

    #[test]
    fn test_per_layer_cutoffs() {
        let labels = ["a", "b"];
        let (corr1, pval1) = layer(&[("a", "b", 0.5, 0.01)], &labels);
        let (corr2, pval2) = layer(&[("a", "b", 0.9, 0.01)], &labels);

        // A permissive cutoff on layer 1 lets the shared edge survive
        let configs = vec![
            GraphConfig {
                pvalue_cutoff: 0.05,
                corr_cutoff: 0.4,
            },
            GraphConfig::default(),
        ];
        let (graph, _) =
            build_intersection_network(&[corr1, corr2], &[pval1, pval2], &configs, Some(1))
                .unwrap();
        // The a-b edge is common to both layers but is a dyad, pruned away
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_layer_count_mismatch_rejected() {
        let labels = ["a", "b"];
        let (corr, pval) = layer(&[("a", "b", 0.9, 0.01)], &labels);
        let err = build_intersection_network(
            &[corr.clone(), corr],
            &[pval],
            &[GraphConfig::default()],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::LayerMismatch(_)));
    }

    #[test]
    fn test_no_layers_is_empty_network() {
        let (graph, partition) =
            build_intersection_network(&[], &[], &[GraphConfig::default()], None).unwrap();
        assert_eq!(graph.node_count(), 0);
        assert!(partition.is_empty());
    }
}
