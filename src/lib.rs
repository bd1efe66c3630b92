//! Bootstrap Spearman correlation networks for multi-omics time courses.
//!
//! The pipeline: fit a normal distribution per replicate group of every
//! entity, bootstrap Spearman correlations for all unordered entity pairs in
//! parallel, threshold the resulting matrices into correlation graphs per
//! omics layer, intersect the layers, prune degenerate substructures and
//! partition the intersection into communities.

pub mod bootstrap;
pub mod community;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod matrix;
pub mod network;
pub mod pairs;
pub mod progress;
pub mod stats;
pub mod table;

pub use bootstrap::{bootstrap_spearman, fit_replicate_distributions, BootstrapResult};
pub use community::{louvain_communities, CommunityPartition};
pub use dispatch::{bootstrap_correlate_parallel, CorrelateConfig};
pub use error::AppError;
pub use graph::{build_corr_graph, intersect_graphs, prune_pair_isolates, CorrGraph, GraphConfig};
pub use matrix::PairMatrix;
pub use network::build_intersection_network;
pub use progress::{DescriptiveProgress, NoProgress, ProgressObserver};
pub use table::{MeasurementSeries, OmicsTable};
