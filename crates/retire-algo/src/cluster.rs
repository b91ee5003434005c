//! Cluster graph construction over scaled feature rows.
//!
//! Plants are grouped by deterministic average-linkage agglomerative
//! merging: starting from singletons, the pair of clusters with the
//! highest average member-pair similarity merges while that similarity
//! stays at or above the configured threshold. Ties break on the smaller
//! minimum member row index, so repeated runs on identical input produce
//! identical graphs; no unordered-map iteration order can leak into the
//! result.
//!
//! Every final cluster becomes one node with its sorted raw-row membership
//! and a stable id assigned by minimum member row index. Cluster pairs
//! whose average similarity exceeds the edge threshold are connected by an
//! edge carrying that similarity; weights are symmetric by construction
//! and live in [0, 1].
//!
//! # Example
//!
//! ```ignore
//! use retire_algo::cluster::{build_cluster_graph, ClusterConfig};
//!
//! let graph = build_cluster_graph(&features, &ClusterConfig::default())?;
//! println!("{} clusters, {} edges", graph.node_count(), graph.edge_count());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use retire_core::{ClusterGraph, ClusterId, ClusterNode, RetireError};

use crate::normalize::{ScaledFeatures, FEATURE_COUNT};

/// Error type for cluster graph construction.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// No feature rows to cluster
    #[error("no feature rows to cluster")]
    EmptyInput,

    /// Everything merged into one cluster; the threshold is too permissive
    #[error("clustering collapsed {rows} rows into a single cluster (threshold {threshold})")]
    Collapsed { rows: usize, threshold: f64 },

    /// More clusters than the configured maximum; the threshold is too strict
    #[error("clustering produced {clusters} clusters, above the maximum {max}")]
    TooManyClusters { clusters: usize, max: usize },

    /// Out-of-range or contradictory configuration
    #[error("invalid cluster configuration: {0}")]
    InvalidConfig(String),
}

impl From<ClusterError> for RetireError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::EmptyInput => RetireError::EmptyInput,
            ClusterError::Collapsed { .. } | ClusterError::TooManyClusters { .. } => {
                RetireError::DegenerateClustering(err.to_string())
            }
            ClusterError::InvalidConfig(msg) => RetireError::Config(msg),
        }
    }
}

/// Similarity metric over scaled feature vectors. Every metric maps into
/// [0, 1] with higher meaning more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Gaussian kernel on Euclidean distance: `exp(-d^2 / 2)`
    #[default]
    Gaussian,
    /// Cosine similarity rescaled from [-1, 1] to [0, 1]
    Cosine,
    /// Inverse distance: `1 / (1 + d)`
    InverseDistance,
}

impl SimilarityMetric {
    /// Similarity between two scaled feature vectors.
    pub fn similarity(&self, a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
        match self {
            SimilarityMetric::Gaussian => {
                let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
                (-d2 / 2.0).exp()
            }
            SimilarityMetric::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let na: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let nb: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
                // All-zero vectors happen when every column has zero
                // variance; identical zeros count as identical.
                if na < 1e-12 && nb < 1e-12 {
                    1.0
                } else if na < 1e-12 || nb < 1e-12 {
                    0.5
                } else {
                    // Clamp away f64 rounding past the ends of [-1, 1].
                    ((1.0 + dot / (na * nb)) / 2.0).clamp(0.0, 1.0)
                }
            }
            SimilarityMetric::InverseDistance => {
                let d: f64 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y).powi(2))
                    .sum::<f64>()
                    .sqrt();
                1.0 / (1.0 + d)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Gaussian => "gaussian",
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::InverseDistance => "inverse_distance",
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" => Ok(SimilarityMetric::Gaussian),
            "cosine" => Ok(SimilarityMetric::Cosine),
            "inverse_distance" | "inverse-distance" => Ok(SimilarityMetric::InverseDistance),
            other => Err(ClusterError::InvalidConfig(format!(
                "unknown similarity metric '{}'",
                other
            ))),
        }
    }
}

/// Configuration for the cluster graph builder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub metric: SimilarityMetric,
    /// Minimum average similarity for two clusters to merge, in (0, 1]
    pub cluster_threshold: f64,
    /// Minimum average similarity for an edge between final clusters, in
    /// [0, 1). Must sit below `cluster_threshold`: merging strips every
    /// inter-cluster similarity above the merge threshold, so an equal or
    /// higher edge threshold always yields an edgeless graph.
    pub edge_threshold: f64,
    /// Upper bound on the final cluster count
    pub max_clusters: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::default(),
            cluster_threshold: 0.5,
            edge_threshold: 0.3,
            max_clusters: 64,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), ClusterError> {
        if !(self.cluster_threshold > 0.0 && self.cluster_threshold <= 1.0) {
            return Err(ClusterError::InvalidConfig(format!(
                "cluster_threshold {} outside (0, 1]",
                self.cluster_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.edge_threshold) {
            return Err(ClusterError::InvalidConfig(format!(
                "edge_threshold {} outside [0, 1)",
                self.edge_threshold
            )));
        }
        if self.edge_threshold >= self.cluster_threshold {
            return Err(ClusterError::InvalidConfig(format!(
                "edge_threshold {} must be below cluster_threshold {}",
                self.edge_threshold, self.cluster_threshold
            )));
        }
        if self.max_clusters == 0 {
            return Err(ClusterError::InvalidConfig(
                "max_clusters must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build the cluster graph for a scaled feature table.
///
/// Fails with [`ClusterError::Collapsed`] when more than one input row
/// ends in a single cluster, and [`ClusterError::TooManyClusters`] when
/// the final count exceeds `max_clusters`; both signal a misconfigured
/// threshold. A non-empty input never yields an empty graph.
pub fn build_cluster_graph(
    features: &ScaledFeatures,
    config: &ClusterConfig,
) -> Result<ClusterGraph, ClusterError> {
    config.validate()?;

    let n = features.len();
    if n == 0 {
        return Err(ClusterError::EmptyInput);
    }

    let sim = similarity_matrix(features, config.metric);

    // Agglomerative merge loop over matrix-row clusters. Members stay
    // sorted, so the first qualifying pair in (i, j) scan order is the
    // deterministic tie-break winner.
    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    loop {
        if clusters.len() < 2 {
            break;
        }
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let s = average_similarity(&clusters[i], &clusters[j], &sim);
                if best.map_or(true, |(_, _, b)| s > b) {
                    best = Some((i, j, s));
                }
            }
        }
        match best {
            Some((i, j, s)) if s >= config.cluster_threshold => {
                let merged = clusters.remove(j);
                clusters[i].extend(merged);
                clusters[i].sort_unstable();
            }
            _ => break,
        }
    }

    if n > 1 && clusters.len() == 1 {
        return Err(ClusterError::Collapsed {
            rows: n,
            threshold: config.cluster_threshold,
        });
    }
    if clusters.len() > config.max_clusters {
        return Err(ClusterError::TooManyClusters {
            clusters: clusters.len(),
            max: config.max_clusters,
        });
    }

    // Stable ids by minimum member row index. Matrix rows ascend with raw
    // rows, so sorting by first member gives the same order in both spaces.
    clusters.sort_by_key(|members| members[0]);

    let mut graph = ClusterGraph::new();
    graph.excluded_rows = features.dropped_rows().to_vec();
    for (id, members) in clusters.iter().enumerate() {
        let membership = members
            .iter()
            .map(|&row| features.source_row(row))
            .collect::<Vec<_>>();
        graph.add_cluster(ClusterNode::new(ClusterId::new(id), membership));
    }

    for i in 0..clusters.len() {
        for j in (i + 1)..clusters.len() {
            let weight = average_similarity(&clusters[i], &clusters[j], &sim);
            if weight > config.edge_threshold {
                graph
                    .add_similarity(ClusterId::new(i), ClusterId::new(j), weight)
                    .expect("cluster ids exist by construction");
            }
        }
    }

    info!(
        rows = n,
        clusters = graph.node_count(),
        edges = graph.edge_count(),
        metric = config.metric.as_str(),
        "built cluster graph"
    );

    Ok(graph)
}

/// Dense pairwise similarity matrix over matrix rows.
#[cfg(not(feature = "rayon"))]
fn similarity_matrix(features: &ScaledFeatures, metric: SimilarityMetric) -> Vec<Vec<f64>> {
    (0..features.len())
        .map(|i| {
            (0..features.len())
                .map(|j| metric.similarity(features.row(i), features.row(j)))
                .collect()
        })
        .collect()
}

/// Dense pairwise similarity matrix, rows computed in parallel. Row order
/// is fixed by the collect, so the output is identical to the serial path.
#[cfg(feature = "rayon")]
fn similarity_matrix(features: &ScaledFeatures, metric: SimilarityMetric) -> Vec<Vec<f64>> {
    use rayon::prelude::*;
    (0..features.len())
        .into_par_iter()
        .map(|i| {
            (0..features.len())
                .map(|j| metric.similarity(features.row(i), features.row(j)))
                .collect()
        })
        .collect()
}

/// Average linkage: mean pairwise similarity between two member sets.
fn average_similarity(a: &[usize], b: &[usize], sim: &[Vec<f64>]) -> f64 {
    let mut total = 0.0;
    for &i in a {
        for &j in b {
            total += sim[i][j];
        }
    }
    total / (a.len() * b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize_features, NormalizerConfig};
    use crate::test_utils::plant;
    use retire_core::PlantTable;

    /// Four plants where the first two are near-identical and the last two
    /// are far from everything.
    fn twin_table() -> PlantTable {
        PlantTable::new(vec![
            plant("1", 500.0, 35, 0.45),
            plant("2", 505.0, 36, 0.46),
            plant("3", 1800.0, 12, 0.88),
            plant("4", 60.0, 63, 0.15),
        ])
    }

    fn features(table: &PlantTable) -> crate::normalize::ScaledFeatures {
        normalize_features(table, &NormalizerConfig::default()).unwrap()
    }

    #[test]
    fn permissive_threshold_groups_twins() {
        let table = twin_table();
        let config = ClusterConfig {
            cluster_threshold: 0.4,
            edge_threshold: 0.01,
            ..ClusterConfig::default()
        };
        let graph = build_cluster_graph(&features(&table), &config).unwrap();

        let nodes = graph.nodes_in_id_order();
        assert_eq!(nodes[0].membership, vec![0, 1], "twins share a cluster");
        assert!(graph.validate_partition(4).is_ok());
    }

    #[test]
    fn strict_threshold_separates_twins() {
        let table = twin_table();
        let config = ClusterConfig {
            cluster_threshold: 0.9999,
            edge_threshold: 0.01,
            ..ClusterConfig::default()
        };
        let graph = build_cluster_graph(&features(&table), &config).unwrap();

        assert_eq!(graph.node_count(), 4);
        for node in graph.nodes_in_id_order() {
            assert_eq!(node.size(), 1);
        }
    }

    #[test]
    fn memberships_partition_all_rows() {
        let table = twin_table();
        let graph = build_cluster_graph(&features(&table), &ClusterConfig::default()).unwrap();
        assert!(graph.validate_partition(table.len()).is_ok());
        assert_eq!(graph.member_count(), table.len());
    }

    #[test]
    fn cluster_ids_follow_minimum_member_index() {
        let table = twin_table();
        let graph = build_cluster_graph(&features(&table), &ClusterConfig::default()).unwrap();
        let nodes = graph.nodes_in_id_order();
        for (expected, node) in nodes.iter().enumerate() {
            assert_eq!(node.cluster_id.value(), expected);
        }
        // First members strictly increase across id order.
        let firsts: Vec<usize> = nodes.iter().map(|n| n.membership[0]).collect();
        assert!(firsts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn edge_weights_within_metric_domain() {
        let table = twin_table();
        let config = ClusterConfig {
            cluster_threshold: 0.9999,
            edge_threshold: 0.0,
            ..ClusterConfig::default()
        };
        let graph = build_cluster_graph(&features(&table), &config).unwrap();
        assert!(graph.edge_count() > 0);
        for edge in graph.graph.edge_weights() {
            assert!(edge.weight > 0.0 && edge.weight <= 1.0);
        }
    }

    #[test]
    fn collapse_is_degenerate() {
        // Identical plants: every similarity is 1, everything merges.
        let table = PlantTable::new(vec![
            plant("1", 500.0, 35, 0.45),
            plant("2", 500.0, 35, 0.45),
            plant("3", 500.0, 35, 0.45),
        ]);
        let err =
            build_cluster_graph(&features(&table), &ClusterConfig::default()).unwrap_err();
        assert!(matches!(err, ClusterError::Collapsed { rows: 3, .. }));
    }

    #[test]
    fn explosion_is_degenerate() {
        let table = twin_table();
        let config = ClusterConfig {
            cluster_threshold: 0.9999,
            edge_threshold: 0.01,
            max_clusters: 2,
            ..ClusterConfig::default()
        };
        let err = build_cluster_graph(&features(&table), &config).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::TooManyClusters { clusters: 4, max: 2 }
        ));
    }

    #[test]
    fn single_row_is_a_singleton_not_degenerate() {
        let table = PlantTable::new(vec![plant("1", 500.0, 35, 0.45)]);
        let graph = build_cluster_graph(&features(&table), &ClusterConfig::default()).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.nodes_in_id_order()[0].membership, vec![0]);
    }

    #[test]
    fn config_validation_rejects_bad_thresholds() {
        let bad_cluster = ClusterConfig {
            cluster_threshold: 1.5,
            ..ClusterConfig::default()
        };
        assert!(bad_cluster.validate().is_err());

        let inverted = ClusterConfig {
            cluster_threshold: 0.3,
            edge_threshold: 0.5,
            ..ClusterConfig::default()
        };
        assert!(inverted.validate().is_err());

        let zero_max = ClusterConfig {
            max_clusters: 0,
            ..ClusterConfig::default()
        };
        assert!(zero_max.validate().is_err());
    }

    #[test]
    fn repeated_runs_are_identical() {
        let table = twin_table();
        let scaled = features(&table);
        let a = build_cluster_graph(&scaled, &ClusterConfig::default()).unwrap();
        let b = build_cluster_graph(&scaled, &ClusterConfig::default()).unwrap();

        let doc_a = serde_json::to_string(&a.to_document()).unwrap();
        let doc_b = serde_json::to_string(&b.to_document()).unwrap();
        assert_eq!(doc_a, doc_b);
    }

    #[test]
    fn metrics_stay_in_unit_interval() {
        let a = [1.0, -0.5, 0.3, 0.0, 2.0];
        let b = [-1.0, 0.5, -0.3, 0.0, -2.0];
        for metric in [
            SimilarityMetric::Gaussian,
            SimilarityMetric::Cosine,
            SimilarityMetric::InverseDistance,
        ] {
            let s = metric.similarity(&a, &b);
            assert!((0.0..=1.0).contains(&s), "{:?} gave {}", metric, s);
            // Symmetry
            assert_eq!(s, metric.similarity(&b, &a));
            // Self-similarity is maximal
            assert!((metric.similarity(&a, &a) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn metric_parses_from_str() {
        assert_eq!(
            "gaussian".parse::<SimilarityMetric>().unwrap(),
            SimilarityMetric::Gaussian
        );
        assert!("fancy".parse::<SimilarityMetric>().is_err());
    }

    #[test]
    fn dropped_rows_become_excluded() {
        use crate::normalize::MissingValuePolicy;
        use retire_core::Fraction;

        let mut missing = plant("2", 505.0, 36, 0.46);
        missing.capacity_factor = Fraction(f64::NAN);
        let table = PlantTable::new(vec![
            plant("1", 500.0, 35, 0.45),
            missing,
            plant("3", 1800.0, 12, 0.88),
            plant("4", 60.0, 63, 0.15),
        ]);
        let scaled = normalize_features(
            &table,
            &NormalizerConfig {
                missing_values: MissingValuePolicy::DropRow,
            },
        )
        .unwrap();
        let graph = build_cluster_graph(&scaled, &ClusterConfig::default()).unwrap();

        assert_eq!(graph.excluded_rows, vec![1]);
        assert!(graph.validate_partition(table.len()).is_ok());
    }
}
