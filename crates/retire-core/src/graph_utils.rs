use crate::{ClusterGraph, RetireError, RetireResult};
use petgraph::algo::connected_components;

/// Summary statistics for a cluster graph (density/degree/connected
/// components).
#[derive(Debug)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// Calculates graph-level statistics such as density, degree distribution,
/// and component counts (classic network science measures).
pub fn graph_stats(graph: &ClusterGraph) -> GraphStats {
    let node_count = graph.graph.node_count();
    let edge_count = graph.graph.edge_count();
    let mut degrees = Vec::with_capacity(node_count);
    for node in graph.graph.node_indices() {
        degrees.push(graph.graph.neighbors(node).count());
    }
    let min_degree = *degrees.iter().min().unwrap_or(&0);
    let max_degree = *degrees.iter().max().unwrap_or(&0);
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().copied().sum::<usize>() as f64 / node_count as f64
    };
    let density = if node_count < 2 {
        0.0
    } else {
        2.0 * edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    };
    GraphStats {
        node_count,
        edge_count,
        connected_components: connected_components(&graph.graph),
        min_degree,
        avg_degree,
        max_degree,
        density,
    }
}

/// Enforce the partition invariant: every raw-table row index in
/// `0..row_count` appears in exactly one node's membership or in the
/// graph's excluded set. Duplicated rows are a validation error; missing
/// rows are orphans.
pub fn validate_partition(graph: &ClusterGraph, row_count: usize) -> RetireResult<()> {
    let mut owner: Vec<Option<usize>> = vec![None; row_count];

    for node in graph.graph.node_weights() {
        if node.membership.is_empty() {
            return Err(RetireError::Validation(format!(
                "cluster {} has empty membership",
                node.cluster_id
            )));
        }
        for &row in &node.membership {
            if row >= row_count {
                return Err(RetireError::Validation(format!(
                    "cluster {} references row {} beyond table length {}",
                    node.cluster_id, row, row_count
                )));
            }
            match owner[row] {
                None => owner[row] = Some(node.cluster_id.value()),
                Some(other) => {
                    return Err(RetireError::Validation(format!(
                        "row {} belongs to both cluster {} and cluster {}",
                        row, other, node.cluster_id
                    )))
                }
            }
        }
    }

    for &row in &graph.excluded_rows {
        if row >= row_count {
            return Err(RetireError::Validation(format!(
                "excluded row {} beyond table length {}",
                row, row_count
            )));
        }
        if let Some(cluster) = owner[row] {
            return Err(RetireError::Validation(format!(
                "row {} is both excluded and a member of cluster {}",
                row, cluster
            )));
        }
        owner[row] = Some(usize::MAX); // excluded marker
    }

    if let Some(row) = owner.iter().position(|o| o.is_none()) {
        return Err(RetireError::OrphanRow { row });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClusterId, ClusterNode};

    fn three_cluster_graph() -> ClusterGraph {
        let mut graph = ClusterGraph::new();
        graph.add_cluster(ClusterNode::new(ClusterId::new(0), vec![0, 1]));
        graph.add_cluster(ClusterNode::new(ClusterId::new(1), vec![2]));
        graph.add_cluster(ClusterNode::new(ClusterId::new(2), vec![3]));
        graph
            .add_similarity(ClusterId::new(0), ClusterId::new(1), 0.75)
            .unwrap();
        graph
            .add_similarity(ClusterId::new(1), ClusterId::new(2), 0.60)
            .unwrap();
        graph
    }

    #[test]
    fn stats_on_sample_graph() {
        let stats = graph_stats(&three_cluster_graph());
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.connected_components, 1);
        assert_eq!(stats.min_degree, 1);
        assert_eq!(stats.max_degree, 2);
        assert!((stats.density - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn stats_on_empty_graph() {
        let stats = graph_stats(&ClusterGraph::new());
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.density, 0.0);
    }

    #[test]
    fn partition_accepts_full_coverage() {
        assert!(validate_partition(&three_cluster_graph(), 4).is_ok());
    }

    #[test]
    fn partition_flags_orphan_row() {
        let graph = three_cluster_graph();
        let err = validate_partition(&graph, 5).unwrap_err();
        assert!(matches!(err, RetireError::OrphanRow { row: 4 }));
    }

    #[test]
    fn partition_flags_duplicate_row() {
        let mut graph = three_cluster_graph();
        graph.add_cluster(ClusterNode::new(ClusterId::new(3), vec![0]));
        assert!(matches!(
            validate_partition(&graph, 4),
            Err(RetireError::Validation(_))
        ));
    }

    #[test]
    fn partition_honors_excluded_rows() {
        let mut graph = three_cluster_graph();
        graph.excluded_rows.push(4);
        assert!(validate_partition(&graph, 5).is_ok());
    }

    #[test]
    fn partition_rejects_excluded_member_overlap() {
        let mut graph = three_cluster_graph();
        graph.excluded_rows.push(2);
        assert!(matches!(
            validate_partition(&graph, 4),
            Err(RetireError::Validation(_))
        ));
    }
}
