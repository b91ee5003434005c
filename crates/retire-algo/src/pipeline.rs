//! Single-call orchestration of the full analysis pipeline.
//!
//! Data flows strictly forward: raw table -> scaled features -> cluster
//! graph -> group summary + target explanations. No stage mutates another
//! stage's output; a failing stage aborts the run with its own error and
//! nothing downstream is produced.

use std::path::Path;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

use retire_core::{ClusterGraph, PlantTable, RetireError, RetireResult};

use crate::analyze::{group_analysis, target_explanations, PriorityThresholds};
use crate::cluster::{build_cluster_graph, ClusterConfig};
use crate::normalize::{normalize_features, NormalizerConfig, ScaledFeatures};

/// Everything the pipeline is parameterized by. Loadable from a JSON file;
/// every section falls back to its documented default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub thresholds: PriorityThresholds,
}

impl PipelineConfig {
    /// Reject contradictory configuration before any work starts.
    pub fn validate(&self) -> RetireResult<()> {
        self.cluster.validate().map_err(RetireError::from)?;
        self.thresholds.validate().map_err(RetireError::from)?;
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> RetireResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

/// The four result structures of one analysis run.
#[derive(Debug)]
pub struct PipelineOutputs {
    pub features: ScaledFeatures,
    pub graph: ClusterGraph,
    pub groups: DataFrame,
    pub targets: DataFrame,
}

/// Run normalize -> cluster -> analyze over a plant table.
///
/// Re-running on identical input and configuration yields identical
/// outputs; every stage is a pure function of its inputs.
pub fn run_pipeline(table: &PlantTable, config: &PipelineConfig) -> RetireResult<PipelineOutputs> {
    table.validate()?;
    config.validate()?;

    info!(plants = table.len(), "starting analysis pipeline");
    let features = normalize_features(table, &config.normalizer)?;
    let graph = build_cluster_graph(&features, &config.cluster)?;
    let groups = group_analysis(&graph, table)?;
    let targets = target_explanations(&graph, table, &config.thresholds)?;
    info!(
        clusters = graph.node_count(),
        edges = graph.edge_count(),
        "pipeline complete"
    );

    Ok(PipelineOutputs {
        features,
        graph,
        groups,
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{group_analysis_rows, target_explanation_rows};
    use crate::test_utils::sample_plants;

    #[test]
    fn pipeline_produces_all_four_outputs() {
        let table = sample_plants();
        let outputs = run_pipeline(&table, &PipelineConfig::default()).unwrap();

        assert_eq!(outputs.features.len(), 4);
        assert!(outputs.graph.node_count() >= 2);
        assert_eq!(outputs.groups.height(), outputs.graph.node_count());
        assert_eq!(outputs.targets.height(), 4);
        assert!(outputs.graph.validate_partition(table.len()).is_ok());
    }

    #[test]
    fn pipeline_is_deterministic() {
        let table = sample_plants();
        let config = PipelineConfig::default();

        let a = run_pipeline(&table, &config).unwrap();
        let b = run_pipeline(&table, &config).unwrap();

        let graph_a = serde_json::to_string(&a.graph.to_document()).unwrap();
        let graph_b = serde_json::to_string(&b.graph.to_document()).unwrap();
        assert_eq!(graph_a, graph_b);

        let groups_a = group_analysis_rows(&a.graph, &table).unwrap();
        let groups_b = group_analysis_rows(&b.graph, &table).unwrap();
        assert_eq!(
            serde_json::to_string(&groups_a).unwrap(),
            serde_json::to_string(&groups_b).unwrap()
        );

        let thresholds = config.thresholds;
        let targets_a = target_explanation_rows(&a.graph, &table, &thresholds).unwrap();
        let targets_b = target_explanation_rows(&b.graph, &table, &thresholds).unwrap();
        assert_eq!(
            serde_json::to_string(&targets_a).unwrap(),
            serde_json::to_string(&targets_b).unwrap()
        );
    }

    #[test]
    fn empty_table_aborts_before_any_stage() {
        let table = PlantTable::default();
        assert!(matches!(
            run_pipeline(&table, &PipelineConfig::default()),
            Err(RetireError::EmptyInput)
        ));
    }

    #[test]
    fn invalid_config_aborts_before_any_stage() {
        let table = sample_plants();
        let mut config = PipelineConfig::default();
        config.thresholds.high = 0.2; // below medium
        assert!(matches!(
            run_pipeline(&table, &config),
            Err(RetireError::Config(_))
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig::default();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(
            loaded.cluster.cluster_threshold,
            config.cluster.cluster_threshold
        );
        assert_eq!(loaded.thresholds.high, config.thresholds.high);
    }
}
