//! # retire-algo: Clustering and Scoring for Plant Retirement Analysis
//!
//! This crate implements the analysis pipeline over a raw coal-plant
//! table, in three strictly forward-flowing stages:
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | [`normalize`] | `PlantTable` | z-scored [`ScaledFeatures`] |
//! | [`cluster`] | `ScaledFeatures` | weighted [`retire_core::ClusterGraph`] |
//! | [`analyze`] | graph + raw table | group summary + target explanations |
//!
//! [`pipeline`] chains the three stages behind one call and one config
//! struct; [`io`] persists the resulting tables.
//!
//! ## Determinism
//!
//! Every stage is a pure function of its inputs and configuration. Cluster
//! ids are assigned by minimum member row index, group rows iterate in id
//! order, and target rows follow raw row order, so two runs on identical
//! input produce identical outputs. The optional `rayon` feature
//! parallelizes the pairwise-similarity computation without changing any
//! observable ordering.
//!
//! ## Example
//!
//! ```ignore
//! use retire_algo::{run_pipeline, PipelineConfig};
//! use retire_io::load_plants_from_csv;
//!
//! let import = load_plants_from_csv("coal_plants.csv")?;
//! let outputs = run_pipeline(&import.table, &PipelineConfig::default())?;
//! println!("{} clusters", outputs.graph.node_count());
//! ```

pub mod analyze;
pub mod cluster;
pub mod io;
pub mod normalize;
pub mod pipeline;
pub mod test_utils;

pub use analyze::{
    group_analysis, group_analysis_rows, group_frame, target_explanation_rows,
    target_explanations, target_frame, AnalyzeError, GroupRow, Priority, PriorityThresholds,
    TargetRow,
};
pub use cluster::{build_cluster_graph, ClusterConfig, ClusterError, SimilarityMetric};
pub use io::{persist_dataframe, staged_output_path, OutputStage};
pub use normalize::{
    normalize_features, MissingValuePolicy, NormalizeError, NormalizerConfig, ScaledFeatures,
    FEATURE_COLUMNS, FEATURE_COUNT,
};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineOutputs};
