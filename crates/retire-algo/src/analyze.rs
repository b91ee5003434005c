//! Group summaries and plant-level targeting explanations.
//!
//! Both operations consume the cluster graph plus the original plant
//! table. The partition invariant is validated up front: a raw row outside
//! every membership (and not excluded) is an orphan, and nothing is
//! computed from an inconsistent graph.
//!
//! **Group summary** - one row per cluster, iterated in `cluster_id`
//! order: plant count, mean capacity, mean age, retirement rate, mean
//! emission-rate proxy.
//!
//! **Target explanations** - one row per plant, in raw row order: three
//! scores in [0, 1] blended from the plant's own attributes and its
//! cluster's aggregates, a priority tier from fixed thresholds, and a
//! rationale naming the dominant factor(s).

use std::collections::HashMap;

use polars::prelude::{DataFrame, NamedFrom, PolarsError, Series};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use retire_core::{ClusterGraph, ClusterId, PlantRecord, PlantTable, RetireError};

/// Error type for the analyzer.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// A raw-table row is unaccounted for in the cluster graph
    #[error("raw row {row} is not a member of any cluster")]
    OrphanRow { row: usize },

    /// Membership is not a valid partition (duplicates, bad indices)
    #[error("invalid cluster partition: {0}")]
    Partition(String),

    /// Priority thresholds are out of range or inverted
    #[error("invalid priority thresholds: {0}")]
    InvalidThresholds(String),

    #[error("polars error: {0}")]
    Frame(#[from] PolarsError),
}

impl From<AnalyzeError> for RetireError {
    fn from(err: AnalyzeError) -> Self {
        match err {
            AnalyzeError::OrphanRow { row } => RetireError::OrphanRow { row },
            AnalyzeError::Partition(msg) => RetireError::Validation(msg),
            AnalyzeError::InvalidThresholds(msg) => RetireError::Config(msg),
            AnalyzeError::Frame(e) => RetireError::Other(e.to_string()),
        }
    }
}

/// Combined-score cutoffs for the priority tiers. Fixed per run, never
/// tuned per call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityThresholds {
    /// Combined score at or above this is "high"
    pub high: f64,
    /// Combined score at or above this (and below `high`) is "medium"
    pub medium: f64,
}

impl Default for PriorityThresholds {
    fn default() -> Self {
        Self {
            high: 0.75,
            medium: 0.45,
        }
    }
}

impl PriorityThresholds {
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        if !(0.0 < self.medium && self.medium < 1.0) || !(0.0 < self.high && self.high < 1.0) {
            return Err(AnalyzeError::InvalidThresholds(format!(
                "thresholds must lie in (0, 1), got high={} medium={}",
                self.high, self.medium
            )));
        }
        if self.high <= self.medium {
            return Err(AnalyzeError::InvalidThresholds(format!(
                "high threshold {} must exceed medium threshold {}",
                self.high, self.medium
            )));
        }
        Ok(())
    }
}

/// Ordinal priority tier for a plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Monotonic mapping from combined score to tier.
    pub fn from_score(combined: f64, thresholds: &PriorityThresholds) -> Self {
        if combined >= thresholds.high {
            Priority::High
        } else if combined >= thresholds.medium {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// One group-summary row.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRow {
    pub group: ClusterId,
    pub plant_count: usize,
    pub avg_capacity_mw: f64,
    pub avg_age_years: f64,
    pub retirement_rate: f64,
    pub avg_emissions_rate: f64,
}

/// One target-explanation row.
#[derive(Debug, Clone, Serialize)]
pub struct TargetRow {
    pub orispl: String,
    pub plant_name: String,
    pub priority: Priority,
    pub economic_score: f64,
    pub environmental_score: f64,
    pub political_feasibility: f64,
    pub explanation: String,
}

impl TargetRow {
    /// The combined score the priority tier was derived from.
    pub fn combined_score(&self) -> f64 {
        (self.economic_score + self.environmental_score + self.political_feasibility) / 3.0
    }
}

/// Per-cluster aggregates the target scores draw on.
struct ClusterAggregates {
    mean_age: f64,
    retirement_rate: f64,
}

fn validate(graph: &ClusterGraph, table: &PlantTable) -> Result<(), AnalyzeError> {
    graph
        .validate_partition(table.len())
        .map_err(|err| match err {
            RetireError::OrphanRow { row } => AnalyzeError::OrphanRow { row },
            other => AnalyzeError::Partition(other.to_string()),
        })
}

/// Aggregate the raw attributes of each cluster's members into one summary
/// row per cluster, in `cluster_id` order.
pub fn group_analysis_rows(
    graph: &ClusterGraph,
    table: &PlantTable,
) -> Result<Vec<GroupRow>, AnalyzeError> {
    validate(graph, table)?;

    let rows = graph
        .nodes_in_id_order()
        .into_iter()
        .map(|node| {
            let members: Vec<&PlantRecord> = node
                .membership
                .iter()
                .map(|&row| table.get(row).expect("validated membership"))
                .collect();
            let n = members.len() as f64;
            GroupRow {
                group: node.cluster_id,
                plant_count: members.len(),
                avg_capacity_mw: members.iter().map(|p| p.capacity.value()).sum::<f64>() / n,
                avg_age_years: members.iter().map(|p| p.age_years as f64).sum::<f64>() / n,
                retirement_rate: members
                    .iter()
                    .map(|p| p.retirement_contribution())
                    .sum::<f64>()
                    / n,
                avg_emissions_rate: members
                    .iter()
                    .map(|p| p.emissions_rate().value())
                    .sum::<f64>()
                    / n,
            }
        })
        .collect::<Vec<_>>();

    info!(groups = rows.len(), "aggregated group analysis");
    Ok(rows)
}

/// Group summary as a DataFrame for the output boundary.
pub fn group_analysis(graph: &ClusterGraph, table: &PlantTable) -> Result<DataFrame, AnalyzeError> {
    let rows = group_analysis_rows(graph, table)?;
    group_frame(&rows)
}

/// Render group-summary rows as a DataFrame.
pub fn group_frame(rows: &[GroupRow]) -> Result<DataFrame, AnalyzeError> {
    let df = DataFrame::new(vec![
        Series::new(
            "Group",
            rows.iter().map(|r| r.group.value() as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "Plant_Count",
            rows.iter().map(|r| r.plant_count as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "Avg_Capacity_MW",
            rows.iter().map(|r| r.avg_capacity_mw).collect::<Vec<_>>(),
        ),
        Series::new(
            "Avg_Age_Years",
            rows.iter().map(|r| r.avg_age_years).collect::<Vec<_>>(),
        ),
        Series::new(
            "Retirement_Rate",
            rows.iter().map(|r| r.retirement_rate).collect::<Vec<_>>(),
        ),
        Series::new(
            "Avg_Emissions_Rate",
            rows.iter().map(|r| r.avg_emissions_rate).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Substitute a neutral midpoint for inputs the dataset left missing, so a
/// gap in one survey column cannot zero out a plant's whole score.
fn or_neutral(value: f64) -> f64 {
    if value.is_nan() {
        0.5
    } else {
        value
    }
}

/// Economic retirement case: low utilization, old equipment, and a
/// renewables cost advantage all strengthen it.
fn economic_score(plant: &PlantRecord) -> f64 {
    let utilization = 1.0 - or_neutral(plant.capacity_factor.value()) / 0.9;
    let age = (plant.age_years as f64 / 60.0).min(1.0);
    let cost_gap = clamp01(0.5 + or_neutral(plant.pct_difference) / 50.0);
    clamp01(0.4 * utilization + 0.3 * age + 0.3 * cost_gap)
}

/// Environmental burden: the emission-rate proxy plus how the plant's age
/// sits against its cluster's mean.
fn environmental_score(plant: &PlantRecord, aggregates: &ClusterAggregates) -> f64 {
    let emissions = (or_neutral(plant.emissions_rate().value()) - 1.0) / 2.0;
    let relative_age = clamp01(0.5 + (plant.age_years as f64 - aggregates.mean_age) / 40.0);
    clamp01(0.6 * emissions + 0.4 * relative_age)
}

/// Political feasibility: weak local opposition plus the cluster's
/// retirement momentum.
fn political_feasibility(plant: &PlantRecord, aggregates: &ClusterAggregates) -> f64 {
    let support = 1.0 - or_neutral(plant.opposition.value());
    clamp01(0.7 * support + 0.3 * aggregates.retirement_rate)
}

/// Rationale naming the dominant factor, plus a runner-up when it is close.
fn explanation(priority: Priority, economic: f64, environmental: f64, political: f64) -> String {
    let factors = [
        (economic, "poor economics relative to renewables"),
        (environmental, "heavy emissions burden for its cluster"),
        (political, "favorable political conditions"),
    ];
    let (dominant, clause) = factors
        .iter()
        .cloned()
        .fold((f64::MIN, ""), |best, (score, clause)| {
            if score > best.0 {
                (score, clause)
            } else {
                best
            }
        });
    let runner_up = factors
        .iter()
        .filter(|(score, c)| *c != clause && dominant - score < 0.1)
        .map(|(_, c)| *c)
        .next();

    let tier = match priority {
        Priority::High => "High",
        Priority::Medium => "Moderate",
        Priority::Low => "Low",
    };
    match runner_up {
        Some(second) => format!("{} priority - {} and {}", tier, clause, second),
        None => format!("{} priority - {}", tier, clause),
    }
}

/// Score every clustered plant and explain its targeting priority.
///
/// Rows excluded before clustering (drop-row policy) carry no cluster
/// context and are omitted from the output; everything else appears in raw
/// row order.
pub fn target_explanation_rows(
    graph: &ClusterGraph,
    table: &PlantTable,
    thresholds: &PriorityThresholds,
) -> Result<Vec<TargetRow>, AnalyzeError> {
    thresholds.validate()?;
    validate(graph, table)?;

    // Row -> cluster aggregates, via each node's membership.
    let mut row_cluster: HashMap<usize, usize> = HashMap::new();
    let nodes = graph.nodes_in_id_order();
    let mut aggregates = Vec::with_capacity(nodes.len());
    for (slot, node) in nodes.iter().enumerate() {
        let members: Vec<&PlantRecord> = node
            .membership
            .iter()
            .map(|&row| table.get(row).expect("validated membership"))
            .collect();
        let n = members.len() as f64;
        aggregates.push(ClusterAggregates {
            mean_age: members.iter().map(|p| p.age_years as f64).sum::<f64>() / n,
            retirement_rate: members
                .iter()
                .map(|p| p.retirement_contribution())
                .sum::<f64>()
                / n,
        });
        for &row in &node.membership {
            row_cluster.insert(row, slot);
        }
    }

    let mut rows = Vec::with_capacity(table.len());
    for (row, plant) in table.iter().enumerate() {
        let Some(&slot) = row_cluster.get(&row) else {
            // Excluded before clustering; validated above.
            continue;
        };
        let agg = &aggregates[slot];
        let economic = economic_score(plant);
        let environmental = environmental_score(plant, agg);
        let political = political_feasibility(plant, agg);
        let combined = (economic + environmental + political) / 3.0;
        let priority = Priority::from_score(combined, thresholds);
        rows.push(TargetRow {
            orispl: plant.orispl.as_str().to_string(),
            plant_name: plant.name.clone(),
            priority,
            economic_score: economic,
            environmental_score: environmental,
            political_feasibility: political,
            explanation: explanation(priority, economic, environmental, political),
        });
    }

    info!(plants = rows.len(), "scored target explanations");
    Ok(rows)
}

/// Target explanations as a DataFrame for the output boundary.
pub fn target_explanations(
    graph: &ClusterGraph,
    table: &PlantTable,
    thresholds: &PriorityThresholds,
) -> Result<DataFrame, AnalyzeError> {
    let rows = target_explanation_rows(graph, table, thresholds)?;
    target_frame(&rows)
}

/// Render target-explanation rows as a DataFrame.
pub fn target_frame(rows: &[TargetRow]) -> Result<DataFrame, AnalyzeError> {
    let df = DataFrame::new(vec![
        Series::new(
            "ORISPL",
            rows.iter().map(|r| r.orispl.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "Plant_Name",
            rows.iter().map(|r| r.plant_name.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "Priority",
            rows.iter()
                .map(|r| r.priority.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "Economic_Score",
            rows.iter().map(|r| r.economic_score).collect::<Vec<_>>(),
        ),
        Series::new(
            "Environmental_Score",
            rows.iter().map(|r| r.environmental_score).collect::<Vec<_>>(),
        ),
        Series::new(
            "Political_Feasibility",
            rows.iter()
                .map(|r| r.political_feasibility)
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "Explanation",
            rows.iter().map(|r| r.explanation.clone()).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{plant, sample_plants};
    use retire_core::{ClusterNode, Fraction, PlantTable, RetirementStatus};

    /// The fixture clustering: {A, B}, {C}, {D}.
    fn sample_graph() -> ClusterGraph {
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
    fn group_rows_match_node_count_and_sizes() {
        let table = sample_plants();
        let rows = group_analysis_rows(&sample_graph(), &table).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].plant_count, 2);
        assert_eq!(rows[1].plant_count, 1);
        assert_eq!(rows[2].plant_count, 1);
        // Ordered by cluster id.
        let ids: Vec<usize> = rows.iter().map(|r| r.group.value()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn group_aggregates_are_member_means() {
        let table = sample_plants();
        let rows = group_analysis_rows(&sample_graph(), &table).unwrap();

        // Cluster 0 = plants A (500 MW, 35y) and B (750 MW, 42y).
        assert!((rows[0].avg_capacity_mw - 625.0).abs() < 1e-9);
        assert!((rows[0].avg_age_years - 38.5).abs() < 1e-9);
    }

    #[test]
    fn retiring_status_outweighs_operating() {
        // Cluster 1 holds Plant C: cf 0.38, age 28, already retiring.
        let table = sample_plants();
        let rows = group_analysis_rows(&sample_graph(), &table).unwrap();

        let retiring_rate = rows[1].retirement_rate;
        let operating_rate = rows[2].retirement_rate; // Plant D, status 0
        assert!(retiring_rate > operating_rate);
        assert_eq!(operating_rate, 0.0);
        assert_eq!(retiring_rate, 1.0);
    }

    #[test]
    fn orphan_row_is_detected() {
        let table = sample_plants();
        let mut graph = ClusterGraph::new();
        graph.add_cluster(ClusterNode::new(ClusterId::new(0), vec![0, 1]));
        graph.add_cluster(ClusterNode::new(ClusterId::new(1), vec![2]));
        // Row 3 unaccounted for.
        let err = group_analysis_rows(&graph, &table).unwrap_err();
        assert!(matches!(err, AnalyzeError::OrphanRow { row: 3 }));
    }

    #[test]
    fn excluded_rows_are_not_orphans() {
        let table = sample_plants();
        let mut graph = ClusterGraph::new();
        graph.add_cluster(ClusterNode::new(ClusterId::new(0), vec![0, 1]));
        graph.add_cluster(ClusterNode::new(ClusterId::new(1), vec![2]));
        graph.excluded_rows.push(3);

        let rows = group_analysis_rows(&graph, &table).unwrap();
        assert_eq!(rows.len(), 2);

        let targets =
            target_explanation_rows(&graph, &table, &PriorityThresholds::default()).unwrap();
        assert_eq!(targets.len(), 3, "excluded plant is omitted");
    }

    #[test]
    fn target_rows_in_raw_order_with_unit_scores() {
        let table = sample_plants();
        let rows =
            target_explanation_rows(&sample_graph(), &table, &PriorityThresholds::default())
                .unwrap();

        assert_eq!(rows.len(), 4);
        let orispls: Vec<&str> = rows.iter().map(|r| r.orispl.as_str()).collect();
        assert_eq!(orispls, vec!["12345", "23456", "34567", "45678"]);
        for row in &rows {
            for score in [
                row.economic_score,
                row.environmental_score,
                row.political_feasibility,
            ] {
                assert!((0.0..=1.0).contains(&score));
            }
            assert!(!row.explanation.is_empty());
        }
    }

    #[test]
    fn priority_is_monotonic_in_combined_score() {
        let thresholds = PriorityThresholds::default();
        let mut last = Priority::Low;
        for step in 0..=100 {
            let combined = step as f64 / 100.0;
            let priority = Priority::from_score(combined, &thresholds);
            assert!(priority >= last, "priority dropped at {}", combined);
            last = priority;
        }
        assert_eq!(Priority::from_score(0.75, &thresholds), Priority::High);
        assert_eq!(Priority::from_score(0.45, &thresholds), Priority::Medium);
        assert_eq!(Priority::from_score(0.44, &thresholds), Priority::Low);
    }

    #[test]
    fn inverted_thresholds_are_config_error() {
        let thresholds = PriorityThresholds {
            high: 0.4,
            medium: 0.6,
        };
        let table = sample_plants();
        let err = target_explanation_rows(&sample_graph(), &table, &thresholds).unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidThresholds(_)));
    }

    #[test]
    fn retiring_cluster_raises_political_feasibility() {
        // Two single-plant clusters, identical except retirement momentum.
        let mut retiring = plant("1", 500.0, 35, 0.45);
        retiring.status = RetirementStatus::Retiring;
        retiring.pct_capacity_retiring = Fraction(1.0);
        let steady = plant("2", 500.0, 35, 0.45);
        let table = PlantTable::new(vec![retiring, steady]);

        let mut graph = ClusterGraph::new();
        graph.add_cluster(ClusterNode::new(ClusterId::new(0), vec![0]));
        graph.add_cluster(ClusterNode::new(ClusterId::new(1), vec![1]));

        let rows =
            target_explanation_rows(&graph, &table, &PriorityThresholds::default()).unwrap();
        assert!(rows[0].political_feasibility > rows[1].political_feasibility);
    }

    #[test]
    fn explanation_names_the_dominant_factor() {
        // Plant D: strong economics (huge cost gap, old), strong opposition.
        let table = sample_plants();
        let rows =
            target_explanation_rows(&sample_graph(), &table, &PriorityThresholds::default())
                .unwrap();
        let plant_d = &rows[3];
        assert!(plant_d.explanation.contains("economics"));
    }

    #[test]
    fn dataframe_outputs_have_expected_shape() {
        let table = sample_plants();
        let graph = sample_graph();

        let groups = group_analysis(&graph, &table).unwrap();
        assert_eq!(groups.height(), 3);
        assert_eq!(
            groups.get_column_names(),
            vec![
                "Group",
                "Plant_Count",
                "Avg_Capacity_MW",
                "Avg_Age_Years",
                "Retirement_Rate",
                "Avg_Emissions_Rate"
            ]
        );

        let targets =
            target_explanations(&graph, &table, &PriorityThresholds::default()).unwrap();
        assert_eq!(targets.height(), 4);
        assert_eq!(
            targets.get_column_names(),
            vec![
                "ORISPL",
                "Plant_Name",
                "Priority",
                "Economic_Score",
                "Environmental_Score",
                "Political_Feasibility",
                "Explanation"
            ]
        );
    }
}
