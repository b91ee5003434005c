//! # retire-core: Coal Plant Dataset and Cluster Graph Core
//!
//! Provides the fundamental data structures for coal plant retirement
//! analysis: the plant-record table the pipeline consumes, and the
//! cluster graph it produces.
//!
//! ## Design Philosophy
//!
//! Clustering results are modeled as an **undirected weighted graph** where:
//! - **Nodes**: plant clusters, each carrying the raw-table row indices of
//!   its members
//! - **Edges**: inter-cluster similarity weights in [0, 1]
//!
//! Representing the clustering as an explicit node/edge structure with
//! attribute maps (rather than an implicit assignment array) enables:
//! - Independent validation of the partition invariant
//! - Topological queries over the cluster landscape (density, components)
//! - A stable serialized form for handing results between CLI invocations
//!
//! ## Quick Start
//!
//! ```rust
//! use retire_core::*;
//!
//! let mut graph = ClusterGraph::new();
//!
//! graph.add_cluster(ClusterNode::new(ClusterId::new(0), vec![0, 1]));
//! graph.add_cluster(ClusterNode::new(ClusterId::new(1), vec![2]));
//! graph.add_similarity(ClusterId::new(0), ClusterId::new(1), 0.75).unwrap();
//!
//! assert_eq!(graph.node_count(), 2);
//! assert!(graph.validate_partition(3).is_ok());
//! ```
//!
//! ## Core Data Structures
//!
//! - [`PlantRecord`] / [`PlantTable`] - the raw plant dataset; the row index
//!   is the identity every downstream component refers to
//! - [`ClusterGraph`] - petgraph `UnGraph<ClusterNode, ClusterEdge>`
//! - Type-safe IDs: [`Orispl`] (the dataset's unique plant key),
//!   [`ClusterId`]
//!
//! ## Row-Index Contract
//!
//! Cluster membership is defined as a list of raw-table **row indices**, not
//! ORISPL values. Any re-indexing of the raw table invalidates existing
//! cluster graphs; rows intentionally removed before clustering must be
//! recorded in [`ClusterGraph::excluded_rows`].
//!
//! ## Modules
//!
//! - [`diagnostics`] - non-fatal issue collection
//! - [`graph_utils`] - cluster-graph statistics and partition validation
//! - [`units`] - unit newtypes (megawatts, fractions, emission rates)

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, ImportStats, Severity};
pub use error::{RetireError, RetireResult};
pub use graph_utils::*;
pub use petgraph::graph::NodeIndex;
pub use units::{Fraction, Megawatts, TonsPerMwh};

/// ORISPL code: the EIA's unique plant identifier and the join key used by
/// every downstream component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Orispl(String);

impl Orispl {
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        Orispl(value.into())
    }
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Orispl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable cluster identifier, assigned in order of minimum member row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(usize);

impl ClusterId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ClusterId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Retirement status of a plant, from the dataset's `ret_STATUS` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetirementStatus {
    /// Code 0: operating with no retirement activity
    Operating,
    /// Code 1: retirement announced for part of the capacity
    Announced,
    /// Code 2: already retiring
    Retiring,
}

impl RetirementStatus {
    /// Decode the dataset's integer status code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RetirementStatus::Operating),
            1 => Some(RetirementStatus::Announced),
            2 => Some(RetirementStatus::Retiring),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            RetirementStatus::Operating => 0,
            RetirementStatus::Announced => 1,
            RetirementStatus::Retiring => 2,
        }
    }

    /// Contribution weight toward a group's retirement rate. An already
    /// retiring plant always outweighs an operating one.
    pub fn weight(&self) -> f64 {
        match self {
            RetirementStatus::Operating => 0.0,
            RetirementStatus::Announced => 0.5,
            RetirementStatus::Retiring => 1.0,
        }
    }
}

/// Whether a utility's replacement build-out leans renewables or coal,
/// from the dataset's "Renewables or Coal" column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPreference {
    Renewables,
    Coal,
}

impl TransitionPreference {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "renewables" => Some(TransitionPreference::Renewables),
            "coal" => Some(TransitionPreference::Coal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionPreference::Renewables => "renewables",
            TransitionPreference::Coal => "coal",
        }
    }
}

/// One row of the raw coal-plant dataset.
///
/// Source sentinels are resolved before a record is constructed: missing
/// retirement dates are `None`, never the "n/a" string, and percentage
/// columns are canonical [`Fraction`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantRecord {
    pub name: String,
    pub orispl: Orispl,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Total nameplate capacity
    pub capacity: Megawatts,
    pub age_years: u32,
    pub status: RetirementStatus,
    /// Share of nameplate capacity with announced retirement, in [0, 1]
    pub pct_capacity_retiring: Fraction,
    pub generator_count: u32,
    pub utility: String,
    /// Average capacity factor, in [0, 1]
    pub capacity_factor: Fraction,
    pub fuel_type: String,
    pub transition: TransitionPreference,
    /// Signed percent cost difference, renewables vs coal (positive means
    /// renewables are cheaper)
    pub pct_difference: f64,
    /// Year of the (planned) retirement, if any
    pub retirement_year: Option<i32>,
    /// Free-text date of last unit or planned retirement, if any
    pub last_retirement: Option<String>,
    /// Share of local respondents opposing strict limits on coal plants,
    /// in [0, 1]
    pub opposition: Fraction,
}

impl PlantRecord {
    /// Emission-rate proxy in tons CO2 per MWh.
    ///
    /// Heat rate degrades with age; high utilization correlates with newer,
    /// more efficient units. The dataset carries no stack measurements, so
    /// group emission summaries are derived from this proxy.
    pub fn emissions_rate(&self) -> TonsPerMwh {
        TonsPerMwh(
            1.4 + 0.02 * self.age_years as f64 + 0.6 * (0.6 - self.capacity_factor.value()),
        )
    }

    /// Contribution of this plant toward its group's retirement rate,
    /// combining the status weight with the retiring-capacity share.
    pub fn retirement_contribution(&self) -> f64 {
        self.status.weight() * (0.5 + 0.5 * self.pct_capacity_retiring.value())
    }
}

/// The raw plant dataset: one record per physical plant, ordered as read.
///
/// The row index is the identity used by cluster memberships, so the table
/// is append-only once loaded; there is no API for reordering or removing
/// rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlantTable {
    records: Vec<PlantRecord>,
}

impl PlantTable {
    pub fn new(records: Vec<PlantRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&PlantRecord> {
        self.records.get(row)
    }

    pub fn records(&self) -> &[PlantRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlantRecord> {
        self.records.iter()
    }

    /// Row index of the plant with the given ORISPL code.
    pub fn position_of(&self, orispl: &Orispl) -> Option<usize> {
        self.records.iter().position(|r| &r.orispl == orispl)
    }

    /// Table-level invariants: at least one row, unique ORISPL keys,
    /// non-negative capacity, at least one generator per plant.
    pub fn validate(&self) -> RetireResult<()> {
        if self.records.is_empty() {
            return Err(RetireError::EmptyInput);
        }
        let mut seen = std::collections::HashSet::new();
        for record in &self.records {
            if !seen.insert(&record.orispl) {
                return Err(RetireError::Validation(format!(
                    "duplicate ORISPL '{}'",
                    record.orispl
                )));
            }
            if record.capacity.value() < 0.0 {
                return Err(RetireError::Validation(format!(
                    "plant '{}' has negative capacity",
                    record.orispl
                )));
            }
            if record.generator_count == 0 {
                return Err(RetireError::Validation(format!(
                    "plant '{}' has zero generators",
                    record.orispl
                )));
            }
        }
        Ok(())
    }
}

/// A cluster of plants, represented as one graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Stable integer id, assigned by minimum member row index
    pub cluster_id: ClusterId,
    /// Display label, `cluster_{id}`
    pub label: String,
    /// Sorted raw-table row indices of the member plants; non-empty,
    /// disjoint across nodes
    pub membership: Vec<usize>,
}

impl ClusterNode {
    /// Build a node; membership is sorted on construction.
    pub fn new(cluster_id: ClusterId, mut membership: Vec<usize>) -> Self {
        membership.sort_unstable();
        Self {
            label: format!("cluster_{}", cluster_id.value()),
            cluster_id,
            membership,
        }
    }

    pub fn size(&self) -> usize {
        self.membership.len()
    }
}

/// Inter-cluster similarity edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterEdge {
    /// Similarity in [0, 1]; higher = more similar
    pub weight: f64,
}

/// Undirected weighted graph over plant clusters.
#[derive(Debug, Clone, Default)]
pub struct ClusterGraph {
    pub graph: UnGraph<ClusterNode, ClusterEdge>,
    /// Raw-table rows intentionally removed before clustering (e.g. by the
    /// drop-row missing-value policy). These are exempt from the partition
    /// invariant; anything else unaccounted for is an orphan row.
    pub excluded_rows: Vec<usize>,
}

impl ClusterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn add_cluster(&mut self, node: ClusterNode) -> NodeIndex {
        self.graph.add_node(node)
    }

    /// Petgraph index of the node with the given cluster id.
    pub fn index_of(&self, id: ClusterId) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].cluster_id == id)
    }

    /// Connect two clusters with a similarity weight. Self-loops are
    /// rejected; the edge is undirected, so weight(A,B) == weight(B,A) by
    /// construction.
    pub fn add_similarity(&mut self, a: ClusterId, b: ClusterId, weight: f64) -> RetireResult<()> {
        if a == b {
            return Err(RetireError::Validation(format!(
                "self-loop on cluster {} rejected",
                a
            )));
        }
        let ia = self
            .index_of(a)
            .ok_or_else(|| RetireError::Validation(format!("unknown cluster id {}", a)))?;
        let ib = self
            .index_of(b)
            .ok_or_else(|| RetireError::Validation(format!("unknown cluster id {}", b)))?;
        self.graph.add_edge(ia, ib, ClusterEdge { weight });
        Ok(())
    }

    /// Nodes sorted by cluster id; the iteration order every consumer uses.
    pub fn nodes_in_id_order(&self) -> Vec<&ClusterNode> {
        let mut nodes: Vec<&ClusterNode> = self.graph.node_weights().collect();
        nodes.sort_by_key(|n| n.cluster_id);
        nodes
    }

    /// Total number of member rows across all clusters.
    pub fn member_count(&self) -> usize {
        self.graph.node_weights().map(|n| n.membership.len()).sum()
    }

    /// Enforce the partition invariant against a raw table of `row_count`
    /// rows: every row index appears in exactly one membership, or is
    /// listed in `excluded_rows`.
    pub fn validate_partition(&self, row_count: usize) -> RetireResult<()> {
        graph_utils::validate_partition(self, row_count)
    }

    /// Serializable form for the CLI boundary.
    pub fn to_document(&self) -> ClusterGraphDocument {
        let nodes = self
            .nodes_in_id_order()
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        let mut edges: Vec<ClusterGraphEdgeDocument> = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (ia, ib) = self.graph.edge_endpoints(e)?;
                let (mut a, mut b) = (
                    self.graph[ia].cluster_id.value(),
                    self.graph[ib].cluster_id.value(),
                );
                if a > b {
                    std::mem::swap(&mut a, &mut b);
                }
                Some(ClusterGraphEdgeDocument {
                    a,
                    b,
                    weight: self.graph[e].weight,
                })
            })
            .collect();
        edges.sort_by(|x, y| (x.a, x.b).cmp(&(y.a, y.b)));
        ClusterGraphDocument {
            nodes,
            edges,
            excluded_rows: self.excluded_rows.clone(),
        }
    }

    /// Rebuild a graph from its serialized form.
    pub fn from_document(doc: ClusterGraphDocument) -> RetireResult<Self> {
        let mut graph = ClusterGraph {
            excluded_rows: doc.excluded_rows,
            ..ClusterGraph::default()
        };
        for node in doc.nodes {
            if node.membership.is_empty() {
                return Err(RetireError::Validation(format!(
                    "cluster {} has empty membership",
                    node.cluster_id
                )));
            }
            graph.add_cluster(node);
        }
        for edge in doc.edges {
            graph.add_similarity(
                ClusterId::new(edge.a),
                ClusterId::new(edge.b),
                edge.weight,
            )?;
        }
        Ok(graph)
    }
}

/// Serialized cluster graph: node attributes plus id-keyed edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterGraphDocument {
    pub nodes: Vec<ClusterNode>,
    pub edges: Vec<ClusterGraphEdgeDocument>,
    #[serde(default)]
    pub excluded_rows: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterGraphEdgeDocument {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}
