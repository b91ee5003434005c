//! Feature normalization: raw plant records to z-scored feature rows.
//!
//! Five numeric features drive the clustering:
//!
//! | column | derivation |
//! |--------|------------|
//! | `capacity_scaled` | nameplate capacity (MW) |
//! | `age_scaled` | age in years |
//! | `efficiency_scaled` | average capacity factor |
//! | `emissions_scaled` | emission-rate proxy ([`PlantRecord::emissions_rate`]) |
//! | `economic_factor_scaled` | percent cost difference, renewables vs coal |
//!
//! Missing numeric inputs (NaN after ingestion) are resolved by the
//! configured [`MissingValuePolicy`] before scaling. Each column is then
//! z-scored with the population standard deviation. A zero-variance column
//! scales to all zeros with a warning diagnostic; it is never a fatal
//! error and never divides by zero.
//!
//! Row order and count match the input table, except under
//! [`MissingValuePolicy::DropRow`], where the surviving raw-row indices are
//! recorded so downstream membership stays defined.

use polars::prelude::{DataFrame, NamedFrom, PolarsError, Series};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use retire_core::{Diagnostics, PlantTable, RetireError};

/// Number of derived features per plant.
pub const FEATURE_COUNT: usize = 5;

/// Output column names, in feature order.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "capacity_scaled",
    "age_scaled",
    "efficiency_scaled",
    "emissions_scaled",
    "economic_factor_scaled",
];

/// Raw feature names used in diagnostics, in feature order.
const RAW_FEATURES: [&str; FEATURE_COUNT] =
    ["capacity", "age", "efficiency", "emissions", "economic_factor"];

/// Variance below this is treated as zero.
const VARIANCE_EPS: f64 = 1e-12;

/// Error type for feature normalization.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The input table has zero rows
    #[error("plant table has no rows to normalize")]
    EmptyInput,

    /// Every row was removed by the drop-row missing-value policy
    #[error("no rows survive the drop-row missing-value policy")]
    AllRowsDropped,

    /// A feature column has no usable values to impute from
    #[error("feature column '{0}' has no usable values")]
    MissingColumn(&'static str),

    #[error("polars error: {0}")]
    Frame(#[from] PolarsError),
}

impl From<NormalizeError> for RetireError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::EmptyInput | NormalizeError::AllRowsDropped => RetireError::EmptyInput,
            NormalizeError::MissingColumn(column) => {
                RetireError::Schema(format!("feature column '{}' has no usable values", column))
            }
            NormalizeError::Frame(e) => RetireError::Other(e.to_string()),
        }
    }
}

/// How to resolve missing numeric inputs before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Replace a missing value with its column mean (row count preserved)
    #[default]
    ImputeMean,
    /// Remove any row with a missing value (surviving indices recorded)
    DropRow,
}

/// Configuration for the feature normalizer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default)]
    pub missing_values: MissingValuePolicy,
}

/// Z-scored feature table, row-aligned with the raw plant table.
#[derive(Debug, Clone)]
pub struct ScaledFeatures {
    matrix: Vec<[f64; FEATURE_COUNT]>,
    source_rows: Vec<usize>,
    dropped_rows: Vec<usize>,
    diagnostics: Diagnostics,
}

impl ScaledFeatures {
    /// Number of scaled rows (equals the raw row count unless rows were
    /// dropped).
    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    /// The scaled feature vector at matrix row `i`.
    pub fn row(&self, i: usize) -> &[f64; FEATURE_COUNT] {
        &self.matrix[i]
    }

    /// Raw-table row index behind matrix row `i`.
    pub fn source_row(&self, i: usize) -> usize {
        self.source_rows[i]
    }

    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    /// Raw-table rows removed by the drop-row policy.
    pub fn dropped_rows(&self) -> &[usize] {
        &self.dropped_rows
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Render as a DataFrame with one column per scaled feature, for the
    /// output boundary.
    pub fn to_dataframe(&self) -> Result<DataFrame, PolarsError> {
        let columns = (0..FEATURE_COUNT)
            .map(|f| {
                let values: Vec<f64> = self.matrix.iter().map(|row| row[f]).collect();
                Series::new(FEATURE_COLUMNS[f], values)
            })
            .collect::<Vec<_>>();
        DataFrame::new(columns)
    }
}

/// Derive, clean, and z-score the feature table for a raw plant table.
pub fn normalize_features(
    table: &PlantTable,
    config: &NormalizerConfig,
) -> Result<ScaledFeatures, NormalizeError> {
    if table.is_empty() {
        return Err(NormalizeError::EmptyInput);
    }

    let mut diagnostics = Diagnostics::new();

    // Derive the raw feature matrix. Missing inputs arrive as NaN from
    // ingestion and stay NaN through derivation.
    let mut raw: Vec<[f64; FEATURE_COUNT]> = table
        .iter()
        .map(|record| {
            [
                record.capacity.value(),
                record.age_years as f64,
                record.capacity_factor.value(),
                record.emissions_rate().value(),
                record.pct_difference,
            ]
        })
        .collect();

    let mut source_rows: Vec<usize> = (0..raw.len()).collect();
    let mut dropped_rows = Vec::new();

    match config.missing_values {
        MissingValuePolicy::DropRow => {
            let mut kept = Vec::with_capacity(raw.len());
            let mut kept_rows = Vec::with_capacity(raw.len());
            for (row, values) in raw.iter().enumerate() {
                if values.iter().any(|v| v.is_nan()) {
                    dropped_rows.push(row);
                } else {
                    kept.push(*values);
                    kept_rows.push(row);
                }
            }
            if !dropped_rows.is_empty() {
                diagnostics.add_warning(
                    "normalize",
                    &format!(
                        "dropped {} row(s) with missing values",
                        dropped_rows.len()
                    ),
                );
                warn!(dropped = dropped_rows.len(), "dropped rows with missing values");
            }
            if kept.is_empty() {
                return Err(NormalizeError::AllRowsDropped);
            }
            raw = kept;
            source_rows = kept_rows;
        }
        MissingValuePolicy::ImputeMean => {
            for f in 0..FEATURE_COUNT {
                let (sum, count) = raw
                    .iter()
                    .map(|row| row[f])
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    return Err(NormalizeError::MissingColumn(RAW_FEATURES[f]));
                }
                let mean = sum / count as f64;
                let mut imputed = 0usize;
                for row in raw.iter_mut() {
                    if row[f].is_nan() {
                        row[f] = mean;
                        imputed += 1;
                    }
                }
                if imputed > 0 {
                    diagnostics.add_warning_with_entity(
                        "normalize",
                        &format!("imputed {} missing value(s) with the column mean", imputed),
                        &format!("column {}", RAW_FEATURES[f]),
                    );
                }
            }
        }
    }

    // Z-score each column with the population standard deviation.
    let n = raw.len() as f64;
    let mut matrix = vec![[0.0; FEATURE_COUNT]; raw.len()];
    for f in 0..FEATURE_COUNT {
        let mean = raw.iter().map(|row| row[f]).sum::<f64>() / n;
        let variance = raw.iter().map(|row| (row[f] - mean).powi(2)).sum::<f64>() / n;
        if variance < VARIANCE_EPS {
            // Zero variance: all-zero scaled column, by definition.
            diagnostics.add_warning_with_entity(
                "normalize",
                "column has zero variance; scaled values set to zero",
                &format!("column {}", FEATURE_COLUMNS[f]),
            );
            continue;
        }
        let std = variance.sqrt();
        for (i, row) in raw.iter().enumerate() {
            matrix[i][f] = (row[f] - mean) / std;
        }
    }

    debug!(rows = matrix.len(), "normalized feature table");

    Ok(ScaledFeatures {
        matrix,
        source_rows,
        dropped_rows,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{plant, sample_plants};
    use retire_core::{Fraction, PlantTable};

    const TOL: f64 = 1e-9;

    fn column(features: &ScaledFeatures, f: usize) -> Vec<f64> {
        (0..features.len()).map(|i| features.row(i)[f]).collect()
    }

    #[test]
    fn scaled_columns_have_zero_mean_unit_std() {
        let table = sample_plants();
        let features = normalize_features(&table, &NormalizerConfig::default()).unwrap();

        assert_eq!(features.len(), table.len());
        for f in 0..FEATURE_COUNT {
            let values = column(&features, f);
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let std =
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            assert!(mean.abs() < TOL, "column {} mean {}", f, mean);
            assert!((std - 1.0).abs() < TOL, "column {} std {}", f, std);
        }
    }

    #[test]
    fn row_order_matches_input() {
        let table = sample_plants();
        let features = normalize_features(&table, &NormalizerConfig::default()).unwrap();
        assert_eq!(features.source_rows(), &[0, 1, 2, 3]);
        // Plant D has the largest capacity, so its scaled capacity is the max.
        let capacities = column(&features, 0);
        let max = capacities.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(capacities[3], max);
    }

    #[test]
    fn empty_table_is_error() {
        let table = PlantTable::default();
        assert!(matches!(
            normalize_features(&table, &NormalizerConfig::default()),
            Err(NormalizeError::EmptyInput)
        ));
    }

    #[test]
    fn zero_variance_column_warns_and_zeroes() {
        // Identical ages produce a zero-variance age column.
        let table = PlantTable::new(vec![
            plant("1", 100.0, 40, 0.4),
            plant("2", 200.0, 40, 0.5),
            plant("3", 300.0, 40, 0.6),
        ]);
        let features = normalize_features(&table, &NormalizerConfig::default()).unwrap();

        assert!(column(&features, 1).iter().all(|v| *v == 0.0));
        assert!(features
            .diagnostics()
            .issues
            .iter()
            .any(|i| i.message.contains("zero variance")));
    }

    #[test]
    fn impute_mean_preserves_row_count() {
        let mut missing = plant("2", 200.0, 50, 0.5);
        missing.capacity_factor = Fraction(f64::NAN);
        let table = PlantTable::new(vec![plant("1", 100.0, 40, 0.4), missing, plant("3", 300.0, 60, 0.6)]);

        let features = normalize_features(
            &table,
            &NormalizerConfig {
                missing_values: MissingValuePolicy::ImputeMean,
            },
        )
        .unwrap();

        assert_eq!(features.len(), 3);
        assert!(features.dropped_rows().is_empty());
        // Imputed with the column mean, so its z-score for efficiency is 0.
        assert!(features.row(1)[2].abs() < TOL);
        assert!(features.diagnostics().warning_count() >= 1);
    }

    #[test]
    fn drop_row_records_surviving_indices() {
        let mut missing = plant("2", 200.0, 50, 0.5);
        missing.pct_difference = f64::NAN;
        let table = PlantTable::new(vec![plant("1", 100.0, 40, 0.4), missing, plant("3", 300.0, 60, 0.6)]);

        let features = normalize_features(
            &table,
            &NormalizerConfig {
                missing_values: MissingValuePolicy::DropRow,
            },
        )
        .unwrap();

        assert_eq!(features.len(), 2);
        assert_eq!(features.source_rows(), &[0, 2]);
        assert_eq!(features.dropped_rows(), &[1]);
    }

    #[test]
    fn all_rows_dropped_is_error() {
        let mut a = plant("1", 100.0, 40, 0.4);
        a.pct_difference = f64::NAN;
        let mut b = plant("2", 200.0, 50, 0.5);
        b.capacity_factor = Fraction(f64::NAN);
        let table = PlantTable::new(vec![a, b]);

        assert!(matches!(
            normalize_features(
                &table,
                &NormalizerConfig {
                    missing_values: MissingValuePolicy::DropRow,
                },
            ),
            Err(NormalizeError::AllRowsDropped)
        ));
    }

    #[test]
    fn all_missing_column_is_schema_error() {
        let mut a = plant("1", 100.0, 40, 0.4);
        a.pct_difference = f64::NAN;
        let mut b = plant("2", 200.0, 50, 0.5);
        b.pct_difference = f64::NAN;
        let table = PlantTable::new(vec![a, b]);

        assert!(matches!(
            normalize_features(&table, &NormalizerConfig::default()),
            Err(NormalizeError::MissingColumn("economic_factor"))
        ));
    }

    #[test]
    fn dataframe_output_has_expected_columns() {
        let table = sample_plants();
        let features = normalize_features(&table, &NormalizerConfig::default()).unwrap();
        let df = features.to_dataframe().unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(df.get_column_names(), FEATURE_COLUMNS.to_vec());
    }

    #[test]
    fn normalization_is_deterministic() {
        let table = sample_plants();
        let a = normalize_features(&table, &NormalizerConfig::default()).unwrap();
        let b = normalize_features(&table, &NormalizerConfig::default()).unwrap();
        for i in 0..a.len() {
            assert_eq!(a.row(i), b.row(i));
        }
    }
}
