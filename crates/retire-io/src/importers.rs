//! CSV importer for the coal plants dataset.
//!
//! The dataset ships as a delimited text file with one row per plant. The
//! importer is deliberately forgiving about row-level problems (a bad
//! status code skips that row with a diagnostic) and strict about
//! table-level problems (a missing required column or an empty table is a
//! hard error).

use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use retire_core::{
    DiagnosticIssue, Diagnostics, Fraction, ImportStats, Megawatts, Orispl, PlantRecord,
    PlantTable, RetireError, RetirementStatus, Severity, TransitionPreference,
};

/// Columns that must be present in the source CSV. Matching is exact; the
/// dataset's headers are stable across releases.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "Plant Name",
    "ORISPL",
    "State",
    "LAT",
    "LON",
    "Total Nameplate Capacity (MW)",
    "Age",
    "ret_STATUS",
    "Percent Capacity Retiring",
    "Number of Coal Generators",
    "Utility Name",
    "Average Capacity Factor",
    "Mapped Fuel Type",
    "Renewables or Coal",
    "Percent difference",
    "Retirement Date",
    "Date of Last Unit or Planned Retirement",
    OPPOSITION_COLUMN,
];

/// The survey column's full header, kept verbatim from the source release.
pub const OPPOSITION_COLUMN: &str = "Estimated percentage who somewhat/strongly oppose setting strict limits on existing coal-fire power plants";

/// Error type for dataset imports.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A required column is absent from the CSV header
    #[error("required column '{0}' missing from dataset")]
    MissingColumn(String),

    /// The file parsed but produced zero plant records
    #[error("dataset contains no plant rows")]
    EmptyInput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<ImportError> for RetireError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::MissingColumn(column) => {
                RetireError::Schema(format!("required column '{}' missing", column))
            }
            ImportError::EmptyInput => RetireError::EmptyInput,
            ImportError::Io(e) => RetireError::Io(e),
            ImportError::Csv(e) => RetireError::Parse(e.to_string()),
        }
    }
}

/// Import outcome: the typed table plus everything worth knowing about how
/// it was produced.
#[derive(Debug)]
pub struct PlantImport {
    pub table: PlantTable,
    pub diagnostics: Diagnostics,
    pub stats: ImportStats,
}

/// One CSV row, straight off the file. All sentinel and unit handling
/// happens when this is converted to a [`PlantRecord`].
#[derive(Debug, Deserialize)]
struct RawPlantRow {
    #[serde(rename = "Plant Name")]
    name: String,
    #[serde(rename = "ORISPL")]
    orispl: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "LAT")]
    latitude: f64,
    #[serde(rename = "LON")]
    longitude: f64,
    #[serde(rename = "Total Nameplate Capacity (MW)")]
    capacity_mw: f64,
    #[serde(rename = "Age")]
    age_years: u32,
    #[serde(rename = "ret_STATUS")]
    status_code: i64,
    #[serde(rename = "Percent Capacity Retiring")]
    pct_capacity_retiring: f64,
    #[serde(rename = "Number of Coal Generators")]
    generator_count: u32,
    #[serde(rename = "Utility Name")]
    utility: String,
    #[serde(rename = "Average Capacity Factor")]
    capacity_factor: Option<f64>,
    #[serde(rename = "Mapped Fuel Type")]
    fuel_type: String,
    #[serde(rename = "Renewables or Coal")]
    transition: String,
    #[serde(rename = "Percent difference")]
    pct_difference: Option<f64>,
    #[serde(rename = "Retirement Date")]
    retirement_year: Option<f64>,
    #[serde(rename = "Date of Last Unit or Planned Retirement")]
    last_retirement: String,
    #[serde(rename = "Estimated percentage who somewhat/strongly oppose setting strict limits on existing coal-fire power plants")]
    opposition_pct: f64,
}

/// Load the coal plants dataset from a CSV file.
///
/// Row-level problems (unknown status code, unparseable transition value)
/// skip that row and record an error diagnostic. Table-level problems fail
/// the import: [`ImportError::MissingColumn`] when a required header is
/// absent, [`ImportError::EmptyInput`] when no rows survive.
pub fn load_plants_from_csv(path: impl AsRef<Path>) -> Result<PlantImport, ImportError> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers = rdr.headers()?.clone();
    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *required) {
            return Err(ImportError::MissingColumn(required.to_string()));
        }
    }

    let mut diagnostics = Diagnostics::new();
    let mut records = Vec::new();
    let mut rows_skipped = 0usize;

    for (line, result) in rdr.deserialize::<RawPlantRow>().enumerate() {
        // Header is line 1; data starts at line 2.
        let line_number = line + 2;
        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                diagnostics.add_error_at_line("parse", &err.to_string(), line_number);
                rows_skipped += 1;
                continue;
            }
        };
        match convert_row(raw, line_number, &mut diagnostics) {
            Some(record) => records.push(record),
            None => rows_skipped += 1,
        }
    }

    if records.is_empty() {
        return Err(ImportError::EmptyInput);
    }

    if rows_skipped > 0 {
        warn!(rows_skipped, "skipped malformed plant rows during import");
    }
    info!(
        rows = records.len(),
        path = %path.display(),
        "imported coal plants dataset"
    );

    Ok(PlantImport {
        stats: ImportStats {
            rows_imported: records.len(),
            rows_skipped,
        },
        table: PlantTable::new(records),
        diagnostics,
    })
}

/// Resolve sentinels and canonicalize units for one row. Returns `None`
/// (after recording a diagnostic) when the row cannot represent a plant.
fn convert_row(
    raw: RawPlantRow,
    line: usize,
    diagnostics: &mut Diagnostics,
) -> Option<PlantRecord> {
    let entity = format!("plant {}", raw.orispl);

    let status = match RetirementStatus::from_code(raw.status_code) {
        Some(status) => status,
        None => {
            diagnostics.add(
                DiagnosticIssue::new(
                    Severity::Error,
                    "parse",
                    format!("unknown retirement status code {}", raw.status_code),
                )
                .with_entity(entity.as_str())
                .with_line(line),
            );
            return None;
        }
    };

    let transition = match TransitionPreference::parse(&raw.transition) {
        Some(transition) => transition,
        None => {
            diagnostics.add(
                DiagnosticIssue::new(
                    Severity::Error,
                    "parse",
                    format!("unrecognized 'Renewables or Coal' value '{}'", raw.transition),
                )
                .with_entity(entity.as_str())
                .with_line(line),
            );
            return None;
        }
    };

    // The source is inconsistent about whether this column holds a fraction
    // or a percentage. Canonical form is a fraction; anything above 1 is
    // treated as a percentage.
    let pct_capacity_retiring = if raw.pct_capacity_retiring > 1.0 {
        diagnostics.add_warning_with_entity(
            "units",
            &format!(
                "'Percent Capacity Retiring' value {} read as a percentage",
                raw.pct_capacity_retiring
            ),
            &entity,
        );
        Fraction::from_percent(raw.pct_capacity_retiring)
    } else {
        Fraction(raw.pct_capacity_retiring)
    };

    let last_retirement = match raw.last_retirement.trim() {
        "" => None,
        text if text.eq_ignore_ascii_case("n/a") => None,
        text => Some(text.to_string()),
    };

    Some(PlantRecord {
        name: raw.name,
        orispl: Orispl::new(raw.orispl),
        state: raw.state,
        latitude: raw.latitude,
        longitude: raw.longitude,
        capacity: Megawatts(raw.capacity_mw),
        age_years: raw.age_years,
        status,
        pct_capacity_retiring,
        generator_count: raw.generator_count,
        utility: raw.utility,
        // Missing numeric inputs travel as NaN until the normalizer's
        // missing-value policy resolves them.
        capacity_factor: Fraction(raw.capacity_factor.unwrap_or(f64::NAN)),
        fuel_type: raw.fuel_type,
        transition,
        pct_difference: raw.pct_difference.unwrap_or(f64::NAN),
        retirement_year: raw.retirement_year.map(|y| y as i32),
        last_retirement,
        opposition: Fraction::from_percent(raw.opposition_pct),
    })
}
