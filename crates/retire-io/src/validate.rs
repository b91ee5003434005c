//! Dataset schema validation against a JSON column spec.
//!
//! A spec file names the dataset (relative to the spec's directory) and the
//! columns it must carry, each with an optional dtype. Running validation
//! before an import catches header drift early, with a clearer message than
//! a row-level parse failure.
//!
//! ```json
//! {
//!   "dataset": "coal_plants.csv",
//!   "columns": [
//!     {"name": "ORISPL", "dtype": "str"},
//!     {"name": "Total Nameplate Capacity (MW)", "dtype": "f64"}
//!   ]
//! }
//! ```

use std::{fs::File, path::Path};

use anyhow::{anyhow, bail, Context, Result};
#[cfg(feature = "parquet")]
use polars::prelude::ParquetReader;
use polars::prelude::{CsvReader, DataFrame, SerReader};
use serde::Deserialize;

#[derive(Deserialize)]
struct DatasetSpec {
    dataset: String,
    columns: Vec<ColumnSpec>,
}

#[derive(Deserialize)]
struct ColumnSpec {
    name: String,
    dtype: Option<String>,
}

/// Validate the dataset named by `spec_file` against its column spec.
pub fn validate_dataset(spec_file: &str) -> Result<()> {
    let spec_path = Path::new(spec_file);
    let text = std::fs::read_to_string(spec_path)
        .with_context(|| format!("reading spec file '{}'", spec_file))?;
    let spec: DatasetSpec =
        serde_json::from_str(&text).context("parsing dataset spec as JSON schema")?;
    let dataset_path = spec_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&spec.dataset);

    if !dataset_path.exists() {
        bail!("dataset file '{}' does not exist", dataset_path.display());
    }

    let df = read_dataframe(&dataset_path)?;
    for column in spec.columns {
        let series = df
            .column(&column.name)
            .with_context(|| format!("column '{}' missing from dataset", column.name))?;
        if let Some(expected) = &column.dtype {
            let actual = series.dtype().to_string();
            if !eq_dtype(expected, &actual) {
                bail!(
                    "column '{}' dtype mismatch: expected {}, found {}",
                    column.name,
                    expected,
                    actual
                );
            }
        }
    }

    tracing::info!(
        dataset = %dataset_path.display(),
        spec = spec_file,
        "dataset conforms to spec"
    );
    Ok(())
}

fn read_dataframe(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let mut file =
        File::open(path).with_context(|| format!("opening dataset '{}'", path.display()))?;
    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => {
            let reader = ParquetReader::new(&mut file);
            reader.finish().context("reading Parquet dataset")
        }
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => {
            let reader = CsvReader::new(&mut file);
            reader.finish().context("reading CSV dataset")
        }
        other => Err(anyhow!(
            "unsupported dataset extension '{}' (use .csv or .parquet)",
            other
        )),
    }
}

fn eq_dtype(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
        || strip_mod(expected).eq_ignore_ascii_case(strip_mod(actual))
}

fn strip_mod(dtype: &str) -> &str {
    dtype.split('_').next().unwrap_or(dtype)
}
