//! # retire-io: Dataset Ingestion for Coal Plant Analysis
//!
//! The input boundary of the pipeline. This crate turns the coal plants
//! CSV (with its source-specific conventions) into a typed
//! [`retire_core::PlantTable`]:
//!
//! - headers are matched verbatim, including the survey column's long name
//! - the "n/a" string sentinel for missing dates is resolved to `None` at
//!   ingestion and never reaches numeric code
//! - source percentages are converted to canonical [0, 1] fractions
//! - malformed rows are skipped with error diagnostics rather than
//!   aborting the import
//!
//! [`validate`] checks a CSV dataset against a JSON column spec before any
//! import is attempted.

pub mod importers;
pub mod validate;

pub use importers::{load_plants_from_csv, ImportError, PlantImport, REQUIRED_COLUMNS};
pub use validate::validate_dataset;
