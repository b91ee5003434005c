use anyhow::{Context, Result};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use std::{
    ffi::OsStr,
    fs::{self, File},
    path::{Path, PathBuf},
};

/// Pipeline stage an output table belongs to; used to stage files on disk
/// so successive runs of different stages never clobber each other.
#[derive(Debug, Clone, Copy)]
pub enum OutputStage {
    Normalize,
    Cluster,
    Groups,
    Targets,
}

impl OutputStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStage::Normalize => "normalize",
            OutputStage::Cluster => "cluster",
            OutputStage::Groups => "groups",
            OutputStage::Targets => "targets",
        }
    }
}

pub fn staged_output_path(output: &Path, stage: &str) -> PathBuf {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let file_name = output.file_name().unwrap_or_else(|| OsStr::new("output"));
    parent.join(stage).join(file_name)
}

/// Write a result table under its stage directory, then copy it to the
/// requested path. CSV by default; Parquet when the output extension asks
/// for it and the `parquet` feature is enabled.
pub fn persist_dataframe(df: &mut DataFrame, output: &Path, stage: &str) -> Result<()> {
    let staged = staged_output_path(output, stage);
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    write_frame(df, &staged)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    fs::copy(&staged, output)
        .with_context(|| format!("copying {} to {}", staged.display(), output.display()))?;
    Ok(())
}

fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let mut file = File::create(path)
        .with_context(|| format!("creating output file '{}'", path.display()))?;
    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => {
            use polars::prelude::ParquetWriter;
            ParquetWriter::new(&mut file)
                .finish(df)
                .context("writing Parquet output")?;
            Ok(())
        }
        #[cfg(not(feature = "parquet"))]
        "parquet" => anyhow::bail!(
            "parquet output is disabled; rebuild with the 'parquet' feature"
        ),
        _ => {
            CsvWriter::new(&mut file)
                .finish(df)
                .context("writing CSV output")?;
            Ok(())
        }
    }
}
