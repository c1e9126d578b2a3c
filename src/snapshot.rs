//! Export of projection runs to disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::projection::ProjectionOutput;
use crate::summary::ProjectionSummary;

/// Descriptive header written alongside every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub scenario: String,
    pub seed: u64,
    pub replicate: u64,
    pub years: usize,
    pub ages: usize,
    pub areas: usize,
    pub generated_at: String,
}

#[derive(Serialize)]
struct ProjectionFile<'a> {
    metadata: &'a RunMetadata,
    output: &'a ProjectionOutput,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    metadata: &'a RunMetadata,
    summary: &'a ProjectionSummary,
}

pub struct RunWriter {
    output_dir: PathBuf,
}

impl RunWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn metadata(
        scenario: &str,
        seed: u64,
        replicate: u64,
        output: &ProjectionOutput,
    ) -> RunMetadata {
        RunMetadata {
            scenario: scenario.to_string(),
            seed,
            replicate,
            years: output.years(),
            ages: output.ages(),
            areas: output.areas(),
            generated_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Writes `projection.json` and `summary.json` under `<dir>/<scenario>/`.
    pub fn write(
        &self,
        metadata: &RunMetadata,
        output: &ProjectionOutput,
        summary: &ProjectionSummary,
    ) -> Result<PathBuf> {
        let dir = self.output_dir.join(&metadata.scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let projection_path = dir.join("projection.json");
        let json = serde_json::to_string_pretty(&ProjectionFile { metadata, output })?;
        fs::write(&projection_path, json)
            .with_context(|| format!("Failed to write {}", projection_path.display()))?;

        let summary_path = dir.join("summary.json");
        let json = serde_json::to_string_pretty(&SummaryFile { metadata, summary })?;
        fs::write(&summary_path, json)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;

        tracing::info!("Wrote projection run to {:?}", dir);
        Ok(dir)
    }
}
