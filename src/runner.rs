//! Runner - experiment to catalogued run
//!
//! ## Pipeline
//!
//! ```text
//! Experiment.build(params) ─> Backend.run(circuit) ─> validate(rho)
//!     ─> write results/{run_id}_rho.npy ─> to_bloch(rho)
//!     ─> write artifacts/{run_id}_{name}.{ext} ─> RunRecord
//! ```
//!
//! Steps run strictly in sequence. Every file is flushed, synced and closed
//! before the record is assembled, so a record handed to the store only
//! ever names files that already exist. Any failure aborts the run with no
//! retry; files already written by an aborted run are left on disk for the
//! caller to clean up.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::backend::Backend;
use crate::bloch::{self, ArtifactKind};
use crate::experiment::Experiment;
use crate::params::{Metadata, Params};
use crate::quantum::DEFAULT_TOLERANCE;
use crate::store::{layout, npy, truncate_to_micros, ResultStore, RunRecord};
use crate::Result;

/// Metadata key the runner fills with `[x, y, z]` unless the caller set it.
pub const BLOCH_VECTOR_KEY: &str = "bloch_vector";

fn default_artifacts() -> Vec<ArtifactKind> {
    ArtifactKind::ALL.to_vec()
}

const fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

/// Options for one [`Runner::execute`] call.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Base directory for results and artifacts.
    pub output_dir: PathBuf,
    /// Artifacts to generate (default: every known kind).
    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<ArtifactKind>,
    /// Extra key-value pairs attached to the record.
    #[serde(default)]
    pub metadata: Metadata,
    /// Tolerance for the density-matrix checks.
    #[serde(default = "default_tolerance")]
    pub validation_tolerance: f64,
    /// Artifact title; defaults to `"{experiment} - {run_id prefix}"`.
    #[serde(default)]
    pub title: Option<String>,
}

impl RunConfig {
    /// Defaults writing under `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            artifacts: default_artifacts(),
            metadata: Metadata::new(),
            validation_tolerance: DEFAULT_TOLERANCE,
            title: None,
        }
    }

    /// Set the output directory.
    #[must_use]
    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Restrict which artifacts are generated.
    #[must_use]
    pub fn artifacts(mut self, artifacts: impl IntoIterator<Item = ArtifactKind>) -> Self {
        self.artifacts = artifacts.into_iter().collect();
        self
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the validation tolerance.
    #[must_use]
    pub const fn validation_tolerance(mut self, tolerance: f64) -> Self {
        self.validation_tolerance = tolerance;
        self
    }

    /// Set the artifact title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Executes experiments on one injected backend.
#[derive(Debug)]
pub struct Runner<B: Backend> {
    backend: B,
}

impl<B: Backend> Runner<B> {
    /// Create a runner around `backend`.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get the backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Execute `experiment` with `params` and write its files.
    ///
    /// The returned record is not yet catalogued; pass it to
    /// [`ResultStore::save_run`] or use [`Runner::execute_and_save`].
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidParameter`] from the builder or for
    ///   parameters that cannot be stored
    /// - [`crate::Error::Execution`] from the backend
    /// - [`crate::Error::InvalidDensityMatrix`] if the backend result
    ///   fails the physical checks
    /// - [`crate::Error::Io`] if a file cannot be written
    #[instrument(skip_all, fields(experiment = experiment.name(), backend = self.backend.name()))]
    pub fn execute(&self, experiment: &Experiment, params: &Params, config: &RunConfig) -> Result<RunRecord> {
        let timestamp = truncate_to_micros(Utc::now());
        params.to_json()?;

        let circuit = experiment.build(params)?;
        debug!(gates = circuit.len(), "circuit built");

        let rho = self.backend.run(&circuit)?;
        if let Err(err) = rho.validate(config.validation_tolerance) {
            warn!(%err, "backend returned an invalid density matrix");
            return Err(err);
        }

        let run_id = RunRecord::new_run_id();
        let base = config.output_dir.as_path();
        layout::ensure_dirs(base)?;

        let rho_path = layout::density_matrix_path(&run_id);
        npy::write_density_matrix(&layout::resolve(base, &rho_path), &rho)?;
        debug!(path = %rho_path, "density matrix written");

        let vector = bloch::to_bloch_with_tolerance(&rho, config.validation_tolerance)?;
        let title = config
            .title
            .clone()
            .unwrap_or_else(|| format!("{} - {}", experiment.name(), run_id.get(..8).unwrap_or(&run_id)));

        let mut builder = RunRecord::builder(&run_id, experiment.name(), self.backend.name(), rho_path)
            .params(params.clone())
            .timestamp(timestamp);

        let mut kinds = config.artifacts.clone();
        kinds.sort_unstable();
        kinds.dedup();
        for kind in kinds {
            let path = write_artifact(base, &run_id, kind, &vector, &title)?;
            builder = builder.artifact(kind.name(), path);
        }

        let mut metadata = config.metadata.clone();
        if metadata.contains_key(BLOCH_VECTOR_KEY) {
            warn!(key = BLOCH_VECTOR_KEY, "caller metadata kept; derived Bloch vector not recorded there");
        } else {
            metadata.insert(BLOCH_VECTOR_KEY.to_string(), serde_json::json!(vector.to_array()));
        }

        debug!(run_id = %run_id, x = vector.x, y = vector.y, z = vector.z, "run complete");
        Ok(builder.metadata(metadata).build())
    }

    /// Execute and catalogue in one call.
    ///
    /// Files are written under the store's base directory regardless of
    /// `config.output_dir`.
    ///
    /// # Errors
    ///
    /// Any error of [`Runner::execute`] or [`ResultStore::save_run`].
    pub fn execute_and_save(
        &self,
        experiment: &Experiment,
        params: &Params,
        config: &RunConfig,
        store: &mut ResultStore,
    ) -> Result<RunRecord> {
        let config = config.clone().output_dir(store.base_dir());
        let record = self.execute(experiment, params, &config)?;
        store.save_run(&record)?;
        Ok(record)
    }
}

fn write_artifact(
    base: &Path,
    run_id: &str,
    kind: ArtifactKind,
    vector: &crate::quantum::BlochVector,
    title: &str,
) -> Result<String> {
    let payload = kind.render(vector, title)?;
    let path = layout::artifact_path(run_id, kind.name(), kind.extension());
    layout::write_synced(&layout::resolve(base, &path), payload.as_bytes())?;
    debug!(artifact = kind.name(), path = %path, "artifact written");
    Ok(path)
}
