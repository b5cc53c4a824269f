//! Run Record - one persisted execution of an experiment

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::params::{Metadata, Params};

/// Truncate to whole microseconds so the catalog's REAL column round-trips.
#[must_use]
pub fn truncate_to_micros(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(timestamp.timestamp_micros()).unwrap_or(timestamp)
}

/// Run Record represents a single execution of an experiment.
///
/// `run_id` is generated once and never reused. Paths are relative to the
/// store's base directory; the density-matrix file is expected to exist
/// whenever the record is read back, but that is only checked lazily by
/// [`super::ResultStore::load_density_matrix`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    run_id: String,
    experiment_name: String,
    params: Params,
    backend_name: String,
    timestamp: DateTime<Utc>,
    density_matrix_path: String,
    artifacts: BTreeMap<String, String>,
    metadata: Option<Metadata>,
}

impl RunRecord {
    /// Generate a fresh, globally unique run ID.
    #[must_use]
    pub fn new_run_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Create a builder for constructing a run record with optional fields.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `experiment_name` - Name of the experiment that ran
    /// * `backend_name` - Identifier of the executing backend
    /// * `density_matrix_path` - Matrix file, relative to the store base
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        experiment_name: impl Into<String>,
        backend_name: impl Into<String>,
        density_matrix_path: impl Into<String>,
    ) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id, experiment_name, backend_name, density_matrix_path)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Get the parameters the experiment was built with.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Get the backend name.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Get the execution timestamp (microsecond precision).
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Get the density-matrix path, relative to the store base.
    #[must_use]
    pub fn density_matrix_path(&self) -> &str {
        &self.density_matrix_path
    }

    /// Get the artifact name to relative path mapping.
    #[must_use]
    pub const fn artifacts(&self) -> &BTreeMap<String, String> {
        &self.artifacts
    }

    /// Get the path of one artifact.
    #[must_use]
    pub fn artifact(&self, name: &str) -> Option<&str> {
        self.artifacts.get(name).map(String::as_str)
    }

    /// Get the free-form metadata, if any.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    run_id: String,
    experiment_name: String,
    params: Params,
    backend_name: String,
    timestamp: DateTime<Utc>,
    density_matrix_path: String,
    artifacts: BTreeMap<String, String>,
    metadata: Option<Metadata>,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields, timestamped now.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_name: impl Into<String>,
        backend_name: impl Into<String>,
        density_matrix_path: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_name: experiment_name.into(),
            params: Params::new(),
            backend_name: backend_name.into(),
            timestamp: truncate_to_micros(Utc::now()),
            density_matrix_path: density_matrix_path.into(),
            artifacts: BTreeMap::new(),
            metadata: None,
        }
    }

    /// Set the parameters.
    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Set a custom timestamp (truncated to microseconds).
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = truncate_to_micros(timestamp);
        self
    }

    /// Add one artifact.
    #[must_use]
    pub fn artifact(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.artifacts.insert(name.into(), path.into());
        self
    }

    /// Replace the artifact mapping.
    #[must_use]
    pub fn artifacts(mut self, artifacts: BTreeMap<String, String>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Attach metadata. An empty mapping is stored as no metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = if metadata.is_empty() { None } else { Some(metadata) };
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            experiment_name: self.experiment_name,
            params: self.params,
            backend_name: self.backend_name,
            timestamp: self.timestamp,
            density_matrix_path: self.density_matrix_path,
            artifacts: self.artifacts,
            metadata: self.metadata,
        }
    }
}
