//! Artifact Record - catalog row for one derived file of a run

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bloch::ArtifactKind;

/// Content type for an artifact path, derived from its extension.
#[must_use]
pub fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("npy") => "application/x-npy",
        _ => "application/octet-stream",
    }
}

/// Type tag stored for an artifact: the kind's content type when
/// `artifact_name` is a known [`ArtifactKind`], else the extension mapping.
#[must_use]
pub fn artifact_type_for(artifact_name: &str, path: &str) -> &'static str {
    ArtifactKind::from_name(artifact_name).map_or_else(|| content_type_for(path), ArtifactKind::content_type)
}

/// Artifact Record is the persisted projection of one entry of a run's
/// artifact mapping.
///
/// `artifact_id` is assigned by the store and increases monotonically. An
/// artifact row never exists without its parent run row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    artifact_id: i64,
    run_id: String,
    artifact_name: String,
    artifact_path: String,
    artifact_type: String,
}

impl ArtifactRecord {
    /// Create an artifact record as read back from the catalog.
    #[must_use]
    pub fn new(
        artifact_id: i64,
        run_id: impl Into<String>,
        artifact_name: impl Into<String>,
        artifact_path: impl Into<String>,
        artifact_type: impl Into<String>,
    ) -> Self {
        Self {
            artifact_id,
            run_id: run_id.into(),
            artifact_name: artifact_name.into(),
            artifact_path: artifact_path.into(),
            artifact_type: artifact_type.into(),
        }
    }

    /// Get the store-assigned ID.
    #[must_use]
    pub const fn artifact_id(&self) -> i64 {
        self.artifact_id
    }

    /// Get the parent run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact name.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    /// Get the path, relative to the store base.
    #[must_use]
    pub fn artifact_path(&self) -> &str {
        &self.artifact_path
    }

    /// Get the content-type tag.
    #[must_use]
    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }
}
