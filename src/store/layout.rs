//! On-disk layout under a store base directory
//!
//! ```text
//! <base>/qex.db                                  catalog
//! <base>/results/{run_id}_rho.npy                density matrix
//! <base>/artifacts/{run_id}_{artifact_name}.{ext}
//! ```
//!
//! File names derive from the run ID, so runners sharing a base directory
//! never collide. Catalog paths are always relative to the base and use
//! `/` as separator.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default catalog file name.
pub const CATALOG_FILE: &str = "qex.db";
/// Directory holding density-matrix files.
pub const RESULTS_DIR: &str = "results";
/// Directory holding artifact files.
pub const ARTIFACTS_DIR: &str = "artifacts";
/// Extension of density-matrix files.
pub const DENSITY_MATRIX_EXTENSION: &str = "npy";

/// Relative path of a run's density-matrix file.
#[must_use]
pub fn density_matrix_path(run_id: &str) -> String {
    format!("{RESULTS_DIR}/{run_id}_rho.{DENSITY_MATRIX_EXTENSION}")
}

/// Relative path of one of a run's artifacts.
#[must_use]
pub fn artifact_path(run_id: &str, artifact_name: &str, extension: &str) -> String {
    format!("{ARTIFACTS_DIR}/{run_id}_{artifact_name}.{extension}")
}

/// Check that `relative` names a location inside the base directory.
///
/// Accepted paths are non-empty, `/`-separated, and have no empty, `.` or
/// `..` components. Absolute paths, drive prefixes and `\` separators are
/// refused.
///
/// # Errors
///
/// Returns a description of the first offending part.
pub fn check_relative(relative: &str) -> Result<(), String> {
    if relative.is_empty() {
        return Err("path is empty".to_string());
    }
    if relative.starts_with('/') || relative.contains('\\') || relative.contains(':') {
        return Err(format!("'{relative}' is not a base-relative path"));
    }
    match relative.split('/').find(|part| matches!(*part, "" | "." | "..")) {
        Some(part) => Err(format!("'{relative}' has a '{part}' component")),
        None => Ok(()),
    }
}

/// Resolve a catalog-relative path against `base`.
#[must_use]
pub fn resolve(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |path, part| path.join(part))
}

/// Create the results and artifacts directories under `base`.
///
/// # Errors
///
/// Returns the underlying I/O error if a directory cannot be created.
pub fn ensure_dirs(base: &Path) -> io::Result<()> {
    std::fs::create_dir_all(base.join(RESULTS_DIR))?;
    std::fs::create_dir_all(base.join(ARTIFACTS_DIR))
}

/// Write `bytes` to `path`; the file is flushed, synced and closed on return.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    file.sync_all()
}
