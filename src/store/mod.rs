//! Result Store - durable run catalog backed by `SQLite`
//!
//! ## Schema Overview
//!
//! ```text
//! runs (1) ──< artifacts (N)      ON DELETE CASCADE
//! ```
//!
//! `save_run` inserts the run row and every artifact row in one
//! `IMMEDIATE` transaction, so readers never observe a run without its
//! artifacts or an artifact without its run. Matrix and artifact files are
//! written by the runner first; the store checks they exist before it
//! commits.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use qex::backend::IdealSimulator;
//! use qex::experiment::catalog;
//! use qex::params::Params;
//! use qex::runner::{RunConfig, Runner};
//! use qex::store::ResultStore;
//!
//! let mut store = ResultStore::open("qex_data")?;
//! let runner = Runner::new(IdealSimulator::new());
//!
//! let record = runner.execute(&catalog::hadamard(), &Params::new(), &RunConfig::new(store.base_dir()))?;
//! store.save_run(&record)?;
//!
//! let hadamard_runs = store.list_runs(Some("hadamard"), Some(10))?;
//! assert_eq!(hadamard_runs[0].run_id(), record.run_id());
//! store.close()?;
//! # Ok::<(), qex::Error>(())
//! ```

mod artifact_record;
pub mod layout;
pub mod npy;
mod run_record;

pub use artifact_record::{artifact_type_for, content_type_for, ArtifactRecord};
pub use run_record::{truncate_to_micros, RunRecord, RunRecordBuilder};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::params::{Metadata, Params};
use crate::quantum::DensityMatrix;
use crate::{Error, Result};

/// Catalog schema version.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    experiment_name TEXT NOT NULL,
    params TEXT NOT NULL,
    backend_name TEXT NOT NULL,
    timestamp REAL NOT NULL,
    density_matrix_path TEXT NOT NULL,
    metadata TEXT
);
CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
    artifact_name TEXT NOT NULL,
    artifact_path TEXT NOT NULL,
    artifact_type TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_runs_experiment_name ON runs(experiment_name);
CREATE INDEX IF NOT EXISTS idx_runs_timestamp ON runs(timestamp);
CREATE INDEX IF NOT EXISTS idx_artifacts_run_id ON artifacts(run_id);
";

const RUN_COLUMNS: &str =
    "run_id, experiment_name, params, backend_name, timestamp, density_matrix_path, metadata";

/// `SQLite` journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// WAL journal mode (readers proceed during a write).
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl JournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_catalog_file() -> String {
    layout::CATALOG_FILE.to_string()
}

const fn default_true() -> bool {
    true
}

/// Configuration for [`ResultStore`].
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base directory; catalog, results and artifacts live beneath it.
    pub base_dir: PathBuf,
    /// Catalog file name inside `base_dir`.
    #[serde(default = "default_catalog_file")]
    pub catalog_file: String,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: JournalMode,
    /// Refuse to commit a run whose files are not on disk.
    #[serde(default = "default_true")]
    pub verify_files_on_save: bool,
}

impl StoreConfig {
    /// Defaults rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            catalog_file: default_catalog_file(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: JournalMode::default(),
            verify_files_on_save: true,
        }
    }

    /// Set the catalog file name.
    #[must_use]
    pub fn catalog_file(mut self, name: impl Into<String>) -> Self {
        self.catalog_file = name.into();
        self
    }

    /// Set the journal mode.
    #[must_use]
    pub const fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Enable or disable the file check in `save_run`.
    #[must_use]
    pub const fn verify_files_on_save(mut self, verify: bool) -> Self {
        self.verify_files_on_save = verify;
        self
    }
}

/// Durable catalog of runs and their artifacts.
///
/// Owns one connection with an explicit open/close lifecycle; every
/// operation after [`ResultStore::close`] fails with [`Error::StoreClosed`].
#[derive(Debug)]
pub struct ResultStore {
    conn: Option<Connection>,
    base_dir: PathBuf,
    catalog_path: PathBuf,
    verify_files: bool,
}

impl ResultStore {
    /// Open (or create) the catalog under `base_dir` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the directories or catalog cannot
    /// be created, or the catalog has an unknown schema version.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(StoreConfig::new(base_dir))
    }

    /// Open (or create) the catalog described by `config`.
    ///
    /// # Errors
    ///
    /// See [`ResultStore::open`].
    pub fn open_with(config: StoreConfig) -> Result<Self> {
        layout::ensure_dirs(&config.base_dir).map_err(|err| {
            Error::Persistence(format!("cannot create {}: {err}", config.base_dir.display()))
        })?;
        let catalog_path = config.base_dir.join(&config.catalog_file);

        let mut conn = Connection::open(&catalog_path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
        initialize_schema(&mut conn)?;

        info!(catalog = %catalog_path.display(), "result store opened");
        Ok(Self {
            conn: Some(conn),
            base_dir: config.base_dir,
            catalog_path,
            verify_files: config.verify_files_on_save,
        })
    }

    /// Base directory all catalog paths are relative to.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the catalog file.
    #[must_use]
    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Check if [`ResultStore::close`] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::StoreClosed)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(Error::StoreClosed)
    }

    fn check_paths(record: &RunRecord) -> Result<()> {
        for (what, relative) in referenced_paths(record) {
            layout::check_relative(relative).map_err(|reason| {
                Error::Persistence(format!("{what} path of run '{}' rejected: {reason}", record.run_id()))
            })?;
        }
        Ok(())
    }

    fn check_files(&self, record: &RunRecord) -> Result<()> {
        for (what, relative) in referenced_paths(record) {
            if !layout::resolve(&self.base_dir, relative).is_file() {
                return Err(Error::Persistence(format!(
                    "{what} file '{relative}' of run '{}' does not exist under {}",
                    record.run_id(),
                    self.base_dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Persist a run and all its artifacts atomically.
    ///
    /// # Errors
    ///
    /// - [`Error::StoreClosed`] after `close()`
    /// - [`Error::DuplicateRun`] if `run_id` is already catalogued; the
    ///   existing rows are left untouched
    /// - [`Error::InvalidParameter`] if the params cannot be encoded
    /// - [`Error::Persistence`] on any storage failure, a path that is not
    ///   base-relative, or a missing file; nothing is written
    #[instrument(skip(self, record), fields(run_id = %record.run_id()))]
    pub fn save_run(&mut self, record: &RunRecord) -> Result<()> {
        self.conn()?;
        let params_json = record.params().to_json()?;
        let metadata_json = record.metadata().map(serde_json::to_string).transpose()?;
        Self::check_paths(record)?;
        if self.verify_files {
            self.check_files(record)?;
        }

        let conn = self.conn_mut()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = tx
            .query_row("SELECT 1 FROM runs WHERE run_id = ?1", params![record.run_id()], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            warn!("duplicate run_id rejected");
            return Err(Error::DuplicateRun(record.run_id().to_string()));
        }

        tx.execute(
            &format!("INSERT INTO runs ({RUN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                record.run_id(),
                record.experiment_name(),
                params_json,
                record.backend_name(),
                encode_timestamp(record.timestamp()),
                record.density_matrix_path(),
                metadata_json,
            ],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO artifacts (run_id, artifact_name, artifact_path, artifact_type)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (name, path) in record.artifacts() {
                insert.execute(params![record.run_id(), name, path, artifact_type_for(name, path)])?;
            }
        }

        tx.commit()?;
        info!(
            experiment = record.experiment_name(),
            artifacts = record.artifacts().len(),
            "run saved"
        );
        Ok(())
    }

    /// Point lookup by run ID.
    ///
    /// Returns `Ok(None)` for an unknown ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreClosed`] or [`Error::Persistence`].
    pub fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE run_id = ?1"),
                params![run_id],
                RunRow::from_row,
            )
            .optional()?;

        row.map(|row| row.into_record(load_artifact_map(conn, run_id)?)).transpose()
    }

    /// Runs ordered most recent first.
    ///
    /// `experiment_name` restricts to an exact name match; `limit` caps the
    /// number returned. Ties on timestamp fall back to insertion order,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreClosed`] or [`Error::Persistence`].
    pub fn list_runs(&self, experiment_name: Option<&str>, limit: Option<usize>) -> Result<Vec<RunRecord>> {
        let conn = self.conn()?;
        let limit = limit.map_or(Ok(-1), i64::try_from).map_err(|_| {
            Error::Persistence("limit does not fit in a SQL integer".to_string())
        })?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM runs
             WHERE ?1 IS NULL OR experiment_name = ?1
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![experiment_name, limit], RunRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(count = rows.len(), ?experiment_name, "listed runs");
        rows.into_iter()
            .map(|row| {
                let artifacts = load_artifact_map(conn, &row.run_id)?;
                row.into_record(artifacts)
            })
            .collect()
    }

    /// Number of runs, optionally restricted to one experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreClosed`] or [`Error::Persistence`].
    pub fn count_runs(&self, experiment_name: Option<&str>) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM runs WHERE ?1 IS NULL OR experiment_name = ?1",
            params![experiment_name],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| Error::Persistence(format!("run count '{count}' cannot be represented as usize")))
    }

    /// Artifact rows of a run, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreClosed`] or [`Error::Persistence`].
    pub fn artifacts_for_run(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT artifact_id, run_id, artifact_name, artifact_path, artifact_type
             FROM artifacts WHERE run_id = ?1 ORDER BY artifact_id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(ArtifactRecord::new(
                row.get(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Remove a run and its artifact rows. Files on disk are left alone.
    ///
    /// Returns whether a run was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreClosed`] or [`Error::Persistence`].
    #[instrument(skip(self))]
    pub fn delete_run(&mut self, run_id: &str) -> Result<bool> {
        let tx = self.conn_mut()?.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM artifacts WHERE run_id = ?1", params![run_id])?;
        let removed = tx.execute("DELETE FROM runs WHERE run_id = ?1", params![run_id])?;
        tx.commit()?;
        if removed > 0 {
            info!("run deleted");
        }
        Ok(removed > 0)
    }

    /// Load the density matrix a record points at.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreClosed`], or [`Error::Persistence`] if the
    /// file is missing, unreadable or malformed.
    pub fn load_density_matrix(&self, record: &RunRecord) -> Result<DensityMatrix> {
        self.conn()?;
        npy::read_density_matrix(&layout::resolve(&self.base_dir, record.density_matrix_path()))
    }

    /// Release the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreClosed`] if already closed, or
    /// [`Error::Persistence`] if `SQLite` refuses to close.
    pub fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(Error::StoreClosed)?;
        conn.close().map_err(|(_, err)| Error::from(err))?;
        info!(catalog = %self.catalog_path.display(), "result store closed");
        Ok(())
    }
}

/// Every path a record points at, labelled for error messages.
fn referenced_paths(record: &RunRecord) -> impl Iterator<Item = (&'static str, &str)> {
    std::iter::once(("density matrix", record.density_matrix_path()))
        .chain(record.artifacts().values().map(|path| ("artifact", path.as_str())))
}

/// Initialize the schema or validate an existing version.
fn initialize_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(Error::Persistence(format!(
                "unsupported catalog schema version {other} (expected {SCHEMA_VERSION})"
            )));
        }
    }
    tx.execute_batch(SCHEMA)?;
    tx.commit()?;
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn encode_timestamp(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp_micros() as f64 / 1e6
}

#[allow(clippy::cast_possible_truncation)]
fn decode_timestamp(seconds: f64) -> Result<DateTime<Utc>> {
    let micros = (seconds * 1e6).round();
    if !micros.is_finite() {
        return Err(Error::Persistence(format!("invalid timestamp {seconds}")));
    }
    DateTime::from_timestamp_micros(micros as i64)
        .ok_or_else(|| Error::Persistence(format!("timestamp {seconds} out of range")))
}

fn load_artifact_map(conn: &Connection, run_id: &str) -> Result<BTreeMap<String, String>> {
    let mut stmt =
        conn.prepare("SELECT artifact_name, artifact_path FROM artifacts WHERE run_id = ?1 ORDER BY artifact_id")?;
    let rows = stmt.query_map(params![run_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    Ok(rows.collect::<rusqlite::Result<BTreeMap<String, String>>>()?)
}

/// Raw `runs` row, decoded into a record once its artifacts are loaded.
struct RunRow {
    run_id: String,
    experiment_name: String,
    params: String,
    backend_name: String,
    timestamp: f64,
    density_matrix_path: String,
    metadata: Option<String>,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            experiment_name: row.get(1)?,
            params: row.get(2)?,
            backend_name: row.get(3)?,
            timestamp: row.get(4)?,
            density_matrix_path: row.get(5)?,
            metadata: row.get(6)?,
        })
    }

    fn into_record(self, artifacts: BTreeMap<String, String>) -> Result<RunRecord> {
        let params = Params::from_json(&self.params)?;
        let metadata: Option<Metadata> = self.metadata.as_deref().map(serde_json::from_str).transpose()?;

        let mut builder = RunRecord::builder(
            self.run_id,
            self.experiment_name,
            self.backend_name,
            self.density_matrix_path,
        )
        .params(params)
        .timestamp(decode_timestamp(self.timestamp)?)
        .artifacts(artifacts);
        if let Some(metadata) = metadata {
            builder = builder.metadata(metadata);
        }
        Ok(builder.build())
    }
}
