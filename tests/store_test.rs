//! Result Store Tests
//!
//! Catalog behavior against a real `SQLite` file in a temp directory.

use std::thread;

use chrono::{TimeZone, Utc};
use qex::params::{Metadata, Params};
use qex::quantum::DensityMatrix;
use qex::store::{layout, npy, JournalMode, ResultStore, RunRecord, StoreConfig};
use qex::Error;
use tempfile::TempDir;

/// Write the files a record points at and return the record.
fn record_on_disk(base: &std::path::Path, run_id: &str, experiment: &str, seconds: i64) -> RunRecord {
    let rho_path = layout::density_matrix_path(run_id);
    npy::write_density_matrix(&layout::resolve(base, &rho_path), &DensityMatrix::maximally_mixed()).unwrap();

    let html = layout::artifact_path(run_id, "bloch_sphere", "html");
    std::fs::write(layout::resolve(base, &html), "<html></html>").unwrap();

    RunRecord::builder(run_id, experiment, "ideal_statevector", rho_path)
        .timestamp(Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap())
        .artifact("bloch_sphere", html)
        .build()
}

fn store_with(runs: &[(&str, &str, i64)]) -> (TempDir, ResultStore) {
    let dir = TempDir::new().unwrap();
    let mut store = ResultStore::open(dir.path()).unwrap();
    for (run_id, experiment, seconds) in runs {
        store.save_run(&record_on_disk(dir.path(), run_id, experiment, *seconds)).unwrap();
    }
    (dir, store)
}

fn ids(records: &[RunRecord]) -> Vec<&str> {
    records.iter().map(RunRecord::run_id).collect()
}

// =============================================================================
// Round trip
// =============================================================================

#[test]
fn test_save_then_get_returns_equal_record() {
    let dir = TempDir::new().unwrap();
    let mut store = ResultStore::open(dir.path()).unwrap();

    let mut metadata = Metadata::new();
    metadata.insert("operator".to_string(), serde_json::json!("alice"));
    metadata.insert("bloch_vector".to_string(), serde_json::json!([0.1, -0.2, 0.3]));
    metadata.insert("calibration".to_string(), serde_json::json!({"t1_us": 52.5, "batch": 7}));

    let params = Params::new()
        .with("theta", 0.1 + 0.2)
        .with("shots", 1024)
        .with("label", "sweep-a")
        .with("dry_run", false);

    let base = record_on_disk(dir.path(), "run-1", "ry_sweep", 0);
    let record = RunRecord::builder("run-1", "ry_sweep", "ideal_statevector", base.density_matrix_path())
        .params(params)
        .timestamp(Utc::now())
        .artifacts(base.artifacts().clone())
        .metadata(metadata)
        .build();

    store.save_run(&record).unwrap();
    let loaded = store.get_run("run-1").unwrap().unwrap();

    assert_eq!(loaded, record);
    assert_eq!(loaded.timestamp(), record.timestamp());
    assert_eq!(loaded.params().get("shots").and_then(|v| v.as_f64()), Some(1024.0));
}

#[test]
fn test_get_unknown_returns_none() {
    let (_dir, store) = store_with(&[("a", "hadamard", 0)]);
    assert!(store.get_run("does-not-exist").unwrap().is_none());
}

#[test]
fn test_load_density_matrix_matches_written() {
    let dir = TempDir::new().unwrap();
    let mut store = ResultStore::open(dir.path()).unwrap();
    let rho = DensityMatrix::from_real([[0.0, 0.0], [0.0, 1.0]]);

    let rho_path = layout::density_matrix_path("flip");
    npy::write_density_matrix(&layout::resolve(dir.path(), &rho_path), &rho).unwrap();
    let record = RunRecord::builder("flip", "x_gate", "ideal_statevector", rho_path).build();
    store.save_run(&record).unwrap();

    let loaded = store.get_run("flip").unwrap().unwrap();
    assert!(store.load_density_matrix(&loaded).unwrap().approx_eq(&rho, 0.0));
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn test_list_runs_most_recent_first() {
    let (_dir, store) = store_with(&[("old", "hadamard", 0), ("new", "hadamard", 20), ("mid", "x_gate", 10)]);

    let runs = store.list_runs(None, None).unwrap();
    assert_eq!(ids(&runs), vec!["new", "mid", "old"]);
}

#[test]
fn test_list_runs_filters_by_exact_name() {
    let (_dir, store) = store_with(&[
        ("a", "hadamard", 0),
        ("b", "x_gate", 1),
        ("c", "hadamard", 2),
        ("d", "hadamard_variant", 3),
    ]);

    let runs = store.list_runs(Some("hadamard"), None).unwrap();
    assert_eq!(ids(&runs), vec!["c", "a"]);
    assert!(store.list_runs(Some("ry_sweep"), None).unwrap().is_empty());
}

#[test]
fn test_list_runs_limit() {
    let (_dir, store) = store_with(&[("a", "hadamard", 0), ("b", "hadamard", 1), ("c", "hadamard", 2)]);

    assert_eq!(ids(&store.list_runs(None, Some(2)).unwrap()), vec!["c", "b"]);
    assert!(store.list_runs(None, Some(0)).unwrap().is_empty());
    assert_eq!(store.list_runs(None, Some(100)).unwrap().len(), 3);
}

#[test]
fn test_list_runs_ties_fall_back_to_insertion_order() {
    let (_dir, store) = store_with(&[("first", "hadamard", 5), ("second", "hadamard", 5)]);
    assert_eq!(ids(&store.list_runs(None, None).unwrap()), vec!["second", "first"]);
}

#[test]
fn test_listed_records_carry_artifacts() {
    let (_dir, store) = store_with(&[("a", "hadamard", 0)]);
    let runs = store.list_runs(None, None).unwrap();
    assert_eq!(runs[0].artifact("bloch_sphere"), Some("artifacts/a_bloch_sphere.html"));
}

// =============================================================================
// Atomicity and duplicates
// =============================================================================

#[test]
fn test_duplicate_run_id_leaves_existing_rows_untouched() {
    let (dir, mut store) = store_with(&[("dup", "hadamard", 0)]);
    let original = store.get_run("dup").unwrap().unwrap();

    let json = layout::artifact_path("dup", "bloch_vector", "json");
    std::fs::write(layout::resolve(dir.path(), &json), "{}").unwrap();
    let imposter = RunRecord::builder("dup", "x_gate", "other_backend", original.density_matrix_path())
        .artifact("bloch_vector", json)
        .build();

    let err = store.save_run(&imposter).unwrap_err();
    assert!(matches!(err, Error::DuplicateRun(ref id) if id == "dup"));

    assert_eq!(store.get_run("dup").unwrap().unwrap(), original);
    assert_eq!(store.artifacts_for_run("dup").unwrap().len(), 1);
    assert_eq!(store.count_runs(None).unwrap(), 1);
}

#[test]
fn test_failed_save_writes_no_rows() {
    let dir = TempDir::new().unwrap();
    let mut store = ResultStore::open(dir.path()).unwrap();
    let on_disk = record_on_disk(dir.path(), "partial", "hadamard", 0);
    let record = RunRecord::builder("partial", "hadamard", "ideal_statevector", on_disk.density_matrix_path())
        .artifacts(on_disk.artifacts().clone())
        .artifact("bloch_vector", "artifacts/partial_bloch_vector.json")
        .build();

    assert!(matches!(store.save_run(&record), Err(Error::Persistence(_))));
    assert!(store.get_run("partial").unwrap().is_none());
    assert!(store.artifacts_for_run("partial").unwrap().is_empty());
}

#[test]
fn test_paths_outside_base_rejected_even_without_file_check() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("store");
    std::fs::write(dir.path().join("outside.npy"), b"not a matrix").unwrap();
    let config = StoreConfig::new(&base).verify_files_on_save(false);
    let mut store = ResultStore::open_with(config).unwrap();

    let cases = [
        RunRecord::builder("parent", "x_gate", "ideal_statevector", "../outside.npy").build(),
        RunRecord::builder("absolute", "x_gate", "ideal_statevector", "/tmp/rho.npy").build(),
        RunRecord::builder("artifact", "x_gate", "ideal_statevector", "results/artifact_rho.npy")
            .artifact("bloch_sphere", "artifacts/../../escape.html")
            .build(),
    ];
    for record in &cases {
        let err = store.save_run(record).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)), "{}: {err}", record.run_id());
    }
    assert_eq!(store.count_runs(None).unwrap(), 0);
}

#[test]
fn test_load_rejects_matrix_file_with_wrong_shape() {
    let dir = TempDir::new().unwrap();
    let mut store = ResultStore::open(dir.path()).unwrap();
    let record = record_on_disk(dir.path(), "reshaped", "hadamard", 0);
    store.save_run(&record).unwrap();

    let path = layout::resolve(dir.path(), record.density_matrix_path());
    let mut bytes = std::fs::read(&path).unwrap();
    let at = bytes.windows(6).position(|w| w == b"(2, 2)").unwrap();
    bytes[at..at + 6].copy_from_slice(b"(4, 1)");
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(store.load_density_matrix(&record), Err(Error::Persistence(_))));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_operations_after_close_fail() {
    let (dir, mut store) = store_with(&[("a", "hadamard", 0)]);
    let record = record_on_disk(dir.path(), "b", "hadamard", 1);
    store.close().unwrap();

    assert!(matches!(store.save_run(&record), Err(Error::StoreClosed)));
    assert!(matches!(store.get_run("a"), Err(Error::StoreClosed)));
    assert!(matches!(store.list_runs(None, None), Err(Error::StoreClosed)));
    assert!(matches!(store.count_runs(None), Err(Error::StoreClosed)));
    assert!(matches!(store.delete_run("a"), Err(Error::StoreClosed)));
    assert!(matches!(store.load_density_matrix(&record), Err(Error::StoreClosed)));
}

#[test]
fn test_runs_survive_reopen() {
    let (dir, mut store) = store_with(&[("a", "hadamard", 0), ("b", "x_gate", 1)]);
    let before = store.list_runs(None, None).unwrap();
    store.close().unwrap();

    let reopened = ResultStore::open(dir.path()).unwrap();
    assert_eq!(reopened.list_runs(None, None).unwrap(), before);
}

#[test]
fn test_custom_catalog_file_and_journal_mode() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::new(dir.path())
        .catalog_file("lab.db")
        .journal_mode(JournalMode::Delete);
    let mut store = ResultStore::open_with(config).unwrap();

    store.save_run(&record_on_disk(dir.path(), "a", "hadamard", 0)).unwrap();
    assert_eq!(store.catalog_path(), dir.path().join("lab.db"));
    assert!(!dir.path().join(layout::CATALOG_FILE).exists());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_second_store_sees_committed_runs() {
    let (dir, mut writer) = store_with(&[("a", "hadamard", 0)]);
    let reader = ResultStore::open(dir.path()).unwrap();

    assert_eq!(reader.count_runs(None).unwrap(), 1);
    writer.save_run(&record_on_disk(dir.path(), "b", "x_gate", 1)).unwrap();
    assert_eq!(reader.get_run("b").unwrap().unwrap().experiment_name(), "x_gate");
}

#[test]
fn test_concurrent_writers_from_threads() {
    const WRITERS: usize = 4;
    const RUNS_PER_WRITER: usize = 10;

    let dir = TempDir::new().unwrap();
    let stores: Vec<ResultStore> = (0..WRITERS).map(|_| ResultStore::open(dir.path()).unwrap()).collect();

    let handles: Vec<_> = stores
        .into_iter()
        .enumerate()
        .map(|(writer, mut store)| {
            let base = dir.path().to_path_buf();
            thread::spawn(move || {
                for n in 0..RUNS_PER_WRITER {
                    let run_id = format!("w{writer}-r{n}");
                    let seconds = i64::try_from(writer * RUNS_PER_WRITER + n).unwrap();
                    store.save_run(&record_on_disk(&base, &run_id, "hadamard", seconds)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let store = ResultStore::open(dir.path()).unwrap();
    assert_eq!(store.count_runs(Some("hadamard")).unwrap(), WRITERS * RUNS_PER_WRITER);
    for record in store.list_runs(None, None).unwrap() {
        assert_eq!(store.artifacts_for_run(record.run_id()).unwrap().len(), 1);
    }
}
