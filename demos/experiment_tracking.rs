//! Experiment Tracking Example
//!
//! Runs the built-in single-qubit experiments on the ideal simulator,
//! catalogues every run and reads the results back.
//!
//! Run with: cargo run --example experiment_tracking [base_dir]
//! Set `RUST_LOG=qex=debug` to see each pipeline step.

use std::f64::consts::PI;

use anyhow::Context;
use qex::backend::IdealSimulator;
use qex::bloch;
use qex::experiment::catalog;
use qex::params::Params;
use qex::runner::{RunConfig, Runner};
use qex::store::ResultStore;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qex=info")))
        .init();

    println!("=== qex Experiment Tracking ===\n");

    let base_dir = std::env::args().nth(1).unwrap_or_else(|| "qex_data".to_string());
    let mut store = ResultStore::open(&base_dir).with_context(|| format!("opening store at {base_dir}"))?;
    let runner = Runner::new(IdealSimulator::new());
    let config = RunConfig::new(store.base_dir()).metadata("source", "experiment_tracking demo");

    // -------------------------------------------------------------------------
    // 1. Fixed-circuit experiments
    // -------------------------------------------------------------------------
    println!("1. Running fixed circuits...");

    for experiment in [catalog::x_gate(), catalog::hadamard(), catalog::phase_plus_i()] {
        let record = runner.execute_and_save(&experiment, &Params::new(), &config, &mut store)?;
        let rho = store.load_density_matrix(&record)?;
        let v = bloch::to_bloch(&rho)?;
        println!(
            "   {:<14} run {}  ->  ({:+.4}, {:+.4}, {:+.4})",
            record.experiment_name(),
            &record.run_id()[..8],
            v.x,
            v.y,
            v.z
        );
    }

    // -------------------------------------------------------------------------
    // 2. Parameter sweep
    // -------------------------------------------------------------------------
    println!("\n2. Sweeping Ry(theta) over [0, pi]...");

    let sweep = catalog::ry_sweep();
    let steps = 8;
    for step in 0..=steps {
        let theta = PI * f64::from(step) / f64::from(steps);
        let params = Params::new().with("theta", theta);
        let record = runner.execute_and_save(&sweep, &params, &config, &mut store)?;
        let v = bloch::to_bloch(&store.load_density_matrix(&record)?)?;
        println!("   theta={theta:.4}  x={:+.4}  z={:+.4}", v.x, v.z);
    }

    // -------------------------------------------------------------------------
    // 3. Query the catalog
    // -------------------------------------------------------------------------
    println!("\n3. Querying catalog...");

    println!("   Total runs: {}", store.count_runs(None)?);
    println!("   ry_sweep runs: {}", store.count_runs(Some("ry_sweep"))?);

    for record in store.list_runs(None, Some(3))? {
        println!("   {} {} ({})", record.timestamp(), record.experiment_name(), record.backend_name());
        for artifact in store.artifacts_for_run(record.run_id())? {
            println!("      {:<13} {} [{}]", artifact.artifact_name(), artifact.artifact_path(), artifact.artifact_type());
        }
    }

    // -------------------------------------------------------------------------
    // 4. Close
    // -------------------------------------------------------------------------
    let catalog = store.catalog_path().display().to_string();
    store.close()?;
    println!("\nCatalog: {catalog}");
    println!("Open any artifacts/*_bloch_sphere.html file in a browser to view a run.");

    Ok(())
}
