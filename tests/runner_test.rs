//! Runner integration tests
//!
//! End-to-end: experiment -> ideal backend -> files on disk -> record.

use std::f64::consts::{FRAC_PI_2, PI};

use qex::backend::{Backend, IdealSimulator};
use qex::bloch::{self, ArtifactKind};
use qex::experiment::{catalog, Experiment};
use qex::params::Params;
use qex::quantum::{BlochVector, Circuit, DensityMatrix, Gate};
use qex::runner::{RunConfig, Runner};
use qex::store::{layout, npy, ResultStore};
use qex::Error;
use tempfile::TempDir;

const EPS: f64 = 1e-9;

fn run(experiment: &Experiment, params: &Params) -> (TempDir, DensityMatrix, BlochVector) {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(IdealSimulator::new());
    let record = runner.execute(experiment, params, &RunConfig::new(dir.path())).unwrap();

    let rho = npy::read_density_matrix(&layout::resolve(dir.path(), record.density_matrix_path())).unwrap();
    let vector = bloch::to_bloch(&rho).unwrap();
    (dir, rho, vector)
}

// =============================================================================
// Reference scenarios
// =============================================================================

#[test]
fn test_x_gate_flips_to_south_pole() {
    let (_dir, rho, vector) = run(&catalog::x_gate(), &Params::new());

    assert!(rho.approx_eq(&DensityMatrix::from_real([[0.0, 0.0], [0.0, 1.0]]), EPS));
    assert!(vector.approx_eq(&BlochVector::new(0.0, 0.0, -1.0), EPS));
}

#[test]
fn test_hadamard_lands_on_plus_x() {
    let (_dir, rho, vector) = run(&catalog::hadamard(), &Params::new());

    assert!(rho.approx_eq(&DensityMatrix::from_real([[0.5, 0.5], [0.5, 0.5]]), EPS));
    assert!(vector.approx_eq(&BlochVector::new(1.0, 0.0, 0.0), EPS));
}

#[test]
fn test_ry_sweep_quarter_turn_is_plus_state() {
    // Ry(pi/2)|0> = |+>
    let (_dir, _rho, vector) = run(&catalog::ry_sweep(), &Params::new().with("theta", FRAC_PI_2));
    assert!(vector.approx_eq(&BlochVector::new(1.0, 0.0, 0.0), EPS));
}

#[test]
fn test_rx_sweep_reaches_plus_i() {
    let (_dir, _rho, vector) = run(&catalog::rx_sweep(), &Params::new().with("theta", -FRAC_PI_2));
    assert!(vector.approx_eq(&BlochVector::new(0.0, 1.0, 0.0), EPS));
}

#[test]
fn test_phase_plus_i_reaches_plus_i() {
    let (_dir, rho, vector) = run(&catalog::phase_plus_i(), &Params::new());

    assert!(vector.approx_eq(&BlochVector::new(0.0, 1.0, 0.0), EPS));
    assert!(rho.get(0, 1).unwrap().im < 0.0);
}

#[test]
fn test_ry_sweep_traces_xz_circle() {
    for step in 0..8 {
        let theta = f64::from(step) * PI / 4.0;
        let (_dir, _rho, vector) = run(&catalog::ry_sweep(), &Params::new().with("theta", theta));
        assert!(vector.approx_eq(&BlochVector::new(theta.sin(), 0.0, theta.cos()), EPS), "theta = {theta}");
    }
}

// =============================================================================
// Record contents
// =============================================================================

#[test]
fn test_record_fields() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(IdealSimulator::new());
    let params = Params::new().with("theta", 0.5);
    let config = RunConfig::new(dir.path()).metadata("operator", "alice");

    let record = runner.execute(&catalog::ry_sweep(), &params, &config).unwrap();

    assert_eq!(record.experiment_name(), "ry_sweep");
    assert_eq!(record.backend_name(), IdealSimulator::NAME);
    assert_eq!(record.params(), &params);
    assert_eq!(record.density_matrix_path(), layout::density_matrix_path(record.run_id()));
    assert_eq!(
        record.artifact("bloch_sphere"),
        Some(layout::artifact_path(record.run_id(), "bloch_sphere", "html").as_str())
    );

    let metadata = record.metadata().unwrap();
    assert_eq!(metadata["operator"], "alice");
    assert!(metadata.contains_key("bloch_vector"));
}

#[test]
fn test_html_artifact_embeds_coordinates() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(IdealSimulator::new());
    let config = RunConfig::new(dir.path()).artifacts([ArtifactKind::BlochSphere]).title("flip");
    let record = runner.execute(&catalog::x_gate(), &Params::new(), &config).unwrap();

    let html = std::fs::read_to_string(layout::resolve(dir.path(), record.artifact("bloch_sphere").unwrap())).unwrap();
    assert!(html.contains("<title>flip</title>"));
    assert!(html.contains("z = -1.0000"));
    assert!(html.contains("id=\"marker\""));
    assert!(!html.contains("<script"));
}

#[test]
fn test_each_run_gets_fresh_id_and_files() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(IdealSimulator::new());
    let config = RunConfig::new(dir.path());

    let a = runner.execute(&catalog::hadamard(), &Params::new(), &config).unwrap();
    let b = runner.execute(&catalog::hadamard(), &Params::new(), &config).unwrap();

    assert_ne!(a.run_id(), b.run_id());
    assert_ne!(a.density_matrix_path(), b.density_matrix_path());
}

// =============================================================================
// Failure propagation
// =============================================================================

struct BrokenBackend {
    result: fn() -> qex::Result<DensityMatrix>,
}

impl Backend for BrokenBackend {
    fn run(&self, _circuit: &Circuit) -> qex::Result<DensityMatrix> {
        (self.result)()
    }

    fn name(&self) -> &str {
        "broken"
    }
}

#[test]
fn test_invalid_density_matrix_is_hard_stop() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(BrokenBackend {
        result: || Ok(DensityMatrix::from_real([[0.9, 0.0], [0.0, 0.9]])),
    });

    let err = runner.execute(&catalog::x_gate(), &Params::new(), &RunConfig::new(dir.path())).unwrap_err();
    assert!(matches!(err, Error::InvalidDensityMatrix(_)));
    assert!(!dir.path().join(layout::RESULTS_DIR).exists());
}

#[test]
fn test_execution_error_propagates_unchanged() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(BrokenBackend {
        result: || Err(Error::Execution("unsupported operation".to_string())),
    });

    let err = runner.execute(&catalog::x_gate(), &Params::new(), &RunConfig::new(dir.path())).unwrap_err();
    match err {
        Error::Execution(msg) => assert_eq!(msg, "unsupported operation"),
        other => panic!("expected Execution, got {other:?}"),
    }
}

#[test]
fn test_invalid_parameter_names_key() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(IdealSimulator::new());
    let err = runner
        .execute(&catalog::ry_sweep(), &Params::new().with("theta", true), &RunConfig::new(dir.path()))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidParameter { ref key, .. } if key == "theta"));
}

#[test]
fn test_non_finite_param_rejected_before_execution() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(IdealSimulator::new());
    let err = runner
        .execute(&catalog::x_gate(), &Params::new().with("noise", f64::NAN), &RunConfig::new(dir.path()))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidParameter { ref key, .. } if key == "noise"));
}

#[test]
fn test_custom_experiment_through_runner() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::new(IdealSimulator::new());
    let flip_twice = Experiment::new("flip_twice", |_: &Params| Ok(Circuit::new().then(Gate::X).then(Gate::X)));

    let record = runner.execute(&flip_twice, &Params::new(), &RunConfig::new(dir.path())).unwrap();
    let rho = npy::read_density_matrix(&layout::resolve(dir.path(), record.density_matrix_path())).unwrap();
    assert!(bloch::to_bloch(&rho).unwrap().approx_eq(&BlochVector::new(0.0, 0.0, 1.0), EPS));
}

// =============================================================================
// Runner + store
// =============================================================================

#[test]
fn test_execute_and_save_uses_store_base() {
    let store_dir = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let mut store = ResultStore::open(store_dir.path()).unwrap();
    let runner = Runner::new(IdealSimulator::new());

    let record = runner
        .execute_and_save(&catalog::hadamard(), &Params::new(), &RunConfig::new(elsewhere.path()), &mut store)
        .unwrap();

    assert_eq!(store.get_run(record.run_id()).unwrap(), Some(record.clone()));
    let rho = store.load_density_matrix(&record).unwrap();
    assert!(rho.approx_eq(&DensityMatrix::from_real([[0.5, 0.5], [0.5, 0.5]]), EPS));
}
