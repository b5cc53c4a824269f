//! # qex: Offline Lab Notebook for Single-Qubit Experiments
//!
//! qex defines, executes and durably records small parametric single-qubit
//! experiments. Every run produces a density matrix, a Bloch vector and a
//! set of self-contained visual artifacts, all catalogued in a local
//! `SQLite` file. No server, no network.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke**: files are written and synced before a run is
//!   catalogued; a catalog row never points at a missing file
//! - **Jidoka**: backend output is validated (Hermitian, unit trace, PSD)
//!   before anything downstream trusts it
//! - **Genchi Genbutsu**: records carry exactly what ran: params, backend,
//!   timestamp, matrix, artifacts
//!
//! ## Example Usage
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
//! let params = Params::new().with("theta", std::f64::consts::FRAC_PI_4);
//! let record = runner.execute_and_save(&catalog::ry_sweep(), &params, &RunConfig::new("qex_data"), &mut store)?;
//!
//! let rho = store.load_density_matrix(&record)?;
//! println!("{} -> {:?}", record.run_id(), qex::bloch::to_bloch(&rho)?);
//! # Ok::<(), qex::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod backend;
pub mod bloch;
pub mod error;
pub mod experiment;
pub mod params;
pub mod quantum;
pub mod runner;
pub mod store;

pub use error::{Error, Result};
