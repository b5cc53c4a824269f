//! Built-in single-qubit experiments
//!
//! | Name           | Circuit          | Params                        |
//! |----------------|------------------|-------------------------------|
//! | `x_gate`       | `X`              | none                          |
//! | `hadamard`     | `H`              | none                          |
//! | `ry_sweep`     | `Ry(theta)`      | `theta` (optional, default 0) |
//! | `rx_sweep`     | `Rx(theta)`      | `theta` (required)            |
//! | `phase_plus_i` | `H`, `S`         | none                          |

use super::Experiment;
use crate::params::Params;
use crate::quantum::{Circuit, Gate};

/// `|0> -> X -> |1>`, the south pole.
#[must_use]
pub fn x_gate() -> Experiment {
    Experiment::new("x_gate", |_: &Params| Ok(Circuit::new().then(Gate::X)))
}

/// `|0> -> H -> |+>`, the +X axis.
#[must_use]
pub fn hadamard() -> Experiment {
    Experiment::new("hadamard", |_: &Params| Ok(Circuit::new().then(Gate::H)))
}

/// `|0> -> Ry(theta)`, sweeping the XZ great circle.
#[must_use]
pub fn ry_sweep() -> Experiment {
    Experiment::new("ry_sweep", |params: &Params| {
        let theta = params.f64_or("theta", 0.0)?;
        Ok(Circuit::new().then(Gate::Ry(theta)))
    })
}

/// `|0> -> Rx(theta)`, sweeping the YZ great circle.
///
/// `theta = -pi/2` lands on the +i eigenstate `(0, 1, 0)`.
#[must_use]
pub fn rx_sweep() -> Experiment {
    Experiment::new("rx_sweep", |params: &Params| {
        let theta = params.require_f64("theta")?;
        Ok(Circuit::new().then(Gate::Rx(theta)))
    })
}

/// `|0> -> H -> S -> |+i>`.
#[must_use]
pub fn phase_plus_i() -> Experiment {
    Experiment::new("phase_plus_i", |_: &Params| {
        Ok(Circuit::new().then(Gate::H).then(Gate::S))
    })
}

/// All built-in experiments.
#[must_use]
pub fn all() -> Vec<Experiment> {
    vec![x_gate(), hadamard(), ry_sweep(), rx_sweep(), phase_plus_i()]
}

/// Look up a built-in experiment by name.
#[must_use]
pub fn by_name(name: &str) -> Option<Experiment> {
    all().into_iter().find(|exp| exp.name() == name)
}
