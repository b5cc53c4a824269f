//! Execution backends
//!
//! A [`Backend`] turns a [`Circuit`] into the final [`DensityMatrix`] of
//! the qubit. Exactly one backend is injected into each
//! [`crate::runner::Runner`]; alternative backends (noisy, hardware) are
//! further implementations of the trait, never global configuration.

use num_complex::Complex64;

use crate::quantum::{Circuit, DensityMatrix};
use crate::{Error, Result};

/// Circuit execution capability.
pub trait Backend {
    /// Execute `circuit` from `|0>` and return the final density matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] if the circuit cannot be executed.
    fn run(&self, circuit: &Circuit) -> Result<DensityMatrix>;

    /// Stable identifier recorded with every run.
    fn name(&self) -> &str;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn run(&self, circuit: &Circuit) -> Result<DensityMatrix> {
        (**self).run(circuit)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn run(&self, circuit: &Circuit) -> Result<DensityMatrix> {
        (**self).run(circuit)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Ideal (noiseless) state-vector simulator.
///
/// Evolves `|0>` through each gate's unitary and returns `|psi><psi|`.
/// Deterministic: the same circuit always yields the same matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdealSimulator {
    _private: (),
}

impl IdealSimulator {
    /// Backend name recorded in the catalog.
    pub const NAME: &'static str = "ideal_statevector";

    /// Create a new simulator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl Backend for IdealSimulator {
    fn run(&self, circuit: &Circuit) -> Result<DensityMatrix> {
        let mut psi = [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)];

        for (step, gate) in circuit.gates().iter().enumerate() {
            if let Some(theta) = gate.angle() {
                if !theta.is_finite() {
                    return Err(Error::Execution(format!(
                        "gate {step} ({gate:?}) has a non-finite rotation angle"
                    )));
                }
            }
            let u = gate.matrix();
            psi = [
                u[[0, 0]] * psi[0] + u[[0, 1]] * psi[1],
                u[[1, 0]] * psi[0] + u[[1, 1]] * psi[1],
            ];
        }

        DensityMatrix::from_state_vector(psi[0], psi[1])
            .map_err(|err| Error::Execution(format!("state lost normalization: {err}")))
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
