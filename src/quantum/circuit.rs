//! Single-qubit gates and circuit descriptions

use ndarray::{arr2, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// A single-qubit gate.
///
/// Rotation angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate", content = "theta", rename_all = "snake_case")]
pub enum Gate {
    /// Identity
    I,
    /// Pauli-X (bit flip)
    X,
    /// Pauli-Y
    Y,
    /// Pauli-Z (phase flip)
    Z,
    /// Hadamard
    H,
    /// Phase gate, `sqrt(Z)`
    S,
    /// Inverse phase gate
    Sdg,
    /// `pi/8` gate
    T,
    /// Rotation about X
    Rx(f64),
    /// Rotation about Y
    Ry(f64),
    /// Rotation about Z
    Rz(f64),
}

impl Gate {
    /// Rotation angle, if this gate has one.
    #[must_use]
    pub const fn angle(&self) -> Option<f64> {
        match self {
            Self::Rx(theta) | Self::Ry(theta) | Self::Rz(theta) => Some(*theta),
            _ => None,
        }
    }

    /// Unitary matrix of the gate.
    #[must_use]
    pub fn matrix(&self) -> Array2<Complex64> {
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);
        let i = Complex64::new(0.0, 1.0);
        let s = std::f64::consts::FRAC_1_SQRT_2;

        match *self {
            Self::I => arr2(&[[one, zero], [zero, one]]),
            Self::X => arr2(&[[zero, one], [one, zero]]),
            Self::Y => arr2(&[[zero, -i], [i, zero]]),
            Self::Z => arr2(&[[one, zero], [zero, -one]]),
            Self::H => arr2(&[[one * s, one * s], [one * s, -one * s]]),
            Self::S => arr2(&[[one, zero], [zero, i]]),
            Self::Sdg => arr2(&[[one, zero], [zero, -i]]),
            Self::T => arr2(&[
                [one, zero],
                [zero, Complex64::from_polar(1.0, std::f64::consts::FRAC_PI_4)],
            ]),
            Self::Rx(theta) => {
                let (sin, cos) = (theta / 2.0).sin_cos();
                arr2(&[[one * cos, -i * sin], [-i * sin, one * cos]])
            }
            Self::Ry(theta) => {
                let (sin, cos) = (theta / 2.0).sin_cos();
                arr2(&[[one * cos, -one * sin], [one * sin, one * cos]])
            }
            Self::Rz(theta) => arr2(&[
                [Complex64::from_polar(1.0, -theta / 2.0), zero],
                [zero, Complex64::from_polar(1.0, theta / 2.0)],
            ]),
        }
    }
}

/// Ordered sequence of gates acting on one qubit prepared in `|0>`.
///
/// The runner treats this as opaque; only backends look inside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    gates: Vec<Gate>,
}

impl Circuit {
    /// Create an empty circuit (leaves the qubit in `|0>`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a gate.
    #[must_use]
    pub fn then(mut self, gate: Gate) -> Self {
        self.gates.push(gate);
        self
    }

    /// Append a gate in place.
    pub fn push(&mut self, gate: Gate) {
        self.gates.push(gate);
    }

    /// Gates in application order.
    #[must_use]
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Number of gates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Check if the circuit has no gates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

impl FromIterator<Gate> for Circuit {
    fn from_iter<I: IntoIterator<Item = Gate>>(iter: I) -> Self {
        Self {
            gates: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unitary(u: &Array2<Complex64>) -> bool {
        let product = u.dot(&u.t().mapv(|c| c.conj()));
        let eye = Array2::<Complex64>::eye(2);
        product.iter().zip(eye.iter()).all(|(a, b)| (a - b).norm() < 1e-12)
    }

    #[test]
    fn test_all_gates_unitary() {
        let gates = [
            Gate::I,
            Gate::X,
            Gate::Y,
            Gate::Z,
            Gate::H,
            Gate::S,
            Gate::Sdg,
            Gate::T,
            Gate::Rx(0.3),
            Gate::Ry(1.1),
            Gate::Rz(-2.4),
        ];
        for gate in gates {
            assert!(is_unitary(&gate.matrix()), "{gate:?} is not unitary");
        }
    }

    #[test]
    fn test_circuit_builder_order() {
        let circuit = Circuit::new().then(Gate::H).then(Gate::S);
        assert_eq!(circuit.gates(), &[Gate::H, Gate::S]);
        assert_eq!(circuit.len(), 2);
    }

    #[test]
    fn test_gate_angle() {
        assert_eq!(Gate::Ry(0.5).angle(), Some(0.5));
        assert_eq!(Gate::X.angle(), None);
    }
}
