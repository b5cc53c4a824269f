//! Density Matrix - 2x2 complex single-qubit state

use ndarray::{arr2, Array1, Array2};
use num_complex::Complex64;

use crate::{Error, Result};

/// Default numerical tolerance for the physical checks.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Density matrix of a single qubit.
///
/// Construction never validates; call [`DensityMatrix::validate`] before
/// trusting the physical invariants (Hermitian, unit trace, PSD). Matrices
/// returned by a backend are validated by the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityMatrix {
    matrix: Array2<Complex64>,
}

impl DensityMatrix {
    /// Wrap an arbitrary complex matrix (shape is checked by `validate`).
    #[must_use]
    pub const fn from_array(matrix: Array2<Complex64>) -> Self {
        Self { matrix }
    }

    /// Build from row-major 2x2 entries.
    #[must_use]
    pub fn from_rows(rows: [[Complex64; 2]; 2]) -> Self {
        Self { matrix: arr2(&rows) }
    }

    /// Build from real row-major entries.
    #[must_use]
    pub fn from_real(rows: [[f64; 2]; 2]) -> Self {
        Self::from_array(arr2(&rows).mapv(|v| Complex64::new(v, 0.0)))
    }

    /// Pure state `|psi><psi|` for `|psi> = a|0> + b|1>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDensityMatrix`] if the amplitudes are not
    /// normalized within [`DEFAULT_TOLERANCE`].
    pub fn from_state_vector(a: Complex64, b: Complex64) -> Result<Self> {
        let psi = Array1::from(vec![a, b]);
        let norm_sqr: f64 = psi.iter().map(Complex64::norm_sqr).sum();
        if (norm_sqr - 1.0).abs() > DEFAULT_TOLERANCE {
            return Err(Error::InvalidDensityMatrix(format!(
                "state vector is not normalized (|psi|^2 = {norm_sqr})"
            )));
        }

        let matrix = Array2::from_shape_fn((2, 2), |(i, j)| psi[i] * psi[j].conj());
        Ok(Self { matrix })
    }

    /// The maximally mixed state `I/2`.
    #[must_use]
    pub fn maximally_mixed() -> Self {
        Self::from_real([[0.5, 0.0], [0.0, 0.5]])
    }

    /// Underlying matrix.
    #[must_use]
    pub const fn as_array(&self) -> &Array2<Complex64> {
        &self.matrix
    }

    /// Matrix shape as `(rows, cols)`.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.matrix.dim()
    }

    /// Entry at `(row, col)`, if in bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<Complex64> {
        self.matrix.get([row, col]).copied()
    }

    /// Sum of the diagonal.
    #[must_use]
    pub fn trace(&self) -> Complex64 {
        self.matrix.diag().sum()
    }

    /// Row-major entries.
    pub fn iter(&self) -> impl Iterator<Item = &Complex64> {
        self.matrix.iter()
    }

    /// Element-wise comparison within `tolerance`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.dim() == other.dim()
            && self
                .matrix
                .iter()
                .zip(other.matrix.iter())
                .all(|(a, b)| (a - b).norm() <= tolerance)
    }

    /// Eigenvalues of the Hermitian part, smallest first.
    ///
    /// Closed form for 2x2: `(a+d)/2 -/+ sqrt(((a-d)/2)^2 + |b|^2)`.
    #[must_use]
    pub fn eigenvalues(&self) -> Option<(f64, f64)> {
        if self.dim() != (2, 2) {
            return None;
        }
        let a = self.matrix[[0, 0]].re;
        let d = self.matrix[[1, 1]].re;
        let b = (self.matrix[[0, 1]] + self.matrix[[1, 0]].conj()) * 0.5;

        let mean = (a + d) / 2.0;
        let radius = ((a - d) / 2.0).hypot(b.norm());
        Some((mean - radius, mean + radius))
    }

    /// Check the physical invariants within `tolerance`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDensityMatrix`] naming the first failed check:
    /// shape, finiteness, Hermiticity, unit trace, positive semidefiniteness.
    pub fn validate(&self, tolerance: f64) -> Result<()> {
        let (rows, cols) = self.dim();
        if (rows, cols) != (2, 2) {
            return Err(Error::InvalidDensityMatrix(format!(
                "expected a 2x2 matrix, got {rows}x{cols}"
            )));
        }

        if self.matrix.iter().any(|c| !c.re.is_finite() || !c.im.is_finite()) {
            return Err(Error::InvalidDensityMatrix(
                "matrix contains non-finite entries".to_string(),
            ));
        }

        let mut deviation: f64 = 0.0;
        for i in 0..2 {
            for j in 0..2 {
                deviation = deviation.max((self.matrix[[i, j]] - self.matrix[[j, i]].conj()).norm());
            }
        }
        if deviation > tolerance {
            return Err(Error::InvalidDensityMatrix(format!(
                "matrix is not Hermitian (max deviation {deviation:e})"
            )));
        }

        let trace = self.trace();
        if (trace - Complex64::new(1.0, 0.0)).norm() > tolerance {
            return Err(Error::InvalidDensityMatrix(format!("trace is {trace}, expected 1")));
        }

        if let Some((smallest, _)) = self.eigenvalues() {
            if smallest < -tolerance {
                return Err(Error::InvalidDensityMatrix(format!(
                    "matrix is not positive semidefinite (eigenvalue {smallest:e})"
                )));
            }
        }

        Ok(())
    }
}
