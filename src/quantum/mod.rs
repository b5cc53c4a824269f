//! Single-qubit state primitives
//!
//! - [`DensityMatrix`]: 2x2 complex state with physical-invariant checks
//! - [`BlochVector`]: real `(x, y, z)` projection of a state
//! - [`Gate`] / [`Circuit`]: the circuit description experiments build

mod circuit;
mod density;

pub use circuit::{Circuit, Gate};
pub use density::{DensityMatrix, DEFAULT_TOLERANCE};

use serde::{Deserialize, Serialize};

/// Point on or inside the unit Bloch sphere.
///
/// Pure states lie on the surface (`|r| = 1`), mixed states strictly inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlochVector {
    /// `Tr(rho * sigma_x)`
    pub x: f64,
    /// `Tr(rho * sigma_y)`
    pub y: f64,
    /// `Tr(rho * sigma_z)`
    pub z: f64,
}

impl BlochVector {
    /// Create a vector from its components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.z.hypot(self.x.hypot(self.y))
    }

    /// Check if the vector lies on the sphere surface within `tolerance`.
    #[must_use]
    pub fn is_pure(&self, tolerance: f64) -> bool {
        (self.norm() - 1.0).abs() <= tolerance
    }

    /// Component-wise comparison within `tolerance`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    /// Components as an array.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}
