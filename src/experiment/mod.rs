//! Experiments - named, parametric circuit builders
//!
//! An [`Experiment`] pairs a human-readable name with a pure builder that
//! turns a [`Params`] mapping into a [`Circuit`]. Experiments hold no
//! execution logic and are cheap to clone and reuse across runs.
//!
//! ## Usage
//!
//! ```rust
//! use qex::experiment::Experiment;
//! use qex::params::Params;
//! use qex::quantum::{Circuit, Gate};
//!
//! let tilt = Experiment::new("tilt", |params: &Params| {
//!     let theta = params.require_f64("theta")?;
//!     Ok(Circuit::new().then(Gate::Ry(theta)))
//! });
//!
//! let circuit = tilt.build(&Params::new().with("theta", 0.25))?;
//! assert_eq!(circuit.gates(), &[Gate::Ry(0.25)]);
//! # Ok::<(), qex::Error>(())
//! ```

pub mod catalog;

use std::fmt;
use std::sync::Arc;

use crate::params::Params;
use crate::quantum::Circuit;
use crate::Result;

type Builder = dyn Fn(&Params) -> Result<Circuit> + Send + Sync;

/// Immutable experiment definition.
#[derive(Clone)]
pub struct Experiment {
    name: String,
    builder: Arc<Builder>,
}

impl Experiment {
    /// Create an experiment from a name and a builder.
    ///
    /// The builder validates its own required keys and types, returning
    /// [`crate::Error::InvalidParameter`] naming the offending key.
    pub fn new<F>(name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&Params) -> Result<Circuit> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            builder: Arc::new(builder),
        }
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the circuit for `params`.
    ///
    /// # Errors
    ///
    /// Propagates the builder's [`crate::Error::InvalidParameter`].
    pub fn build(&self, params: &Params) -> Result<Circuit> {
        (self.builder)(params)
    }
}

impl fmt::Debug for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment").field("name", &self.name).finish_non_exhaustive()
    }
}
