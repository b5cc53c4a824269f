//! Bloch Math - density matrix to Bloch vector, and Bloch vector to artifact
//!
//! ## Projection
//!
//! ```text
//! x = Tr(rho * sigma_x)    y = Tr(rho * sigma_y)    z = Tr(rho * sigma_z)
//! ```
//!
//! ## Artifact Payloads
//!
//! Every payload is a self-contained string: no scripts, fonts or
//! stylesheets are fetched when it is viewed.
//!
//! | Kind           | Extension | Content type       |
//! |----------------|-----------|--------------------|
//! | `bloch_sphere` | `html`    | `text/html`        |
//! | `bloch_vector` | `json`    | `application/json` |

use ndarray::{arr2, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::quantum::{BlochVector, DensityMatrix, DEFAULT_TOLERANCE};
use crate::{Error, Result};

/// The three Pauli matrices `(sigma_x, sigma_y, sigma_z)`.
#[must_use]
pub fn pauli_matrices() -> [Array2<Complex64>; 3] {
    let zero = Complex64::new(0.0, 0.0);
    let one = Complex64::new(1.0, 0.0);
    let i = Complex64::new(0.0, 1.0);
    [
        arr2(&[[zero, one], [one, zero]]),
        arr2(&[[zero, -i], [i, zero]]),
        arr2(&[[one, zero], [zero, -one]]),
    ]
}

fn pauli_traces(rho: &DensityMatrix) -> Result<[Complex64; 3]> {
    let (rows, cols) = rho.dim();
    if (rows, cols) != (2, 2) {
        return Err(Error::InvalidDensityMatrix(format!(
            "Bloch projection expects a 2x2 matrix, got {rows}x{cols}"
        )));
    }
    let [sx, sy, sz] = pauli_matrices();
    let project = |sigma: &Array2<Complex64>| rho.as_array().dot(sigma).diag().sum();
    Ok([project(&sx), project(&sy), project(&sz)])
}

/// Bloch vector of a validated density matrix.
///
/// Validates with [`DEFAULT_TOLERANCE`], requires every Pauli trace to be
/// real within tolerance, and projects lengths in `(1, 1 + 2*tol]` back
/// onto the unit sphere.
///
/// # Errors
///
/// Returns [`Error::InvalidDensityMatrix`] if `rho` is not 2x2 or fails
/// any physical check.
pub fn to_bloch(rho: &DensityMatrix) -> Result<BlochVector> {
    to_bloch_with_tolerance(rho, DEFAULT_TOLERANCE)
}

/// [`to_bloch`] with an explicit tolerance.
///
/// # Errors
///
/// See [`to_bloch`].
pub fn to_bloch_with_tolerance(rho: &DensityMatrix, tolerance: f64) -> Result<BlochVector> {
    rho.validate(tolerance)?;
    let traces = pauli_traces(rho)?;

    for (axis, trace) in ['x', 'y', 'z'].iter().zip(traces.iter()) {
        if trace.im.abs() > tolerance {
            return Err(Error::InvalidDensityMatrix(format!(
                "Tr(rho * sigma_{axis}) has imaginary part {:e}",
                trace.im
            )));
        }
    }

    let vector = BlochVector::new(traces[0].re, traces[1].re, traces[2].re);
    let norm = vector.norm();
    if norm > 1.0 {
        return Ok(BlochVector::new(vector.x / norm, vector.y / norm, vector.z / norm));
    }
    Ok(vector)
}

/// Bloch vector without the physical checks.
///
/// Only the shape is checked; imaginary remainders are discarded.
///
/// # Errors
///
/// Returns [`Error::InvalidDensityMatrix`] if `rho` is not 2x2.
pub fn to_bloch_unvalidated(rho: &DensityMatrix) -> Result<BlochVector> {
    let [x, y, z] = pauli_traces(rho)?;
    Ok(BlochVector::new(x.re, y.re, z.re))
}

/// Derived artifact a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Self-contained HTML page with an inline SVG sphere and marker.
    BlochSphere,
    /// JSON document with the raw coordinates.
    BlochVector,
}

impl ArtifactKind {
    /// Every known kind, in generation order.
    pub const ALL: [Self; 2] = [Self::BlochSphere, Self::BlochVector];

    /// Artifact name used as the key in a run's artifact mapping.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BlochSphere => "bloch_sphere",
            Self::BlochVector => "bloch_vector",
        }
    }

    /// File extension (without the dot).
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::BlochSphere => "html",
            Self::BlochVector => "json",
        }
    }

    /// MIME content type.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::BlochSphere => "text/html",
            Self::BlochVector => "application/json",
        }
    }

    /// Look up a kind by its artifact name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Render the payload for `vector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinate`] for non-finite coordinates.
    pub fn render(self, vector: &BlochVector, title: &str) -> Result<String> {
        match self {
            Self::BlochSphere => to_artifact(vector.x, vector.y, vector.z, title),
            Self::BlochVector => to_vector_json(vector, title),
        }
    }
}

fn check_finite(x: f64, y: f64, z: f64) -> Result<()> {
    for (axis, value) in [('x', x), ('y', y), ('z', z)] {
        if !value.is_finite() {
            return Err(Error::InvalidCoordinate { axis, value });
        }
    }
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const VIEW: f64 = 400.0;
const RADIUS: f64 = 150.0;
/// Foreshortening of the x axis (points out of the screen).
const DEPTH: f64 = 0.354;

/// Oblique projection of a sphere point to SVG coordinates.
fn project(x: f64, y: f64, z: f64) -> (f64, f64) {
    let c = VIEW / 2.0;
    (c + RADIUS * DEPTH.mul_add(-x, y), c - RADIUS * DEPTH.mul_add(-x, z))
}

/// HTML page with an inline SVG Bloch sphere marking `(x, y, z)`.
///
/// # Errors
///
/// Returns [`Error::InvalidCoordinate`] if any coordinate is NaN or infinite.
pub fn to_artifact(x: f64, y: f64, z: f64, title: &str) -> Result<String> {
    check_finite(x, y, z)?;
    let title = escape_html(title);
    let c = VIEW / 2.0;
    let (px, py) = project(x, y, z);

    let axes: String = [
        ("|+&#x27E9;", (1.0, 0.0, 0.0)),
        ("|+i&#x27E9;", (0.0, 1.0, 0.0)),
        ("|0&#x27E9;", (0.0, 0.0, 1.0)),
        ("|1&#x27E9;", (0.0, 0.0, -1.0)),
    ]
    .into_iter()
    .map(|(label, (ax, ay, az))| {
        let (ex, ey) = project(ax * 1.15, ay * 1.15, az * 1.15);
        let (lx, ly) = project(ax * 1.28, ay * 1.28, az * 1.28);
        format!(
            r##"  <line x1="{c}" y1="{c}" x2="{ex:.2}" y2="{ey:.2}" stroke="#aaa"/>
  <text x="{lx:.2}" y="{ly:.2}" fill="#ddd" font-size="14" text-anchor="middle">{label}</text>
"##
        )
    })
    .collect();
    let ry = RADIUS * DEPTH;
    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {VIEW} {VIEW}" width="{VIEW}" height="{VIEW}">
  <circle cx="{c}" cy="{c}" r="{RADIUS}" fill="#4a90e2" fill-opacity="0.15" stroke="#888"/>
  <ellipse cx="{c}" cy="{c}" rx="{RADIUS}" ry="{ry:.1}" fill="none" stroke="#666" stroke-dasharray="4 3"/>
{axes}  <line x1="{c}" y1="{c}" x2="{px:.2}" y2="{py:.2}" stroke="#ff4444" stroke-width="2"/>
  <circle id="marker" cx="{px:.2}" cy="{py:.2}" r="7" fill="#ff4444" data-x="{x}" data-y="{y}" data-z="{z}"/>
</svg>"##
    );

    Ok(format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body {{ margin: 0; padding: 20px; background: #1a1a1a; color: #fff; font-family: sans-serif; text-align: center; }}
.coord {{ display: inline-block; margin: 0 15px; font-family: monospace; }}
</style>
</head>
<body>
<h1>{title}</h1>
{svg}
<div id="info">
<div class="coord">x = {x:.4}</div>
<div class="coord">y = {y:.4}</div>
<div class="coord">z = {z:.4}</div>
</div>
</body>
</html>
"##
    ))
}

/// JSON document carrying the coordinates and their norm.
///
/// # Errors
///
/// Returns [`Error::InvalidCoordinate`] if any coordinate is NaN or infinite.
pub fn to_vector_json(vector: &BlochVector, title: &str) -> Result<String> {
    check_finite(vector.x, vector.y, vector.z)?;
    let payload = serde_json::json!({
        "title": title,
        "x": vector.x,
        "y": vector.y,
        "z": vector.z,
        "norm": vector.norm(),
    });
    Ok(serde_json::to_string_pretty(&payload)?)
}
