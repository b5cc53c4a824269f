//! NumPy `.npy` codec for density matrices
//!
//! Matrices are written as format version 1.0, dtype `<c16` (little-endian
//! complex128: real then imaginary `f64`), C order. Files load directly
//! with `numpy.load`.
//!
//! ```text
//! \x93NUMPY | 0x01 0x00 | u16 LE header_len | header dict (space padded, '\n') | data
//! ```
//!
//! The preamble plus header is padded to a multiple of 64 bytes.

use std::path::Path;

use ndarray::Array2;
use num_complex::Complex64;

use crate::quantum::DensityMatrix;
use crate::{Error, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;
const DESCR: &str = "<c16";
const ITEM_BYTES: usize = 16;

/// Encode a matrix as `.npy` bytes.
#[must_use]
pub fn encode(rho: &DensityMatrix) -> Vec<u8> {
    let (rows, cols) = rho.dim();
    let dict = format!("{{'descr': '{DESCR}', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");

    let preamble = MAGIC.len() + 2 + 2;
    let unpadded = preamble + dict.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(preamble + header_len + rows * cols * ITEM_BYTES);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    // header_len < 128 for any 2-D shape we write
    out.extend_from_slice(&u16::try_from(header_len).unwrap_or(u16::MAX).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');

    for value in rho.iter() {
        out.extend_from_slice(&value.re.to_le_bytes());
        out.extend_from_slice(&value.im.to_le_bytes());
    }
    out
}

fn corrupt(reason: impl std::fmt::Display) -> Error {
    Error::Persistence(format!("malformed .npy data: {reason}"))
}

/// Value of `key` in a header dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}'");
    let start = header.find(&needle)? + needle.len();
    let rest = header[start..].trim_start().strip_prefix(':')?.trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else if let Some(quoted) = rest.strip_prefix('\'') {
        quoted.find('\'')? + 2
    } else {
        rest.find(&[',', '}'][..]).unwrap_or(rest.len())
    };
    Some(rest[..end].trim())
}

fn parse_shape(literal: &str) -> Option<Vec<usize>> {
    let inner = literal.strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect()
}

/// Decode `.npy` bytes into a matrix.
///
/// Only `(2, 2)` `<c16` arrays in C order are accepted. The matrix is not
/// validated physically.
///
/// # Errors
///
/// Returns [`Error::Persistence`] describing the first malformed element.
pub fn decode(bytes: &[u8]) -> Result<DensityMatrix> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(corrupt("missing magic string"));
    }

    let (header_len, header_start) = match bytes[6] {
        1 => (usize::from(u16::from_le_bytes([bytes[8], bytes[9]])), 10),
        2 | 3 if bytes.len() >= 12 => {
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (usize::try_from(len).map_err(corrupt)?, 12)
        }
        major => return Err(corrupt(format!("unsupported format version {major}"))),
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or_else(|| corrupt("truncated header"))?;
    let header = std::str::from_utf8(header).map_err(corrupt)?;

    match dict_value(header, "descr") {
        Some(descr) if descr.trim_matches('\'') == DESCR => {}
        other => return Err(corrupt(format!("unsupported dtype {other:?}, expected {DESCR}"))),
    }
    if dict_value(header, "fortran_order") != Some("False") {
        return Err(corrupt("only C-order arrays are supported"));
    }
    let shape = dict_value(header, "shape")
        .and_then(parse_shape)
        .ok_or_else(|| corrupt("missing or unreadable shape"))?;
    let [rows, cols] = shape[..] else {
        return Err(corrupt(format!("expected a 2-D array, got shape {shape:?}")));
    };
    if (rows, cols) != (2, 2) {
        return Err(corrupt(format!("expected shape (2, 2), got ({rows}, {cols})")));
    }
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(ITEM_BYTES))
        .ok_or_else(|| corrupt(format!("shape ({rows}, {cols}) overflows")))?;

    let data = &bytes[data_start..];
    if data.len() != expected {
        return Err(corrupt(format!(
            "expected {expected} data bytes for shape ({rows}, {cols}), found {}",
            data.len()
        )));
    }

    let values: Vec<Complex64> = data
        .chunks_exact(ITEM_BYTES)
        .map(|chunk| {
            let mut re = [0u8; 8];
            let mut im = [0u8; 8];
            re.copy_from_slice(&chunk[..8]);
            im.copy_from_slice(&chunk[8..]);
            Complex64::new(f64::from_le_bytes(re), f64::from_le_bytes(im))
        })
        .collect();

    let matrix = Array2::from_shape_vec((rows, cols), values).map_err(corrupt)?;
    Ok(DensityMatrix::from_array(matrix))
}

/// Write a matrix to `path`, flushed and synced before returning.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be created or written.
pub fn write_density_matrix(path: &Path, rho: &DensityMatrix) -> Result<()> {
    Ok(super::layout::write_synced(path, &encode(rho))?)
}

/// Read a matrix from `path`.
///
/// # Errors
///
/// Returns [`Error::Persistence`] if the file is missing, unreadable or
/// malformed.
pub fn read_density_matrix(path: &Path) -> Result<DensityMatrix> {
    let bytes = std::fs::read(path)
        .map_err(|err| Error::Persistence(format!("cannot read {}: {err}", path.display())))?;
    decode(&bytes)
}
