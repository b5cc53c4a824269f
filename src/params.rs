//! Flat primitive parameter mapping
//!
//! Experiment parameters are a flat mapping from string keys to one of four
//! primitive kinds: booleans, 64-bit integers, finite 64-bit floats and
//! strings. Nothing else is accepted, so what goes into the catalog's
//! `params` column is exactly what comes back out.
//!
//! ## Catalog Encoding
//!
//! ```text
//! {"shots": 1024, "theta": 1.5707963267948966, "label": "sweep", "tag": true}
//! ```
//!
//! Integers and floats stay distinct across the round-trip (`2` vs `2.0`).
//! Non-finite floats have no JSON form and are rejected at encode time.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Free-form key-value metadata attached to a run.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A single primitive parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Finite float
    Float(f64),
    /// UTF-8 string
    Str(String),
}

impl ParamValue {
    /// Numeric view of the value; integers widen to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Human-readable kind, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Flat parameter mapping handed to an experiment builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Create an empty parameter mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamValue> {
        self.0.iter()
    }

    /// Numeric parameter that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming `key` if it is missing,
    /// not numeric, or not finite.
    pub fn require_f64(&self, key: &str) -> Result<f64> {
        self.f64_opt(key)?
            .ok_or_else(|| Error::invalid_parameter(key, "required parameter is missing"))
    }

    /// Numeric parameter with a default when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `key` is present but not a
    /// finite number.
    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.f64_opt(key)?.unwrap_or(default))
    }

    fn f64_opt(&self, key: &str) -> Result<Option<f64>> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        let number = value.as_f64().ok_or_else(|| {
            Error::invalid_parameter(key, format!("expected a number, got {}", value.kind()))
        })?;
        if !number.is_finite() {
            return Err(Error::invalid_parameter(key, format!("expected a finite number, got {number}")));
        }
        Ok(Some(number))
    }

    /// Encode for the catalog's `params` column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for non-finite floats, which
    /// cannot be represented without loss.
    pub fn to_json(&self) -> Result<String> {
        for (key, value) in &self.0 {
            if let ParamValue::Float(v) = value {
                if !v.is_finite() {
                    return Err(Error::invalid_parameter(
                        key.clone(),
                        format!("non-finite float {v} cannot be stored"),
                    ));
                }
            }
        }
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Decode the catalog's `params` column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the text is not a flat mapping of
    /// primitive values.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_json_keeps_int_and_float_distinct() {
        let params = Params::new().with("n", 2).with("theta", 2.0).with("on", true).with("label", "a");
        let json = params.to_json().unwrap();
        let decoded = Params::from_json(&json).unwrap();

        assert_eq!(decoded, params);
        assert_eq!(decoded.get("n"), Some(&ParamValue::Int(2)));
        assert_eq!(decoded.get("theta"), Some(&ParamValue::Float(2.0)));
    }

    #[test]
    fn test_params_reject_non_finite_on_encode() {
        let params = Params::new().with("theta", f64::NAN);
        match params.to_json() {
            Err(Error::InvalidParameter { key, .. }) => assert_eq!(key, "theta"),
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_require_f64_missing_and_mistyped() {
        let params = Params::new().with("label", "x");

        assert!(matches!(
            params.require_f64("theta"),
            Err(Error::InvalidParameter { ref key, .. }) if key == "theta"
        ));
        assert!(matches!(
            params.require_f64("label"),
            Err(Error::InvalidParameter { ref key, .. }) if key == "label"
        ));
    }

    #[test]
    fn test_f64_or_widens_integers() {
        let params = Params::new().with("theta", 3);
        assert!((params.f64_or("theta", 0.0).unwrap() - 3.0).abs() < f64::EPSILON);
        assert!((params.f64_or("phi", 0.5).unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_json_rejects_nested_values() {
        assert!(Params::from_json(r#"{"a": [1, 2]}"#).is_err());
    }
}
