use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named real-valued parameters for one analysis run.
///
/// A fresh set is constructed per run, either from user input or from a
/// preset in the [`catalog`](crate::catalog); evaluators never share
/// parameter state across calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    values: BTreeMap<String, f64>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> EvalResult<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::validation(format!("missing parameter '{name}'")))
    }

    /// Looks up a parameter that the model requires to be strictly
    /// positive (growth rates, capacities, effectiveness coefficients).
    pub fn get_positive(&self, name: &str) -> EvalResult<f64> {
        let value = self.get(name)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(EvalError::validation(format!(
                "parameter '{name}' must be positive, got {value}"
            )))
        }
    }

    pub fn get_non_negative(&self, name: &str) -> EvalResult<f64> {
        let value = self.get(name)?;
        if value >= 0.0 {
            Ok(value)
        } else {
            Err(EvalError::validation(format!(
                "parameter '{name}' must not be negative, got {value}"
            )))
        }
    }

    /// Value with a fallback for optional parameters.
    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.values.get(name).copied().unwrap_or(default)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ParameterSet;
    use crate::error::EvalError;

    #[test]
    fn missing_parameter_is_a_validation_error() {
        let params = ParameterSet::new().with("alpha", 0.01);
        assert!(params.get("alpha").is_ok());
        assert!(matches!(
            params.get("beta"),
            Err(EvalError::Validation(_))
        ));
    }

    #[test]
    fn positivity_is_enforced() {
        let params = ParameterSet::new().with("k", 0.0).with("n", 1000.0);
        assert!(matches!(
            params.get_positive("k"),
            Err(EvalError::Validation(_))
        ));
        assert_eq!(params.get_positive("n").unwrap(), 1000.0);
    }

    #[test]
    fn defaults_cover_optional_parameters() {
        let params = ParameterSet::new();
        assert_eq!(params.get_or("fatigue_blue", 0.0), 0.0);
    }
}
