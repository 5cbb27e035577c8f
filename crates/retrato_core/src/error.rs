use thiserror::Error;

/// Failures surfaced by the evaluation layer.
///
/// `Validation` covers malformed requests (bad ranges, unknown
/// symbols, non-physical parameters) and is raised before any numerics
/// run. The remaining variants are numerical outcomes.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{0}")]
    Validation(String),

    /// The field evaluated to a non-finite value at `t`.
    #[error("field left its domain at t = {t}: {detail}")]
    Domain { t: f64, detail: String },

    /// Observation data that no logistic curve can pass through.
    #[error("invalid observations: {0}")]
    InvalidObservations(String),

    #[error("fit did not converge after {iterations} iterations (residual {residual:.3e})")]
    FitDidNotConverge { iterations: usize, residual: f64 },
}

impl EvalError {
    pub fn validation(detail: impl Into<String>) -> Self {
        EvalError::Validation(detail.into())
    }

    pub fn observations(detail: impl Into<String>) -> Self {
        EvalError::InvalidObservations(detail.into())
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
