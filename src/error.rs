//! Error kinds shared by the factory and belts engines.
//!
//! Malformed input and solver failure are both hard errors (non-zero exit
//! at the CLI boundary); infeasibility is a domain outcome reported as a
//! normal `"status":"infeasible"` response, never as an `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("solver failed during {phase} phase: {reason}")]
    SolverFailure { phase: &'static str, reason: String },
}

impl PlannerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PlannerError::InvalidInput(msg.into())
    }

    pub fn solver(phase: &'static str, reason: impl Into<String>) -> Self {
        PlannerError::SolverFailure {
            phase,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
