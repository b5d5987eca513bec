//! Solver error types.

use edgealloc_core::ConfigurationError;
use thiserror::Error;

/// Errors returned by [`crate::Solver`].
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("budgeted split requires assigner.split_strategy to be set")]
    MissingSplitStrategy,
}

pub type SolveResult<T> = Result<T, SolveError>;
