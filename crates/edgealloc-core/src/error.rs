//! Construction-time error types.
//!
//! These are the only fatal conditions in edgealloc. Constraint breaches
//! during a solve are scored as penalties, never raised.

use thiserror::Error;

/// Result type alias for validated construction.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Malformed input or configuration rejected before any solve begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("task {task}: demand must be positive and finite, got {demand}")]
    InvalidDemand { task: String, demand: f64 },

    #[error("server {server}: capacity must be positive and finite, got {capacity}")]
    InvalidCapacity { server: String, capacity: f64 },

    #[error("server {server}: idle power must be non-negative and finite, got {idle_power}")]
    InvalidIdlePower { server: String, idle_power: f64 },

    #[error("power curve is empty")]
    EmptyPowerCurve,

    #[error("power curve breakpoint {index}: {reason}")]
    InvalidBreakpoint { index: usize, reason: String },

    #[error("power curve is not strictly increasing at breakpoint {index}")]
    UnsortedPowerCurve { index: usize },

    #[error("task {task}: reward for {server} must be non-negative and finite, got {reward}")]
    InvalidReward { task: String, server: String, reward: f64 },

    #[error("task {task} references unknown server {server}")]
    UnknownServer { task: String, server: String },

    #[error("duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("duplicate server id: {0}")]
    DuplicateServer(String),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ConfigurationError {
    pub fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
