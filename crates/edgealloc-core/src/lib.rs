//! edgealloc core: data model, power model, and configuration.
//!
//! Shared by every allocator crate. Nothing here performs a search; it
//! defines what a problem instance is, how a server's power draw is
//! modeled, and how results are summarized.
//!
//! # Components
//!
//! - **`types`**: `Task`, `Server`, `Problem`, allocation outputs, budget map
//! - **`power`**: piecewise-linear power curves
//! - **`config`**: `edgealloc.toml` parsing and validation
//! - **`convert`**: dense-array input adapter
//! - **`summary`**: reward/power/load summary
//! - **`cancel`**: cooperative cancellation token

pub mod cancel;
pub mod config;
pub mod convert;
pub mod error;
pub mod power;
pub mod summary;
pub mod types;

pub use cancel::CancelToken;
pub use config::{
    AssignerConfig, BudgetConfig, ColonyConfig, ColonyHeuristic, ObjectiveConfig, SolverConfig,
    SplitStrategy, SwarmConfig,
};
pub use convert::DenseInstance;
pub use error::{ConfigResult, ConfigurationError};
pub use power::{Breakpoint, PowerCurve};
pub use summary::AllocationSummary;
pub use types::*;
