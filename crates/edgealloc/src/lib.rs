//! edgealloc: power-aware task placement for edge servers.
//!
//! Runs one of four allocation strategies over a validated [`Problem`]:
//!
//! - **`Swarm`**: particle swarm, splittable
//! - **`Colony`**: ant colony, exclusive
//! - **`BudgetedExclusive`**: power budgeting, then exclusive assignment
//! - **`BudgetedSplit`**: power budgeting, then splittable assignment
//!
//! # Architecture
//!
//! ```text
//! Solver
//!   ├── edgealloc-search (SwarmAllocator, ColonyAllocator, ObjectiveEvaluator)
//!   ├── edgealloc-budget (BudgetGreedyAllocator → ConstrainedAssigner)
//!   └── SolveReport (allocation + reward/power summary, JSON)
//! ```

pub mod error;
pub mod report;
pub mod solver;

pub use edgealloc_budget::BudgetOutcome;
pub use edgealloc_core::{
    AllocationMatrix, AllocationSummary, BudgetMap, CancelToken, ExclusiveAssignment, Placement,
    PowerCurve, Problem, Server, SolverConfig, SplitStrategy, Task,
};
pub use error::{SolveError, SolveResult};
pub use report::{ReportedAllocation, SolveReport};
pub use solver::{Solver, Strategy};
