//! edgealloc budgeted path: power budgeting and constrained assignment.
//!
//! [`BudgetGreedyAllocator`] turns a global power budget into a per-server
//! ceiling map; [`ConstrainedAssigner`] places tasks under that map, either
//! exclusively or split across servers.

pub mod assigner;
pub mod flow;
pub mod mud;

pub use assigner::{ConstrainedAssigner, ExclusiveOutcome, SplitOutcome};
pub use flow::{FlowEdge, FlowNetwork, FlowSolution, FlowSolver, SuccessiveShortestPath};
pub use mud::{BudgetGreedyAllocator, BudgetOutcome};
