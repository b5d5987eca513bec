//! edgealloc search allocators.
//!
//! Two population-based searches over the same soft-constraint objective:
//!
//! - **`swarm`**: particle swarm over fractional matrices (tasks may split)
//! - **`colony`**: ant colony over exclusive placements (one server per task)
//!
//! Both depend on **`objective`** for scoring; the swarm additionally uses
//! **`projection`** to keep each row within `{x ≥ 0, Σx ≤ 1}`.

pub mod colony;
pub mod objective;
pub mod projection;
pub mod swarm;

pub use colony::{ColonyAllocator, ColonyOutcome};
pub use objective::{ObjectiveEvaluator, ScoreBreakdown};
pub use projection::{project, project_in_place, project_matrix};
pub use swarm::{SwarmAllocator, SwarmOutcome};
