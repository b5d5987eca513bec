//! Reward and power summary handed to external reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{AllocationMatrix, ExclusiveAssignment, Problem, ServerId};

/// Aggregate outcome of an allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    /// `Σ reward[t][s] · demand[t] · x[t][s]`.
    pub total_reward: f64,
    /// Modeled draw across all servers, idle ones included.
    pub total_power: f64,
    /// Demand-weighted load per server.
    pub per_server_load: BTreeMap<ServerId, f64>,
}

impl AllocationSummary {
    pub fn from_matrix(problem: &Problem, allocation: &AllocationMatrix) -> Self {
        let loads = problem.loads(allocation);
        let mut total_reward = 0.0;
        for t in 0..problem.task_count() {
            let demand = problem.demand(t);
            for (s, &x) in allocation.row(t).iter().enumerate() {
                total_reward += problem.reward(t, s) * demand * x;
            }
        }

        Self {
            total_reward,
            total_power: problem.total_power(&loads),
            per_server_load: problem
                .servers()
                .iter()
                .zip(&loads)
                .map(|(server, &load)| (server.id.clone(), load))
                .collect(),
        }
    }

    pub fn from_exclusive(problem: &Problem, assignment: &ExclusiveAssignment) -> Self {
        Self::from_matrix(problem, &assignment.to_matrix(problem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::PowerCurve;
    use crate::types::{Placement, Server, Task};

    fn sample_problem() -> Problem {
        let servers = vec![
            Server::new("s1", 10.0, 50.0, PowerCurve::constant(150.0).unwrap()),
            Server::new("s2", 20.0, 60.0, PowerCurve::constant(160.0).unwrap()),
        ];
        let tasks = vec![
            Task::new("a", 5.0).covering("s1", 2.0).covering("s2", 3.0),
            Task::new("b", 10.0).covering("s2", 1.0),
        ];
        Problem::new(tasks, servers).unwrap()
    }

    #[test]
    fn empty_allocation_draws_idle_power() {
        let p = sample_problem();
        let summary = AllocationSummary::from_matrix(&p, &AllocationMatrix::for_problem(&p));
        assert_eq!(summary.total_reward, 0.0);
        assert_eq!(summary.total_power, 110.0);
        assert_eq!(summary.per_server_load.get("s1"), Some(&0.0));
    }

    #[test]
    fn reward_and_load_follow_fractions() {
        let p = sample_problem();
        let mut x = AllocationMatrix::for_problem(&p);
        x.set(0, 0, 1.0);
        x.set(1, 1, 0.5);
        let summary = AllocationSummary::from_matrix(&p, &x);
        // 2·5·1 + 1·10·0.5
        assert_eq!(summary.total_reward, 15.0);
        assert_eq!(summary.per_server_load.get("s1"), Some(&5.0));
        assert_eq!(summary.per_server_load.get("s2"), Some(&5.0));
        // s1 at 50%: 150·0.5 + 50·0.5; s2 at 25%: 160·0.25 + 60·0.75
        assert!((summary.total_power - (100.0 + 85.0)).abs() < 1e-9);
    }

    #[test]
    fn exclusive_summary_matches_matrix() {
        let p = sample_problem();
        let mut assignment = ExclusiveAssignment::unassigned(&p);
        assignment
            .placements
            .insert("a".into(), Placement::Server("s2".into()));
        let summary = AllocationSummary::from_exclusive(&p, &assignment);
        assert_eq!(summary.total_reward, 15.0);
        assert_eq!(summary.per_server_load.get("s2"), Some(&5.0));
    }
}
