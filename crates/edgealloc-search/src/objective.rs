//! Soft-constraint objective shared by the search allocators.
//!
//! `score = -(reward - latency) + capacity + power + row_overflow`
//! (lower is better). Every breach is scaled by a large weight so that
//! infeasible candidates remain rankable against each other.

use edgealloc_core::{AllocationMatrix, ObjectiveConfig, Problem};
use serde::Serialize;

/// Scores candidate allocations for one problem and power budget.
#[derive(Debug, Clone)]
pub struct ObjectiveEvaluator {
    penalty_weight: f64,
    latency_weight: f64,
    epsilon: f64,
    power_budget: f64,
}

/// Individual objective terms for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub reward: f64,
    pub latency_penalty: f64,
    pub capacity_penalty: f64,
    pub power_penalty: f64,
    pub row_overflow_penalty: f64,
    pub total_power: f64,
    pub score: f64,
}

impl ObjectiveEvaluator {
    pub fn new(config: &ObjectiveConfig, power_budget: f64) -> Self {
        Self {
            penalty_weight: config.penalty_weight,
            latency_weight: config.latency_weight,
            epsilon: config.epsilon,
            power_budget,
        }
    }

    pub fn power_budget(&self) -> f64 {
        self.power_budget
    }

    /// Scalar score; lower is better.
    pub fn evaluate(&self, problem: &Problem, allocation: &AllocationMatrix) -> f64 {
        self.breakdown(problem, allocation).score
    }

    pub fn breakdown(&self, problem: &Problem, allocation: &AllocationMatrix) -> ScoreBreakdown {
        let w = self.penalty_weight;
        let mut reward = 0.0;
        let mut row_overflow = 0.0;
        let mut loads = vec![0.0; problem.server_count()];

        for t in 0..problem.task_count() {
            let demand = problem.demand(t);
            let row = allocation.row(t);
            for (s, &x) in row.iter().enumerate() {
                reward += problem.reward(t, s) * demand * x;
                loads[s] += demand * x;
            }
            row_overflow += (row.iter().sum::<f64>() - 1.0).max(0.0);
        }

        let capacity_overflow: f64 = loads
            .iter()
            .zip(problem.servers())
            .map(|(&load, server)| (load - server.capacity).max(0.0))
            .sum();
        let total_power = problem.total_power(&loads);

        let latency_penalty = self.latency_weight * allocation.active_pairs(self.epsilon) as f64;
        let capacity_penalty = w * capacity_overflow;
        let power_penalty = w * (total_power - self.power_budget).max(0.0);
        let row_overflow_penalty = w * row_overflow;

        ScoreBreakdown {
            reward,
            latency_penalty,
            capacity_penalty,
            power_penalty,
            row_overflow_penalty,
            total_power,
            score: -(reward - latency_penalty)
                + capacity_penalty
                + power_penalty
                + row_overflow_penalty,
        }
    }
}
