//! Marginal-utility budgeting (MUD).
//!
//! Greedily commits `(task, server)` pairs in order of reward per watt of
//! incremental power, never breaching a server's capacity or the global
//! power budget. The committed usage per server becomes the ceiling map `Y`
//! handed to the constrained assigner.

use std::collections::BTreeSet;

use edgealloc_core::{
    BudgetConfig, BudgetMap, CAPACITY_EPSILON, CancelToken, ConfigResult, ConfigurationError,
    ExclusiveAssignment, Placement, Problem, cancel::is_cancelled,
};
use tracing::{debug, info, warn};

/// Result of a budgeting pass.
#[derive(Debug, Clone)]
pub struct BudgetOutcome {
    /// Per-server ceiling `Y`.
    pub budget: BudgetMap,
    /// Where the pass itself placed each task.
    pub placements: ExclusiveAssignment,
    /// Modeled draw at the committed usage.
    pub total_power: f64,
    pub cancelled: bool,
}

/// Best candidate found in one sweep.
struct Candidate {
    task: usize,
    server: usize,
    efficiency: f64,
    power_after: f64,
}

/// Derives per-server ceilings under a global power budget.
pub struct BudgetGreedyAllocator<'a> {
    problem: &'a Problem,
    power_budget: f64,
    config: BudgetConfig,
    cancel: Option<CancelToken>,
}

impl<'a> BudgetGreedyAllocator<'a> {
    pub fn new(
        problem: &'a Problem,
        power_budget: f64,
        config: BudgetConfig,
    ) -> ConfigResult<Self> {
        if !power_budget.is_finite() || power_budget < 0.0 {
            return Err(ConfigurationError::parameter(
                "power_budget",
                format!("must be non-negative and finite, got {power_budget}"),
            ));
        }
        Ok(Self {
            problem,
            power_budget,
            config,
            cancel: None,
        })
    }

    /// Poll `token` between commits.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn run(&self) -> BudgetOutcome {
        let p = self.problem;
        let mut usage = vec![0.0; p.server_count()];
        let mut server_power: Vec<f64> = p.servers().iter().map(|s| s.power(0.0)).collect();
        let mut total_power: f64 = server_power.iter().sum();
        let mut unassigned: BTreeSet<usize> = (0..p.task_count()).collect();
        let mut placements = ExclusiveAssignment::unassigned(p);
        let mut cancelled = false;

        if total_power > self.power_budget {
            warn!(
                idle_power = total_power,
                budget = self.power_budget,
                "idle draw already exceeds the power budget"
            );
        }

        while !unassigned.is_empty() {
            if is_cancelled(self.cancel.as_ref()) {
                warn!(committed = p.task_count() - unassigned.len(), "budgeting cancelled");
                cancelled = true;
                break;
            }

            let Some(best) = self.best_candidate(&unassigned, &usage, &server_power, total_power)
            else {
                break;
            };

            let task = &p.tasks()[best.task];
            let server = &p.servers()[best.server];
            usage[best.server] += task.demand;
            server_power[best.server] = best.power_after;
            total_power = server_power.iter().sum();
            unassigned.remove(&best.task);
            placements
                .placements
                .insert(task.id.clone(), Placement::Server(server.id.clone()));

            debug!(
                task = %task.id,
                server = %server.id,
                efficiency = best.efficiency,
                usage = usage[best.server],
                total_power,
                "committed task under power budget"
            );
        }

        if self.config.fill_unused_servers {
            self.fill_unused(&mut usage);
        }

        if !unassigned.is_empty() {
            warn!(
                remaining = unassigned.len(),
                "tasks left without budget; they stay unassigned"
            );
        }
        info!(
            committed = p.task_count() - unassigned.len(),
            total_power,
            budget = self.power_budget,
            "budgeting finished"
        );

        BudgetOutcome {
            budget: BudgetMap::new(usage),
            placements,
            total_power,
            cancelled,
        }
    }

    /// Highest reward-per-watt pair that fits capacity and budget.
    fn best_candidate(
        &self,
        unassigned: &BTreeSet<usize>,
        usage: &[f64],
        server_power: &[f64],
        total_power: f64,
    ) -> Option<Candidate> {
        let p = self.problem;
        let mut best: Option<Candidate> = None;

        for &t in unassigned {
            let demand = p.demand(t);
            for &s in p.candidates(t) {
                let server = &p.servers()[s];
                let next = usage[s] + demand;
                if next > server.capacity + CAPACITY_EPSILON {
                    continue;
                }
                let before = server_power[s];
                let after = server.power_at_load(next);
                let delta = after - before;
                // A ratio against a non-positive delta cannot be ranked.
                if delta <= 0.0 {
                    continue;
                }
                if total_power - before + after > self.power_budget {
                    continue;
                }
                let efficiency = p.reward(t, s) / delta;
                if best.as_ref().is_none_or(|b| efficiency > b.efficiency) {
                    best = Some(Candidate {
                        task: t,
                        server: s,
                        efficiency,
                        power_after: after,
                    });
                }
            }
        }
        best
    }

    /// Give idle servers a ceiling equal to the demand that could reach them.
    fn fill_unused(&self, usage: &mut [f64]) {
        let p = self.problem;
        for (s, ceiling) in usage.iter_mut().enumerate() {
            if *ceiling > 0.0 {
                continue;
            }
            let covered: f64 = (0..p.task_count())
                .filter(|&t| p.covers(t, s))
                .map(|t| p.demand(t))
                .sum();
            *ceiling = covered.min(p.capacity(s));
            debug!(server = %p.servers()[s].id, ceiling = *ceiling, "filled unused server ceiling");
        }
    }
}
