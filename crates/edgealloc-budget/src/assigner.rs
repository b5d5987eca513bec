//! Final placement against a per-server ceiling map `Y`.
//!
//! Three passes share one contract: no server ever carries more than its
//! ceiling, and a task that cannot be placed is reported as unassigned.
//!
//! - [`ConstrainedAssigner::assign_exclusive`]: each task lands wholly on one
//!   server (EAA-NTS).
//! - [`ConstrainedAssigner::greedy_fill`]: demand is split across servers by
//!   draining residual ceilings in reward-per-unit order (EAA-TS, greedy).
//! - [`ConstrainedAssigner::min_cost_flow`]: demand is split by a
//!   minimum-cost maximum flow (EAA-TS, exact for the linear relaxation).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use edgealloc_core::{
    AllocationMatrix, BudgetMap, CAPACITY_EPSILON, CancelToken, ConfigResult, ConfigurationError,
    ExclusiveAssignment, Placement, Problem, SplitStrategy, TaskId, cancel::is_cancelled,
};
use tracing::{debug, info, warn};

use crate::flow::{FLOW_EPSILON, FlowNetwork, FlowSolver, SuccessiveShortestPath};

/// Result of an exclusive assignment.
#[derive(Debug, Clone)]
pub struct ExclusiveOutcome {
    pub assignment: ExclusiveAssignment,
    /// Ceiling left on each server.
    pub residual: BudgetMap,
    pub cancelled: bool,
}

/// Result of a splittable assignment.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    /// Fraction of each task's demand placed on each server.
    pub allocation: AllocationMatrix,
    /// Demand left unplaced, only for tasks with some shortfall.
    pub unmet_demand: BTreeMap<TaskId, f64>,
    pub cancelled: bool,
}

/// Places tasks under a fixed ceiling map.
pub struct ConstrainedAssigner<'a> {
    problem: &'a Problem,
    budget: &'a BudgetMap,
    cancel: Option<CancelToken>,
}

impl<'a> ConstrainedAssigner<'a> {
    pub fn new(problem: &'a Problem, budget: &'a BudgetMap) -> ConfigResult<Self> {
        if budget.as_slice().len() != problem.server_count() {
            return Err(ConfigurationError::Shape(format!(
                "budget has {} ceilings for {} servers",
                budget.as_slice().len(),
                problem.server_count()
            )));
        }
        if let Some(bad) = budget.as_slice().iter().find(|y| !y.is_finite() || **y < 0.0) {
            return Err(ConfigurationError::parameter(
                "budget",
                format!("ceilings must be non-negative and finite, got {bad}"),
            ));
        }
        Ok(Self {
            problem,
            budget,
            cancel: None,
        })
    }

    /// Poll `token` between task commits.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Exclusive placement in descending order of best achievable reward.
    pub fn assign_exclusive(&self) -> ExclusiveOutcome {
        let p = self.problem;
        let mut residual = self.budget.as_slice().to_vec();
        let mut assignment = ExclusiveAssignment::unassigned(p);
        let mut cancelled = false;

        let mut order: Vec<usize> = (0..p.task_count()).collect();
        order.sort_by(|&a, &b| descending(p.best_reward(a), p.best_reward(b)));

        for t in order {
            if is_cancelled(self.cancel.as_ref()) {
                warn!("exclusive assignment cancelled");
                cancelled = true;
                break;
            }

            let task = &p.tasks()[t];
            let chosen = self
                .servers_by_reward(t)
                .into_iter()
                .find(|&s| residual[s] + CAPACITY_EPSILON >= task.demand);

            match chosen {
                Some(s) => {
                    residual[s] = (residual[s] - task.demand).max(0.0);
                    let server = &p.servers()[s];
                    assignment
                        .placements
                        .insert(task.id.clone(), Placement::Server(server.id.clone()));
                    debug!(
                        task = %task.id,
                        server = %server.id,
                        residual = residual[s],
                        "task placed"
                    );
                }
                None => {
                    debug!(task = %task.id, demand = task.demand, "no covering server has room");
                }
            }
        }

        let unplaced = p.task_count() - assignment.assigned_count();
        if unplaced > 0 {
            warn!(unassigned = unplaced, "tasks left unassigned");
        }
        info!(
            assigned = assignment.assigned_count(),
            cancelled,
            "exclusive assignment finished"
        );

        ExclusiveOutcome {
            assignment,
            residual: BudgetMap::new(residual),
            cancelled,
        }
    }

    /// Splittable placement using the selected strategy.
    pub fn assign_split(&self, strategy: SplitStrategy) -> SplitOutcome {
        match strategy {
            SplitStrategy::GreedyFill => self.greedy_fill(),
            SplitStrategy::MinCostFlow => self.min_cost_flow(),
        }
    }

    /// Drain residual ceilings in descending reward-per-unit order.
    pub fn greedy_fill(&self) -> SplitOutcome {
        let p = self.problem;
        let mut residual = self.budget.as_slice().to_vec();
        let mut allocation = AllocationMatrix::for_problem(p);
        let mut unmet_demand = BTreeMap::new();
        let mut cancelled = false;

        let per_unit = |t: usize| p.best_reward(t) / p.demand(t);
        let mut order: Vec<usize> = (0..p.task_count()).collect();
        order.sort_by(|&a, &b| descending(per_unit(a), per_unit(b)));

        for (visited, &t) in order.iter().enumerate() {
            if is_cancelled(self.cancel.as_ref()) {
                warn!("greedy fill cancelled");
                cancelled = true;
                for &rest in &order[visited..] {
                    let task = &p.tasks()[rest];
                    unmet_demand.insert(task.id.clone(), task.demand);
                }
                break;
            }

            let task = &p.tasks()[t];
            let mut remaining = task.demand;
            for s in self.servers_by_reward(t) {
                if remaining <= CAPACITY_EPSILON {
                    break;
                }
                let take = remaining.min(residual[s]);
                if take <= CAPACITY_EPSILON {
                    continue;
                }
                residual[s] -= take;
                remaining -= take;
                allocation.set(t, s, take / task.demand);
                debug!(
                    task = %task.id,
                    server = %p.servers()[s].id,
                    amount = take,
                    "demand drained"
                );
            }

            if remaining > CAPACITY_EPSILON {
                unmet_demand.insert(task.id.clone(), remaining);
            }
        }

        self.finish_split("greedy fill", allocation, unmet_demand, cancelled)
    }

    /// Minimum-cost maximum flow with the built-in solver.
    pub fn min_cost_flow(&self) -> SplitOutcome {
        self.min_cost_flow_with(&SuccessiveShortestPath::default())
    }

    /// Minimum-cost maximum flow with a caller-supplied solver.
    ///
    /// Nodes: source `0`, tasks `1..=T`, servers `T+1..=T+S`, sink `T+S+1`.
    /// Task→server arcs exist only for covering servers and cost the
    /// negated reward per unit of demand.
    pub fn min_cost_flow_with(&self, solver: &dyn FlowSolver) -> SplitOutcome {
        let p = self.problem;
        let (tasks, servers) = (p.task_count(), p.server_count());
        let source = 0;
        let sink = tasks + servers + 1;

        if is_cancelled(self.cancel.as_ref()) {
            warn!("flow assignment cancelled");
            return self.all_unassigned(true);
        }

        let mut network = FlowNetwork::new(tasks + servers + 2);
        let mut pair_edges = Vec::new();
        for t in 0..tasks {
            let demand = p.demand(t);
            network.add_edge(source, 1 + t, demand, 0.0);
            for &s in p.candidates(t) {
                let edge = network.add_edge(1 + t, 1 + tasks + s, demand, -p.reward(t, s) / demand);
                pair_edges.push((t, s, edge));
            }
        }
        for s in 0..servers {
            network.add_edge(1 + tasks + s, sink, self.budget.get(s), 0.0);
        }

        let Some(solution) = solver.solve(&network, source, sink) else {
            warn!("flow solver failed, returning all tasks unassigned");
            return self.all_unassigned(false);
        };

        let mut allocation = AllocationMatrix::for_problem(p);
        let mut placed = vec![0.0; tasks];
        for &(t, s, edge) in &pair_edges {
            let flow = solution.flows[edge];
            if flow > FLOW_EPSILON {
                allocation.set(t, s, flow / p.demand(t));
                placed[t] += flow;
            }
        }

        let unmet_demand = p
            .tasks()
            .iter()
            .zip(&placed)
            .filter_map(|(task, &flow)| {
                let short = task.demand - flow;
                (short > CAPACITY_EPSILON).then(|| (task.id.clone(), short))
            })
            .collect();

        debug!(
            total_flow = solution.total_flow,
            total_cost = solution.total_cost,
            "flow assignment solved"
        );
        self.finish_split("flow assignment", allocation, unmet_demand, false)
    }

    /// Covering servers of `task`, highest reward first; ties keep server order.
    fn servers_by_reward(&self, task: usize) -> Vec<usize> {
        let mut servers = self.problem.candidates(task).to_vec();
        let reward = |s: usize| self.problem.reward(task, s);
        servers.sort_by(|&a, &b| descending(reward(a), reward(b)));
        servers
    }

    fn all_unassigned(&self, cancelled: bool) -> SplitOutcome {
        SplitOutcome {
            allocation: AllocationMatrix::for_problem(self.problem),
            unmet_demand: self
                .problem
                .tasks()
                .iter()
                .map(|t| (t.id.clone(), t.demand))
                .collect(),
            cancelled,
        }
    }

    fn finish_split(
        &self,
        pass: &str,
        allocation: AllocationMatrix,
        unmet_demand: BTreeMap<TaskId, f64>,
        cancelled: bool,
    ) -> SplitOutcome {
        if !unmet_demand.is_empty() {
            warn!(pass, short_tasks = unmet_demand.len(), "demand left unplaced");
        }
        info!(pass, cancelled, "splittable assignment finished");
        SplitOutcome {
            allocation,
            unmet_demand,
            cancelled,
        }
    }
}

/// Descending order for a stable sort, so equal values keep input order.
fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
