//! Strategy dispatch over one problem instance.

use std::collections::BTreeMap;

use edgealloc_budget::{BudgetGreedyAllocator, BudgetOutcome, ConstrainedAssigner};
use edgealloc_core::{AllocationSummary, CancelToken, Problem, SolverConfig};
use edgealloc_search::{ColonyAllocator, ObjectiveEvaluator, SwarmAllocator};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SolveError, SolveResult};
use crate::report::{ReportedAllocation, SolveReport};

/// Which allocation path to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Swarm,
    Colony,
    BudgetedExclusive,
    BudgetedSplit,
}

/// Runs allocation strategies against a validated configuration.
pub struct Solver<'a> {
    problem: &'a Problem,
    config: SolverConfig,
    cancel: Option<CancelToken>,
}

impl<'a> Solver<'a> {
    pub fn new(problem: &'a Problem, config: SolverConfig) -> SolveResult<Self> {
        config.validate()?;
        Ok(Self {
            problem,
            config,
            cancel: None,
        })
    }

    /// Share `token` with every allocator this solver runs.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn run(&self, strategy: Strategy) -> SolveResult<SolveReport> {
        info!(
            strategy = ?strategy,
            tasks = self.problem.task_count(),
            servers = self.problem.server_count(),
            power_budget = self.config.power_budget,
            "solve started"
        );
        let report = match strategy {
            Strategy::Swarm => self.run_swarm()?,
            Strategy::Colony => self.run_colony()?,
            Strategy::BudgetedExclusive => self.run_budgeted_exclusive()?,
            Strategy::BudgetedSplit => self.run_budgeted_split()?,
        };
        info!(
            strategy = ?strategy,
            total_reward = report.summary.total_reward,
            total_power = report.summary.total_power,
            cancelled = report.cancelled,
            "solve finished"
        );
        Ok(report)
    }

    /// Run only the power-budgeting pass.
    pub fn budget(&self) -> SolveResult<BudgetOutcome> {
        let mut allocator = BudgetGreedyAllocator::new(
            self.problem,
            self.config.power_budget,
            self.config.budget.clone(),
        )?;
        if let Some(token) = &self.cancel {
            allocator = allocator.with_cancel(token.clone());
        }
        Ok(allocator.run())
    }

    fn objective(&self) -> ObjectiveEvaluator {
        ObjectiveEvaluator::new(&self.config.objective, self.config.power_budget)
    }

    fn run_swarm(&self) -> SolveResult<SolveReport> {
        let mut allocator =
            SwarmAllocator::new(self.problem, self.config.swarm.clone(), self.objective())?;
        if let Some(token) = &self.cancel {
            allocator = allocator.with_cancel(token.clone());
        }
        let outcome = allocator.run();
        Ok(SolveReport {
            strategy: Strategy::Swarm,
            summary: AllocationSummary::from_matrix(self.problem, &outcome.allocation),
            allocation: ReportedAllocation::Split(outcome.allocation),
            score: Some(outcome.score),
            budget: None,
            unmet_demand: BTreeMap::new(),
            cancelled: outcome.cancelled,
        })
    }

    fn run_colony(&self) -> SolveResult<SolveReport> {
        let mut allocator =
            ColonyAllocator::new(self.problem, self.config.colony.clone(), self.objective())?;
        if let Some(token) = &self.cancel {
            allocator = allocator.with_cancel(token.clone());
        }
        let outcome = allocator.run();
        Ok(SolveReport {
            strategy: Strategy::Colony,
            summary: AllocationSummary::from_exclusive(self.problem, &outcome.assignment),
            allocation: ReportedAllocation::Exclusive(outcome.assignment),
            score: Some(outcome.score),
            budget: None,
            unmet_demand: BTreeMap::new(),
            cancelled: outcome.cancelled,
        })
    }

    fn run_budgeted_exclusive(&self) -> SolveResult<SolveReport> {
        let budgeted = self.budget()?;
        let outcome = self.assigner(&budgeted)?.assign_exclusive();
        Ok(SolveReport {
            strategy: Strategy::BudgetedExclusive,
            summary: AllocationSummary::from_exclusive(self.problem, &outcome.assignment),
            allocation: ReportedAllocation::Exclusive(outcome.assignment),
            score: None,
            budget: Some(budgeted.budget.to_map(self.problem)),
            unmet_demand: BTreeMap::new(),
            cancelled: budgeted.cancelled || outcome.cancelled,
        })
    }

    fn run_budgeted_split(&self) -> SolveResult<SolveReport> {
        let strategy = self
            .config
            .assigner
            .split_strategy
            .ok_or(SolveError::MissingSplitStrategy)?;
        let budgeted = self.budget()?;
        let outcome = self.assigner(&budgeted)?.assign_split(strategy);
        Ok(SolveReport {
            strategy: Strategy::BudgetedSplit,
            summary: AllocationSummary::from_matrix(self.problem, &outcome.allocation),
            allocation: ReportedAllocation::Split(outcome.allocation),
            score: None,
            budget: Some(budgeted.budget.to_map(self.problem)),
            unmet_demand: outcome.unmet_demand,
            cancelled: budgeted.cancelled || outcome.cancelled,
        })
    }

    fn assigner<'b>(&'b self, budgeted: &'b BudgetOutcome) -> SolveResult<ConstrainedAssigner<'b>> {
        let mut assigner = ConstrainedAssigner::new(self.problem, &budgeted.budget)?;
        if let Some(token) = &self.cancel {
            assigner = assigner.with_cancel(token.clone());
        }
        Ok(assigner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgealloc_core::{PowerCurve, Server, SplitStrategy, Task};

    fn make_problem() -> Problem {
        let servers = vec![
            Server::new("s1", 10.0, 5.0, PowerCurve::constant(20.0).unwrap()),
            Server::new("s2", 10.0, 5.0, PowerCurve::constant(30.0).unwrap()),
        ];
        let tasks = vec![
            Task::new("a", 4.0).covering("s1", 3.0).covering("s2", 5.0),
            Task::new("b", 3.0).covering("s1", 2.0),
        ];
        Problem::new(tasks, servers).unwrap()
    }

    fn fast_config() -> SolverConfig {
        let mut config = SolverConfig::with_budget(100.0);
        config.swarm.population = 6;
        config.swarm.iterations = 10;
        config.colony.ants = 6;
        config.colony.iterations = 10;
        config
    }

    #[test]
    fn strategy_names_come_from_serde() {
        let json = serde_json::to_string(&Strategy::BudgetedSplit).unwrap();
        assert_eq!(json, "\"budgeted_split\"");
        let back: Strategy = serde_json::from_str("\"colony\"").unwrap();
        assert_eq!(back, Strategy::Colony);
    }

    #[test]
    fn rejects_invalid_config() {
        let p = make_problem();
        let config = SolverConfig::with_budget(-1.0);
        assert!(matches!(Solver::new(&p, config), Err(SolveError::Configuration(_))));
    }

    #[test]
    fn budgeted_split_requires_explicit_strategy() {
        let p = make_problem();
        let solver = Solver::new(&p, fast_config()).unwrap();
        assert!(matches!(
            solver.run(Strategy::BudgetedSplit),
            Err(SolveError::MissingSplitStrategy)
        ));
    }

    #[test]
    fn report_shape_follows_strategy() {
        let p = make_problem();
        let mut config = fast_config();
        config.assigner.split_strategy = Some(SplitStrategy::GreedyFill);
        let solver = Solver::new(&p, config).unwrap();

        let swarm = solver.run(Strategy::Swarm).unwrap();
        assert!(swarm.allocation.as_split().is_some());
        assert!(swarm.score.is_some());
        assert!(swarm.budget.is_none());

        let colony = solver.run(Strategy::Colony).unwrap();
        assert!(colony.allocation.as_exclusive().is_some());

        let exclusive = solver.run(Strategy::BudgetedExclusive).unwrap();
        assert!(exclusive.allocation.as_exclusive().is_some());
        assert!(exclusive.score.is_none());
        assert_eq!(exclusive.budget.as_ref().map(BTreeMap::len), Some(2));

        let split = solver.run(Strategy::BudgetedSplit).unwrap();
        assert!(split.allocation.as_split().is_some());
    }

    #[test]
    fn cancelled_token_flags_every_strategy() {
        let p = make_problem();
        let mut config = fast_config();
        config.assigner.split_strategy = Some(SplitStrategy::MinCostFlow);
        let token = CancelToken::new();
        token.cancel();
        let solver = Solver::new(&p, config).unwrap().with_cancel(token);
        for strategy in [
            Strategy::Swarm,
            Strategy::Colony,
            Strategy::BudgetedExclusive,
            Strategy::BudgetedSplit,
        ] {
            assert!(solver.run(strategy).unwrap().cancelled, "{strategy:?}");
        }
    }
}
