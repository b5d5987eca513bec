//! Ant colony search over exclusive allocations.
//!
//! Every ant walks the tasks in order and picks one covering server per
//! task with probability proportional to `pheromone^α · heuristic^β`,
//! restricted to servers whose residual capacity still fits the task. When
//! that leaves no mass, the choice is uniform over the covering servers and
//! the capacity penalty absorbs the overflow. After each iteration the trail
//! evaporates and the elite ants reinforce their choices.

use edgealloc_core::{
    AllocationMatrix, CAPACITY_EPSILON, CancelToken, ColonyConfig, ColonyHeuristic, ConfigResult,
    ExclusiveAssignment, Problem, cancel::is_cancelled,
};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::objective::ObjectiveEvaluator;

/// Heuristic values are clipped to `[HEURISTIC_FLOOR, 1 / HEURISTIC_FLOOR]`.
const HEURISTIC_FLOOR: f64 = 1e-6;

/// Result of a colony run.
#[derive(Debug, Clone)]
pub struct ColonyOutcome {
    /// Best 0/1 allocation seen across all ants and iterations.
    pub allocation: AllocationMatrix,
    pub assignment: ExclusiveAssignment,
    pub score: f64,
    /// Best score after each completed iteration.
    pub history: Vec<f64>,
    pub iterations: usize,
    pub cancelled: bool,
}

/// One ant's tour: the chosen server per task, if any covers it.
type Tour = Vec<Option<usize>>;

/// Discrete allocator producing an exclusive assignment.
pub struct ColonyAllocator<'a> {
    problem: &'a Problem,
    config: ColonyConfig,
    objective: ObjectiveEvaluator,
    cancel: Option<CancelToken>,
}

impl<'a> ColonyAllocator<'a> {
    pub fn new(
        problem: &'a Problem,
        config: ColonyConfig,
        objective: ObjectiveEvaluator,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            problem,
            config,
            objective,
            cancel: None,
        })
    }

    /// Poll `token` between iterations.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn run(&self) -> ColonyOutcome {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.run_with_rng(&mut rng)
    }

    pub fn run_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> ColonyOutcome {
        let cfg = &self.config;
        let p = self.problem;
        let n = p.server_count();
        let heuristic = self.heuristic();
        let mut pheromone = vec![1.0; p.task_count() * n];
        let elites = cfg.elite_count();

        let mut best: Option<(AllocationMatrix, f64)> = None;
        let mut history = Vec::with_capacity(cfg.iterations);
        let mut cancelled = false;

        for iteration in 0..cfg.iterations {
            if is_cancelled(self.cancel.as_ref()) {
                warn!(iteration, "colony search cancelled");
                cancelled = true;
                break;
            }

            let tours: Vec<Tour> = (0..cfg.ants)
                .map(|_| self.construct(&pheromone, &heuristic, rng))
                .collect();
            let solutions: Vec<AllocationMatrix> =
                tours.iter().map(|t| self.to_matrix(t)).collect();
            let scores: Vec<f64> = solutions
                .par_iter()
                .map(|x| self.objective.evaluate(p, x))
                .collect();

            for (solution, &score) in solutions.iter().zip(&scores) {
                if best.as_ref().is_none_or(|(_, b)| score < *b) {
                    best = Some((solution.clone(), score));
                    debug!(iteration, score, "colony best improved");
                }
            }

            for tau in pheromone.iter_mut() {
                *tau *= cfg.retention;
            }
            let mut ranked: Vec<usize> = (0..tours.len()).collect();
            ranked.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
            for &ant in ranked.iter().take(elites) {
                let bonus = cfg.deposit / (1.0 + scores[ant].max(0.0));
                for (t, choice) in tours[ant].iter().enumerate() {
                    if let Some(s) = choice {
                        pheromone[t * n + s] += bonus;
                    }
                }
            }

            if let Some((_, score)) = &best {
                history.push(*score);
            }
        }

        let (allocation, score) = best.unwrap_or_else(|| {
            let empty = AllocationMatrix::for_problem(p);
            let score = self.objective.evaluate(p, &empty);
            (empty, score)
        });
        let assignment = allocation.to_exclusive(p);
        let unassigned = assignment.unassigned_tasks().count();
        if unassigned > 0 {
            warn!(unassigned, "colony left tasks without a covering server unassigned");
        }
        info!(
            iterations = history.len(),
            ants = cfg.ants,
            score,
            cancelled,
            "colony search finished"
        );

        ColonyOutcome {
            allocation,
            assignment,
            score,
            iterations: history.len(),
            history,
            cancelled,
        }
    }

    /// Row-major heuristic desirability table.
    fn heuristic(&self) -> Vec<f64> {
        let p = self.problem;
        let mut table = Vec::with_capacity(p.task_count() * p.server_count());
        for t in 0..p.task_count() {
            for s in 0..p.server_count() {
                let denominator = match self.config.heuristic {
                    ColonyHeuristic::CapacityOrDemand => p.capacity(s).max(p.demand(t)),
                    ColonyHeuristic::Capacity => p.capacity(s),
                };
                let h = p.reward(t, s) / denominator;
                table.push(h.clamp(HEURISTIC_FLOOR, 1.0 / HEURISTIC_FLOOR));
            }
        }
        table
    }

    /// Build one exclusive tour.
    fn construct<R: Rng + ?Sized>(
        &self,
        pheromone: &[f64],
        heuristic: &[f64],
        rng: &mut R,
    ) -> Tour {
        let p = self.problem;
        let n = p.server_count();
        let cfg = &self.config;
        let mut residual: Vec<f64> = p.servers().iter().map(|s| s.capacity).collect();
        let mut tour = vec![None; p.task_count()];
        let mut weights = Vec::with_capacity(n);
        let mut fitting = Vec::with_capacity(n);

        for (t, slot) in tour.iter_mut().enumerate() {
            let candidates = p.candidates(t);
            if candidates.is_empty() {
                continue;
            }
            let demand = p.demand(t);

            fitting.clear();
            fitting.extend(
                (0..candidates.len())
                    .filter(|&i| residual[candidates[i]] + CAPACITY_EPSILON >= demand),
            );

            weights.clear();
            weights.extend(candidates.iter().map(|&s| {
                if residual[s] + CAPACITY_EPSILON < demand {
                    return 0.0;
                }
                let tau = pheromone[t * n + s].powf(cfg.alpha);
                let w = tau * heuristic[t * n + s].powf(cfg.beta);
                if w.is_finite() && w > 0.0 { w } else { 0.0 }
            }));
            let total: f64 = weights.iter().sum();

            let dist = if total > 0.0 && total.is_finite() {
                WeightedIndex::<f64>::new(&weights).ok()
            } else {
                None
            };
            // Without mass, prefer servers that still fit, then any candidate.
            let pick = match dist {
                Some(dist) => dist.sample(rng),
                None if !fitting.is_empty() => fitting[rng.gen_range(0..fitting.len())],
                None => rng.gen_range(0..candidates.len()),
            };

            let s = candidates[pick];
            residual[s] -= demand;
            *slot = Some(s);
        }
        tour
    }

    fn to_matrix(&self, tour: &Tour) -> AllocationMatrix {
        let mut m = AllocationMatrix::for_problem(self.problem);
        for (t, choice) in tour.iter().enumerate() {
            if let Some(s) = *choice {
                m.set(t, s, 1.0);
            }
        }
        m
    }
}
