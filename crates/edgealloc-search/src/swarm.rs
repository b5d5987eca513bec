//! Particle swarm search over splittable allocations.
//!
//! Each particle is a full `tasks × servers` matrix. After every move the
//! position is clipped to `[0, 1]`, masked to covering servers, and each row
//! is projected onto `{x ≥ 0, Σx ≤ 1}`. Fitness evaluation runs in parallel;
//! every random draw comes from one seeded generator, in a fixed order, so a
//! run is reproducible from its seed.

use edgealloc_core::{
    AllocationMatrix, CancelToken, ConfigResult, Problem, SwarmConfig, cancel::is_cancelled,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::objective::ObjectiveEvaluator;
use crate::projection::project_in_place;

/// Bound on the initial per-cell velocity.
const INITIAL_VELOCITY: f64 = 0.1;

/// Result of a swarm run.
#[derive(Debug, Clone)]
pub struct SwarmOutcome {
    /// Global-best allocation.
    pub allocation: AllocationMatrix,
    pub score: f64,
    /// Global-best score after each completed iteration.
    pub history: Vec<f64>,
    pub iterations: usize,
    pub cancelled: bool,
}

struct Particle {
    position: AllocationMatrix,
    velocity: AllocationMatrix,
    best: AllocationMatrix,
    best_score: f64,
}

/// Continuous allocator producing a splittable assignment.
pub struct SwarmAllocator<'a> {
    problem: &'a Problem,
    config: SwarmConfig,
    objective: ObjectiveEvaluator,
    cancel: Option<CancelToken>,
}

impl<'a> SwarmAllocator<'a> {
    pub fn new(
        problem: &'a Problem,
        config: SwarmConfig,
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

    /// Run with a generator seeded from the configuration.
    pub fn run(&self) -> SwarmOutcome {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.run_with_rng(&mut rng)
    }

    /// Run with a caller-supplied generator.
    pub fn run_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> SwarmOutcome {
        let cfg = &self.config;
        let mut particles: Vec<Particle> = (0..cfg.population)
            .map(|_| self.spawn_particle(rng))
            .collect();

        let scores = self.evaluate_positions(&particles);
        for (particle, score) in particles.iter_mut().zip(scores) {
            particle.best_score = score;
        }
        let (mut global_best, mut global_score) = match best_of(&particles) {
            Some(idx) => (particles[idx].best.clone(), particles[idx].best_score),
            None => {
                let empty = AllocationMatrix::for_problem(self.problem);
                let score = self.objective.evaluate(self.problem, &empty);
                (empty, score)
            }
        };

        let mut history = Vec::with_capacity(cfg.iterations);
        let mut cancelled = false;

        for iteration in 0..cfg.iterations {
            if is_cancelled(self.cancel.as_ref()) {
                warn!(iteration, "swarm search cancelled");
                cancelled = true;
                break;
            }

            for particle in &mut particles {
                self.step(particle, &global_best, rng);
            }

            let scores = self.evaluate_positions(&particles);
            for (particle, score) in particles.iter_mut().zip(scores) {
                if score < particle.best_score {
                    particle.best.clone_from(&particle.position);
                    particle.best_score = score;
                }
            }

            if let Some(idx) = best_of(&particles) {
                if particles[idx].best_score < global_score {
                    global_best.clone_from(&particles[idx].best);
                    global_score = particles[idx].best_score;
                    debug!(iteration, score = global_score, "swarm global best improved");
                }
            }
            history.push(global_score);
        }

        info!(
            iterations = history.len(),
            population = cfg.population,
            score = global_score,
            cancelled,
            "swarm search finished"
        );

        SwarmOutcome {
            allocation: global_best,
            score: global_score,
            iterations: history.len(),
            history,
            cancelled,
        }
    }

    fn spawn_particle<R: Rng + ?Sized>(&self, rng: &mut R) -> Particle {
        let mut position = AllocationMatrix::for_problem(self.problem);
        for x in position.as_mut_slice() {
            *x = rng.r#gen::<f64>();
        }
        self.repair(&mut position);

        let mut velocity = AllocationMatrix::for_problem(self.problem);
        for v in velocity.as_mut_slice() {
            *v = rng.gen_range(-INITIAL_VELOCITY..=INITIAL_VELOCITY);
        }

        Particle {
            best: position.clone(),
            position,
            velocity,
            best_score: f64::INFINITY,
        }
    }

    /// Velocity and position update for one particle.
    fn step<R: Rng + ?Sized>(
        &self,
        particle: &mut Particle,
        global_best: &AllocationMatrix,
        rng: &mut R,
    ) {
        let cfg = &self.config;
        let position = particle.position.as_mut_slice();
        let velocity = particle.velocity.as_mut_slice();
        let personal = particle.best.as_slice();
        let global = global_best.as_slice();

        for i in 0..position.len() {
            let r1 = rng.r#gen::<f64>();
            let r2 = rng.r#gen::<f64>();
            let x = position[i];
            let v = cfg.inertia * velocity[i]
                + cfg.cognitive * r1 * (personal[i] - x)
                + cfg.social * r2 * (global[i] - x);
            velocity[i] = v;
            position[i] = (x + v).clamp(0.0, 1.0);
        }
        self.repair(&mut particle.position);
    }

    /// Zero uncovered cells, then project each row.
    fn repair(&self, position: &mut AllocationMatrix) {
        for t in 0..self.problem.task_count() {
            let row = position.row_mut(t);
            for (s, x) in row.iter_mut().enumerate() {
                if !self.problem.covers(t, s) {
                    *x = 0.0;
                }
            }
            project_in_place(row);
        }
    }

    fn evaluate_positions(&self, particles: &[Particle]) -> Vec<f64> {
        particles
            .par_iter()
            .map(|p| self.objective.evaluate(self.problem, &p.position))
            .collect()
    }
}

/// Index of the particle with the lowest personal best; first wins ties.
fn best_of(particles: &[Particle]) -> Option<usize> {
    particles
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, p)| match best {
            Some((_, score)) if score <= p.best_score => best,
            _ => Some((idx, p.best_score)),
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgealloc_core::{ObjectiveConfig, PowerCurve, Server, Task};

    fn make_problem() -> Problem {
        let servers = vec![
            Server::new("s1", 15.0, 50.0, PowerCurve::linear(60.0, 80.0).unwrap()),
            Server::new("s2", 20.0, 60.0, PowerCurve::linear(70.0, 90.0).unwrap()),
        ];
        let tasks = vec![
            Task::new("t1", 8.0).covering("s1", 40.0).covering("s2", 60.0),
            Task::new("t2", 6.0).covering("s1", 30.0).covering("s2", 50.0),
            Task::new("t3", 5.0).covering("s1", 45.0).covering("s2", 55.0),
            Task::new("t4", 7.0).covering("s1", 35.0).covering("s2", 65.0),
        ];
        Problem::new(tasks, servers).unwrap()
    }

    fn small_config(seed: u64) -> SwarmConfig {
        SwarmConfig {
            population: 12,
            iterations: 40,
            seed,
            ..SwarmConfig::default()
        }
    }

    fn allocator<'a>(problem: &'a Problem, seed: u64) -> SwarmAllocator<'a> {
        let objective = ObjectiveEvaluator::new(&ObjectiveConfig::default(), 250.0);
        SwarmAllocator::new(problem, small_config(seed), objective).unwrap()
    }

    #[test]
    fn rejects_empty_population() {
        let p = make_problem();
        let objective = ObjectiveEvaluator::new(&ObjectiveConfig::default(), 250.0);
        let config = SwarmConfig {
            population: 0,
            ..SwarmConfig::default()
        };
        assert!(SwarmAllocator::new(&p, config, objective).is_err());
    }

    #[test]
    fn rows_stay_feasible() {
        let p = make_problem();
        let outcome = allocator(&p, 42).run();
        for t in 0..p.task_count() {
            assert!(outcome.allocation.row(t).iter().all(|&x| (0.0..=1.0).contains(&x)));
            assert!(outcome.allocation.row_sum(t) <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn global_best_never_worsens() {
        let p = make_problem();
        let outcome = allocator(&p, 3).run();
        assert_eq!(outcome.history.len(), 40);
        for pair in outcome.history.windows(2) {
            assert!(pair[1] <= pair[0], "history increased: {pair:?}");
        }
        assert_eq!(outcome.score, *outcome.history.last().unwrap());
    }

    #[test]
    fn same_seed_same_result() {
        let p = make_problem();
        let a = allocator(&p, 11).run();
        let b = allocator(&p, 11).run();
        assert_eq!(a.allocation, b.allocation);
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn finds_positive_reward() {
        let p = make_problem();
        let outcome = allocator(&p, 42).run();
        let b = ObjectiveEvaluator::new(&ObjectiveConfig::default(), 250.0)
            .breakdown(&p, &outcome.allocation);
        assert!(b.reward > 0.0);
        assert!(outcome.score < 0.0, "penalties dominate: {b:?}");
    }

    #[test]
    fn uncovered_cells_stay_zero() {
        let servers = vec![
            Server::new("s1", 10.0, 10.0, PowerCurve::constant(20.0).unwrap()),
            Server::new("s2", 10.0, 10.0, PowerCurve::constant(20.0).unwrap()),
        ];
        let tasks = vec![
            Task::new("only-s2", 3.0).covering("s2", 5.0).with_reward("s1", 100.0),
            Task::new("nowhere", 3.0),
        ];
        let p = Problem::new(tasks, servers).unwrap();
        let outcome = allocator(&p, 5).run();
        assert_eq!(outcome.allocation.get(0, 0), 0.0);
        assert_eq!(outcome.allocation.row(1), &[0.0, 0.0]);
    }

    #[test]
    fn cancelled_before_start_returns_initial_best() {
        let p = make_problem();
        let token = CancelToken::new();
        token.cancel();
        let outcome = allocator(&p, 42).with_cancel(token).run();
        assert!(outcome.cancelled);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.history.is_empty());
        assert!(outcome.score.is_finite());
    }

    #[test]
    fn idle_token_does_not_change_result() {
        let p = make_problem();
        let plain = allocator(&p, 9).run();
        let with_token = allocator(&p, 9).with_cancel(CancelToken::new()).run();
        assert_eq!(plain.allocation, with_token.allocation);
        assert!(!with_token.cancelled);
    }
}
