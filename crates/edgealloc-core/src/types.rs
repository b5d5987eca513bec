//! Canonical data model shared by every allocator.
//!
//! Callers supply [`Task`] and [`Server`] records; [`Problem`] validates them
//! once and exposes a dense, index-ordered view. Solve-scoped outputs
//! ([`AllocationMatrix`], [`ExclusiveAssignment`], [`BudgetMap`]) are plain
//! values that never alias the problem.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, ConfigurationError};
use crate::power::PowerCurve;

/// Unique identifier for a task.
pub type TaskId = String;

/// Unique identifier for an edge server.
pub type ServerId = String;

/// Tolerance used when comparing residual capacity against demand.
pub const CAPACITY_EPSILON: f64 = 1e-9;

// ── Records ────────────────────────────────────────────────────────

/// A unit of work to be placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Resource units required. Must be positive.
    pub demand: f64,
    /// Server-specific reward. Missing servers read as 0.
    #[serde(default)]
    pub reward: HashMap<ServerId, f64>,
    /// Network reachability. Missing servers read as not covered.
    #[serde(default)]
    pub coverage: HashMap<ServerId, bool>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, demand: f64) -> Self {
        Self {
            id: id.into(),
            demand,
            reward: HashMap::new(),
            coverage: HashMap::new(),
        }
    }

    /// Mark `server` as reachable with the given reward.
    pub fn covering(mut self, server: impl Into<ServerId>, reward: f64) -> Self {
        let server = server.into();
        self.reward.insert(server.clone(), reward);
        self.coverage.insert(server, true);
        self
    }

    /// Record a reward for `server` without changing its coverage.
    pub fn with_reward(mut self, server: impl Into<ServerId>, reward: f64) -> Self {
        self.reward.insert(server.into(), reward);
        self
    }

    /// Explicitly mark `server` as unreachable.
    pub fn not_covering(mut self, server: impl Into<ServerId>) -> Self {
        self.coverage.insert(server.into(), false);
        self
    }
}

/// An edge server with finite capacity and a power curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    /// Resource units available. Must be positive.
    pub capacity: f64,
    /// Watts drawn at zero utilization.
    pub idle_power: f64,
    pub power_curve: PowerCurve,
}

impl Server {
    pub fn new(
        id: impl Into<ServerId>,
        capacity: f64,
        idle_power: f64,
        power_curve: PowerCurve,
    ) -> Self {
        Self {
            id: id.into(),
            capacity,
            idle_power,
            power_curve,
        }
    }

    /// Draw in watts at the given utilization fraction.
    pub fn power(&self, utilization: f64) -> f64 {
        self.power_curve.power(self.idle_power, utilization)
    }

    /// Draw in watts when carrying `load` resource units.
    pub fn power_at_load(&self, load: f64) -> f64 {
        self.power(load / self.capacity)
    }
}

// ── Problem ────────────────────────────────────────────────────────

/// A validated, immutable problem instance for one solve.
#[derive(Debug, Clone)]
pub struct Problem {
    tasks: Vec<Task>,
    servers: Vec<Server>,
    /// Row-major `tasks × servers` reward table.
    rewards: Vec<f64>,
    /// Row-major `tasks × servers` coverage table.
    covers: Vec<bool>,
    /// Covering server indices per task, in server order.
    candidates: Vec<Vec<usize>>,
    server_index: HashMap<ServerId, usize>,
}

impl Problem {
    /// Validate records and build the dense view.
    pub fn new(tasks: Vec<Task>, servers: Vec<Server>) -> ConfigResult<Self> {
        let mut server_index = HashMap::with_capacity(servers.len());
        for (idx, server) in servers.iter().enumerate() {
            if !server.capacity.is_finite() || server.capacity <= 0.0 {
                return Err(ConfigurationError::InvalidCapacity {
                    server: server.id.clone(),
                    capacity: server.capacity,
                });
            }
            if !server.idle_power.is_finite() || server.idle_power < 0.0 {
                return Err(ConfigurationError::InvalidIdlePower {
                    server: server.id.clone(),
                    idle_power: server.idle_power,
                });
            }
            if server_index.insert(server.id.clone(), idx).is_some() {
                return Err(ConfigurationError::DuplicateServer(server.id.clone()));
            }
        }

        let n = servers.len();
        let mut rewards = vec![0.0; tasks.len() * n];
        let mut covers = vec![false; tasks.len() * n];
        let mut seen = HashSet::with_capacity(tasks.len());

        for (t, task) in tasks.iter().enumerate() {
            if !task.demand.is_finite() || task.demand <= 0.0 {
                return Err(ConfigurationError::InvalidDemand {
                    task: task.id.clone(),
                    demand: task.demand,
                });
            }
            if !seen.insert(task.id.as_str()) {
                return Err(ConfigurationError::DuplicateTask(task.id.clone()));
            }
            for (server, &reward) in &task.reward {
                let s = *server_index.get(server).ok_or_else(|| ConfigurationError::UnknownServer {
                    task: task.id.clone(),
                    server: server.clone(),
                })?;
                if !reward.is_finite() || reward < 0.0 {
                    return Err(ConfigurationError::InvalidReward {
                        task: task.id.clone(),
                        server: server.clone(),
                        reward,
                    });
                }
                rewards[t * n + s] = reward;
            }
            for (server, &covered) in &task.coverage {
                let s = *server_index.get(server).ok_or_else(|| ConfigurationError::UnknownServer {
                    task: task.id.clone(),
                    server: server.clone(),
                })?;
                covers[t * n + s] = covered;
            }
        }

        let candidates = (0..tasks.len())
            .map(|t| (0..n).filter(|&s| covers[t * n + s]).collect())
            .collect();

        Ok(Self {
            tasks,
            servers,
            rewards,
            covers,
            candidates,
            server_index,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn demand(&self, task: usize) -> f64 {
        self.tasks[task].demand
    }

    pub fn capacity(&self, server: usize) -> f64 {
        self.servers[server].capacity
    }

    pub fn reward(&self, task: usize, server: usize) -> f64 {
        self.rewards[task * self.servers.len() + server]
    }

    pub fn covers(&self, task: usize, server: usize) -> bool {
        self.covers[task * self.servers.len() + server]
    }

    /// Indices of servers covering `task`, in server order.
    pub fn candidates(&self, task: usize) -> &[usize] {
        &self.candidates[task]
    }

    pub fn server_index(&self, id: &str) -> Option<usize> {
        self.server_index.get(id).copied()
    }

    /// Highest reward over the task's covering servers, or 0 if none cover it.
    pub fn best_reward(&self, task: usize) -> f64 {
        self.candidates[task]
            .iter()
            .map(|&s| self.reward(task, s))
            .fold(0.0, f64::max)
    }

    /// Demand-weighted load on every server.
    pub fn loads(&self, allocation: &AllocationMatrix) -> Vec<f64> {
        let mut loads = vec![0.0; self.servers.len()];
        for (t, task) in self.tasks.iter().enumerate() {
            for (s, &x) in allocation.row(t).iter().enumerate() {
                loads[s] += task.demand * x;
            }
        }
        loads
    }

    /// Total modeled power when servers carry `loads`.
    pub fn total_power(&self, loads: &[f64]) -> f64 {
        self.servers
            .iter()
            .zip(loads)
            .map(|(server, &load)| server.power_at_load(load))
            .sum()
    }

    /// Total power with every server idle.
    pub fn idle_power(&self) -> f64 {
        self.servers.iter().map(|s| s.power(0.0)).sum()
    }
}

// ── Allocation outputs ─────────────────────────────────────────────

/// Dense `tasks × servers` matrix of fractional weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationMatrix {
    tasks: usize,
    servers: usize,
    weights: Vec<f64>,
}

impl AllocationMatrix {
    pub fn zeros(tasks: usize, servers: usize) -> Self {
        Self {
            tasks,
            servers,
            weights: vec![0.0; tasks * servers],
        }
    }

    pub fn for_problem(problem: &Problem) -> Self {
        Self::zeros(problem.task_count(), problem.server_count())
    }

    pub fn tasks(&self) -> usize {
        self.tasks
    }

    pub fn servers(&self) -> usize {
        self.servers
    }

    pub fn get(&self, task: usize, server: usize) -> f64 {
        self.weights[task * self.servers + server]
    }

    pub fn set(&mut self, task: usize, server: usize, weight: f64) {
        self.weights[task * self.servers + server] = weight;
    }

    pub fn row(&self, task: usize) -> &[f64] {
        let start = task * self.servers;
        &self.weights[start..start + self.servers]
    }

    pub fn row_mut(&mut self, task: usize) -> &mut [f64] {
        let start = task * self.servers;
        &mut self.weights[start..start + self.servers]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    pub fn row_sum(&self, task: usize) -> f64 {
        self.row(task).iter().sum()
    }

    /// Number of `(task, server)` cells with weight above `epsilon`.
    pub fn active_pairs(&self, epsilon: f64) -> usize {
        self.weights.iter().filter(|&&x| x > epsilon).count()
    }

    /// Collapse each row to its largest cell. All-zero rows are unassigned.
    pub fn to_exclusive(&self, problem: &Problem) -> ExclusiveAssignment {
        let mut placements = BTreeMap::new();
        for (t, task) in problem.tasks().iter().enumerate() {
            let best = self
                .row(t)
                .iter()
                .enumerate()
                .filter(|&(_, &x)| x > 0.0)
                .fold(None, |best: Option<(usize, f64)>, (s, &x)| match best {
                    Some((_, bx)) if bx >= x => best,
                    _ => Some((s, x)),
                });
            let placement = match best {
                Some((s, _)) => Placement::Server(problem.servers()[s].id.clone()),
                None => Placement::Unassigned,
            };
            placements.insert(task.id.clone(), placement);
        }
        ExclusiveAssignment { placements }
    }
}

/// Where an exclusively placed task ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Server(ServerId),
    Unassigned,
}

impl Placement {
    pub fn server(&self) -> Option<&str> {
        match self {
            Placement::Server(id) => Some(id),
            Placement::Unassigned => None,
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self, Placement::Unassigned)
    }
}

/// Task id → placement for exclusive strategies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExclusiveAssignment {
    pub placements: BTreeMap<TaskId, Placement>,
}

impl ExclusiveAssignment {
    /// Every task of `problem` marked unassigned.
    pub fn unassigned(problem: &Problem) -> Self {
        Self {
            placements: problem
                .tasks()
                .iter()
                .map(|t| (t.id.clone(), Placement::Unassigned))
                .collect(),
        }
    }

    pub fn get(&self, task_id: &str) -> Option<&Placement> {
        self.placements.get(task_id)
    }

    pub fn assigned_count(&self) -> usize {
        self.placements.values().filter(|p| !p.is_unassigned()).count()
    }

    /// Ids of unassigned tasks, in id order.
    pub fn unassigned_tasks(&self) -> impl Iterator<Item = &str> {
        self.placements
            .iter()
            .filter(|(_, p)| p.is_unassigned())
            .map(|(id, _)| id.as_str())
    }

    /// Expand into a 0/1 matrix over `problem`'s index order.
    pub fn to_matrix(&self, problem: &Problem) -> AllocationMatrix {
        let mut matrix = AllocationMatrix::for_problem(problem);
        for (t, task) in problem.tasks().iter().enumerate() {
            if let Some(s) = self
                .placements
                .get(&task.id)
                .and_then(Placement::server)
                .and_then(|id| problem.server_index(id))
            {
                matrix.set(t, s, 1.0);
            }
        }
        matrix
    }
}

// ── Budget map ─────────────────────────────────────────────────────

/// Per-server usage ceiling `Y`, aligned with the problem's server order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetMap {
    ceilings: Vec<f64>,
}

impl BudgetMap {
    pub fn new(ceilings: Vec<f64>) -> Self {
        Self { ceilings }
    }

    /// Build from a caller-supplied `server_id → ceiling` map.
    ///
    /// Servers absent from the map get a ceiling of zero. A ceiling must not
    /// exceed the server's capacity.
    pub fn from_ceilings(
        problem: &Problem,
        ceilings: &HashMap<ServerId, f64>,
    ) -> ConfigResult<Self> {
        let mut out = vec![0.0; problem.server_count()];
        for (id, &ceiling) in ceilings {
            let s = problem
                .server_index(id)
                .ok_or_else(|| ConfigurationError::UnknownServer {
                    task: "<budget>".to_string(),
                    server: id.clone(),
                })?;
            if !ceiling.is_finite() || ceiling < 0.0 {
                return Err(ConfigurationError::parameter(
                    "budget",
                    format!("ceiling for {id} must be non-negative and finite, got {ceiling}"),
                ));
            }
            let capacity = problem.capacity(s);
            if ceiling > capacity + CAPACITY_EPSILON {
                return Err(ConfigurationError::parameter(
                    "budget",
                    format!("ceiling for {id} is {ceiling}, above capacity {capacity}"),
                ));
            }
            out[s] = ceiling;
        }
        Ok(Self { ceilings: out })
    }

    /// Every server's full capacity.
    pub fn full_capacity(problem: &Problem) -> Self {
        Self {
            ceilings: problem.servers().iter().map(|s| s.capacity).collect(),
        }
    }

    pub fn get(&self, server: usize) -> f64 {
        self.ceilings.get(server).copied().unwrap_or(0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.ceilings
    }

    pub fn total(&self) -> f64 {
        self.ceilings.iter().sum()
    }

    pub fn to_map(&self, problem: &Problem) -> BTreeMap<ServerId, f64> {
        problem
            .servers()
            .iter()
            .enumerate()
            .map(|(s, server)| (server.id.clone(), self.get(s)))
            .collect()
    }
}
