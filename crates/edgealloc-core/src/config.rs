//! Solver configuration (`edgealloc.toml`).
//!
//! Every section is optional and falls back to the reference parameters;
//! only `power_budget` is required.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigResult, ConfigurationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Global power budget in watts.
    pub power_budget: f64,
    #[serde(default)]
    pub objective: ObjectiveConfig,
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub colony: ColonyConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub assigner: AssignerConfig,
}

/// Soft-constraint objective weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveConfig {
    /// Weight `W` applied to every constraint breach.
    pub penalty_weight: f64,
    /// Per active `(task, server)` pair. Zero disables the fragmentation term.
    pub latency_weight: f64,
    /// Threshold above which a cell counts as active.
    pub epsilon: f64,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            penalty_weight: 1e6,
            latency_weight: 10.0,
            epsilon: 1e-6,
        }
    }
}

/// Particle swarm parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub population: usize,
    pub iterations: usize,
    /// Inertia weight `w`.
    pub inertia: f64,
    /// Cognitive coefficient `c1`.
    pub cognitive: f64,
    /// Social coefficient `c2`.
    pub social: f64,
    pub seed: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            population: 30,
            iterations: 200,
            inertia: 0.72,
            cognitive: 1.4,
            social: 1.4,
            seed: 42,
        }
    }
}

/// How the colony scores a `(task, server)` pair before pheromone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColonyHeuristic {
    /// `reward / max(capacity, demand)`.
    #[default]
    CapacityOrDemand,
    /// `reward / capacity`.
    Capacity,
}

/// Ant colony parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyConfig {
    pub ants: usize,
    pub iterations: usize,
    /// Pheromone exponent.
    pub alpha: f64,
    /// Heuristic exponent.
    pub beta: f64,
    /// Fraction of pheromone kept after each iteration.
    pub retention: f64,
    /// Deposit bonus `Q`.
    pub deposit: f64,
    /// Share of ants reinforcing the trail each iteration (at least one).
    pub elite_fraction: f64,
    pub heuristic: ColonyHeuristic,
    pub seed: u64,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            ants: 30,
            iterations: 100,
            alpha: 1.0,
            beta: 2.0,
            retention: 0.8,
            deposit: 10.0,
            elite_fraction: 0.2,
            heuristic: ColonyHeuristic::default(),
            seed: 42,
        }
    }
}

/// Marginal-utility budgeting options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Replace a zero ceiling with the covered demand for that server,
    /// capped at capacity. May exceed the power budget at `Y`.
    pub fill_unused_servers: bool,
}

/// Strategy for the splittable final assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    GreedyFill,
    MinCostFlow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignerConfig {
    /// Must be set explicitly before running a splittable assignment.
    pub split_strategy: Option<SplitStrategy>,
}

impl SolverConfig {
    /// Reference parameters with the given power budget.
    pub fn with_budget(power_budget: f64) -> Self {
        Self {
            power_budget,
            objective: ObjectiveConfig::default(),
            swarm: SwarmConfig::default(),
            colony: ColonyConfig::default(),
            budget: BudgetConfig::default(),
            assigner: AssignerConfig::default(),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: SolverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.power_budget.is_finite() || self.power_budget < 0.0 {
            return Err(ConfigurationError::parameter(
                "power_budget",
                format!("must be non-negative and finite, got {}", self.power_budget),
            ));
        }
        self.objective.validate()?;
        self.swarm.validate()?;
        self.colony.validate()
    }
}

impl ObjectiveConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        non_negative("objective.penalty_weight", self.penalty_weight)?;
        non_negative("objective.latency_weight", self.latency_weight)?;
        non_negative("objective.epsilon", self.epsilon)
    }
}

impl SwarmConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.population == 0 {
            return Err(ConfigurationError::parameter("swarm.population", "must be at least 1"));
        }
        finite("swarm.inertia", self.inertia)?;
        finite("swarm.cognitive", self.cognitive)?;
        finite("swarm.social", self.social)
    }
}

impl ColonyConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.ants == 0 {
            return Err(ConfigurationError::parameter("colony.ants", "must be at least 1"));
        }
        finite("colony.alpha", self.alpha)?;
        finite("colony.beta", self.beta)?;
        non_negative("colony.deposit", self.deposit)?;
        if !(self.retention > 0.0 && self.retention <= 1.0) {
            return Err(ConfigurationError::parameter(
                "colony.retention",
                format!("must be in (0, 1], got {}", self.retention),
            ));
        }
        if !(self.elite_fraction > 0.0 && self.elite_fraction <= 1.0) {
            return Err(ConfigurationError::parameter(
                "colony.elite_fraction",
                format!("must be in (0, 1], got {}", self.elite_fraction),
            ));
        }
        Ok(())
    }

    /// Number of elite ants per iteration.
    pub fn elite_count(&self) -> usize {
        ((self.ants as f64 * self.elite_fraction).floor() as usize).clamp(1, self.ants.max(1))
    }
}

fn finite(name: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::parameter(name, format!("must be finite, got {value}")))
    }
}

fn non_negative(name: &'static str, value: f64) -> ConfigResult<()> {
    finite(name, value)?;
    if value < 0.0 {
        return Err(ConfigurationError::parameter(
            name,
            format!("must be non-negative, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal() {
        let config = SolverConfig::from_toml_str("power_budget = 250.0").unwrap();
        assert_eq!(config.power_budget, 250.0);
        assert_eq!(config.swarm, SwarmConfig::default());
        assert_eq!(config.colony.heuristic, ColonyHeuristic::CapacityOrDemand);
        assert_eq!(config.assigner.split_strategy, None);
    }

    #[test]
    fn parse_sections() {
        let toml_str = r#"
power_budget = 400.0

[objective]
latency_weight = 0.0

[swarm]
population = 8
seed = 7

[colony]
heuristic = "capacity"
retention = 0.5

[budget]
fill_unused_servers = true

[assigner]
split_strategy = "min_cost_flow"
"#;
        let config = SolverConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.objective.latency_weight, 0.0);
        assert_eq!(config.objective.penalty_weight, 1e6);
        assert_eq!(config.swarm.population, 8);
        assert_eq!(config.swarm.iterations, 200);
        assert_eq!(config.swarm.seed, 7);
        assert_eq!(config.colony.heuristic, ColonyHeuristic::Capacity);
        assert_eq!(config.colony.retention, 0.5);
        assert!(config.budget.fill_unused_servers);
        assert_eq!(config.assigner.split_strategy, Some(SplitStrategy::MinCostFlow));
    }

    #[test]
    fn missing_budget_is_rejected() {
        assert!(SolverConfig::from_toml_str("[swarm]\npopulation = 3").is_err());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(SolverConfig::from_toml_str("power_budget = -1.0").is_err());
        for body in [
            "[swarm]\npopulation = 0",
            "[colony]\nretention = 1.5",
            "[colony]\nelite_fraction = 0.0",
        ] {
            let toml = format!("power_budget = 1.0\n{body}");
            assert!(SolverConfig::from_toml_str(&toml).is_err(), "{body}");
        }
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = SolverConfig::with_budget(300.0);
        config.assigner.split_strategy = Some(SplitStrategy::GreedyFill);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("greedy_fill"));
        assert_eq!(SolverConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn elite_count_is_at_least_one() {
        let mut colony = ColonyConfig::default();
        assert_eq!(colony.elite_count(), 6);
        colony.ants = 3;
        assert_eq!(colony.elite_count(), 1);
    }
}
