//! Input adapters from dense arrays to the canonical records.
//!
//! Search-style callers often hold a demand vector `U`, a reward matrix
//! `R`, and per-server capacity/idle arrays. [`DenseInstance`] carries that
//! shape and converts it into a validated [`Problem`] with generated ids.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, ConfigurationError};
use crate::power::PowerCurve;
use crate::types::{Problem, Server, Task};

/// Dense problem description, indexed by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseInstance {
    /// Demand per task.
    pub demands: Vec<f64>,
    /// `tasks × servers` reward matrix.
    pub rewards: Vec<Vec<f64>>,
    pub capacities: Vec<f64>,
    pub idle_power: Vec<f64>,
    pub power_curves: Vec<PowerCurve>,
    /// `tasks × servers` reachability. Absent means every server is reachable.
    #[serde(default)]
    pub coverage: Option<Vec<Vec<bool>>>,
}

pub fn task_id(index: usize) -> String {
    format!("task-{index}")
}

pub fn server_id(index: usize) -> String {
    format!("server-{index}")
}

/// Repeat one reward per task across `servers` columns.
pub fn uniform_rewards(per_task: &[f64], servers: usize) -> Vec<Vec<f64>> {
    per_task.iter().map(|&r| vec![r; servers]).collect()
}

impl DenseInstance {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Convert to a [`Problem`], checking every array against the shape.
    pub fn into_problem(self) -> ConfigResult<Problem> {
        let n_tasks = self.demands.len();
        let n_servers = self.capacities.len();

        if self.idle_power.len() != n_servers || self.power_curves.len() != n_servers {
            return Err(ConfigurationError::Shape(format!(
                "{n_servers} capacities but {} idle powers and {} power curves",
                self.idle_power.len(),
                self.power_curves.len()
            )));
        }
        check_matrix(
            "rewards",
            self.rewards.len(),
            self.rewards.iter().map(Vec::len),
            n_tasks,
            n_servers,
        )?;
        if let Some(coverage) = &self.coverage {
            check_matrix(
                "coverage",
                coverage.len(),
                coverage.iter().map(Vec::len),
                n_tasks,
                n_servers,
            )?;
        }

        let servers = self
            .capacities
            .iter()
            .zip(&self.idle_power)
            .zip(self.power_curves)
            .enumerate()
            .map(|(j, ((&capacity, &idle), curve))| {
                Server::new(server_id(j), capacity, idle, curve)
            })
            .collect();

        let tasks = self
            .demands
            .iter()
            .enumerate()
            .map(|(i, &demand)| {
                let mut task = Task::new(task_id(i), demand);
                for (j, &reward) in self.rewards[i].iter().enumerate() {
                    let covered = self.coverage.as_ref().is_none_or(|c| c[i][j]);
                    task = task.with_reward(server_id(j), reward);
                    task.coverage.insert(server_id(j), covered);
                }
                task
            })
            .collect();

        Problem::new(tasks, servers)
    }
}

fn check_matrix(
    name: &str,
    rows: usize,
    mut cols: impl Iterator<Item = usize>,
    n_tasks: usize,
    n_servers: usize,
) -> ConfigResult<()> {
    if rows != n_tasks {
        return Err(ConfigurationError::Shape(format!(
            "{name} has {rows} rows, expected {n_tasks}"
        )));
    }
    if let Some(bad) = cols.position(|len| len != n_servers) {
        return Err(ConfigurationError::Shape(format!(
            "{name} row {bad} does not have {n_servers} columns"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instance() -> DenseInstance {
        DenseInstance {
            demands: vec![8.0, 6.0],
            rewards: vec![vec![40.0, 60.0], vec![30.0, 50.0]],
            capacities: vec![15.0, 20.0],
            idle_power: vec![50.0, 60.0],
            power_curves: vec![
                PowerCurve::linear(60.0, 80.0).unwrap(),
                PowerCurve::linear(70.0, 90.0).unwrap(),
            ],
            coverage: None,
        }
    }

    #[test]
    fn converts_with_generated_ids() {
        let problem = sample_instance().into_problem().unwrap();
        assert_eq!(problem.task_count(), 2);
        assert_eq!(problem.servers()[1].id, "server-1");
        assert_eq!(problem.tasks()[0].id, "task-0");
        assert_eq!(problem.reward(1, 1), 50.0);
        assert_eq!(problem.capacity(0), 15.0);
    }

    #[test]
    fn missing_coverage_means_full_reachability() {
        let problem = sample_instance().into_problem().unwrap();
        assert_eq!(problem.candidates(0), &[0, 1]);
        assert_eq!(problem.candidates(1), &[0, 1]);
    }

    #[test]
    fn explicit_coverage_is_respected() {
        let mut instance = sample_instance();
        instance.coverage = Some(vec![vec![false, true], vec![false, false]]);
        let problem = instance.into_problem().unwrap();
        assert_eq!(problem.candidates(0), &[1]);
        assert!(problem.candidates(1).is_empty());
    }

    #[test]
    fn rejects_ragged_rewards() {
        let mut instance = sample_instance();
        instance.rewards[1].pop();
        assert!(matches!(instance.into_problem(), Err(ConfigurationError::Shape(_))));
    }

    #[test]
    fn rejects_mismatched_server_arrays() {
        let mut instance = sample_instance();
        instance.idle_power.pop();
        assert!(matches!(instance.into_problem(), Err(ConfigurationError::Shape(_))));
    }

    #[test]
    fn invalid_values_surface_as_configuration_errors() {
        let mut instance = sample_instance();
        instance.demands[0] = 0.0;
        assert!(matches!(
            instance.into_problem(),
            Err(ConfigurationError::InvalidDemand { .. })
        ));
    }

    #[test]
    fn uniform_rewards_tile_columns() {
        assert_eq!(uniform_rewards(&[1.0, 2.0], 3), vec![vec![1.0; 3], vec![2.0; 3]]);
    }

    #[test]
    fn parses_json() {
        let json = r#"{
            "demands": [1.0],
            "rewards": [[2.0]],
            "capacities": [4.0],
            "idle_power": [10.0],
            "power_curves": [[{"utilization": 0.0, "coefficient": 20.0}]]
        }"#;
        let instance: DenseInstance = serde_json::from_str(json).unwrap();
        assert_eq!(instance.coverage, None);
        assert!(instance.into_problem().is_ok());
    }
}
