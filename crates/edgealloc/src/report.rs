//! Serializable solve results.

use std::collections::BTreeMap;

use edgealloc_core::{AllocationMatrix, AllocationSummary, ExclusiveAssignment, ServerId, TaskId};
use serde::{Deserialize, Serialize};

use crate::solver::Strategy;

/// The allocation a strategy produced, in its native shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedAllocation {
    Split(AllocationMatrix),
    Exclusive(ExclusiveAssignment),
}

impl ReportedAllocation {
    pub fn as_split(&self) -> Option<&AllocationMatrix> {
        match self {
            Self::Split(matrix) => Some(matrix),
            Self::Exclusive(_) => None,
        }
    }

    pub fn as_exclusive(&self) -> Option<&ExclusiveAssignment> {
        match self {
            Self::Exclusive(assignment) => Some(assignment),
            Self::Split(_) => None,
        }
    }
}

/// Outcome of one [`crate::Solver::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub strategy: Strategy,
    pub allocation: ReportedAllocation,
    pub summary: AllocationSummary,
    /// Objective score; set by the search strategies only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Ceiling map `Y`; set by the budgeted strategies only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BTreeMap<ServerId, f64>>,
    /// Demand left unplaced by a splittable budgeted run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unmet_demand: BTreeMap<TaskId, f64>,
    pub cancelled: bool,
}

impl SolveReport {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
