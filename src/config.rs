//! Planner configuration.
//!
//! All knobs of a planning run: the action duration table, the horizon,
//! the search budget and the heuristics' tuning. Every field has a default,
//! so a partial JSON document is enough.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PlanError;
use crate::models::{CostModel, Dimension};

/// What the search minimises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Sum of the action end times.
    #[default]
    TotalCost,
    /// Completion time of the last action.
    Makespan,
}

/// How a VM picks a node when its current host is not available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Node with the most residual capacity.
    #[default]
    WorstFit,
    /// Node with the least residual capacity that still fits.
    BestFit,
}

/// Configuration of a planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Action durations.
    pub costs: CostModel,
    /// Horizon override; computed from the worst-case plan when absent.
    pub horizon: Option<i64>,
    /// Wall-clock budget in milliseconds.
    pub time_limit_ms: Option<u64>,
    /// Maximum number of search decisions.
    pub node_limit: Option<u64>,
    /// Keep improving after the first plan.
    pub optimize: bool,
    /// Minimised quantity.
    pub objective: Objective,
    /// Node selection policy for displaced VMs.
    pub fit: FitPolicy,
    /// Dimension the fit policy ranks nodes on.
    pub fit_dimension: Dimension,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            costs: CostModel::default(),
            horizon: None,
            time_limit_ms: Some(10_000),
            node_limit: None,
            optimize: true,
            objective: Objective::TotalCost,
            fit: FitPolicy::WorstFit,
            fit_dimension: Dimension::Cpu,
        }
    }
}

impl PlannerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the action durations.
    pub fn with_costs(mut self, costs: CostModel) -> Self {
        self.costs = costs;
        self
    }

    /// Sets the horizon.
    pub fn with_horizon(mut self, horizon: i64) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Sets the time budget in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Removes the time budget.
    pub fn without_time_limit(mut self) -> Self {
        self.time_limit_ms = None;
        self
    }

    /// Sets the decision budget.
    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.node_limit = Some(nodes);
        self
    }

    /// Enables or disables optimisation.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Sets the objective.
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Sets the fit policy and the dimension it ranks on.
    pub fn with_fit(mut self, fit: FitPolicy, dimension: Dimension) -> Self {
        self.fit = fit;
        self.fit_dimension = dimension;
        self
    }

    /// Time budget as a [`Duration`].
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}
