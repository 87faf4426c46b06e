//! Plan quality metrics (KPIs).
//!
//! Computes reconfiguration performance indicators from a plan.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Latest action end |
//! | Total Cost | Sum of action ends |
//! | Actions by Kind | Number of actions of each kind |
//! | Max Parallelism | Largest number of actions running at one instant |
//! | Migrated Memory | Memory moved by live migrations |
//!
//! # Reference
//! Hermenier et al. (2009), "Entropy: a Consolidation Manager for Clusters", §4

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Action, ActionKind, ReconfigurationPlan};

/// Plan performance indicators, in abstract time units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanKpi {
    /// Latest action end.
    pub makespan: i64,
    /// Sum of action ends.
    pub total_cost: i64,
    /// Number of actions.
    pub action_count: usize,
    /// Number of actions per kind.
    pub actions_by_kind: BTreeMap<ActionKind, usize>,
    /// Largest number of simultaneous actions.
    pub max_parallelism: usize,
    /// Memory consumption of the migrated VMs.
    pub migrated_memory: i64,
}

impl PlanKpi {
    /// Computes KPIs from a plan.
    pub fn calculate(plan: &ReconfigurationPlan) -> Self {
        let mut actions_by_kind = BTreeMap::new();
        for action in &plan.actions {
            *actions_by_kind.entry(action.action.kind()).or_insert(0) += 1;
        }

        // zero-length actions still occupy their instant
        let max_parallelism = plan
            .actions
            .iter()
            .map(|a| {
                plan.actions
                    .iter()
                    .filter(|b| b.start <= a.start && a.start < b.end.max(b.start + 1))
                    .count()
            })
            .max()
            .unwrap_or(0);

        let migrated_memory = plan
            .actions
            .iter()
            .filter_map(|a| match &a.action {
                Action::Migration { vm, .. } => plan.source().vm(vm),
                _ => None,
            })
            .map(|vm| i64::from(vm.memory_consumption))
            .sum();

        Self {
            makespan: plan.makespan(),
            total_cost: plan.total_cost(),
            action_count: plan.action_count(),
            actions_by_kind,
            max_parallelism,
            migrated_memory,
        }
    }

    /// Number of actions of a kind.
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions_by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Whether the plan meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_makespan: i64, max_parallelism: usize) -> bool {
        self.makespan <= max_makespan && self.max_parallelism <= max_parallelism
    }
}
