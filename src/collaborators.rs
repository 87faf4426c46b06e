//! Interfaces to the surrounding control loop.
//!
//! The planner itself never samples the infrastructure nor runs commands.
//! A control loop supplies the snapshot through a [`Monitor`], the
//! placement rules of each workload (vjob) through a [`VjobBuilder`], and
//! hands the plan to an [`Executor`]. [`run_iteration`] performs one
//! monitor → plan → execute pass.
//!
//! # Usage
//!
//! ```
//! use u_reconfig::collaborators::{
//!     run_iteration, ActionOutcome, ExecutionReport, Executor, Monitor, VjobBuilder,
//! };
//! use u_reconfig::models::{Configuration, Node, ReconfigurationPlan, TargetState, VirtualMachine};
//! use u_reconfig::placement::PlacementConstraint;
//! use u_reconfig::planner::ReconfigurationPlanner;
//!
//! struct Snapshot(Configuration);
//! impl Monitor for Snapshot {
//!     fn configuration(&self) -> Configuration {
//!         self.0.clone()
//!     }
//! }
//!
//! struct NoRules;
//! impl VjobBuilder for NoRules {
//!     fn constraints(&self, _vjob: &str) -> Vec<Box<dyn PlacementConstraint>> {
//!         Vec::new()
//!     }
//! }
//!
//! struct DryRun;
//! impl Executor for DryRun {
//!     fn execute(&mut self, plan: &ReconfigurationPlan) -> ExecutionReport {
//!         ExecutionReport::uniform(plan, ActionOutcome::Succeeded)
//!     }
//! }
//!
//! let monitor = Snapshot(
//!     Configuration::new()
//!         .with_online(Node::new("N1").with_capacity(4, 4))
//!         .with_waiting(VirtualMachine::new("VM1").with_usage(1, 1)),
//! );
//! let target = TargetState::new().with_running(["VM1"]);
//! let report = run_iteration(
//!     &monitor,
//!     &NoRules,
//!     &[],
//!     &target,
//!     &ReconfigurationPlanner::default(),
//!     &mut DryRun,
//! )
//! .unwrap();
//! assert!(report.execution.is_complete());
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PlanError;
use crate::models::{Configuration, ReconfigurationPlan, TargetState, TimedAction};
use crate::placement::PlacementConstraint;
use crate::planner::{PlanningOutcome, ReconfigurationPlanner};

/// Source of configuration snapshots.
pub trait Monitor {
    /// Current state of the infrastructure.
    fn configuration(&self) -> Configuration;
}

/// Source of the placement rules attached to a workload.
pub trait VjobBuilder {
    /// Placement constraints of the vjob.
    fn constraints(&self, vjob: &str) -> Vec<Box<dyn PlacementConstraint>>;
}

/// Runs the actions of a plan on the infrastructure.
pub trait Executor {
    /// Executes the plan and reports the outcome of every action.
    fn execute(&mut self, plan: &ReconfigurationPlan) -> ExecutionReport;
}

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// The action completed.
    Succeeded,
    /// The action was attempted and failed.
    Failed {
        /// Reason reported by the executor.
        reason: String,
    },
    /// The action was not attempted.
    Skipped,
}

/// An action and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    /// The action.
    pub action: TimedAction,
    /// What happened.
    pub outcome: ActionOutcome,
}

/// Per-action outcomes of a plan execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// One entry per executed action, in plan order.
    pub actions: Vec<ActionReport>,
}

impl ExecutionReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report giving every action of the plan the same outcome.
    pub fn uniform(plan: &ReconfigurationPlan, outcome: ActionOutcome) -> Self {
        let mut report = Self::new();
        for action in &plan.actions {
            report.record(action.clone(), outcome.clone());
        }
        report
    }

    /// Records an outcome.
    pub fn record(&mut self, action: TimedAction, outcome: ActionOutcome) {
        self.actions.push(ActionReport { action, outcome });
    }

    /// Number of succeeded actions.
    pub fn succeeded(&self) -> usize {
        self.actions
            .iter()
            .filter(|r| r.outcome == ActionOutcome::Succeeded)
            .count()
    }

    /// Actions that failed.
    pub fn failures(&self) -> Vec<&ActionReport> {
        self.actions
            .iter()
            .filter(|r| matches!(r.outcome, ActionOutcome::Failed { .. }))
            .collect()
    }

    /// Whether every action succeeded.
    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.actions.len()
    }
}

/// Result of one control-loop pass.
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// The computed plan.
    pub outcome: PlanningOutcome,
    /// What the executor did with it.
    pub execution: ExecutionReport,
}

/// Samples the infrastructure, plans towards `target` under the rules of
/// `vjobs`, and executes the plan.
///
/// Nothing is executed when planning fails.
pub fn run_iteration(
    monitor: &dyn Monitor,
    builder: &dyn VjobBuilder,
    vjobs: &[&str],
    target: &TargetState,
    planner: &ReconfigurationPlanner,
    executor: &mut dyn Executor,
) -> Result<IterationReport, PlanError> {
    let source = monitor.configuration();
    let constraints: Vec<Box<dyn PlacementConstraint>> = vjobs
        .iter()
        .flat_map(|vjob| builder.constraints(vjob))
        .collect();

    let outcome = planner.plan(&source, target, &constraints)?;
    let execution = executor.execute(&outcome.plan);

    let failed = execution.failures().len();
    if failed > 0 {
        warn!(failed, total = execution.actions.len(), "plan execution incomplete");
    } else {
        info!(actions = execution.actions.len(), "plan executed");
    }
    Ok(IterationReport { outcome, execution })
}
