//! Reconfiguration planner.
//!
//! Turns a source configuration, a target state and placement constraints
//! into a timed [`ReconfigurationPlan`].
//!
//! # Algorithm
//! 1. Validate the request (every problem reported at once)
//! 2. Build the [`ReconfigurationProblem`] (slices, action models, scheduling)
//! 3. Flag VMs violating a placement constraint, then inject the constraints
//! 4. Depth-first branch-and-bound under the configured budget
//! 5. Project the best solution onto a plan and compute its KPIs
//!
//! # Usage
//!
//! ```
//! use u_reconfig::models::{Configuration, Node, TargetState, VirtualMachine};
//! use u_reconfig::planner::{PlanStatus, ReconfigurationPlanner};
//!
//! let source = Configuration::new()
//!     .with_online(Node::new("N1").with_capacity(8, 8))
//!     .with_waiting(VirtualMachine::new("VM1").with_usage(2, 2));
//! let target = TargetState::new().with_running(["VM1"]);
//!
//! let outcome = ReconfigurationPlanner::default()
//!     .plan(&source, &target, &[])
//!     .unwrap();
//! assert_eq!(outcome.status, PlanStatus::Optimal);
//! assert_eq!(outcome.plan.action_count(), 1);
//! assert!(outcome.plan.is_valid());
//! ```

mod extract;
mod kpi;

pub use kpi::PlanKpi;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlannerConfig;
use crate::cp::{SearchLimits, SearchStatistics, SearchStatus, Solver};
use crate::error::PlanError;
use crate::models::{Configuration, ReconfigurationPlan, TargetState};
use crate::placement::PlacementConstraint;
use crate::problem::ReconfigurationProblem;
use crate::search::SearchStrategy;
use crate::validation::validate_request;

/// How good the returned plan is known to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    /// Search space exhausted: no cheaper plan exists.
    Optimal,
    /// First plan found, optimisation disabled.
    Satisfied,
    /// Budget spent; best plan found so far.
    BestEffort,
}

/// Result of a successful planning run.
#[derive(Debug, Clone)]
pub struct PlanningOutcome {
    /// The plan.
    pub plan: ReconfigurationPlan,
    /// Quality guarantee.
    pub status: PlanStatus,
    /// Search counters.
    pub statistics: SearchStatistics,
    /// Plan indicators.
    pub kpi: PlanKpi,
}

/// Computes reconfiguration plans.
#[derive(Debug, Clone, Default)]
pub struct ReconfigurationPlanner {
    config: PlannerConfig,
}

impl ReconfigurationPlanner {
    /// Creates a planner.
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn limits(&self) -> SearchLimits {
        let mut limits = SearchLimits::default().with_optimize(self.config.optimize);
        if let Some(limit) = self.config.time_limit() {
            limits = limits.with_time_limit(limit);
        }
        if let Some(nodes) = self.config.node_limit {
            limits = limits.with_node_limit(nodes);
        }
        limits
    }

    /// Plans the reconfiguration from `source` to `target`.
    ///
    /// # Errors
    /// - [`PlanError::InvalidInput`] when validation fails
    /// - [`PlanError::Infeasible`] when no plan satisfies the constraints
    /// - [`PlanError::BudgetExhausted`] when the budget ran out first
    pub fn plan(
        &self,
        source: &Configuration,
        target: &TargetState,
        constraints: &[Box<dyn PlacementConstraint>],
    ) -> Result<PlanningOutcome, PlanError> {
        validate_request(source, target, &self.config.costs).map_err(PlanError::InvalidInput)?;
        info!(
            nodes = source.node_count(),
            vms = source.vm_count(),
            constraints = constraints.len(),
            "planning reconfiguration"
        );

        let mut problem =
            ReconfigurationProblem::new(source, target, &self.config).map_err(|err| {
                debug!(%err, "problem is infeasible at build time");
                PlanError::Infeasible
            })?;

        for constraint in constraints {
            problem.mark_misplaced(constraint.misplaced(source));
            constraint.inject(&mut problem).map_err(|err| {
                debug!(constraint = constraint.name(), %err, "constraint cannot be injected");
                PlanError::Infeasible
            })?;
        }

        let strategy = SearchStrategy::for_problem(&problem, &self.config);
        let objective = problem.objective();
        let outcome =
            Solver::new(self.limits()).solve(problem.model_mut(), &strategy, Some(objective));
        debug!(
            propagators = problem.model().propagator_count(),
            propagations = problem.model().propagations(),
            failures = outcome.statistics.failures,
            "search finished"
        );

        let Some(solution) = outcome.solution else {
            return Err(match outcome.status {
                SearchStatus::BudgetReached => PlanError::BudgetExhausted {
                    nodes: outcome.statistics.nodes,
                    elapsed: outcome.statistics.elapsed,
                },
                _ => PlanError::Infeasible,
            });
        };
        let status = match outcome.status {
            SearchStatus::Optimal => PlanStatus::Optimal,
            SearchStatus::Satisfied => PlanStatus::Satisfied,
            SearchStatus::BudgetReached | SearchStatus::Infeasible => PlanStatus::BestEffort,
        };

        let plan = extract::build_plan(&problem, &solution);
        let kpi = PlanKpi::calculate(&plan);
        info!(
            ?status,
            actions = kpi.action_count,
            makespan = kpi.makespan,
            cost = kpi.total_cost,
            nodes = outcome.statistics.nodes,
            "reconfiguration planned"
        );

        Ok(PlanningOutcome {
            plan,
            status,
            statistics: outcome.statistics,
            kpi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, ActionKind, Node, VirtualMachine, VmState};
    use crate::placement::{Ban, Fence, Gather, Spread};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn planner() -> ReconfigurationPlanner {
        ReconfigurationPlanner::new(PlannerConfig::default().with_time_limit_ms(2_000))
    }

    fn accepted(status: PlanStatus) -> bool {
        matches!(status, PlanStatus::Optimal | PlanStatus::BestEffort)
    }

    fn overloaded() -> Configuration {
        Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(8, 4))
            .with_running(
                VirtualMachine::new("VM1").with_consumption(4, 2).with_demand(7, 2),
                "N1",
            )
            .with_running(VirtualMachine::new("VM2").with_usage(6, 8), "N1")
    }

    #[test]
    fn test_noop_request() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(2, 2), "N1")
            .with_sleeping(VirtualMachine::new("VM2").with_usage(1, 1), "N1")
            .with_waiting(VirtualMachine::new("VM3").with_usage(1, 1));
        let outcome = planner().plan(&source, &TargetState::new(), &[]).unwrap();

        assert_eq!(outcome.status, PlanStatus::Optimal);
        assert!(outcome.plan.is_empty());
        assert_eq!(outcome.kpi.makespan, 0);
        assert_eq!(outcome.plan.destination(), &source);
    }

    #[test]
    fn test_reduced_demand_needs_no_action() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(5, 5))
            .with_online(Node::new("N2").with_capacity(5, 5))
            .with_running(
                VirtualMachine::new("VM1").with_consumption(5, 5).with_demand(2, 2),
                "N1",
            );
        let outcome = planner().plan(&source, &TargetState::new(), &[]).unwrap();

        assert_eq!(outcome.status, PlanStatus::Optimal);
        assert_eq!(outcome.plan.action_count(), 0);
        assert_eq!(outcome.plan.destination().location("VM1"), Some("N1"));
    }

    #[test]
    fn test_growing_demand_forces_one_migration() {
        let outcome = planner()
            .plan(&overloaded(), &TargetState::new(), &[])
            .unwrap();
        assert!(accepted(outcome.status));

        let plan = &outcome.plan;
        assert_eq!(plan.action_count(), 1);
        let migration = &plan.actions[0];
        assert_eq!(
            migration.action,
            Action::Migration {
                vm: "VM1".into(),
                from: "N1".into(),
                to: "N2".into(),
            }
        );
        assert_eq!((migration.start, migration.end), (0, 6));
        assert_eq!(plan.destination().location("VM1"), Some("N2"));
        assert_eq!(outcome.kpi.migrated_memory, 2);
        assert!(plan.is_valid());
    }

    #[test]
    fn test_boot_precedes_run() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_offline(Node::new("N2").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(4, 4), "N1")
            .with_waiting(VirtualMachine::new("VM2").with_usage(8, 8));
        let target = TargetState::new().with_running(["VM2"]);
        let outcome = planner().plan(&source, &target, &[]).unwrap();
        assert!(accepted(outcome.status));

        let plan = &outcome.plan;
        let boot = plan.actions_of_kind(ActionKind::Boot);
        assert_eq!(boot.len(), 1);
        assert_eq!((boot[0].start, boot[0].end), (0, 7));
        let run = plan.actions_of_kind(ActionKind::Run);
        assert_eq!(run.len(), 1);
        assert!(run[0].start >= 7);
        assert_eq!(
            plan.destination().vm_state("VM2"),
            Some(&VmState::Running { host: "N2".into() })
        );
        assert!(plan.is_valid());
    }

    #[test]
    fn test_local_suspend_and_resume() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(2, 2), "N1")
            .with_sleeping(VirtualMachine::new("VM2").with_usage(2, 2), "N1");
        let target = TargetState::new().with_sleeping(["VM1"]).with_running(["VM2"]);
        let outcome = planner().plan(&source, &target, &[]).unwrap();
        assert!(accepted(outcome.status));

        let plan = &outcome.plan;
        let suspend = plan.actions_of_kind(ActionKind::Suspend);
        assert_eq!(suspend.len(), 1);
        assert_eq!(
            suspend[0].action,
            Action::Suspend {
                vm: "VM1".into(),
                from: "N1".into(),
                to: "N1".into(),
            }
        );
        assert_eq!((suspend[0].start, suspend[0].end), (0, 3));

        let resume = plan.actions_of_kind(ActionKind::Resume);
        assert_eq!(resume.len(), 1);
        assert_eq!(
            resume[0].action,
            Action::Resume {
                vm: "VM2".into(),
                from: "N1".into(),
                to: "N1".into(),
            }
        );
        assert_eq!((resume[0].start, resume[0].end), (0, 3));
        assert!(plan.is_valid());
    }

    #[test]
    fn test_shutdown_waits_for_leaving_vms() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(2, 2), "N2")
            .with_sleeping(VirtualMachine::new("VM2").with_usage(2, 2), "N2");
        let target = TargetState::new().with_running(["VM2"]).with_offline(["N2"]);
        let outcome = planner().plan(&source, &target, &[]).unwrap();
        assert!(accepted(outcome.status));

        let plan = &outcome.plan;
        let resume = plan.actions_of_kind(ActionKind::Resume);
        assert_eq!(resume.len(), 1);
        assert_eq!(
            resume[0].action,
            Action::Resume {
                vm: "VM2".into(),
                from: "N2".into(),
                to: "N1".into(),
            }
        );
        assert_eq!(resume[0].end - resume[0].start, 6);

        let migration = plan.actions_of_kind(ActionKind::Migration);
        assert_eq!(migration.len(), 1);
        assert_eq!(migration[0].action.vm(), Some("VM1"));

        let shutdown = plan.actions_of_kind(ActionKind::Shutdown);
        assert_eq!(shutdown.len(), 1);
        assert_eq!(shutdown[0].action, Action::Shutdown { node: "N2".into() });
        assert_eq!(shutdown[0].end - shutdown[0].start, 3);
        assert!(shutdown[0].start >= resume[0].end);
        assert!(shutdown[0].start >= migration[0].end);
        assert!(!plan.destination().is_online("N2"));
        assert!(plan.is_valid());
    }

    #[test]
    fn test_terminated_vm_leaves_destination() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(2, 2), "N1")
            .with_waiting(VirtualMachine::new("VM2").with_usage(1, 1));
        let target = TargetState::new().with_terminated(["VM1", "VM2"]);
        let outcome = planner().plan(&source, &target, &[]).unwrap();

        assert_eq!(outcome.kpi.count(ActionKind::Stop), 1);
        assert_eq!(outcome.plan.destination().vm_count(), 0);
        assert!(outcome.plan.is_valid());
    }

    #[test]
    fn test_constraints_hold_in_destination() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_online(Node::new("N3").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(2, 2), "N1")
            .with_running(VirtualMachine::new("VM2").with_usage(2, 2), "N1")
            .with_running(VirtualMachine::new("VM3").with_usage(2, 2), "N2")
            .with_running(VirtualMachine::new("VM4").with_usage(2, 2), "N3");
        let constraints: Vec<Box<dyn PlacementConstraint>> = vec![
            Box::new(Spread::new(["VM1", "VM2"])),
            Box::new(Ban::new(["VM3"], ["N2"])),
            Box::new(Gather::new(["VM3", "VM4"])),
        ];
        let outcome = planner()
            .plan(&source, &TargetState::new(), &constraints)
            .unwrap();
        assert!(accepted(outcome.status));

        let destination = outcome.plan.destination();
        for constraint in &constraints {
            assert!(constraint.is_satisfied(destination), "{}", constraint.name());
        }
        assert_eq!(destination.location("VM3"), destination.location("VM4"));
        assert!(outcome.plan.is_valid());
    }

    #[test]
    fn test_invalid_input_rejected() {
        let source = Configuration::new().with_online(Node::new("N1").with_capacity(-1, 4));
        let err = planner().plan(&source, &TargetState::new(), &[]).unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(ref e) if !e.is_empty()));
    }

    #[test]
    fn test_unknown_fence_is_infeasible() {
        let constraints: Vec<Box<dyn PlacementConstraint>> =
            vec![Box::new(Fence::new(["VM1"], ["N9"]))];
        let err = planner()
            .plan(&overloaded(), &TargetState::new(), &constraints)
            .unwrap_err();
        assert!(matches!(err, PlanError::Infeasible));
    }

    #[test]
    fn test_capacity_shortage_is_infeasible() {
        // both VMs must leave N1 but N2 holds only one
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(5, 5))
            .with_running(VirtualMachine::new("VM1").with_usage(4, 4), "N1")
            .with_running(VirtualMachine::new("VM2").with_usage(4, 4), "N1");
        let target = TargetState::new().with_offline(["N1"]);
        let err = planner().plan(&source, &target, &[]).unwrap_err();
        assert!(matches!(err, PlanError::Infeasible));
    }

    #[test]
    fn test_first_plan_without_optimisation() {
        let planner = ReconfigurationPlanner::new(PlannerConfig::default().with_optimize(false));
        let outcome = planner.plan(&overloaded(), &TargetState::new(), &[]).unwrap();
        assert_eq!(outcome.status, PlanStatus::Satisfied);
        assert_eq!(outcome.statistics.solutions, 1);
        assert!(outcome.plan.is_valid());
    }

    #[test]
    fn test_zero_node_budget_exhausts() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_waiting(VirtualMachine::new("VM1").with_usage(1, 1));
        let target = TargetState::new().with_running(["VM1"]);
        let planner = ReconfigurationPlanner::new(PlannerConfig::default().with_node_limit(0));
        let err = planner.plan(&source, &target, &[]).unwrap_err();
        assert!(matches!(err, PlanError::BudgetExhausted { nodes: 0, .. }));
    }

    #[test]
    fn test_random_requests_yield_valid_plans() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = PlannerConfig::default()
            .with_time_limit_ms(300)
            .with_node_limit(20_000);
        let planner = ReconfigurationPlanner::new(config);

        for _ in 0..20 {
            let mut source = Configuration::new();
            let node_count = rng.random_range(2..=4);
            let mut free = Vec::new();
            for n in 0..node_count {
                let capacity = rng.random_range(8..=16);
                let node = Node::new(format!("N{n}")).with_capacity(capacity, capacity);
                if n > 0 && rng.random_bool(0.25) {
                    source = source.with_offline(node);
                } else {
                    source = source.with_online(node);
                    free.push((format!("N{n}"), capacity));
                }
            }

            let mut target = TargetState::new();
            for v in 0..rng.random_range(1..=6) {
                let id = format!("VM{v}");
                let usage = rng.random_range(1..=4);
                let vm = VirtualMachine::new(id.as_str())
                    .with_consumption(usage, usage)
                    .with_demand(usage + rng.random_range(0..=2), usage);
                let slot = rng.random_range(0..free.len());
                if free[slot].1 >= usage && rng.random_bool(0.8) {
                    free[slot].1 -= usage;
                    source = source.with_running(vm, free[slot].0.as_str());
                    if rng.random_bool(0.15) {
                        target = target.with_terminated([id]);
                    }
                } else {
                    source = source.with_waiting(vm);
                    if rng.random_bool(0.5) {
                        target = target.with_running([id]);
                    }
                }
            }

            match planner.plan(&source, &target, &[]) {
                Ok(outcome) => {
                    let violations = outcome.plan.verify();
                    assert!(violations.is_empty(), "{violations:?}");
                    for vm in source.vms() {
                        let kept = outcome.plan.destination().vm(&vm.id).is_some();
                        assert_eq!(kept, !target.terminate.contains(&vm.id));
                    }
                }
                Err(PlanError::Infeasible | PlanError::BudgetExhausted { .. }) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    }
}
