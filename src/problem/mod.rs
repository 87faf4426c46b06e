//! Reconfiguration problem formulation.
//!
//! Translates a source configuration and a target state into a constraint
//! satisfaction problem:
//!
//! | Concept | CSP form |
//! |---------|----------|
//! | Element occupying a node | [`Slice`] (hoster, start, duration, end) |
//! | What happens to an element | [`ActionModel`] composing slices |
//! | Whole request | [`ReconfigurationProblem`] |
//!
//! # Reference
//! - Hermenier et al. (2009), "Entropy: a Consolidation Manager for Clusters", VEE
//! - Hermenier et al. (2011), "Bin Repacking Scheduling in Virtualized Datacenters", CP

mod action_model;
mod boot;
mod reconfiguration;
mod slice;

pub use action_model::{node_model_kind, vm_model_kind, ActionModel, ActionModelKind};
pub use boot::NodeBoot;
pub use reconfiguration::ReconfigurationProblem;
pub use slice::{Slice, SliceId, SliceKind, SliceOwner};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::models::{Configuration, Node, TargetState, VirtualMachine};

    fn source() -> Configuration {
        Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(8, 4))
            .with_offline(Node::new("N3").with_capacity(10, 10))
            .with_running(
                VirtualMachine::new("VM1").with_consumption(4, 2).with_demand(7, 2),
                "N1",
            )
            .with_running(VirtualMachine::new("VM2").with_usage(6, 8), "N1")
            .with_sleeping(VirtualMachine::new("VM3").with_usage(1, 1), "N2")
            .with_waiting(VirtualMachine::new("VM4").with_usage(2, 2))
    }

    #[test]
    fn test_models_per_element() {
        let target = TargetState::new().with_running(["VM4"]).with_offline(["N3"]);
        let p = ReconfigurationProblem::new(&source(), &target, &PlannerConfig::default()).unwrap();

        assert_eq!(p.vm_model("VM1").unwrap().kind(), ActionModelKind::Migration);
        assert_eq!(p.vm_model("VM4").unwrap().kind(), ActionModelKind::Run);
        assert!(p.vm_model("VM3").is_none());
        assert_eq!(p.node_model("N1").unwrap().kind(), ActionModelKind::StayOnline);
        assert_eq!(p.node_model("N3").unwrap().kind(), ActionModelKind::StayOffline);
        assert_eq!(p.modeled_vms().collect::<Vec<_>>(), vec!["VM1", "VM2", "VM4"]);
    }

    #[test]
    fn test_horizon_from_worst_case() {
        let target = TargetState::new().with_running(["VM4"]).with_offline(["N3"]);
        let p = ReconfigurationProblem::new(&source(), &target, &PlannerConfig::default()).unwrap();
        // two migrations (6 each) and one run (1)
        assert_eq!(p.horizon(), 6 + 6 + 1 + 1);

        let config = PlannerConfig::default().with_horizon(50);
        let p = ReconfigurationProblem::new(&source(), &target, &config).unwrap();
        assert_eq!(p.horizon(), 50);
    }

    #[test]
    fn test_candidates_exclude_too_small_and_offline_nodes() {
        let target = TargetState::new().with_offline(["N3"]);
        let p = ReconfigurationProblem::new(&source(), &target, &PlannerConfig::default()).unwrap();
        let hoster = p.vm_hoster("VM2").unwrap();
        // VM2 needs 8 memory: N2 (4) is too small, N3 stays offline
        assert_eq!(p.store().domain(hoster).values(), vec![0]);
        let hoster = p.vm_hoster("VM1").unwrap();
        assert_eq!(p.store().domain(hoster).values(), vec![0, 1]);
    }

    #[test]
    fn test_bootable_node_is_candidate() {
        let p = ReconfigurationProblem::new(&source(), &TargetState::new(), &PlannerConfig::default())
            .unwrap();
        assert_eq!(p.node_model("N3").unwrap().kind(), ActionModelKind::BootableNode);
        let hoster = p.vm_hoster("VM1").unwrap();
        assert_eq!(p.store().domain(hoster).values(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unplaceable_vm_fails() {
        let source = source().with_waiting(VirtualMachine::new("BIG").with_usage(50, 1));
        let target = TargetState::new().with_running(["BIG"]);
        assert!(ReconfigurationProblem::new(&source, &target, &PlannerConfig::default()).is_err());
    }

    #[test]
    fn test_root_propagation_fixes_steady_state() {
        let target = TargetState::new().with_offline(["N3"]);
        let mut p =
            ReconfigurationProblem::new(&source(), &target, &PlannerConfig::default()).unwrap();
        p.model_mut().propagate().unwrap();
        // VM2 can only stay: no migration, no cost
        let model = p.vm_model("VM2").unwrap();
        let store = p.store();
        assert_eq!(store.value(model.duration()), Some(0));
        assert_eq!(p.store().min(p.total_cost()), 0);
    }

    #[test]
    fn test_shutdown_waits_for_leaving_vms() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(3, 3), "N1");
        let target = TargetState::new().with_offline(["N1"]);
        let mut p = ReconfigurationProblem::new(&source, &target, &PlannerConfig::default()).unwrap();
        p.model_mut().propagate().unwrap();

        let vm = p.vm_model("VM1").unwrap();
        let shutdown = p.node_model("N1").unwrap();
        let store = p.store();
        assert_eq!(store.value(p.vm_hoster("VM1").unwrap()), Some(1));
        assert_eq!(store.min(vm.end()), 6);
        assert!(store.min(shutdown.start()) >= 6);
    }
}
