//! Reconfiguration plan (solution) model.
//!
//! A plan is the ordered list of timed actions turning a source
//! configuration into a destination configuration, together with the node
//! reservations the scheduler computed for it. Reservations are what the
//! capacity invariant is checked against: at every instant, the heights of
//! the reservations overlapping that instant on a node never exceed the
//! node's capacity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Action, ActionKind, Configuration, Dimension, NodeState, TimedAction, VmState};

/// A complete reconfiguration plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconfigurationPlan {
    /// Timed actions, ordered by start then end.
    pub actions: Vec<TimedAction>,
    /// Node reservations backing the actions.
    pub reservations: Vec<Reservation>,
    /// VMs removed from the infrastructure by the plan.
    pub terminated: BTreeSet<String>,
    source: Configuration,
    destination: Configuration,
}

/// Resources held by an element on a node during `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Owning element (VM or node ID).
    pub element: String,
    /// Node holding the resources.
    pub node: String,
    /// Start instant (inclusive).
    pub start: i64,
    /// End instant (exclusive).
    pub end: i64,
    /// Reserved CPU.
    pub cpu: i64,
    /// Reserved memory.
    pub memory: i64,
}

impl Reservation {
    /// Height along a dimension.
    pub fn height(&self, dimension: Dimension) -> i64 {
        match dimension {
            Dimension::Cpu => self.cpu,
            Dimension::Memory => self.memory,
        }
    }

    /// Whether the reservation holds the node at `time`.
    #[inline]
    pub fn contains(&self, time: i64) -> bool {
        self.start <= time && time < self.end
    }
}

/// A problem detected in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Related entity ID (node or VM).
    pub entity_id: String,
    /// Human-readable description.
    pub message: String,
}

/// Classification of plan violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// Reservations exceed a node's capacity at some instant.
    CapacityExceeded,
    /// A running or sleeping VM ends up on an offline node.
    OfflineHost,
    /// An action lands on a node before the node finished booting.
    BootOrder,
    /// A source VM is neither in the destination nor terminated.
    LostVm,
}

impl Violation {
    /// Creates a capacity violation.
    pub fn capacity_exceeded(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationType::CapacityExceeded, node_id, message)
    }

    /// Creates an offline host violation.
    pub fn offline_host(vm_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationType::OfflineHost, vm_id, message)
    }

    /// Creates a boot order violation.
    pub fn boot_order(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationType::BootOrder, node_id, message)
    }

    /// Creates a lost VM violation.
    pub fn lost_vm(vm_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationType::LostVm, vm_id, message)
    }

    fn new(
        violation_type: ViolationType,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            violation_type,
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

impl ReconfigurationPlan {
    /// Creates an empty plan whose destination equals the source.
    pub fn new(source: Configuration) -> Self {
        Self {
            actions: Vec::new(),
            reservations: Vec::new(),
            terminated: BTreeSet::new(),
            destination: source.clone(),
            source,
        }
    }

    /// Adds an action and applies it to the destination.
    pub fn add_action(&mut self, action: TimedAction) {
        action.action.apply(&mut self.destination);
        let position = self
            .actions
            .partition_point(|a| (a.start, a.end) <= (action.start, action.end));
        self.actions.insert(position, action);
    }

    /// Adds a reservation.
    pub fn add_reservation(&mut self, reservation: Reservation) {
        self.reservations.push(reservation);
    }

    /// Removes a VM from the destination.
    pub fn terminate(&mut self, vm_id: impl Into<String>) {
        let vm_id = vm_id.into();
        self.destination.remove_vm(&vm_id);
        self.terminated.insert(vm_id);
    }

    /// The configuration the plan starts from.
    pub fn source(&self) -> &Configuration {
        &self.source
    }

    /// The configuration the plan leads to.
    pub fn destination(&self) -> &Configuration {
        &self.destination
    }

    /// Number of actions.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan has no action.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Latest action end (0 for an empty plan).
    pub fn makespan(&self) -> i64 {
        self.actions.iter().map(|a| a.end).max().unwrap_or(0)
    }

    /// Sum of action ends.
    pub fn total_cost(&self) -> i64 {
        self.actions.iter().map(|a| a.end).sum()
    }

    /// Actions manipulating a VM.
    pub fn actions_for_vm(&self, vm_id: &str) -> Vec<&TimedAction> {
        self.actions
            .iter()
            .filter(|a| a.action.vm() == Some(vm_id))
            .collect()
    }

    /// Actions involving a node.
    pub fn actions_on_node(&self, node_id: &str) -> Vec<&TimedAction> {
        self.actions
            .iter()
            .filter(|a| a.action.involves_node(node_id))
            .collect()
    }

    /// Actions of a given kind.
    pub fn actions_of_kind(&self, kind: ActionKind) -> Vec<&TimedAction> {
        self.actions
            .iter()
            .filter(|a| a.action.kind() == kind)
            .collect()
    }

    /// Reservations held on a node.
    pub fn reservations_on(&self, node_id: &str) -> Vec<&Reservation> {
        self.reservations
            .iter()
            .filter(|r| r.node == node_id)
            .collect()
    }

    /// Peak usage of a node along a dimension, with the instant it occurs.
    pub fn peak_usage(&self, node_id: &str, dimension: Dimension) -> (i64, i64) {
        let mut events: Vec<(i64, i64)> = Vec::new();
        for r in self.reservations_on(node_id) {
            let h = r.height(dimension);
            if r.start < r.end && h != 0 {
                events.push((r.start, h));
                events.push((r.end, -h));
            }
        }
        // releases before acquisitions at the same instant
        events.sort();
        let mut usage = 0;
        let mut peak = (0, 0);
        for (time, delta) in events {
            usage += delta;
            if usage > peak.0 {
                peak = (usage, time);
            }
        }
        peak
    }

    /// Checks the plan and returns every violation found.
    ///
    /// Verifies the capacity invariant on every node of the source, that
    /// no VM ends on an offline node, that booted nodes receive nothing
    /// before their boot completes, and that no source VM is lost.
    pub fn verify(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        for node in self.source.nodes() {
            for dimension in Dimension::ALL {
                let (peak, time) = self.peak_usage(&node.id, dimension);
                let capacity = i64::from(node.capacity(dimension));
                if peak > capacity {
                    violations.push(Violation::capacity_exceeded(
                        &node.id,
                        format!("{dimension:?} usage {peak} > {capacity} at t={time}"),
                    ));
                }
            }
        }

        for vm in self.destination.vms() {
            if let Some(host) = self.destination.vm_state(&vm.id).and_then(VmState::host) {
                if self.destination.node_state(host) != Some(NodeState::Online) {
                    violations.push(Violation::offline_host(
                        &vm.id,
                        format!("VM '{}' ends on offline node '{}'", vm.id, host),
                    ));
                }
            }
        }

        for boot in self.actions_of_kind(ActionKind::Boot) {
            let Action::Boot { node } = &boot.action else {
                continue;
            };
            let node = node.as_str();
            for action in &self.actions {
                if action.action.destination() == Some(node) && action.start < boot.end {
                    violations.push(Violation::boot_order(
                        node,
                        format!("{} starts before {} completes", action, boot),
                    ));
                }
            }
        }

        for vm in self.source.vms() {
            if self.destination.vm(&vm.id).is_none() && !self.terminated.contains(&vm.id) {
                violations.push(Violation::lost_vm(
                    &vm.id,
                    format!("VM '{}' disappeared from the destination", vm.id),
                ));
            }
        }

        violations
    }

    /// Whether [`verify`](Self::verify) finds nothing.
    pub fn is_valid(&self) -> bool {
        self.verify().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Node, VirtualMachine};

    fn source() -> Configuration {
        Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_offline(Node::new("N3").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(6, 6), "N1")
            .with_running(VirtualMachine::new("VM2").with_usage(4, 4), "N1")
    }

    fn reservation(element: &str, node: &str, start: i64, end: i64, h: i64) -> Reservation {
        Reservation {
            element: element.into(),
            node: node.into(),
            start,
            end,
            cpu: h,
            memory: h,
        }
    }

    fn migration_plan() -> ReconfigurationPlan {
        let mut plan = ReconfigurationPlan::new(source());
        plan.add_action(TimedAction::new(
            Action::Migration {
                vm: "VM1".into(),
                from: "N1".into(),
                to: "N2".into(),
            },
            0,
            6,
        ));
        plan.add_reservation(reservation("VM1", "N1", 0, 6, 6));
        plan.add_reservation(reservation("VM1", "N2", 0, 20, 6));
        plan.add_reservation(reservation("VM2", "N1", 0, 20, 4));
        plan
    }

    #[test]
    fn test_plan_destination() {
        let plan = migration_plan();
        assert_eq!(plan.destination().location("VM1"), Some("N2"));
        assert_eq!(plan.source().location("VM1"), Some("N1"));
        assert_eq!(plan.action_count(), 1);
        assert_eq!(plan.makespan(), 6);
        assert_eq!(plan.total_cost(), 6);
        assert!(plan.is_valid());
    }

    #[test]
    fn test_plan_ordering() {
        let mut plan = ReconfigurationPlan::new(source());
        plan.add_action(TimedAction::new(Action::Boot { node: "N3".into() }, 5, 12));
        plan.add_action(TimedAction::new(
            Action::Stop {
                vm: "VM2".into(),
                node: "N1".into(),
            },
            0,
            2,
        ));
        assert_eq!(plan.actions[0].start, 0);
        assert_eq!(plan.actions[1].start, 5);
        assert_eq!(plan.actions_on_node("N1").len(), 1);
        assert_eq!(plan.actions_for_vm("VM2").len(), 1);
    }

    #[test]
    fn test_capacity_violation_detected() {
        let mut plan = migration_plan();
        plan.add_reservation(reservation("VM9", "N1", 2, 4, 1));
        let violations = plan.verify();
        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .all(|v| v.violation_type == ViolationType::CapacityExceeded));
        assert_eq!(plan.peak_usage("N1", Dimension::Cpu), (11, 2));
    }

    #[test]
    fn test_back_to_back_reservations_fit() {
        let mut plan = ReconfigurationPlan::new(source());
        plan.add_reservation(reservation("A", "N2", 0, 5, 10));
        plan.add_reservation(reservation("B", "N2", 5, 9, 10));
        assert!(plan.verify().is_empty());
    }

    #[test]
    fn test_boot_order_violation() {
        let mut plan = ReconfigurationPlan::new(source());
        plan.add_action(TimedAction::new(Action::Boot { node: "N3".into() }, 0, 7));
        plan.add_action(TimedAction::new(
            Action::Migration {
                vm: "VM2".into(),
                from: "N1".into(),
                to: "N3".into(),
            },
            3,
            9,
        ));
        let violations = plan.verify();
        assert!(violations
            .iter()
            .any(|v| v.violation_type == ViolationType::BootOrder));
    }

    #[test]
    fn test_offline_host_and_lost_vm() {
        let mut plan = ReconfigurationPlan::new(source());
        plan.add_action(TimedAction::new(Action::Shutdown { node: "N1".into() }, 0, 3));
        let types: Vec<_> = plan.verify().into_iter().map(|v| v.violation_type).collect();
        assert_eq!(types, vec![ViolationType::OfflineHost, ViolationType::OfflineHost]);

        let mut plan = ReconfigurationPlan::new(source());
        plan.terminate("VM1");
        assert!(plan.is_valid());
        assert!(plan.destination().vm("VM1").is_none());
    }
}
