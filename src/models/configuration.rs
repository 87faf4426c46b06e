//! Configuration (infrastructure snapshot) model.
//!
//! A configuration is a consistent snapshot of the infrastructure: which
//! nodes are online or offline, and for every virtual machine whether it is
//! running, sleeping or waiting (and on which host for the first two).
//!
//! # Invariants
//! - A VM has exactly one state, so it appears in exactly one partition.
//! - A running or sleeping VM's host is an online node. This one is not
//!   enforced by the mutators; see [`crate::validation::validate_configuration`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Dimension, Node, VirtualMachine};

/// State of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Powered on, can host VMs.
    Online,
    /// Powered off.
    Offline,
}

/// State of a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmState {
    /// Running on a host.
    Running {
        /// Hosting node.
        host: String,
    },
    /// Suspended, its image stored on a host.
    Sleeping {
        /// Node storing the image.
        host: String,
    },
    /// Not placed anywhere.
    Waiting,
}

impl VmState {
    /// The host of a running or sleeping VM.
    pub fn host(&self) -> Option<&str> {
        match self {
            VmState::Running { host } | VmState::Sleeping { host } => Some(host),
            VmState::Waiting => None,
        }
    }

    /// Whether the VM is running.
    pub fn is_running(&self) -> bool {
        matches!(self, VmState::Running { .. })
    }
}

/// A snapshot of nodes and virtual machines with their states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    nodes: BTreeMap<String, Node>,
    node_states: BTreeMap<String, NodeState>,
    vms: BTreeMap<String, VirtualMachine>,
    vm_states: BTreeMap<String, VmState>,
}

impl Configuration {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an online node.
    pub fn with_online(mut self, node: Node) -> Self {
        self.add_node(node, NodeState::Online);
        self
    }

    /// Adds (or replaces) an offline node.
    pub fn with_offline(mut self, node: Node) -> Self {
        self.add_node(node, NodeState::Offline);
        self
    }

    /// Adds (or replaces) a VM running on `host`.
    pub fn with_running(mut self, vm: VirtualMachine, host: impl Into<String>) -> Self {
        self.add_vm(vm, VmState::Running { host: host.into() });
        self
    }

    /// Adds (or replaces) a VM sleeping on `host`.
    pub fn with_sleeping(mut self, vm: VirtualMachine, host: impl Into<String>) -> Self {
        self.add_vm(vm, VmState::Sleeping { host: host.into() });
        self
    }

    /// Adds (or replaces) a waiting VM.
    pub fn with_waiting(mut self, vm: VirtualMachine) -> Self {
        self.add_vm(vm, VmState::Waiting);
        self
    }

    /// Adds (or replaces) a node with the given state.
    pub fn add_node(&mut self, node: Node, state: NodeState) {
        self.node_states.insert(node.id.clone(), state);
        self.nodes.insert(node.id.clone(), node);
    }

    /// Adds (or replaces) a VM with the given state.
    pub fn add_vm(&mut self, vm: VirtualMachine, state: VmState) {
        self.vm_states.insert(vm.id.clone(), state);
        self.vms.insert(vm.id.clone(), vm);
    }

    /// Changes the state of a known node. Returns `false` if unknown.
    pub fn set_node_state(&mut self, node_id: &str, state: NodeState) -> bool {
        match self.node_states.get_mut(node_id) {
            Some(current) => {
                *current = state;
                true
            }
            None => false,
        }
    }

    /// Changes the state of a known VM. Returns `false` if unknown.
    pub fn set_vm_state(&mut self, vm_id: &str, state: VmState) -> bool {
        match self.vm_states.get_mut(vm_id) {
            Some(current) => {
                *current = state;
                true
            }
            None => false,
        }
    }

    /// Removes a VM from the configuration.
    pub fn remove_vm(&mut self, vm_id: &str) -> Option<VirtualMachine> {
        self.vm_states.remove(vm_id);
        self.vms.remove(vm_id)
    }

    /// Looks up a node.
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Looks up a VM.
    pub fn vm(&self, vm_id: &str) -> Option<&VirtualMachine> {
        self.vms.get(vm_id)
    }

    /// All nodes, ordered by ID.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All VMs, ordered by ID.
    pub fn vms(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.vms.values()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of VMs.
    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    /// State of a node.
    pub fn node_state(&self, node_id: &str) -> Option<NodeState> {
        self.node_states.get(node_id).copied()
    }

    /// State of a VM.
    pub fn vm_state(&self, vm_id: &str) -> Option<&VmState> {
        self.vm_states.get(vm_id)
    }

    /// Whether a node is online.
    pub fn is_online(&self, node_id: &str) -> bool {
        self.node_state(node_id) == Some(NodeState::Online)
    }

    /// Host of a running or sleeping VM.
    pub fn location(&self, vm_id: &str) -> Option<&str> {
        self.vm_states.get(vm_id).and_then(VmState::host)
    }

    /// IDs of online nodes.
    pub fn online_nodes(&self) -> Vec<&str> {
        self.nodes_in(NodeState::Online)
    }

    /// IDs of offline nodes.
    pub fn offline_nodes(&self) -> Vec<&str> {
        self.nodes_in(NodeState::Offline)
    }

    fn nodes_in(&self, state: NodeState) -> Vec<&str> {
        self.node_states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// IDs of running VMs.
    pub fn running_vms(&self) -> Vec<&str> {
        self.vms_matching(|s| matches!(s, VmState::Running { .. }))
    }

    /// IDs of sleeping VMs.
    pub fn sleeping_vms(&self) -> Vec<&str> {
        self.vms_matching(|s| matches!(s, VmState::Sleeping { .. }))
    }

    /// IDs of waiting VMs.
    pub fn waiting_vms(&self) -> Vec<&str> {
        self.vms_matching(|s| matches!(s, VmState::Waiting))
    }

    fn vms_matching(&self, predicate: impl Fn(&VmState) -> bool) -> Vec<&str> {
        self.vm_states
            .iter()
            .filter(|(_, s)| predicate(s))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// VMs running on a node.
    pub fn running_on(&self, node_id: &str) -> Vec<&VirtualMachine> {
        self.vm_states
            .iter()
            .filter(|(_, s)| matches!(s, VmState::Running { host } if host == node_id))
            .filter_map(|(id, _)| self.vms.get(id))
            .collect()
    }

    /// VMs sleeping on a node.
    pub fn sleeping_on(&self, node_id: &str) -> Vec<&VirtualMachine> {
        self.vm_states
            .iter()
            .filter(|(_, s)| matches!(s, VmState::Sleeping { host } if host == node_id))
            .filter_map(|(id, _)| self.vms.get(id))
            .collect()
    }

    /// Sum of the current consumption of the VMs running on a node.
    pub fn consumption_on(&self, node_id: &str, dimension: Dimension) -> i64 {
        self.running_on(node_id)
            .iter()
            .map(|vm| i64::from(vm.consumption(dimension)))
            .sum()
    }

    /// Sum of the demand of the VMs running on a node.
    pub fn demand_on(&self, node_id: &str, dimension: Dimension) -> i64 {
        self.running_on(node_id)
            .iter()
            .map(|vm| i64::from(vm.demand(dimension)))
            .sum()
    }

    /// Online nodes whose running VMs consume more than the capacity.
    pub fn overloaded_nodes(&self) -> Vec<&str> {
        self.overloaded_by(|cfg, id, dim| cfg.consumption_on(id, dim))
    }

    /// Online nodes whose running VMs demand more than the capacity.
    pub fn unsatisfied_nodes(&self) -> Vec<&str> {
        self.overloaded_by(|cfg, id, dim| cfg.demand_on(id, dim))
    }

    fn overloaded_by(&self, load: impl Fn(&Self, &str, Dimension) -> i64) -> Vec<&str> {
        self.nodes
            .values()
            .filter(|n| {
                Dimension::ALL
                    .iter()
                    .any(|&d| load(self, &n.id, d) > i64::from(n.capacity(d)))
            })
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Whether no node is overloaded by current consumption.
    pub fn is_viable(&self) -> bool {
        self.overloaded_nodes().is_empty()
    }
}
