//! Target state model.
//!
//! The target state tells the planner where each element should end up:
//! VMs to run, sleep, wait or terminate, nodes to keep online or offline.
//! Elements absent from the target keep their current state, except that
//! an offline node absent from the target may be booted when the planner
//! decides to place VMs on it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Configuration, NodeState, VmState};

/// Desired final state of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmGoal {
    /// Running somewhere.
    Run,
    /// Sleeping somewhere.
    Sleep,
    /// Waiting (not placed).
    Wait,
    /// Removed from the infrastructure.
    Terminate,
}

/// Desired partitions of VMs and nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    /// VMs that must be running.
    pub run: BTreeSet<String>,
    /// VMs that must be sleeping.
    pub sleep: BTreeSet<String>,
    /// VMs that must be waiting.
    pub wait: BTreeSet<String>,
    /// VMs that must be terminated.
    pub terminate: BTreeSet<String>,
    /// Nodes that must be online.
    pub online: BTreeSet<String>,
    /// Nodes that must be offline.
    pub offline: BTreeSet<String>,
}

fn ids<I, S>(items: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into)
}

impl TargetState {
    /// Creates an empty target (everything keeps its state).
    pub fn new() -> Self {
        Self::default()
    }

    /// Target reproducing the states of a configuration.
    pub fn from_configuration(configuration: &Configuration) -> Self {
        let mut target = Self::new();
        for vm in configuration.vms() {
            let set = match configuration.vm_state(&vm.id) {
                Some(VmState::Running { .. }) => &mut target.run,
                Some(VmState::Sleeping { .. }) => &mut target.sleep,
                _ => &mut target.wait,
            };
            set.insert(vm.id.clone());
        }
        for node in configuration.nodes() {
            match configuration.node_state(&node.id) {
                Some(NodeState::Online) => target.online.insert(node.id.clone()),
                _ => target.offline.insert(node.id.clone()),
            };
        }
        target
    }

    /// Adds VMs that must be running.
    pub fn with_running<I, S>(mut self, vms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run.extend(ids(vms));
        self
    }

    /// Adds VMs that must be sleeping.
    pub fn with_sleeping<I, S>(mut self, vms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sleep.extend(ids(vms));
        self
    }

    /// Adds VMs that must be waiting.
    pub fn with_waiting<I, S>(mut self, vms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wait.extend(ids(vms));
        self
    }

    /// Adds VMs that must be terminated.
    pub fn with_terminated<I, S>(mut self, vms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terminate.extend(ids(vms));
        self
    }

    /// Adds nodes that must be online.
    pub fn with_online<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.online.extend(ids(nodes));
        self
    }

    /// Adds nodes that must be offline.
    pub fn with_offline<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.offline.extend(ids(nodes));
        self
    }

    /// Goal declared for a VM, if any.
    pub fn vm_goal(&self, vm_id: &str) -> Option<VmGoal> {
        if self.run.contains(vm_id) {
            Some(VmGoal::Run)
        } else if self.sleep.contains(vm_id) {
            Some(VmGoal::Sleep)
        } else if self.wait.contains(vm_id) {
            Some(VmGoal::Wait)
        } else if self.terminate.contains(vm_id) {
            Some(VmGoal::Terminate)
        } else {
            None
        }
    }

    /// Goal declared for a node, if any.
    pub fn node_goal(&self, node_id: &str) -> Option<NodeState> {
        if self.online.contains(node_id) {
            Some(NodeState::Online)
        } else if self.offline.contains(node_id) {
            Some(NodeState::Offline)
        } else {
            None
        }
    }

    /// Goals declared for a VM, possibly more than one when inconsistent.
    pub fn vm_goals(&self, vm_id: &str) -> Vec<VmGoal> {
        [
            (&self.run, VmGoal::Run),
            (&self.sleep, VmGoal::Sleep),
            (&self.wait, VmGoal::Wait),
            (&self.terminate, VmGoal::Terminate),
        ]
        .into_iter()
        .filter(|(set, _)| set.contains(vm_id))
        .map(|(_, goal)| goal)
        .collect()
    }

    /// Every VM ID mentioned by the target.
    pub fn mentioned_vms(&self) -> BTreeSet<&str> {
        self.run
            .iter()
            .chain(&self.sleep)
            .chain(&self.wait)
            .chain(&self.terminate)
            .map(String::as_str)
            .collect()
    }

    /// Every node ID mentioned by the target.
    pub fn mentioned_nodes(&self) -> BTreeSet<&str> {
        self.online
            .iter()
            .chain(&self.offline)
            .map(String::as_str)
            .collect()
    }
}
