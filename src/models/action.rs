//! Concrete action model.
//!
//! An action is one operation of a reconfiguration plan: moving, starting,
//! stopping, suspending or resuming a VM, or powering a node on or off.
//! A [`TimedAction`] pins it on the plan's time axis.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Configuration, NodeState, VmState};

/// Classification of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    /// Live migration.
    Migration,
    /// Start of a waiting VM.
    Run,
    /// Stop of a VM.
    Stop,
    /// Running → sleeping.
    Suspend,
    /// Sleeping → running.
    Resume,
    /// Node power-on.
    Boot,
    /// Node power-off.
    Shutdown,
}

/// A reconfiguration action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Moves a running VM between two nodes.
    Migration {
        /// Migrated VM.
        vm: String,
        /// Source node.
        from: String,
        /// Destination node.
        to: String,
    },
    /// Starts a waiting VM on a node.
    Run {
        /// Started VM.
        vm: String,
        /// Hosting node.
        node: String,
    },
    /// Stops a running or sleeping VM.
    Stop {
        /// Stopped VM.
        vm: String,
        /// Node it was on.
        node: String,
    },
    /// Suspends a running VM, storing its image on `to`.
    Suspend {
        /// Suspended VM.
        vm: String,
        /// Node it was running on.
        from: String,
        /// Node storing the image.
        to: String,
    },
    /// Resumes a sleeping VM on `to`.
    Resume {
        /// Resumed VM.
        vm: String,
        /// Node storing the image.
        from: String,
        /// Node it will run on.
        to: String,
    },
    /// Powers a node on.
    Boot {
        /// Booted node.
        node: String,
    },
    /// Powers a node off.
    Shutdown {
        /// Halted node.
        node: String,
    },
}

impl Action {
    /// Kind of the action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Migration { .. } => ActionKind::Migration,
            Action::Run { .. } => ActionKind::Run,
            Action::Stop { .. } => ActionKind::Stop,
            Action::Suspend { .. } => ActionKind::Suspend,
            Action::Resume { .. } => ActionKind::Resume,
            Action::Boot { .. } => ActionKind::Boot,
            Action::Shutdown { .. } => ActionKind::Shutdown,
        }
    }

    /// The VM manipulated by the action, if any.
    pub fn vm(&self) -> Option<&str> {
        match self {
            Action::Migration { vm, .. }
            | Action::Run { vm, .. }
            | Action::Stop { vm, .. }
            | Action::Suspend { vm, .. }
            | Action::Resume { vm, .. } => Some(vm.as_str()),
            Action::Boot { .. } | Action::Shutdown { .. } => None,
        }
    }

    /// The node on which the action makes an element arrive, if any.
    pub fn destination(&self) -> Option<&str> {
        match self {
            Action::Migration { to, .. } | Action::Suspend { to, .. } | Action::Resume { to, .. } => {
                Some(to.as_str())
            }
            Action::Run { node, .. } => Some(node.as_str()),
            Action::Stop { .. } | Action::Boot { .. } | Action::Shutdown { .. } => None,
        }
    }

    /// Whether the action involves a given node.
    pub fn involves_node(&self, node_id: &str) -> bool {
        match self {
            Action::Migration { from, to, .. }
            | Action::Suspend { from, to, .. }
            | Action::Resume { from, to, .. } => from == node_id || to == node_id,
            Action::Run { node, .. }
            | Action::Stop { node, .. }
            | Action::Boot { node }
            | Action::Shutdown { node } => node == node_id,
        }
    }

    /// Applies the action to a configuration.
    ///
    /// Returns `false` when the configuration does not know the element
    /// the action manipulates.
    pub fn apply(&self, configuration: &mut Configuration) -> bool {
        match self {
            Action::Migration { vm, to, .. } | Action::Run { vm, node: to } => {
                configuration.set_vm_state(vm, VmState::Running { host: to.clone() })
            }
            Action::Resume { vm, to, .. } => {
                configuration.set_vm_state(vm, VmState::Running { host: to.clone() })
            }
            Action::Suspend { vm, to, .. } => {
                configuration.set_vm_state(vm, VmState::Sleeping { host: to.clone() })
            }
            Action::Stop { vm, .. } => configuration.set_vm_state(vm, VmState::Waiting),
            Action::Boot { node } => configuration.set_node_state(node, NodeState::Online),
            Action::Shutdown { node } => configuration.set_node_state(node, NodeState::Offline),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Migration { vm, from, to } => write!(f, "migrate({vm}, {from}, {to})"),
            Action::Run { vm, node } => write!(f, "run({vm}, {node})"),
            Action::Stop { vm, node } => write!(f, "stop({vm}, {node})"),
            Action::Suspend { vm, from, to } => write!(f, "suspend({vm}, {from}, {to})"),
            Action::Resume { vm, from, to } => write!(f, "resume({vm}, {from}, {to})"),
            Action::Boot { node } => write!(f, "boot({node})"),
            Action::Shutdown { node } => write!(f, "shutdown({node})"),
        }
    }
}

/// An action positioned on the plan's time axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedAction {
    /// The action.
    pub action: Action,
    /// Start instant.
    pub start: i64,
    /// Finish instant.
    pub end: i64,
}

impl TimedAction {
    /// Creates a timed action.
    pub fn new(action: Action, start: i64, end: i64) -> Self {
        Self { action, start, end }
    }

    /// Duration (end - start).
    #[inline]
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Whether two actions run at the same time.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.start, self.end, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Node, VirtualMachine};

    fn config() -> Configuration {
        Configuration::new()
            .with_online(Node::new("N1"))
            .with_online(Node::new("N2"))
            .with_offline(Node::new("N3"))
            .with_running(VirtualMachine::new("VM1"), "N1")
    }

    #[test]
    fn test_apply_migration() {
        let mut cfg = config();
        let a = Action::Migration {
            vm: "VM1".into(),
            from: "N1".into(),
            to: "N2".into(),
        };
        assert!(a.apply(&mut cfg));
        assert_eq!(cfg.location("VM1"), Some("N2"));
        assert_eq!(a.kind(), ActionKind::Migration);
        assert_eq!(a.destination(), Some("N2"));
        assert!(a.involves_node("N1"));
        assert!(!a.involves_node("N3"));
    }

    #[test]
    fn test_apply_node_actions() {
        let mut cfg = config();
        assert!(Action::Boot { node: "N3".into() }.apply(&mut cfg));
        assert!(cfg.is_online("N3"));
        assert!(Action::Shutdown { node: "N2".into() }.apply(&mut cfg));
        assert!(!cfg.is_online("N2"));
        assert!(!Action::Boot { node: "N9".into() }.apply(&mut cfg));
    }

    #[test]
    fn test_apply_suspend_then_stop() {
        let mut cfg = config();
        let suspend = Action::Suspend {
            vm: "VM1".into(),
            from: "N1".into(),
            to: "N1".into(),
        };
        assert!(suspend.apply(&mut cfg));
        assert_eq!(cfg.sleeping_vms(), vec!["VM1"]);
        let stop = Action::Stop {
            vm: "VM1".into(),
            node: "N1".into(),
        };
        assert!(stop.apply(&mut cfg));
        assert_eq!(cfg.waiting_vms(), vec!["VM1"]);
    }

    #[test]
    fn test_timed_action() {
        let a = TimedAction::new(Action::Boot { node: "N3".into() }, 0, 7);
        let b = TimedAction::new(
            Action::Run {
                vm: "VM2".into(),
                node: "N3".into(),
            },
            7,
            8,
        );
        assert_eq!(a.duration(), 7);
        assert!(!a.overlaps(&b));
        assert_eq!(a.to_string(), "0:7 boot(N3)");
        assert_eq!(b.action.vm(), Some("VM2"));
    }
}
