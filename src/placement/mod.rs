//! Placement constraints.
//!
//! A placement constraint restricts where running VMs may end. It is
//! checked against a configuration (to flag misplaced VMs before planning,
//! or to verify a plan's destination) and injected into a
//! [`ReconfigurationProblem`] as domain reductions or propagators.
//!
//! # Usage
//!
//! ```
//! use u_reconfig::placement::{Ban, PlacementConstraint, Spread};
//! use u_reconfig::models::{Configuration, Node, VirtualMachine};
//!
//! let cfg = Configuration::new()
//!     .with_online(Node::new("N1").with_capacity(8, 8))
//!     .with_running(VirtualMachine::new("VM1").with_usage(1, 1), "N1")
//!     .with_running(VirtualMachine::new("VM2").with_usage(1, 1), "N1");
//!
//! let spread = Spread::new(["VM1", "VM2"]);
//! assert!(!spread.is_satisfied(&cfg));
//! assert!(Ban::new(["VM1"], ["N2"]).is_satisfied(&cfg));
//! ```

pub mod rules;

pub use rules::{Ban, Fence, Gather, Spread};

use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::cp::{Contradiction, VarId};
use crate::models::Configuration;
use crate::problem::{ActionModelKind, ReconfigurationProblem};

/// A rule on the final placement of running VMs.
pub trait PlacementConstraint: Debug {
    /// Rule name (e.g., "ban", "spread").
    fn name(&self) -> &'static str;

    /// Whether a configuration honours the rule.
    fn is_satisfied(&self, configuration: &Configuration) -> bool {
        self.misplaced(configuration).is_empty()
    }

    /// Running VMs of the configuration that violate the rule.
    fn misplaced(&self, configuration: &Configuration) -> BTreeSet<String>;

    /// Restricts the problem so that every plan honours the rule.
    fn inject(&self, problem: &mut ReconfigurationProblem) -> Result<(), Contradiction>;
}

/// Host of a VM when it is running.
pub(crate) fn running_host<'a>(configuration: &'a Configuration, vm: &str) -> Option<&'a str> {
    configuration
        .vm_state(vm)
        .filter(|s| s.is_running())
        .and_then(|s| s.host())
}

/// Final hoster variables of the VMs that end running, paired with their IDs.
pub(crate) fn running_hosters<'a>(
    problem: &ReconfigurationProblem,
    vms: &'a BTreeSet<String>,
) -> Vec<(&'a str, VarId)> {
    vms.iter()
        .filter(|vm| {
            problem.vm_model(vm).is_some_and(|m| {
                matches!(
                    m.kind(),
                    ActionModelKind::Migration | ActionModelKind::Run | ActionModelKind::Resume
                )
            })
        })
        .filter_map(|vm| Some((vm.as_str(), problem.vm_hoster(vm)?)))
        .collect()
}

/// Node indices of known node IDs.
pub(crate) fn node_indices(problem: &ReconfigurationProblem, nodes: &BTreeSet<String>) -> BTreeSet<i64> {
    nodes
        .iter()
        .filter_map(|n| problem.node_index(n))
        .map(|i| i as i64)
        .collect()
}
