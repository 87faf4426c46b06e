//! Built-in placement rules.
//!
//! | Rule | Meaning | Injection |
//! |------|---------|-----------|
//! | [`Ban`] | VMs never on the nodes | hoster values removed |
//! | [`Fence`] | VMs only on the nodes | hoster domains restricted |
//! | [`Spread`] | VMs on distinct nodes | all-different on hosters |
//! | [`Gather`] | VMs on one node | all-equal on hosters, search group |

use std::collections::{BTreeMap, BTreeSet};

use super::{node_indices, running_host, running_hosters, PlacementConstraint};
use crate::cp::{AllDifferent, AllEqual, Contradiction};
use crate::models::Configuration;
use crate::problem::ReconfigurationProblem;

fn id_set<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Running VMs of `vms` grouped by host.
fn by_host<'a>(configuration: &'a Configuration, vms: &'a BTreeSet<String>) -> BTreeMap<&'a str, Vec<&'a str>> {
    let mut hosts: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for vm in vms {
        if let Some(host) = running_host(configuration, vm) {
            hosts.entry(host).or_default().push(vm.as_str());
        }
    }
    hosts
}

// ======================== Ban ========================

/// The VMs must not run on any of the nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ban {
    /// Constrained VMs.
    pub vms: BTreeSet<String>,
    /// Forbidden nodes.
    pub nodes: BTreeSet<String>,
}

impl Ban {
    /// Creates the rule.
    pub fn new<I, S, J, T>(vms: I, nodes: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            vms: id_set(vms),
            nodes: id_set(nodes),
        }
    }
}

impl PlacementConstraint for Ban {
    fn name(&self) -> &'static str {
        "ban"
    }

    fn misplaced(&self, configuration: &Configuration) -> BTreeSet<String> {
        self.vms
            .iter()
            .filter(|vm| running_host(configuration, vm).is_some_and(|h| self.nodes.contains(h)))
            .cloned()
            .collect()
    }

    fn inject(&self, problem: &mut ReconfigurationProblem) -> Result<(), Contradiction> {
        let banned = node_indices(problem, &self.nodes);
        let hosters: Vec<_> = running_hosters(problem, &self.vms)
            .into_iter()
            .map(|(_, h)| h)
            .collect();
        let store = problem.store_mut();
        for hoster in hosters {
            for &node in &banned {
                store.remove_value(hoster, node)?;
            }
        }
        Ok(())
    }
}

// ======================== Fence ========================

/// The VMs may only run on the nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence {
    /// Constrained VMs.
    pub vms: BTreeSet<String>,
    /// Allowed nodes.
    pub nodes: BTreeSet<String>,
}

impl Fence {
    /// Creates the rule.
    pub fn new<I, S, J, T>(vms: I, nodes: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            vms: id_set(vms),
            nodes: id_set(nodes),
        }
    }
}

impl PlacementConstraint for Fence {
    fn name(&self) -> &'static str {
        "fence"
    }

    fn misplaced(&self, configuration: &Configuration) -> BTreeSet<String> {
        self.vms
            .iter()
            .filter(|vm| running_host(configuration, vm).is_some_and(|h| !self.nodes.contains(h)))
            .cloned()
            .collect()
    }

    fn inject(&self, problem: &mut ReconfigurationProblem) -> Result<(), Contradiction> {
        let allowed = node_indices(problem, &self.nodes);
        let hosters: Vec<_> = running_hosters(problem, &self.vms)
            .into_iter()
            .map(|(_, h)| h)
            .collect();
        let store = problem.store_mut();
        for hoster in hosters {
            store.restrict(hoster, &allowed)?;
        }
        Ok(())
    }
}

// ======================== Spread ========================

/// The VMs must run on pairwise distinct nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spread {
    /// Constrained VMs.
    pub vms: BTreeSet<String>,
}

impl Spread {
    /// Creates the rule.
    pub fn new<I, S>(vms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { vms: id_set(vms) }
    }
}

impl PlacementConstraint for Spread {
    fn name(&self) -> &'static str {
        "spread"
    }

    fn misplaced(&self, configuration: &Configuration) -> BTreeSet<String> {
        by_host(configuration, &self.vms)
            .into_values()
            .filter(|vms| vms.len() > 1)
            .flatten()
            .map(str::to_string)
            .collect()
    }

    fn inject(&self, problem: &mut ReconfigurationProblem) -> Result<(), Contradiction> {
        let hosters: Vec<_> = running_hosters(problem, &self.vms)
            .into_iter()
            .map(|(_, h)| h)
            .collect();
        if hosters.len() > 1 {
            problem.post(AllDifferent::new(hosters));
        }
        Ok(())
    }
}

// ======================== Gather ========================

/// The VMs must run together on a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gather {
    /// Constrained VMs.
    pub vms: BTreeSet<String>,
}

impl Gather {
    /// Creates the rule.
    pub fn new<I, S>(vms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { vms: id_set(vms) }
    }
}

impl PlacementConstraint for Gather {
    fn name(&self) -> &'static str {
        "gather"
    }

    fn misplaced(&self, configuration: &Configuration) -> BTreeSet<String> {
        let hosts = by_host(configuration, &self.vms);
        if hosts.len() <= 1 {
            return BTreeSet::new();
        }
        hosts.into_values().flatten().map(str::to_string).collect()
    }

    fn inject(&self, problem: &mut ReconfigurationProblem) -> Result<(), Contradiction> {
        let members: Vec<(String, _)> = running_hosters(problem, &self.vms)
            .into_iter()
            .map(|(vm, h)| (vm.to_string(), h))
            .collect();
        if members.len() > 1 {
            let hosters = members.iter().map(|&(_, h)| h).collect();
            problem.post(AllEqual::new(hosters));
            problem.declare_group(members.into_iter().map(|(vm, _)| vm).collect());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::models::{Node, TargetState, VirtualMachine};

    fn source() -> Configuration {
        Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_online(Node::new("N3").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(1, 1), "N1")
            .with_running(VirtualMachine::new("VM2").with_usage(1, 1), "N1")
            .with_running(VirtualMachine::new("VM3").with_usage(1, 1), "N2")
            .with_sleeping(VirtualMachine::new("VM4").with_usage(1, 1), "N1")
    }

    fn problem() -> ReconfigurationProblem {
        ReconfigurationProblem::new(&source(), &TargetState::new(), &PlannerConfig::default())
            .unwrap()
    }

    #[test]
    fn test_ban() {
        let ban = Ban::new(["VM1", "VM3", "VM4"], ["N1"]);
        assert_eq!(ban.misplaced(&source()), id_set(["VM1"]));

        let mut p = problem();
        ban.inject(&mut p).unwrap();
        let hoster = p.vm_hoster("VM1").unwrap();
        assert_eq!(p.store().domain(hoster).values(), vec![1, 2]);
        let hoster = p.vm_hoster("VM2").unwrap();
        assert_eq!(p.store().domain(hoster).values(), vec![0, 1, 2]);
    }

    #[test]
    fn test_fence() {
        let fence = Fence::new(["VM1", "VM3"], ["N2", "N3"]);
        assert_eq!(fence.misplaced(&source()), id_set(["VM1"]));
        assert!(Fence::new(["VM3"], ["N2"]).is_satisfied(&source()));

        let mut p = problem();
        fence.inject(&mut p).unwrap();
        let hoster = p.vm_hoster("VM1").unwrap();
        assert_eq!(p.store().domain(hoster).values(), vec![1, 2]);
    }

    #[test]
    fn test_fence_without_known_node_fails() {
        let mut p = problem();
        assert!(Fence::new(["VM1"], ["N9"]).inject(&mut p).is_err());
    }

    #[test]
    fn test_spread() {
        let spread = Spread::new(["VM1", "VM2", "VM3"]);
        assert_eq!(spread.misplaced(&source()), id_set(["VM1", "VM2"]));

        let mut p = problem();
        spread.inject(&mut p).unwrap();
        let hoster = p.vm_hoster("VM1").unwrap();
        p.store_mut().instantiate(hoster, 0).unwrap();
        p.model_mut().propagate().unwrap();
        let hoster = p.vm_hoster("VM2").unwrap();
        assert!(!p.store().contains(hoster, 0));
    }

    #[test]
    fn test_gather() {
        let gather = Gather::new(["VM1", "VM3"]);
        assert_eq!(gather.misplaced(&source()), id_set(["VM1", "VM3"]));
        assert!(Gather::new(["VM1", "VM2", "VM4"]).is_satisfied(&source()));

        let mut p = problem();
        gather.inject(&mut p).unwrap();
        assert_eq!(p.groups(), &[vec!["VM1".to_string(), "VM3".to_string()]]);
        let hoster = p.vm_hoster("VM3").unwrap();
        p.store_mut().instantiate(hoster, 2).unwrap();
        p.model_mut().propagate().unwrap();
        assert_eq!(p.store().value(p.vm_hoster("VM1").unwrap()), Some(2));
    }
}
