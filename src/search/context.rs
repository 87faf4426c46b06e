//! Read-only view of a problem for search heuristics.

use std::collections::HashMap;

use crate::cp::{VarId, VariableStore};
use crate::models::Dimension;
use crate::problem::{ActionModelKind, ReconfigurationProblem, SliceKind, SliceOwner};
use crate::scheduling::NodeCapacity;

/// A VM whose final host is decided by the search.
#[derive(Debug, Clone)]
pub struct VmEntry {
    /// VM ID.
    pub id: String,
    /// Final hoster variable.
    pub hoster: VarId,
    /// Current host index, if any.
    pub origin: Option<usize>,
    /// CPU demand.
    pub cpu: i64,
    /// Memory demand.
    pub memory: i64,
    /// Whether a placement rule flags the VM in the source.
    pub misplaced: bool,
}

impl VmEntry {
    /// Demand along a dimension.
    pub fn height(&self, dimension: Dimension) -> i64 {
        match dimension {
            Dimension::Cpu => self.cpu,
            Dimension::Memory => self.memory,
        }
    }
}

/// VMs that must end on one node.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    /// Hoster variables of the members, in declaration order.
    pub members: Vec<VarId>,
    /// Node hosting every member in the source, if they share one.
    pub previous_host: Option<usize>,
}

/// A VM demanding slice whose start is decided by the search.
#[derive(Debug, Clone)]
pub struct ArrivalEntry {
    /// Hoster variable.
    pub hoster: VarId,
    /// Start variable.
    pub start: VarId,
    /// Current host index of the VM, if any.
    pub origin: Option<usize>,
}

/// A non-empty consuming slice: something that frees its node at some point.
#[derive(Debug, Clone)]
pub struct LeavingEntry {
    /// Node being left.
    pub node: usize,
    /// Final hoster of the same element, if it has one.
    pub next_hoster: Option<VarId>,
}

/// Everything the selectors need, extracted once before the search.
#[derive(Debug, Clone, Default)]
pub struct HeuristicContext {
    /// Placed VMs, misplaced first then by decreasing memory and CPU.
    pub vms: Vec<VmEntry>,
    /// Declared groups.
    pub groups: Vec<GroupEntry>,
    /// VM arrivals.
    pub arrivals: Vec<ArrivalEntry>,
    /// Consuming slices.
    pub leaving: Vec<LeavingEntry>,
    /// Node capacities, by node index.
    pub capacities: Vec<NodeCapacity>,
    /// Nodes that are offline and only come online if used.
    pub bootable: Vec<bool>,
    /// Every demanding slice as (hoster, cpu, memory).
    pub demands: Vec<(VarId, i64, i64)>,
    /// Every decision variable, objectives last.
    pub variables: Vec<VarId>,
    vm_by_hoster: HashMap<VarId, usize>,
}

impl HeuristicContext {
    /// Extracts the context of a problem.
    pub fn from_problem(problem: &ReconfigurationProblem) -> Self {
        let store = problem.store();
        let mut vms: Vec<VmEntry> = problem
            .modeled_vms()
            .filter_map(|id| {
                let model = problem.vm_model(id)?;
                let slice = problem.slice(model.demanding_slice()?);
                Some(VmEntry {
                    id: id.to_string(),
                    hoster: slice.hoster(),
                    origin: model.origin(),
                    cpu: slice.cpu,
                    memory: slice.memory,
                    misplaced: problem.misplaced().contains(id),
                })
            })
            .collect();
        vms.sort_by(|a, b| {
            b.misplaced
                .cmp(&a.misplaced)
                .then(b.memory.cmp(&a.memory))
                .then(b.cpu.cmp(&a.cpu))
                .then(a.id.cmp(&b.id))
        });
        let vm_by_hoster = vms.iter().enumerate().map(|(i, v)| (v.hoster, i)).collect();

        let groups = problem
            .groups()
            .iter()
            .map(|members| {
                let hosts: Vec<Option<usize>> = members
                    .iter()
                    .map(|vm| {
                        problem
                            .source()
                            .location(vm)
                            .and_then(|node| problem.node_index(node))
                    })
                    .collect();
                let previous_host = match hosts.first() {
                    Some(&Some(first)) if hosts.iter().all(|&h| h == Some(first)) => Some(first),
                    _ => None,
                };
                GroupEntry {
                    members: members.iter().filter_map(|vm| problem.vm_hoster(vm)).collect(),
                    previous_host,
                }
            })
            .collect();

        let mut arrivals = Vec::new();
        let mut leaving = Vec::new();
        for model in problem.action_models() {
            let next_hoster = model
                .demanding_slice()
                .map(|d| problem.slice(d).hoster());
            if let Some(c) = model.consuming_slice() {
                let slice = problem.slice(c);
                if let (false, Some(node)) = (slice.is_empty(), store.value(slice.hoster())) {
                    leaving.push(LeavingEntry {
                        node: node as usize,
                        next_hoster,
                    });
                }
            }
            if let Some(d) = model.demanding_slice() {
                let slice = problem.slice(d);
                if slice.owner == SliceOwner::Vm {
                    arrivals.push(ArrivalEntry {
                        hoster: slice.hoster(),
                        start: slice.start(),
                        origin: model.origin(),
                    });
                }
            }
        }

        let capacities = problem
            .nodes()
            .iter()
            .map(|n| {
                NodeCapacity::new(
                    n.id.clone(),
                    i64::from(n.cpu_capacity),
                    i64::from(n.memory_capacity),
                )
            })
            .collect();
        let bootable = problem
            .nodes()
            .iter()
            .map(|n| {
                problem
                    .node_model(&n.id)
                    .is_some_and(|m| m.kind() == ActionModelKind::BootableNode)
            })
            .collect();
        let demands = problem
            .slices()
            .iter()
            .filter(|s| s.kind == SliceKind::Demanding)
            .map(|s| (s.hoster(), s.cpu, s.memory))
            .collect();

        let objectives = [problem.plan_end(), problem.total_cost()];
        let variables = store
            .vars()
            .filter(|v| !objectives.contains(v))
            .chain(objectives)
            .collect();

        Self {
            vms,
            groups,
            arrivals,
            leaving,
            capacities,
            bootable,
            demands,
            variables,
            vm_by_hoster,
        }
    }

    /// VM owning a hoster variable.
    pub fn vm_of(&self, hoster: VarId) -> Option<&VmEntry> {
        self.vm_by_hoster.get(&hoster).map(|&i| &self.vms[i])
    }

    /// Capacity of a node left once the placed demanding slices are counted.
    pub fn residual(&self, store: &VariableStore, node: usize, dimension: Dimension) -> i64 {
        let capacity = self.capacities.get(node).map_or(0, |c| c.get(dimension));
        let used: i64 = self
            .demands
            .iter()
            .filter(|(hoster, ..)| store.value(*hoster) == Some(node as i64))
            .map(|&(_, cpu, memory)| match dimension {
                Dimension::Cpu => cpu,
                Dimension::Memory => memory,
            })
            .sum();
        capacity - used
    }

    /// Whether something still occupies `node` and will leave it.
    pub fn has_leaving(&self, store: &VariableStore, node: usize) -> bool {
        self.leaving.iter().any(|l| {
            l.node == node
                && l
                    .next_hoster
                    .is_none_or(|h| store.value(h) != Some(node as i64))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::models::{Configuration, Node, TargetState, VirtualMachine};

    fn problem() -> ReconfigurationProblem {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_offline(Node::new("N3").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(2, 6), "N1")
            .with_running(VirtualMachine::new("VM2").with_usage(5, 6), "N1")
            .with_running(VirtualMachine::new("VM3").with_usage(1, 1), "N2");
        let mut p =
            ReconfigurationProblem::new(&source, &TargetState::new(), &PlannerConfig::default())
                .unwrap();
        p.mark_misplaced(["VM3".to_string()]);
        p.declare_group(vec!["VM1".into(), "VM2".into()]);
        p
    }

    #[test]
    fn test_vm_order() {
        let ctx = HeuristicContext::from_problem(&problem());
        let order: Vec<&str> = ctx.vms.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(order, vec!["VM3", "VM2", "VM1"]);
    }

    #[test]
    fn test_group_previous_host() {
        let ctx = HeuristicContext::from_problem(&problem());
        assert_eq!(ctx.groups.len(), 1);
        assert_eq!(ctx.groups[0].members.len(), 2);
        assert_eq!(ctx.groups[0].previous_host, Some(0));
    }

    #[test]
    fn test_residual_counts_placed_demands() {
        let mut p = problem();
        let ctx = HeuristicContext::from_problem(&p);
        let hoster = p.vm_hoster("VM2").unwrap();
        assert_eq!(ctx.residual(p.store(), 0, Dimension::Cpu), 10);
        p.store_mut().instantiate(hoster, 0).unwrap();
        assert_eq!(ctx.residual(p.store(), 0, Dimension::Cpu), 5);
        assert_eq!(ctx.residual(p.store(), 0, Dimension::Memory), 4);
    }

    #[test]
    fn test_leaving_until_staying() {
        let mut p = problem();
        let ctx = HeuristicContext::from_problem(&p);
        assert!(ctx.has_leaving(p.store(), 0));
        // the boot reservation of N3 ends too
        assert!(ctx.has_leaving(p.store(), 2));
        for vm in ["VM1", "VM2"] {
            let hoster = p.vm_hoster(vm).unwrap();
            p.store_mut().instantiate(hoster, 0).unwrap();
        }
        assert!(!ctx.has_leaving(p.store(), 0));
        assert!(ctx.has_leaving(p.store(), 1));
        assert!(ctx.bootable[2]);
        assert_eq!(ctx.variables.last(), Some(&p.total_cost()));
    }
}
