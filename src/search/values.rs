//! Value selectors.

use std::fmt::Debug;

use super::HeuristicContext;
use crate::config::FitPolicy;
use crate::cp::{VarId, VariableStore};
use crate::models::Dimension;

/// Picks the value tried first for a variable.
pub trait ValueSelector: Debug {
    /// Selector name.
    fn name(&self) -> &'static str;

    /// Value in the domain of `var`.
    fn select(&self, var: VarId, context: &HeuristicContext, store: &VariableStore) -> i64;
}

/// Smallest value of the domain.
#[derive(Debug, Clone, Copy)]
pub struct MinValue;

impl ValueSelector for MinValue {
    fn name(&self) -> &'static str {
        "min-value"
    }

    fn select(&self, var: VarId, _context: &HeuristicContext, store: &VariableStore) -> i64 {
        store.min(var)
    }
}

/// Node for a hoster according to a fit policy.
///
/// Online nodes come before nodes that would need a boot. Worst-fit takes
/// the node with the most residual capacity; best-fit the one with the
/// least residual capacity that still holds the VM, falling back to
/// worst-fit when none does.
pub fn fit_node(
    hoster: VarId,
    height: i64,
    fit: FitPolicy,
    dimension: Dimension,
    context: &HeuristicContext,
    store: &VariableStore,
) -> i64 {
    let candidates: Vec<(i64, bool, i64)> = store
        .domain(hoster)
        .values()
        .into_iter()
        .map(|node| {
            let index = node as usize;
            let bootable = context.bootable.get(index).copied().unwrap_or(false);
            let left = context.residual(store, index, dimension) - height;
            (node, bootable, left)
        })
        .collect();

    let worst = || {
        candidates
            .iter()
            .min_by_key(|&&(node, bootable, left)| (bootable, -left, node))
            .map(|&(node, ..)| node)
    };
    let chosen = match fit {
        FitPolicy::WorstFit => worst(),
        FitPolicy::BestFit => candidates
            .iter()
            .filter(|&&(_, _, left)| left >= 0)
            .min_by_key(|&&(node, bootable, left)| (bootable, left, node))
            .map(|&(node, ..)| node)
            .or_else(worst),
    };
    chosen.unwrap_or_else(|| store.min(hoster))
}

/// Current host when still allowed, else the fit policy.
#[derive(Debug, Clone, Copy)]
pub struct ContinuityFit {
    /// Policy for displaced VMs.
    pub fit: FitPolicy,
    /// Dimension the policy ranks on.
    pub dimension: Dimension,
}

impl ContinuityFit {
    /// Creates the selector.
    pub fn new(fit: FitPolicy, dimension: Dimension) -> Self {
        Self { fit, dimension }
    }
}

impl ValueSelector for ContinuityFit {
    fn name(&self) -> &'static str {
        "continuity-fit"
    }

    fn select(&self, var: VarId, context: &HeuristicContext, store: &VariableStore) -> i64 {
        let Some(vm) = context.vm_of(var) else {
            return store.min(var);
        };
        if let Some(origin) = vm.origin.map(|o| o as i64) {
            if store.contains(var, origin) {
                return origin;
            }
        }
        fit_node(var, vm.height(self.dimension), self.fit, self.dimension, context, store)
    }
}

/// Collective host of a group: where all members ran together, else fit.
#[derive(Debug, Clone, Copy)]
pub struct GroupHost {
    /// Policy when the group has no common host.
    pub fit: FitPolicy,
    /// Dimension the policy ranks on.
    pub dimension: Dimension,
}

impl GroupHost {
    /// Creates the selector.
    pub fn new(fit: FitPolicy, dimension: Dimension) -> Self {
        Self { fit, dimension }
    }
}

impl ValueSelector for GroupHost {
    fn name(&self) -> &'static str {
        "group-host"
    }

    fn select(&self, var: VarId, context: &HeuristicContext, store: &VariableStore) -> i64 {
        let Some(group) = context.groups.iter().find(|g| g.members.first() == Some(&var)) else {
            return ContinuityFit::new(self.fit, self.dimension).select(var, context, store);
        };
        if let Some(host) = group.previous_host.map(|h| h as i64) {
            if store.contains(var, host) {
                return host;
            }
        }
        let height: i64 = group
            .members
            .iter()
            .filter_map(|&h| context.vm_of(h))
            .map(|vm| vm.height(self.dimension))
            .sum();
        fit_node(var, height, self.fit, self.dimension, context, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::models::{Configuration, Node, TargetState, VirtualMachine};
    use crate::problem::ReconfigurationProblem;

    fn problem() -> ReconfigurationProblem {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_online(Node::new("N3").with_capacity(10, 10))
            .with_offline(Node::new("N4").with_capacity(20, 20))
            .with_running(VirtualMachine::new("VM1").with_usage(6, 1), "N1")
            .with_running(VirtualMachine::new("VM2").with_usage(3, 1), "N2")
            .with_running(VirtualMachine::new("VM3").with_usage(2, 1), "N1")
            .with_waiting(VirtualMachine::new("VM4").with_usage(3, 1));
        let target = TargetState::new().with_running(["VM4"]);
        ReconfigurationProblem::new(&source, &target, &PlannerConfig::default()).unwrap()
    }

    fn place(p: &mut ReconfigurationProblem, vm: &str, node: i64) {
        let hoster = p.vm_hoster(vm).unwrap();
        p.store_mut().instantiate(hoster, node).unwrap();
    }

    #[test]
    fn test_continuity_keeps_current_host() {
        let p = problem();
        let ctx = HeuristicContext::from_problem(&p);
        let selector = ContinuityFit::new(FitPolicy::WorstFit, Dimension::Cpu);
        let hoster = p.vm_hoster("VM2").unwrap();
        assert_eq!(selector.select(hoster, &ctx, p.store()), 1);
    }

    #[test]
    fn test_worst_fit_prefers_emptiest_online_node() {
        let mut p = problem();
        place(&mut p, "VM1", 0);
        place(&mut p, "VM2", 1);
        let ctx = HeuristicContext::from_problem(&p);
        let selector = ContinuityFit::new(FitPolicy::WorstFit, Dimension::Cpu);
        let hoster = p.vm_hoster("VM4").unwrap();
        // N3 is empty; N4 is larger but would need a boot
        assert_eq!(selector.select(hoster, &ctx, p.store()), 2);
    }

    #[test]
    fn test_best_fit_prefers_tightest_node() {
        let mut p = problem();
        place(&mut p, "VM1", 0);
        place(&mut p, "VM2", 1);
        let ctx = HeuristicContext::from_problem(&p);
        let selector = ContinuityFit::new(FitPolicy::BestFit, Dimension::Cpu);
        let hoster = p.vm_hoster("VM4").unwrap();
        // residual CPU after VM4: N1 1, N2 4, N3 7
        assert_eq!(selector.select(hoster, &ctx, p.store()), 0);
    }

    #[test]
    fn test_group_goes_back_to_common_host() {
        let mut p = problem();
        p.declare_group(vec!["VM1".into(), "VM3".into()]);
        let ctx = HeuristicContext::from_problem(&p);
        let hoster = p.vm_hoster("VM1").unwrap();
        let selector = GroupHost::new(FitPolicy::WorstFit, Dimension::Cpu);
        assert_eq!(selector.select(hoster, &ctx, p.store()), 0);

        p.store_mut().remove_value(hoster, 0).unwrap();
        // 8 CPU together: N2 and N3 tie, N4 needs a boot
        assert_eq!(selector.select(hoster, &ctx, p.store()), 1);
    }

    #[test]
    fn test_min_value() {
        let p = problem();
        let ctx = HeuristicContext::from_problem(&p);
        assert_eq!(MinValue.select(p.plan_end(), &ctx, p.store()), 0);
    }
}
