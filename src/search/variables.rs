//! Variable selectors.
//!
//! Each selector returns the next variable its stage wants decided, or
//! `None` when the stage has nothing left.

use std::fmt::Debug;

use super::{ArrivalEntry, HeuristicContext};
use crate::cp::{VarId, VariableStore};

/// Picks the next variable to branch on.
pub trait VariableSelector: Debug {
    /// Selector name.
    fn name(&self) -> &'static str;

    /// Next unfixed variable of this stage.
    fn select(&self, context: &HeuristicContext, store: &VariableStore) -> Option<VarId>;
}

/// Hoster of the first member of every declared group.
///
/// Once the representative is placed, the group constraint drags the other
/// members along.
#[derive(Debug, Clone, Copy)]
pub struct GroupRepresentatives;

impl VariableSelector for GroupRepresentatives {
    fn name(&self) -> &'static str {
        "group-representatives"
    }

    fn select(&self, context: &HeuristicContext, store: &VariableStore) -> Option<VarId> {
        context
            .groups
            .iter()
            .filter_map(|g| g.members.first().copied())
            .find(|&h| !store.is_fixed(h))
    }
}

/// VM hosters: misplaced VMs first, then the largest memory and CPU demands.
#[derive(Debug, Clone, Copy)]
pub struct HostersByDemand;

impl VariableSelector for HostersByDemand {
    fn name(&self) -> &'static str {
        "hosters-by-demand"
    }

    fn select(&self, context: &HeuristicContext, store: &VariableStore) -> Option<VarId> {
        context
            .vms
            .iter()
            .map(|v| v.hoster)
            .find(|&h| !store.is_fixed(h))
    }
}

/// Starts of VM arrivals, by how freely they can be scheduled.
///
/// 1. arrivals on nodes that nothing will leave,
/// 2. VMs staying on their node,
/// 3. every other arrival.
///
/// Arrivals whose hoster is still open are skipped.
#[derive(Debug, Clone, Copy)]
pub struct TopologyStarts;

impl VariableSelector for TopologyStarts {
    fn name(&self) -> &'static str {
        "topology-starts"
    }

    fn select(&self, context: &HeuristicContext, store: &VariableStore) -> Option<VarId> {
        let open: Vec<(usize, &ArrivalEntry)> = context
            .arrivals
            .iter()
            .filter(|a| !store.is_fixed(a.start))
            .filter_map(|a| Some((store.value(a.hoster)? as usize, a)))
            .collect();

        open.iter()
            .find(|(node, _)| !context.has_leaving(store, *node))
            .or_else(|| open.iter().find(|(node, a)| a.origin == Some(*node)))
            .or_else(|| open.first())
            .map(|(_, a)| a.start)
    }
}

/// Any unfixed variable, in creation order, objectives last.
#[derive(Debug, Clone, Copy)]
pub struct AnyUnfixed;

impl VariableSelector for AnyUnfixed {
    fn name(&self) -> &'static str {
        "any-unfixed"
    }

    fn select(&self, context: &HeuristicContext, store: &VariableStore) -> Option<VarId> {
        context
            .variables
            .iter()
            .copied()
            .find(|&v| !store.is_fixed(v))
    }
}
