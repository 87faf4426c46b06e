//! Action models.
//!
//! An action model is the CSP-side view of what may happen to one element:
//! it composes zero, one or two slices and exposes the start, end, duration
//! and cost variables of the action. Which model an element gets depends on
//! its current state and its goal (see [`vm_model_kind`] and
//! [`node_model_kind`]).
//!
//! Relocations (migration, suspend, resume) share one shape: a consuming
//! slice on the current host, a demanding slice over the candidate hosts,
//! and a duration that depends on whether the element stays put.

use serde::{Deserialize, Serialize};

use super::{ReconfigurationProblem, Slice, SliceId, SliceOwner};
use crate::cp::{Contradiction, LessOrEqual, Plus, ReifiedEquality, Select, Solution, VarId};
use crate::models::{Action, NodeState, TimedAction, VmGoal, VmState};

/// Closed set of action models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionModelKind {
    /// Running VM that keeps running, possibly elsewhere.
    Migration,
    /// Waiting VM started somewhere.
    Run,
    /// Running or sleeping VM stopped.
    Stop,
    /// Running VM suspended, possibly to another node.
    Suspend,
    /// Sleeping VM resumed, possibly on another node.
    Resume,
    /// Offline node that must come online.
    Boot,
    /// Offline node that comes online only if a VM is placed on it.
    BootableNode,
    /// Online node that must go offline.
    Shutdown,
    /// Online node that stays online.
    StayOnline,
    /// Offline node that stays offline.
    StayOffline,
}

impl ActionModelKind {
    /// Whether the model manipulates a VM.
    pub fn is_vm_model(self) -> bool {
        matches!(
            self,
            ActionModelKind::Migration
                | ActionModelKind::Run
                | ActionModelKind::Stop
                | ActionModelKind::Suspend
                | ActionModelKind::Resume
        )
    }

    /// Whether the node is online once the plan is applied.
    pub fn ends_online(self) -> bool {
        matches!(
            self,
            ActionModelKind::StayOnline | ActionModelKind::Boot | ActionModelKind::BootableNode
        )
    }
}

/// Model for a VM, `None` when the VM keeps its state without any action.
pub fn vm_model_kind(state: &VmState, goal: Option<VmGoal>) -> Option<ActionModelKind> {
    use ActionModelKind as K;
    match (state, goal) {
        (VmState::Running { .. }, None | Some(VmGoal::Run)) => Some(K::Migration),
        (VmState::Running { .. }, Some(VmGoal::Sleep)) => Some(K::Suspend),
        (VmState::Running { .. }, Some(VmGoal::Wait | VmGoal::Terminate)) => Some(K::Stop),
        (VmState::Sleeping { .. }, Some(VmGoal::Run)) => Some(K::Resume),
        (VmState::Sleeping { .. }, Some(VmGoal::Wait | VmGoal::Terminate)) => Some(K::Stop),
        (VmState::Sleeping { .. }, None | Some(VmGoal::Sleep)) => None,
        (VmState::Waiting, Some(VmGoal::Run)) => Some(K::Run),
        (VmState::Waiting, _) => None,
    }
}

/// Model for a node.
pub fn node_model_kind(state: NodeState, goal: Option<NodeState>) -> ActionModelKind {
    use ActionModelKind as K;
    match (state, goal) {
        (NodeState::Online, Some(NodeState::Offline)) => K::Shutdown,
        (NodeState::Online, _) => K::StayOnline,
        (NodeState::Offline, Some(NodeState::Online)) => K::Boot,
        (NodeState::Offline, Some(NodeState::Offline)) => K::StayOffline,
        (NodeState::Offline, None) => K::BootableNode,
    }
}

/// Variables and slices of one action.
#[derive(Debug, Clone)]
pub struct ActionModel {
    kind: ActionModelKind,
    element: String,
    origin: Option<usize>,
    start: VarId,
    end: VarId,
    duration: VarId,
    cost: VarId,
    consuming: Option<SliceId>,
    demanding: Option<SliceId>,
}

/// Heights of a slice (CPU, memory).
pub(crate) type Heights = (i64, i64);

impl ActionModel {
    fn relocation(
        p: &mut ReconfigurationProblem,
        kind: ActionModelKind,
        vm: &str,
        origin: usize,
        (c_heights, d_heights): (Heights, Heights),
        candidates: &[usize],
        (local, remote): (i64, i64),
    ) -> Result<Self, Contradiction> {
        let horizon = p.horizon();
        let c = Slice::consuming(p.model_mut(), vm, SliceOwner::Vm, origin, c_heights, horizon);
        let d = Slice::demanding(
            p.model_mut(),
            vm,
            SliceOwner::Vm,
            candidates,
            d_heights,
            horizon,
        )?;
        let (c_end, d_start, d_hoster, d_duration) = (c.end(), d.start(), d.hoster(), d.duration());

        let model = p.model_mut();
        let s = model.store_mut();
        let stay = s.new_bool(format!("{vm}.stay"));
        let duration = s.new_int(format!("{vm}.duration"), local.min(remote), local.max(remote));
        model.post(ReifiedEquality::new(stay, d_hoster, origin as i64));
        model.post(Select::new(stay, duration, local, remote));
        model.post(Plus::new(d_start, duration, c_end));
        model.post(LessOrEqual::new(duration, d_duration));

        let consuming = p.add_slice(c);
        let demanding = p.add_slice(d);
        Ok(Self {
            kind,
            element: vm.to_string(),
            origin: Some(origin),
            start: d_start,
            end: c_end,
            duration,
            cost: c_end,
            consuming: Some(consuming),
            demanding: Some(demanding),
        })
    }

    /// Keeps a running VM running, on its host or elsewhere.
    pub(crate) fn migration(
        p: &mut ReconfigurationProblem,
        vm: &str,
        origin: usize,
        (consumption, demand): (Heights, Heights),
        candidates: &[usize],
    ) -> Result<Self, Contradiction> {
        let costs = (0, p.costs().migrate);
        Self::relocation(
            p,
            ActionModelKind::Migration,
            vm,
            origin,
            (consumption, demand),
            candidates,
            costs,
        )
    }

    /// Suspends a running VM; the image holds no resource.
    pub(crate) fn suspend(
        p: &mut ReconfigurationProblem,
        vm: &str,
        origin: usize,
        consumption: Heights,
        candidates: &[usize],
    ) -> Result<Self, Contradiction> {
        let costs = (p.costs().suspend_local, p.costs().suspend_remote);
        Self::relocation(
            p,
            ActionModelKind::Suspend,
            vm,
            origin,
            (consumption, (0, 0)),
            candidates,
            costs,
        )
    }

    /// Resumes a sleeping VM; the image holds no resource.
    pub(crate) fn resume(
        p: &mut ReconfigurationProblem,
        vm: &str,
        origin: usize,
        demand: Heights,
        candidates: &[usize],
    ) -> Result<Self, Contradiction> {
        let costs = (p.costs().resume_local, p.costs().resume_remote);
        Self::relocation(
            p,
            ActionModelKind::Resume,
            vm,
            origin,
            ((0, 0), demand),
            candidates,
            costs,
        )
    }

    /// Starts a waiting VM on one of `candidates`.
    pub(crate) fn run(
        p: &mut ReconfigurationProblem,
        vm: &str,
        demand: Heights,
        candidates: &[usize],
    ) -> Result<Self, Contradiction> {
        let horizon = p.horizon();
        let cost = p.costs().run;
        let d = Slice::demanding(p.model_mut(), vm, SliceOwner::Vm, candidates, demand, horizon)?;
        let start = d.start();

        let model = p.model_mut();
        let s = model.store_mut();
        let duration = s.constant(format!("{vm}.duration"), cost);
        let end = s.new_int(format!("{vm}.end"), 0, horizon);
        model.post(Plus::new(start, duration, end));

        let demanding = p.add_slice(d);
        Ok(Self {
            kind: ActionModelKind::Run,
            element: vm.to_string(),
            origin: None,
            start,
            end,
            duration,
            cost: end,
            consuming: None,
            demanding: Some(demanding),
        })
    }

    /// Stops a VM on its host.
    pub(crate) fn stop(
        p: &mut ReconfigurationProblem,
        vm: &str,
        origin: usize,
        consumption: Heights,
    ) -> Result<Self, Contradiction> {
        let horizon = p.horizon();
        let cost = p.costs().stop;
        let c = Slice::consuming(p.model_mut(), vm, SliceOwner::Vm, origin, consumption, horizon);
        let end = c.end();

        let model = p.model_mut();
        let s = model.store_mut();
        let start = s.new_int(format!("{vm}.start"), 0, horizon);
        let duration = s.constant(format!("{vm}.duration"), cost);
        model.post(Plus::new(start, duration, end));

        let consuming = p.add_slice(c);
        Ok(Self {
            kind: ActionModelKind::Stop,
            element: vm.to_string(),
            origin: Some(origin),
            start,
            end,
            duration,
            cost: end,
            consuming: Some(consuming),
            demanding: None,
        })
    }

    /// Boots a node; when `optional`, the boot may last 0 (no boot).
    pub(crate) fn boot(
        p: &mut ReconfigurationProblem,
        node: usize,
        optional: bool,
    ) -> Result<Self, Contradiction> {
        let horizon = p.horizon();
        let cost = p.costs().boot;
        let (id, capacity) = p.node_capacity(node);
        let c = Slice::consuming(p.model_mut(), &id, SliceOwner::Node, node, capacity, horizon);
        let store = p.model_mut().store_mut();
        if optional {
            store.restrict(c.duration(), &[0, cost].into_iter().collect())?;
        } else {
            c.fix_duration(store, cost)?;
        }
        let (start, end, duration) = (c.start(), c.end(), c.duration());

        let consuming = p.add_slice(c);
        Ok(Self {
            kind: if optional {
                ActionModelKind::BootableNode
            } else {
                ActionModelKind::Boot
            },
            element: id,
            origin: Some(node),
            start,
            end,
            duration,
            cost: end,
            consuming: Some(consuming),
            demanding: None,
        })
    }

    /// Powers a node off once every consuming slice on it has ended.
    pub(crate) fn shutdown(p: &mut ReconfigurationProblem, node: usize) -> Result<Self, Contradiction> {
        let horizon = p.horizon();
        let cost = p.costs().shutdown;
        let (id, capacity) = p.node_capacity(node);
        let d = Slice::demanding(p.model_mut(), &id, SliceOwner::Node, &[node], capacity, horizon)?;
        let (start, d_duration) = (d.start(), d.duration());

        let model = p.model_mut();
        let s = model.store_mut();
        let duration = s.constant(format!("{id}.duration"), cost);
        let end = s.new_int(format!("{id}.end"), 0, horizon);
        model.post(Plus::new(start, duration, end));
        model.post(LessOrEqual::new(duration, d_duration));

        let demanding = p.add_slice(d);
        Ok(Self {
            kind: ActionModelKind::Shutdown,
            element: id,
            origin: Some(node),
            start,
            end,
            duration,
            cost: end,
            consuming: None,
            demanding: Some(demanding),
        })
    }

    /// Keeps an offline node's capacity reserved for the whole plan.
    pub(crate) fn stay_offline(
        p: &mut ReconfigurationProblem,
        node: usize,
    ) -> Result<Self, Contradiction> {
        let horizon = p.horizon();
        let (id, capacity) = p.node_capacity(node);
        let d = Slice::demanding(p.model_mut(), &id, SliceOwner::Node, &[node], capacity, horizon)?;
        d.fix_start(p.model_mut().store_mut(), 0)?;
        let start = d.start();
        let zero = p.model_mut().store_mut().constant(format!("{id}.cost"), 0);

        let demanding = p.add_slice(d);
        Ok(Self {
            kind: ActionModelKind::StayOffline,
            element: id,
            origin: Some(node),
            start,
            end: start,
            duration: zero,
            cost: zero,
            consuming: None,
            demanding: Some(demanding),
        })
    }

    /// Leaves an online node alone.
    pub(crate) fn stay_online(p: &mut ReconfigurationProblem, node: usize) -> Self {
        let (id, _) = p.node_capacity(node);
        let zero = p.model_mut().store_mut().constant(format!("{id}.cost"), 0);
        Self {
            kind: ActionModelKind::StayOnline,
            element: id,
            origin: Some(node),
            start: zero,
            end: zero,
            duration: zero,
            cost: zero,
            consuming: None,
            demanding: None,
        }
    }

    /// Kind of model.
    pub fn kind(&self) -> ActionModelKind {
        self.kind
    }

    /// Manipulated element ID.
    pub fn element(&self) -> &str {
        &self.element
    }

    /// Node the element is on before the plan (the node itself for node models).
    pub fn origin(&self) -> Option<usize> {
        self.origin
    }

    /// Start variable.
    pub fn start(&self) -> VarId {
        self.start
    }

    /// End variable.
    pub fn end(&self) -> VarId {
        self.end
    }

    /// Duration variable.
    pub fn duration(&self) -> VarId {
        self.duration
    }

    /// Cost variable.
    pub fn cost(&self) -> VarId {
        self.cost
    }

    /// Consuming slice, if any.
    pub fn consuming_slice(&self) -> Option<SliceId> {
        self.consuming
    }

    /// Demanding slice, if any.
    pub fn demanding_slice(&self) -> Option<SliceId> {
        self.demanding
    }

    /// The concrete action this model stands for in a solution.
    ///
    /// `None` for no-ops: a VM staying on its host, an optional boot that
    /// did not happen, nodes keeping their state.
    pub fn to_action(
        &self,
        solution: &Solution,
        problem: &ReconfigurationProblem,
    ) -> Option<TimedAction> {
        let element = self.element.clone();
        let node_id = |index: usize| problem.node_id(index).to_string();
        let origin = self.origin.map(node_id);
        let destination = self
            .demanding
            .map(|d| problem.slice(d).hoster())
            .map(|h| node_id(solution.value(h) as usize));

        let action = match self.kind {
            ActionModelKind::Migration => {
                let (from, to) = (origin?, destination?);
                if from == to {
                    return None;
                }
                Action::Migration {
                    vm: element,
                    from,
                    to,
                }
            }
            ActionModelKind::Run => Action::Run {
                vm: element,
                node: destination?,
            },
            ActionModelKind::Stop => Action::Stop {
                vm: element,
                node: origin?,
            },
            ActionModelKind::Suspend => Action::Suspend {
                vm: element,
                from: origin?,
                to: destination?,
            },
            ActionModelKind::Resume => Action::Resume {
                vm: element,
                from: origin?,
                to: destination?,
            },
            ActionModelKind::Boot => Action::Boot { node: element },
            ActionModelKind::BootableNode if solution.value(self.duration) > 0 => {
                Action::Boot { node: element }
            }
            ActionModelKind::Shutdown => Action::Shutdown { node: element },
            ActionModelKind::BootableNode
            | ActionModelKind::StayOnline
            | ActionModelKind::StayOffline => return None,
        };
        Some(TimedAction::new(
            action,
            solution.value(self.start),
            solution.value(self.end),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_model_table() {
        let running = VmState::Running { host: "N1".into() };
        let sleeping = VmState::Sleeping { host: "N1".into() };
        let waiting = VmState::Waiting;
        use ActionModelKind as K;

        assert_eq!(vm_model_kind(&running, None), Some(K::Migration));
        assert_eq!(vm_model_kind(&running, Some(VmGoal::Run)), Some(K::Migration));
        assert_eq!(vm_model_kind(&running, Some(VmGoal::Sleep)), Some(K::Suspend));
        assert_eq!(vm_model_kind(&running, Some(VmGoal::Terminate)), Some(K::Stop));
        assert_eq!(vm_model_kind(&sleeping, Some(VmGoal::Run)), Some(K::Resume));
        assert_eq!(vm_model_kind(&sleeping, Some(VmGoal::Wait)), Some(K::Stop));
        assert_eq!(vm_model_kind(&sleeping, None), None);
        assert_eq!(vm_model_kind(&waiting, Some(VmGoal::Run)), Some(K::Run));
        assert_eq!(vm_model_kind(&waiting, Some(VmGoal::Terminate)), None);
        assert_eq!(vm_model_kind(&waiting, None), None);
    }

    #[test]
    fn test_node_model_table() {
        use ActionModelKind as K;
        assert_eq!(node_model_kind(NodeState::Online, Some(NodeState::Offline)), K::Shutdown);
        assert_eq!(node_model_kind(NodeState::Online, None), K::StayOnline);
        assert_eq!(node_model_kind(NodeState::Offline, Some(NodeState::Online)), K::Boot);
        assert_eq!(node_model_kind(NodeState::Offline, Some(NodeState::Offline)), K::StayOffline);
        assert_eq!(node_model_kind(NodeState::Offline, None), K::BootableNode);
        assert!(K::BootableNode.ends_online());
        assert!(!K::Shutdown.ends_online());
        assert!(K::Resume.is_vm_model());
        assert!(!K::Boot.is_vm_model());
    }
}
