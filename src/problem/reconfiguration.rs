//! The reconfiguration problem.
//!
//! Aggregates every variable, slice and action model of one planning run.
//! Building the problem:
//! 1. picks a model for every node and VM from its state and goal,
//! 2. computes the horizon from the worst-case durations,
//! 3. creates the models and their slices,
//! 4. couples node boots and shutdowns with the VMs around them,
//! 5. posts the cluster-wide scheduling propagators,
//! 6. creates the plan-end and total-cost objective variables.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use super::action_model::{node_model_kind, vm_model_kind, Heights};
use super::{ActionModel, ActionModelKind, NodeBoot, Slice, SliceId, SliceKind, SliceOwner};
use crate::config::{Objective, PlannerConfig};
use crate::cp::{Contradiction, LessOrEqual, Maximum, Model, Propagator, Sum, VarId, VariableStore};
use crate::models::{
    ActionKind, Configuration, CostModel, Dimension, Node, NodeState, TargetState, VirtualMachine,
};
use crate::scheduling::{DemandPacking, NodeCapacity, SlicesPlanner};

/// One planning run as a constraint satisfaction problem.
pub struct ReconfigurationProblem {
    model: Model,
    source: Configuration,
    target: TargetState,
    costs: CostModel,
    horizon: i64,
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    slices: Vec<Slice>,
    models: Vec<ActionModel>,
    vm_models: BTreeMap<String, usize>,
    node_models: BTreeMap<String, usize>,
    groups: Vec<Vec<String>>,
    misplaced: BTreeSet<String>,
    plan_end: VarId,
    total_cost: VarId,
    objective: Objective,
}

impl ReconfigurationProblem {
    /// Builds the problem.
    ///
    /// Fails when a VM that must run has no node able to host it.
    pub fn new(
        source: &Configuration,
        target: &TargetState,
        config: &PlannerConfig,
    ) -> Result<Self, Contradiction> {
        let nodes: Vec<Node> = source.nodes().cloned().collect();
        let node_index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let node_kinds: Vec<ActionModelKind> = nodes
            .iter()
            .map(|n| {
                let state = source.node_state(&n.id).unwrap_or(NodeState::Offline);
                node_model_kind(state, target.node_goal(&n.id))
            })
            .collect();
        let vm_kinds: Vec<(VirtualMachine, ActionModelKind)> = source
            .vms()
            .filter_map(|vm| {
                let state = source.vm_state(&vm.id)?;
                vm_model_kind(state, target.vm_goal(&vm.id)).map(|k| (vm.clone(), k))
            })
            .collect();

        let costs = config.costs.clone();
        let horizon = config.horizon.unwrap_or_else(|| {
            node_kinds
                .iter()
                .chain(vm_kinds.iter().map(|(_, k)| k))
                .map(|&k| worst_case(&costs, k))
                .sum::<i64>()
                + 1
        });

        let mut model = Model::new();
        let model_count = node_kinds.len() + vm_kinds.len();
        let plan_end = model.store_mut().new_int("plan.end", 0, horizon);
        let total_cost = model.store_mut().new_int(
            "plan.cost",
            0,
            horizon.saturating_mul(model_count.max(1) as i64),
        );

        let mut problem = Self {
            model,
            source: source.clone(),
            target: target.clone(),
            costs,
            horizon,
            nodes,
            node_index,
            slices: Vec::new(),
            models: Vec::new(),
            vm_models: BTreeMap::new(),
            node_models: BTreeMap::new(),
            groups: Vec::new(),
            misplaced: BTreeSet::new(),
            plan_end,
            total_cost,
            objective: config.objective,
        };

        let online_at_end: Vec<usize> = node_kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| k.ends_online())
            .map(|(i, _)| i)
            .collect();

        for (vm, kind) in &vm_kinds {
            let model = problem.build_vm_model(vm, *kind, &online_at_end)?;
            problem.vm_models.insert(vm.id.clone(), problem.models.len());
            problem.models.push(model);
        }
        for (index, kind) in node_kinds.iter().enumerate() {
            let model = match kind {
                ActionModelKind::Shutdown => ActionModel::shutdown(&mut problem, index)?,
                ActionModelKind::Boot => ActionModel::boot(&mut problem, index, false)?,
                ActionModelKind::BootableNode => ActionModel::boot(&mut problem, index, true)?,
                ActionModelKind::StayOffline => ActionModel::stay_offline(&mut problem, index)?,
                _ => ActionModel::stay_online(&mut problem, index),
            };
            problem
                .node_models
                .insert(problem.nodes[index].id.clone(), problem.models.len());
            problem.models.push(model);
        }

        problem.couple_nodes();
        problem.post_scheduling();
        problem.post_objectives();

        debug!(
            nodes = problem.nodes.len(),
            vms = problem.vm_models.len(),
            slices = problem.slices.len(),
            variables = problem.model.store().len(),
            propagators = problem.model.propagator_count(),
            horizon,
            "reconfiguration problem built"
        );
        Ok(problem)
    }

    fn build_vm_model(
        &mut self,
        vm: &VirtualMachine,
        kind: ActionModelKind,
        online_at_end: &[usize],
    ) -> Result<ActionModel, Contradiction> {
        let consumption = heights(vm, VirtualMachine::consumption);
        let demand = heights(vm, VirtualMachine::demand);
        let fitting: Vec<usize> = online_at_end
            .iter()
            .copied()
            .filter(|&i| self.fits(&self.nodes[i], vm))
            .collect();

        match kind {
            ActionModelKind::Migration => {
                let origin = self.origin_of(vm)?;
                ActionModel::migration(self, &vm.id, origin, (consumption, demand), &fitting)
            }
            ActionModelKind::Suspend => {
                let origin = self.origin_of(vm)?;
                ActionModel::suspend(self, &vm.id, origin, consumption, online_at_end)
            }
            ActionModelKind::Resume => {
                let origin = self.origin_of(vm)?;
                ActionModel::resume(self, &vm.id, origin, demand, &fitting)
            }
            ActionModelKind::Stop => {
                let origin = self.origin_of(vm)?;
                let running = self
                    .source
                    .vm_state(&vm.id)
                    .is_some_and(|s| s.is_running());
                let held = if running { consumption } else { (0, 0) };
                ActionModel::stop(self, &vm.id, origin, held)
            }
            _ => ActionModel::run(self, &vm.id, demand, &fitting),
        }
    }

    fn origin_of(&mut self, vm: &VirtualMachine) -> Result<usize, Contradiction> {
        let found = self
            .source
            .location(&vm.id)
            .and_then(|host| self.node_index.get(host))
            .copied();
        match found {
            Some(index) => Ok(index),
            None => {
                let unknown = self.model.store_mut().constant(format!("{}.origin", vm.id), -1);
                Err(Contradiction::EmptyDomain(unknown))
            }
        }
    }

    fn fits(&self, node: &Node, vm: &VirtualMachine) -> bool {
        vm.cpu_count <= node.cpu_count
            && Dimension::ALL
                .iter()
                .all(|&d| vm.demand(d) <= node.capacity(d))
    }

    /// Shutdowns wait for every consuming slice of their node; boots gate
    /// the demanding slices that may land on their node.
    fn couple_nodes(&mut self) {
        let mut precedences = Vec::new();
        let mut boots = Vec::new();
        let store = self.model.store();
        for model in &self.models {
            let Some(node) = model.origin() else { continue };
            match model.kind() {
                ActionModelKind::Shutdown => {
                    precedences.extend(
                        self.slices
                            .iter()
                            .filter(|s| {
                                s.is_consuming() && store.value(s.hoster()) == Some(node as i64)
                            })
                            .map(|s| LessOrEqual::new(s.end(), model.start())),
                    );
                }
                ActionModelKind::Boot | ActionModelKind::BootableNode => {
                    let arrivals: Vec<(VarId, VarId)> = self
                        .slices
                        .iter()
                        .filter(|s| {
                            s.kind == SliceKind::Demanding
                                && s.owner == SliceOwner::Vm
                                && store.contains(s.hoster(), node as i64)
                        })
                        .map(|s| (s.hoster(), s.start()))
                        .collect();
                    boots.push(NodeBoot::new(
                        &self.nodes[node].id,
                        node,
                        (model.duration(), model.end()),
                        self.costs.boot,
                        model.kind() == ActionModelKind::BootableNode,
                        arrivals,
                    ));
                }
                _ => {}
            }
        }
        for precedence in precedences {
            self.model.post(precedence);
        }
        for boot in boots {
            self.model.post(boot);
        }
    }

    fn post_scheduling(&mut self) {
        let capacities: Vec<NodeCapacity> = self
            .nodes
            .iter()
            .map(|n| NodeCapacity {
                id: n.id.clone(),
                cpu: i64::from(n.cpu_capacity),
                memory: i64::from(n.memory_capacity),
            })
            .collect();
        let links: Vec<(SliceId, SliceId)> = self
            .models
            .iter()
            .filter_map(|m| Some((m.consuming_slice()?, m.demanding_slice()?)))
            .collect();
        self.model.post(SlicesPlanner::new(
            capacities.clone(),
            self.slices.clone(),
            links,
            self.horizon,
        ));
        self.model
            .post(DemandPacking::new(capacities, self.slices.clone(), self.horizon));
    }

    fn post_objectives(&mut self) {
        let ends: Vec<VarId> = self.models.iter().map(ActionModel::end).collect();
        let costs: Vec<VarId> = self.models.iter().map(ActionModel::cost).collect();
        self.model.post(Maximum::new(self.plan_end, ends));
        self.model.post(Sum::new(self.total_cost, costs));
    }

    pub(crate) fn add_slice(&mut self, slice: Slice) -> SliceId {
        self.slices.push(slice);
        SliceId(self.slices.len() - 1)
    }

    pub(crate) fn node_capacity(&self, node: usize) -> (String, Heights) {
        let n = &self.nodes[node];
        (
            n.id.clone(),
            (i64::from(n.cpu_capacity), i64::from(n.memory_capacity)),
        )
    }

    /// Posts an extra propagator.
    pub fn post(&mut self, propagator: impl Propagator + 'static) {
        self.model.post(propagator);
    }

    /// The underlying model.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The underlying model, mutably.
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// Current domains.
    pub fn store(&self) -> &VariableStore {
        self.model.store()
    }

    /// Current domains, mutably.
    pub fn store_mut(&mut self) -> &mut VariableStore {
        self.model.store_mut()
    }

    /// Last instant of the plan.
    pub fn horizon(&self) -> i64 {
        self.horizon
    }

    /// Action durations.
    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    /// Source configuration.
    pub fn source(&self) -> &Configuration {
        &self.source
    }

    /// Target state.
    pub fn target(&self) -> &TargetState {
        &self.target
    }

    /// Nodes, in index order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// ID of the node at `index`.
    pub fn node_id(&self, index: usize) -> &str {
        &self.nodes[index].id
    }

    /// Index of a node.
    pub fn node_index(&self, node_id: &str) -> Option<usize> {
        self.node_index.get(node_id).copied()
    }

    /// Every slice, in creation order.
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// A slice.
    pub fn slice(&self, id: SliceId) -> &Slice {
        &self.slices[id.0]
    }

    /// Every action model.
    pub fn action_models(&self) -> &[ActionModel] {
        &self.models
    }

    /// Model of a VM, if it has one.
    pub fn vm_model(&self, vm_id: &str) -> Option<&ActionModel> {
        self.vm_models.get(vm_id).map(|&i| &self.models[i])
    }

    /// Model of a node.
    pub fn node_model(&self, node_id: &str) -> Option<&ActionModel> {
        self.node_models.get(node_id).map(|&i| &self.models[i])
    }

    /// IDs of the VMs having a model, ordered.
    pub fn modeled_vms(&self) -> impl Iterator<Item = &str> {
        self.vm_models.keys().map(String::as_str)
    }

    /// Final hoster variable of a VM (its demanding slice), if any.
    pub fn vm_hoster(&self, vm_id: &str) -> Option<VarId> {
        let slice = self.vm_model(vm_id)?.demanding_slice()?;
        Some(self.slice(slice).hoster())
    }

    /// Declares VMs that must end on one node; used by the search.
    pub fn declare_group(&mut self, vms: Vec<String>) {
        if !vms.is_empty() {
            self.groups.push(vms);
        }
    }

    /// Declared groups.
    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Marks VMs violating a placement rule in the source.
    pub fn mark_misplaced(&mut self, vms: impl IntoIterator<Item = String>) {
        self.misplaced.extend(vms);
    }

    /// VMs marked as misplaced.
    pub fn misplaced(&self) -> &BTreeSet<String> {
        &self.misplaced
    }

    /// Completion time of the last action.
    pub fn plan_end(&self) -> VarId {
        self.plan_end
    }

    /// Sum of the action costs.
    pub fn total_cost(&self) -> VarId {
        self.total_cost
    }

    /// Variable minimised by the search.
    pub fn objective(&self) -> VarId {
        match self.objective {
            Objective::TotalCost => self.total_cost,
            Objective::Makespan => self.plan_end,
        }
    }
}

fn heights(vm: &VirtualMachine, of: fn(&VirtualMachine, Dimension) -> i32) -> Heights {
    (
        i64::from(of(vm, Dimension::Cpu)),
        i64::from(of(vm, Dimension::Memory)),
    )
}

fn worst_case(costs: &CostModel, kind: ActionModelKind) -> i64 {
    match kind {
        ActionModelKind::Migration => costs.worst_case(ActionKind::Migration),
        ActionModelKind::Run => costs.worst_case(ActionKind::Run),
        ActionModelKind::Stop => costs.worst_case(ActionKind::Stop),
        ActionModelKind::Suspend => costs.worst_case(ActionKind::Suspend),
        ActionModelKind::Resume => costs.worst_case(ActionKind::Resume),
        ActionModelKind::Boot | ActionModelKind::BootableNode => costs.worst_case(ActionKind::Boot),
        ActionModelKind::Shutdown => costs.worst_case(ActionKind::Shutdown),
        ActionModelKind::StayOnline | ActionModelKind::StayOffline => 0,
    }
    .max(0)
}
