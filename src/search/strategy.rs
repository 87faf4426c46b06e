//! Staged branching strategy.

use std::sync::Arc;

use super::{
    AnyUnfixed, ContinuityFit, GroupHost, GroupRepresentatives, HeuristicContext,
    HostersByDemand, MinValue, TopologyStarts, ValueSelector, VariableSelector,
};
use crate::config::PlannerConfig;
use crate::cp::{Brancher, Decision, VariableStore};
use crate::problem::ReconfigurationProblem;

#[derive(Clone)]
struct Stage {
    variables: Arc<dyn VariableSelector>,
    values: Arc<dyn ValueSelector>,
}

/// Ordered list of (variable selector, value selector) stages.
///
/// The first stage proposing a variable makes the decision; when no stage
/// has anything left, the current node is a solution.
///
/// # Example
/// ```
/// use u_reconfig::search::{AnyUnfixed, HeuristicContext, MinValue, SearchStrategy};
///
/// let strategy = SearchStrategy::new(HeuristicContext::default())
///     .with_stage(AnyUnfixed, MinValue);
/// assert_eq!(strategy.stage_names(), vec![("any-unfixed", "min-value")]);
/// ```
#[derive(Clone)]
pub struct SearchStrategy {
    context: HeuristicContext,
    stages: Vec<Stage>,
}

impl SearchStrategy {
    /// Creates a strategy without stages.
    pub fn new(context: HeuristicContext) -> Self {
        Self {
            context,
            stages: Vec::new(),
        }
    }

    /// The default four-stage strategy for a problem.
    pub fn for_problem(problem: &ReconfigurationProblem, config: &PlannerConfig) -> Self {
        Self::new(HeuristicContext::from_problem(problem))
            .with_stage(
                GroupRepresentatives,
                GroupHost::new(config.fit, config.fit_dimension),
            )
            .with_stage(
                HostersByDemand,
                ContinuityFit::new(config.fit, config.fit_dimension),
            )
            .with_stage(TopologyStarts, MinValue)
            .with_stage(AnyUnfixed, MinValue)
    }

    /// Appends a stage.
    pub fn with_stage<V, W>(mut self, variables: V, values: W) -> Self
    where
        V: VariableSelector + 'static,
        W: ValueSelector + 'static,
    {
        self.stages.push(Stage {
            variables: Arc::new(variables),
            values: Arc::new(values),
        });
        self
    }

    /// Heuristic context.
    pub fn context(&self) -> &HeuristicContext {
        &self.context
    }

    /// Names of the stages, in order.
    pub fn stage_names(&self) -> Vec<(&'static str, &'static str)> {
        self.stages
            .iter()
            .map(|s| (s.variables.name(), s.values.name()))
            .collect()
    }
}

impl Brancher for SearchStrategy {
    fn next_decision(&self, store: &VariableStore) -> Option<Decision> {
        self.stages.iter().find_map(|stage| {
            let var = stage.variables.select(&self.context, store)?;
            let value = stage.values.select(var, &self.context, store);
            Some(Decision { var, value })
        })
    }
}

impl std::fmt::Debug for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchStrategy")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::{SearchLimits, SearchStatus, Solver};
    use crate::models::{Configuration, Node, TargetState, VirtualMachine};

    #[test]
    fn test_default_stages() {
        let source = Configuration::new().with_online(Node::new("N1").with_capacity(4, 4));
        let p = ReconfigurationProblem::new(&source, &TargetState::new(), &PlannerConfig::default())
            .unwrap();
        let strategy = SearchStrategy::for_problem(&p, &PlannerConfig::default());
        assert_eq!(
            strategy.stage_names(),
            vec![
                ("group-representatives", "group-host"),
                ("hosters-by-demand", "continuity-fit"),
                ("topology-starts", "min-value"),
                ("any-unfixed", "min-value"),
            ]
        );
    }

    #[test]
    fn test_strategy_fixes_every_variable() {
        let source = Configuration::new()
            .with_online(Node::new("N1").with_capacity(10, 10))
            .with_online(Node::new("N2").with_capacity(10, 10))
            .with_running(VirtualMachine::new("VM1").with_usage(4, 4), "N1")
            .with_waiting(VirtualMachine::new("VM2").with_usage(3, 3));
        let target = TargetState::new().with_running(["VM2"]);
        let config = PlannerConfig::default();
        let mut p = ReconfigurationProblem::new(&source, &target, &config).unwrap();
        let strategy = SearchStrategy::for_problem(&p, &config);
        let objective = p.objective();

        let solver = Solver::new(SearchLimits::default().with_node_limit(10_000));
        let outcome = solver.solve(p.model_mut(), &strategy, Some(objective));
        assert_eq!(outcome.status, SearchStatus::Satisfied);
        let solution = outcome.solution.unwrap();
        // VM1 stays, VM2 starts at 0 and ends after the run cost
        assert_eq!(solution.value(p.vm_hoster("VM1").unwrap()), 0);
        assert_eq!(solution.value(p.total_cost()), 1);
    }
}
