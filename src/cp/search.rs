//! Depth-first branch-and-bound search.
//!
//! # Algorithm
//! At every node the [`Brancher`] proposes a decision `x = v`. The left
//! branch posts it, the right branch (explored on backtrack) posts
//! `x != v`. Propagation runs after each branch. When the brancher has
//! nothing left to decide, the current assignment is a solution; in
//! optimisation mode the objective is then bounded by `best - 1` and the
//! search continues until the tree is exhausted or the budget is spent.
//!
//! The search is iterative: choice points live on an explicit stack, so
//! deep trees cannot overflow the call stack.

use std::time::{Duration, Instant};

use tracing::debug;

use super::{Contradiction, Model, VarId, VariableStore};

/// A branching decision `var = value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Variable to fix.
    pub var: VarId,
    /// Value tried first.
    pub value: i64,
}

/// Chooses the next decision.
pub trait Brancher {
    /// Next decision, or `None` when the current node is a solution.
    fn next_decision(&self, store: &VariableStore) -> Option<Decision>;
}

/// Search budget and mode.
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    /// Wall-clock limit.
    pub time_limit: Option<Duration>,
    /// Maximum number of decisions.
    pub node_limit: Option<u64>,
    /// Keep searching for better solutions after the first one.
    pub optimize: bool,
}

impl SearchLimits {
    /// Sets the time limit.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Sets the node limit.
    pub fn with_node_limit(mut self, limit: u64) -> Self {
        self.node_limit = Some(limit);
        self
    }

    /// Enables optimisation.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }
}

/// Values of every variable at a solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    values: Vec<i64>,
}

impl Solution {
    fn capture(store: &VariableStore) -> Self {
        Self {
            values: store.vars().map(|v| store.min(v)).collect(),
        }
    }

    /// Value of a variable.
    pub fn value(&self, var: VarId) -> i64 {
        self.values[var.index()]
    }
}

/// How the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// Tree exhausted with a solution: the last one is optimal.
    Optimal,
    /// First solution returned without optimisation.
    Satisfied,
    /// Budget spent; the best solution so far, if any, is returned.
    BudgetReached,
    /// Tree exhausted without a solution.
    Infeasible,
}

/// Search counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    /// Decisions taken.
    pub nodes: u64,
    /// Failed branches.
    pub failures: u64,
    /// Solutions found.
    pub solutions: u64,
    /// Deepest decision stack.
    pub max_depth: usize,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

/// Result of [`Solver::solve`].
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best solution found.
    pub solution: Option<Solution>,
    /// Termination status.
    pub status: SearchStatus,
    /// Counters.
    pub statistics: SearchStatistics,
}

struct ChoicePoint {
    decision: Decision,
    refuted: bool,
}

/// Depth-first branch-and-bound solver.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    limits: SearchLimits,
}

impl Solver {
    /// Creates a solver with the given budget.
    pub fn new(limits: SearchLimits) -> Self {
        Self { limits }
    }

    fn exhausted(&self, started: Instant, nodes: u64) -> bool {
        self.limits
            .time_limit
            .is_some_and(|limit| started.elapsed() >= limit)
            || self.limits.node_limit.is_some_and(|limit| nodes >= limit)
    }

    /// Searches the model, minimising `objective` when optimisation is on.
    ///
    /// The model is left in the state it had on entry.
    pub fn solve(
        &self,
        model: &mut Model,
        brancher: &dyn Brancher,
        objective: Option<VarId>,
    ) -> SearchOutcome {
        let started = Instant::now();
        let entry_level = model.level();
        let mut stats = SearchStatistics::default();
        let mut best: Option<Solution> = None;
        let mut bound: Option<i64> = None;
        let mut budget_hit = false;
        let mut stack: Vec<ChoicePoint> = Vec::new();

        model.push_level();
        let mut consistent = model.propagate().is_ok();

        'search: loop {
            if consistent {
                match brancher.next_decision(model.store()) {
                    None => {
                        let solution = Solution::capture(model.store());
                        stats.solutions += 1;
                        let cost = objective.map(|o| solution.value(o));
                        debug!(
                            solutions = stats.solutions,
                            nodes = stats.nodes,
                            ?cost,
                            "solution found"
                        );
                        best = Some(solution);
                        match cost {
                            Some(cost) if self.limits.optimize => bound = Some(cost - 1),
                            _ => break 'search,
                        }
                    }
                    Some(decision) => {
                        if self.exhausted(started, stats.nodes) {
                            debug!(nodes = stats.nodes, "search budget reached");
                            budget_hit = true;
                            break 'search;
                        }
                        stats.nodes += 1;
                        model.push_level();
                        stack.push(ChoicePoint {
                            decision,
                            refuted: false,
                        });
                        stats.max_depth = stats.max_depth.max(stack.len());
                        consistent = apply(model, objective, bound, |s| {
                            s.instantiate(decision.var, decision.value).map(|_| ())
                        })
                        .is_ok();
                        if consistent {
                            continue 'search;
                        }
                        stats.failures += 1;
                    }
                }
            }

            // backtrack to the deepest unrefuted choice point
            loop {
                let Some(point) = stack.pop() else {
                    break 'search;
                };
                model.pop_level();
                if point.refuted {
                    continue;
                }
                if self.exhausted(started, stats.nodes) {
                    budget_hit = true;
                    break 'search;
                }
                let decision = point.decision;
                model.push_level();
                stack.push(ChoicePoint {
                    decision,
                    refuted: true,
                });
                consistent = apply(model, objective, bound, |s| {
                    s.remove_value(decision.var, decision.value).map(|_| ())
                })
                .is_ok();
                if consistent {
                    continue 'search;
                }
                stats.failures += 1;
            }
        }

        while model.level() > entry_level {
            model.pop_level();
        }
        stats.elapsed = started.elapsed();

        let status = match (&best, budget_hit) {
            (_, true) => SearchStatus::BudgetReached,
            (Some(_), false) if self.limits.optimize && objective.is_some() => {
                SearchStatus::Optimal
            }
            (Some(_), false) => SearchStatus::Satisfied,
            (None, false) => SearchStatus::Infeasible,
        };
        SearchOutcome {
            solution: best,
            status,
            statistics: stats,
        }
    }
}

fn apply(
    model: &mut Model,
    objective: Option<VarId>,
    bound: Option<i64>,
    branch: impl FnOnce(&mut VariableStore) -> Result<(), Contradiction>,
) -> Result<(), Contradiction> {
    branch(model.store_mut())?;
    if let (Some(objective), Some(bound)) = (objective, bound) {
        model.store_mut().set_max(objective, bound)?;
    }
    model.propagate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::{AllDifferent, Plus, Sum};

    /// Fixes the first unfixed variable to its minimum.
    struct FirstFail;

    impl Brancher for FirstFail {
        fn next_decision(&self, store: &VariableStore) -> Option<Decision> {
            store.vars().find(|&v| !store.is_fixed(v)).map(|var| Decision {
                var,
                value: store.min(var),
            })
        }
    }

    /// Fixes the first unfixed variable to its maximum.
    struct Greedy;

    impl Brancher for Greedy {
        fn next_decision(&self, store: &VariableStore) -> Option<Decision> {
            store.vars().find(|&v| !store.is_fixed(v)).map(|var| Decision {
                var,
                value: store.max(var),
            })
        }
    }

    #[test]
    fn test_satisfy() {
        let mut m = Model::new();
        let s = m.store_mut();
        let vars: Vec<VarId> = (0..3).map(|i| s.new_int(format!("x{i}"), 0, 2)).collect();
        m.post(AllDifferent::new(vars.clone()));

        let outcome = Solver::default().solve(&mut m, &FirstFail, None);
        assert_eq!(outcome.status, SearchStatus::Satisfied);
        let solution = outcome.solution.unwrap();
        let values: Vec<i64> = vars.iter().map(|&v| solution.value(v)).collect();
        assert_eq!(values, vec![0, 1, 2]);
        assert!(!m.store().is_fixed(vars[0]));
    }

    #[test]
    fn test_infeasible() {
        let mut m = Model::new();
        let s = m.store_mut();
        let vars: Vec<VarId> = (0..3).map(|i| s.new_int(format!("x{i}"), 0, 1)).collect();
        m.post(AllDifferent::new(vars));

        let outcome = Solver::default().solve(&mut m, &FirstFail, None);
        assert_eq!(outcome.status, SearchStatus::Infeasible);
        assert!(outcome.solution.is_none());
        assert!(outcome.statistics.failures > 0);
    }

    #[test]
    fn test_optimize_finds_minimum() {
        let mut m = Model::new();
        let s = m.store_mut();
        let a = s.new_int("a", 1, 5);
        let b = s.new_int("b", 2, 6);
        let total = s.new_int("total", 0, 100);
        m.post(Sum::new(total, vec![a, b]));

        let limits = SearchLimits::default().with_optimize(true);
        let outcome = Solver::new(limits).solve(&mut m, &Greedy, Some(total));
        assert_eq!(outcome.status, SearchStatus::Optimal);
        assert!(outcome.statistics.solutions > 1);
        assert_eq!(outcome.solution.unwrap().value(total), 3);
    }

    #[test]
    fn test_node_budget() {
        let mut m = Model::new();
        let s = m.store_mut();
        let x = s.new_int("x", 0, 50);
        let y = s.new_int("y", 0, 50);
        let z = s.new_int("z", 0, 100);
        m.post(Plus::new(x, y, z));

        let limits = SearchLimits::default()
            .with_optimize(true)
            .with_node_limit(3);
        let outcome = Solver::new(limits).solve(&mut m, &Greedy, Some(z));
        assert_eq!(outcome.status, SearchStatus::BudgetReached);
        assert!(outcome.solution.is_some());
        assert!(outcome.statistics.nodes <= 3);
    }
}
