//! Constraint propagation and search substrate.
//!
//! A small finite-domain solver: integer variables with backtrackable
//! domains ([`VariableStore`]), propagators narrowing them ([`Propagator`]),
//! a fixpoint loop ([`Model`]) and a depth-first branch-and-bound search
//! ([`Solver`]).
//!
//! Propagators communicate failure through [`Contradiction`]; the search
//! recovers from it by backtracking.
//!
//! # Reference
//! - Schulte & Carlsson (2006), "Finite Domain Constraint Programming Systems",
//!   Handbook of Constraint Programming, Ch. 14
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

mod constraints;
mod domain;
mod model;
mod search;
mod store;

pub use constraints::{
    AllDifferent, AllEqual, LessOrEqual, Maximum, Plus, ReifiedEquality, Select, Sum,
};
pub use domain::Domain;
pub use model::Model;
pub use search::{
    Brancher, Decision, SearchLimits, SearchOutcome, SearchStatistics, SearchStatus, Solution,
    Solver,
};
pub use store::{VarId, VariableStore};

/// Failure of a propagation step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Contradiction {
    /// A variable lost its last value.
    #[error("domain of {0} became empty")]
    EmptyDomain(VarId),
    /// A node's guaranteed usage exceeds its capacity.
    #[error("capacity of node '{node}' exceeded at t={time}")]
    Capacity {
        /// Overloaded node.
        node: String,
        /// First instant of the overload.
        time: i64,
    },
}

/// A constraint narrowing variable domains.
///
/// `propagate` must only narrow domains and must be idempotent once a
/// fixpoint is reached. It is re-run whenever one of [`variables`]
/// changes.
///
/// [`variables`]: Propagator::variables
pub trait Propagator {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    /// Variables whose changes wake the propagator.
    fn variables(&self) -> Vec<VarId>;

    /// Narrows domains, or fails.
    fn propagate(&self, store: &mut VariableStore) -> Result<(), Contradiction>;
}
