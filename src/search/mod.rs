//! Search heuristics for the reconfiguration problem.
//!
//! A [`SearchStrategy`] chains stages, each pairing a
//! [`VariableSelector`] with a [`ValueSelector`]. Selectors are stateless:
//! they read the current domains and a [`HeuristicContext`] extracted
//! once from the problem.
//!
//! # Default stages
//! 1. group representatives → common previous host, else fit
//! 2. VM hosters (misplaced, then largest demand) → current host, else fit
//! 3. arrival starts by topology → earliest
//! 4. any remaining variable → smallest value
//!
//! # Reference
//! Hermenier et al. (2009), "Entropy: a Consolidation Manager for Clusters", VEE

mod context;
mod strategy;
mod values;
mod variables;

pub use context::{ArrivalEntry, GroupEntry, HeuristicContext, LeavingEntry, VmEntry};
pub use strategy::SearchStrategy;
pub use values::{fit_node, ContinuityFit, GroupHost, MinValue, ValueSelector};
pub use variables::{
    AnyUnfixed, GroupRepresentatives, HostersByDemand, TopologyStarts, VariableSelector,
};
