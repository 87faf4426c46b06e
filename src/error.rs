//! Planner errors.

use std::time::Duration;

use crate::validation::ValidationError;

/// Why no plan was produced.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The request failed validation.
    #[error("invalid input: {}", join(.0))]
    InvalidInput(Vec<ValidationError>),
    /// No plan satisfies the constraints.
    #[error("no reconfiguration plan satisfies the constraints")]
    Infeasible,
    /// The budget ran out before any plan was found.
    #[error("search budget exhausted after {nodes} nodes ({elapsed:?}) without a plan")]
    BudgetExhausted {
        /// Decisions taken.
        nodes: u64,
        /// Time spent.
        elapsed: Duration,
    },
    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
