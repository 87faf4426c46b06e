//! Input validation for reconfiguration requests.
//!
//! Checks structural integrity of the source configuration and the target
//! state before any variable is built. Detects:
//! - Negative capacities, consumptions or demands
//! - VMs placed on unknown or offline nodes
//! - Overloaded source nodes
//! - Target entries naming unknown elements
//! - Conflicting goals (a VM in two partitions, a node both online and offline)
//! - Transitions no action can perform (waiting → sleeping, a sleeping image
//!   left on a node going offline)
//! - Negative action durations
//!
//! Every check runs; all problems are reported together.

use std::fmt;

use crate::models::{Configuration, CostModel, Dimension, NodeState, TargetState, VmGoal, VmState};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A capacity, consumption or demand is negative.
    NegativeResource,
    /// A VM is hosted by a node the configuration does not know.
    UnknownHost,
    /// A VM is hosted by an offline node.
    OfflineHost,
    /// Running VMs consume more than a node's capacity.
    Overloaded,
    /// The target names an element absent from the configuration.
    UnknownElement,
    /// An element has more than one goal.
    ConflictingGoal,
    /// No action leads from the current state to the goal.
    UnreachableGoal,
    /// An action duration is negative.
    InvalidCost,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Validates a configuration on its own.
///
/// Checks:
/// 1. Node capacities and CPU counts are non-negative
/// 2. VM consumptions, demands and CPU counts are non-negative
/// 3. Every running or sleeping VM is hosted by a known, online node
/// 4. No online node is overloaded by its running VMs
pub fn validate_configuration(configuration: &Configuration) -> ValidationResult {
    let mut errors = Vec::new();
    check_configuration(configuration, &mut errors);
    into_result(errors)
}

/// Validates a full planning request.
///
/// Runs [`validate_configuration`] on the source, then checks the target
/// state and the cost table against it.
pub fn validate_request(
    source: &Configuration,
    target: &TargetState,
    costs: &CostModel,
) -> ValidationResult {
    let mut errors = Vec::new();
    check_configuration(source, &mut errors);

    if !costs.is_valid() {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidCost,
            "Action durations must be non-negative",
        ));
    }

    for vm_id in target.mentioned_vms() {
        if source.vm(vm_id).is_none() {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownElement,
                format!("Target references unknown VM '{vm_id}'"),
            ));
            continue;
        }
        let goals = target.vm_goals(vm_id);
        if goals.len() > 1 {
            errors.push(ValidationError::new(
                ValidationErrorKind::ConflictingGoal,
                format!("VM '{vm_id}' has conflicting goals {goals:?}"),
            ));
        }
    }

    for node_id in target.mentioned_nodes() {
        if source.node(node_id).is_none() {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownElement,
                format!("Target references unknown node '{node_id}'"),
            ));
        } else if target.online.contains(node_id) && target.offline.contains(node_id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::ConflictingGoal,
                format!("Node '{node_id}' is both online and offline in the target"),
            ));
        }
    }

    for vm in source.vms() {
        let goal = target.vm_goal(&vm.id);
        match (source.vm_state(&vm.id), goal) {
            (Some(VmState::Waiting), Some(VmGoal::Sleep)) => {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnreachableGoal,
                    format!("Waiting VM '{}' cannot be suspended", vm.id),
                ));
            }
            (Some(VmState::Sleeping { host }), None | Some(VmGoal::Sleep))
                if target.node_goal(host) == Some(NodeState::Offline) =>
            {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnreachableGoal,
                    format!(
                        "Sleeping VM '{}' stays on node '{}' which goes offline",
                        vm.id, host
                    ),
                ));
            }
            _ => {}
        }
    }

    into_result(errors)
}

fn check_configuration(configuration: &Configuration, errors: &mut Vec<ValidationError>) {
    for node in configuration.nodes() {
        if node.cpu_count < 0 || Dimension::ALL.iter().any(|&d| node.capacity(d) < 0) {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeResource,
                format!("Node '{}' has a negative capacity", node.id),
            ));
        }
    }

    for vm in configuration.vms() {
        let negative = vm.cpu_count < 0
            || Dimension::ALL
                .iter()
                .any(|&d| vm.consumption(d) < 0 || vm.demand(d) < 0);
        if negative {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeResource,
                format!("VM '{}' has a negative consumption or demand", vm.id),
            ));
        }

        if let Some(host) = configuration.location(&vm.id) {
            match configuration.node_state(host) {
                None => errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownHost,
                    format!("VM '{}' is hosted by unknown node '{}'", vm.id, host),
                )),
                Some(NodeState::Offline) => errors.push(ValidationError::new(
                    ValidationErrorKind::OfflineHost,
                    format!("VM '{}' is hosted by offline node '{}'", vm.id, host),
                )),
                Some(NodeState::Online) => {}
            }
        }
    }

    for node_id in configuration.overloaded_nodes() {
        errors.push(ValidationError::new(
            ValidationErrorKind::Overloaded,
            format!("Node '{node_id}' is overloaded by its running VMs"),
        ));
    }
}

fn into_result(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
