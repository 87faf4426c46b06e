//! Reconfiguration domain models.
//!
//! Provides the data types describing the infrastructure, the request and
//! the resulting plan. They are plain values: the solver core never sees
//! them directly, it works on the variables built from them by
//! [`crate::problem`].
//!
//! # Domain Mappings
//!
//! | u-reconfig | Meaning |
//! |------------|---------|
//! | Node | Physical host with CPU and memory capacity |
//! | VirtualMachine | Workload with a consumption and a demand |
//! | Configuration | Snapshot of element states |
//! | TargetState | Desired final states |
//! | ReconfigurationPlan | Timed actions from source to destination |

mod action;
mod configuration;
mod cost;
mod node;
mod plan;
mod target;
mod vm;

pub use action::{Action, ActionKind, TimedAction};
pub use configuration::{Configuration, NodeState, VmState};
pub use cost::CostModel;
pub use node::{Dimension, Node};
pub use plan::{ReconfigurationPlan, Reservation, Violation, ViolationType};
pub use target::{TargetState, VmGoal};
pub use vm::VirtualMachine;
