//! Reconfiguration planning for virtualized clusters.
//!
//! Computes a timed plan of VM migrations, starts, stops, suspends, resumes
//! and node power actions that takes a cluster from its current
//! configuration to a target state, without ever exceeding a node's CPU or
//! memory capacity while the actions run.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Node`, `VirtualMachine`, `Configuration`,
//!   `TargetState`, `CostModel`, `Action`, `ReconfigurationPlan`
//! - **`validation`**: Input integrity checks (negative resources, unknown
//!   elements, conflicting or unreachable goals)
//! - **`cp`**: Finite-domain variables, propagators and depth-first
//!   branch-and-bound search
//! - **`problem`**: Slices, action models and the reconfiguration problem
//! - **`scheduling`**: Capacity propagators over the slices of every node
//! - **`search`**: Placement and scheduling heuristics
//! - **`placement`**: Ban, fence, spread and gather rules
//! - **`planner`**: End-to-end planning, plan extraction and KPIs
//! - **`collaborators`**: Monitor, executor and vjob interfaces
//! - **`config`**, **`error`**: Planner settings and error types
//!
//! # Architecture
//!
//! Every element gets an action model made of a consuming slice (the
//! resources held on its current node until it leaves) and a demanding
//! slice (the resources held on its final node from its arrival on). The
//! scheduling propagator keeps, per node and per dimension, the usage
//! profile of those slices below capacity and narrows the hosting and
//! timing variables accordingly.
//!
//! # References
//!
//! - Hermenier et al. (2009), "Entropy: a Consolidation Manager for Clusters", VEE
//! - Hermenier et al. (2011), "Bin Repacking Scheduling in Virtualized Datacenters", CP
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

pub mod collaborators;
pub mod config;
pub mod cp;
pub mod error;
pub mod models;
pub mod placement;
pub mod planner;
pub mod problem;
pub mod scheduling;
pub mod search;
pub mod validation;

pub use config::{FitPolicy, Objective, PlannerConfig};
pub use error::PlanError;
pub use planner::{PlanKpi, PlanStatus, PlanningOutcome, ReconfigurationPlanner};
