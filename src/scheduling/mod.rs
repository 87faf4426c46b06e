//! Cumulative scheduling of slices on nodes.
//!
//! Two propagators keep node capacities satisfied at every instant:
//!
//! - [`SlicesPlanner`]: per-node reasoning on the time profile of
//!   consuming and demanding slices (consistency, bound tightening,
//!   dominance).
//! - [`DemandPacking`]: bin-packing of the final placement, pruning
//!   hosters early.
//!
//! # Reference
//! - Hermenier et al. (2011), "Bin Repacking Scheduling in Virtualized Datacenters", CP
//! - Baptiste et al. (2001), "Constraint-Based Scheduling", Ch. 2 (timetabling)

mod local;
mod packing;
mod planner;
mod profile;

pub use packing::DemandPacking;
pub use planner::SlicesPlanner;
pub use profile::{Segment, UsageProfile};

use serde::{Deserialize, Serialize};

use crate::models::Dimension;

/// Capacity of one node along every dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCapacity {
    /// Node ID.
    pub id: String,
    /// CPU capacity.
    pub cpu: i64,
    /// Memory capacity.
    pub memory: i64,
}

impl NodeCapacity {
    /// Creates a capacity record.
    pub fn new(id: impl Into<String>, cpu: i64, memory: i64) -> Self {
        Self {
            id: id.into(),
            cpu,
            memory,
        }
    }

    /// Capacity along a dimension.
    pub fn get(&self, dimension: Dimension) -> i64 {
        match dimension {
            Dimension::Cpu => self.cpu,
            Dimension::Memory => self.memory,
        }
    }
}
