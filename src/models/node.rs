//! Physical node model.
//!
//! Nodes are the hosts that run virtual machines. Each node exposes a
//! number of physical CPUs, a CPU capacity and a memory capacity. Capacities
//! are immutable for the duration of one planning run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A resource dimension tracked by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// CPU capacity / consumption.
    Cpu,
    /// Memory capacity / consumption.
    Memory,
}

impl Dimension {
    /// Every tracked dimension, CPU first.
    pub const ALL: [Dimension; 2] = [Dimension::Cpu, Dimension::Memory];
}

/// A physical node able to host virtual machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier.
    pub id: String,
    /// Number of physical CPUs (default: 1).
    pub cpu_count: i32,
    /// CPU capacity, in the same unit as VM CPU consumption.
    pub cpu_capacity: i32,
    /// Memory capacity, in the same unit as VM memory consumption.
    pub memory_capacity: i32,
    /// Domain-specific metadata (rack, zone, hypervisor...).
    pub attributes: HashMap<String, String>,
}

impl Node {
    /// Creates a node with one CPU and no capacity.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cpu_count: 1,
            cpu_capacity: 0,
            memory_capacity: 0,
            attributes: HashMap::new(),
        }
    }

    /// Sets the number of physical CPUs.
    pub fn with_cpu_count(mut self, cpu_count: i32) -> Self {
        self.cpu_count = cpu_count;
        self
    }

    /// Sets the CPU capacity.
    pub fn with_cpu_capacity(mut self, capacity: i32) -> Self {
        self.cpu_capacity = capacity;
        self
    }

    /// Sets the memory capacity.
    pub fn with_memory_capacity(mut self, capacity: i32) -> Self {
        self.memory_capacity = capacity;
        self
    }

    /// Sets both capacities at once.
    pub fn with_capacity(self, cpu: i32, memory: i32) -> Self {
        self.with_cpu_capacity(cpu).with_memory_capacity(memory)
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Capacity for a resource dimension.
    pub fn capacity(&self, dimension: Dimension) -> i32 {
        match dimension {
            Dimension::Cpu => self.cpu_capacity,
            Dimension::Memory => self.memory_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builder() {
        let n = Node::new("N1")
            .with_cpu_count(4)
            .with_capacity(400, 8192)
            .with_attribute("rack", "R12");

        assert_eq!(n.id, "N1");
        assert_eq!(n.cpu_count, 4);
        assert_eq!(n.cpu_capacity, 400);
        assert_eq!(n.memory_capacity, 8192);
        assert_eq!(n.attributes.get("rack"), Some(&"R12".to_string()));
    }

    #[test]
    fn test_node_capacity_by_dimension() {
        let n = Node::new("N1").with_capacity(5, 7);
        assert_eq!(n.capacity(Dimension::Cpu), 5);
        assert_eq!(n.capacity(Dimension::Memory), 7);
    }

    #[test]
    fn test_node_defaults() {
        let n = Node::new("N1");
        assert_eq!(n.cpu_count, 1);
        assert_eq!(n.cpu_capacity, 0);
        assert_eq!(n.memory_capacity, 0);
    }
}
