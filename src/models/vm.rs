//! Virtual machine model.
//!
//! A virtual machine is the unit of work placed on nodes. It carries its
//! current consumption (what it holds right now on its host) and its demand
//! (what it will need once the reconfiguration is over). The two may differ,
//! which models load increases and decreases between planning rounds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Dimension;

/// A virtual machine managed by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Unique VM identifier.
    pub id: String,
    /// Number of virtual CPUs (default: 1).
    pub cpu_count: i32,
    /// CPU currently consumed on the host.
    pub cpu_consumption: i32,
    /// Memory currently consumed on the host.
    pub memory_consumption: i32,
    /// CPU needed after the reconfiguration.
    pub cpu_demand: i32,
    /// Memory needed after the reconfiguration.
    pub memory_demand: i32,
    /// Domain-specific metadata.
    pub attributes: HashMap<String, String>,
}

impl VirtualMachine {
    /// Creates a VM with one vCPU and no resource usage.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cpu_count: 1,
            cpu_consumption: 0,
            memory_consumption: 0,
            cpu_demand: 0,
            memory_demand: 0,
            attributes: HashMap::new(),
        }
    }

    /// Sets the number of virtual CPUs.
    pub fn with_cpu_count(mut self, cpu_count: i32) -> Self {
        self.cpu_count = cpu_count;
        self
    }

    /// Sets the current consumption.
    pub fn with_consumption(mut self, cpu: i32, memory: i32) -> Self {
        self.cpu_consumption = cpu;
        self.memory_consumption = memory;
        self
    }

    /// Sets the demand.
    pub fn with_demand(mut self, cpu: i32, memory: i32) -> Self {
        self.cpu_demand = cpu;
        self.memory_demand = memory;
        self
    }

    /// Sets consumption and demand to the same values (steady load).
    pub fn with_usage(self, cpu: i32, memory: i32) -> Self {
        self.with_consumption(cpu, memory).with_demand(cpu, memory)
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Current consumption along a dimension.
    pub fn consumption(&self, dimension: Dimension) -> i32 {
        match dimension {
            Dimension::Cpu => self.cpu_consumption,
            Dimension::Memory => self.memory_consumption,
        }
    }

    /// Demand along a dimension.
    pub fn demand(&self, dimension: Dimension) -> i32 {
        match dimension {
            Dimension::Cpu => self.cpu_demand,
            Dimension::Memory => self.memory_demand,
        }
    }

    /// Whether the demand exceeds the consumption on any dimension.
    pub fn is_growing(&self) -> bool {
        self.cpu_demand > self.cpu_consumption || self.memory_demand > self.memory_consumption
    }
}
