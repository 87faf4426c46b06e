//! Final-placement packing.
//!
//! Demanding slices all run until the horizon, so the demanding slices of
//! one node must fit its capacity together. This propagator checks the
//! placed load of every node and removes a node from an undecided hoster
//! as soon as the slice no longer fits there.

use super::NodeCapacity;
use crate::cp::{Contradiction, Propagator, VarId, VariableStore};
use crate::models::Dimension;
use crate::problem::{Slice, SliceKind};

/// Bin-packing of demanding slices on node capacities.
#[derive(Debug, Clone)]
pub struct DemandPacking {
    capacities: Vec<NodeCapacity>,
    slices: Vec<Slice>,
    horizon: i64,
}

impl DemandPacking {
    /// Creates the propagator over the demanding slices among `slices`.
    pub fn new(capacities: Vec<NodeCapacity>, slices: Vec<Slice>, horizon: i64) -> Self {
        let slices = slices
            .into_iter()
            .filter(|s| s.kind == SliceKind::Demanding && !s.is_empty())
            .collect();
        Self {
            capacities,
            slices,
            horizon,
        }
    }

    fn loads(&self, store: &VariableStore) -> Vec<[i64; 2]> {
        let mut loads = vec![[0; 2]; self.capacities.len()];
        for slice in &self.slices {
            let Some(node) = store.value(slice.hoster()) else {
                continue;
            };
            if let Some(load) = usize::try_from(node).ok().and_then(|n| loads.get_mut(n)) {
                load[0] += slice.cpu;
                load[1] += slice.memory;
            }
        }
        loads
    }
}

fn dim_index(dim: Dimension) -> usize {
    match dim {
        Dimension::Cpu => 0,
        Dimension::Memory => 1,
    }
}

impl Propagator for DemandPacking {
    fn name(&self) -> &str {
        "demand-packing"
    }

    fn variables(&self) -> Vec<VarId> {
        self.slices.iter().map(Slice::hoster).collect()
    }

    fn propagate(&self, store: &mut VariableStore) -> Result<(), Contradiction> {
        let loads = self.loads(store);
        for (capacity, load) in self.capacities.iter().zip(&loads) {
            if Dimension::ALL
                .iter()
                .any(|&dim| load[dim_index(dim)] > capacity.get(dim))
            {
                return Err(Contradiction::Capacity {
                    node: capacity.id.clone(),
                    time: self.horizon,
                });
            }
        }

        for slice in &self.slices {
            let hoster = slice.hoster();
            if store.is_fixed(hoster) {
                continue;
            }
            for node in store.domain(hoster).values() {
                let Some(index) = usize::try_from(node).ok() else {
                    continue;
                };
                let (Some(capacity), Some(load)) = (self.capacities.get(index), loads.get(index))
                else {
                    continue;
                };
                let overflows = Dimension::ALL.iter().any(|&dim| {
                    load[dim_index(dim)] + slice.height(dim) > capacity.get(dim)
                });
                if overflows {
                    store.remove_value(hoster, node)?;
                }
            }
        }
        Ok(())
    }
}
