//! Per-node cumulative reasoning.
//!
//! # Algorithm
//! For every dimension the scheduler builds the *mandatory* profile of the
//! node: a consuming slice surely occupies `[0, end.min)`, a demanding
//! slice surely occupies `[start.max, horizon)`. Then:
//!
//! 1. **Consistency**: a mandatory profile above capacity fails.
//! 2. **Tightening**: a demanding slice cannot start inside a segment
//!    where its height would overflow, so its earliest start moves past
//!    the last such segment before its latest start. Symmetrically a
//!    consuming slice must end before the first overflowing segment after
//!    its earliest end.
//! 3. **Dominance**: once no undecided placement may still reach the node,
//!    the *maximum* profile (consuming slices up to `end.max`, demanding
//!    slices from `start.min`) settles under capacity at some instant τ.
//!    Starting an arriving VM later than τ gains nothing, so its latest
//!    start becomes τ.
//!
//! Slices of one element staying on the node (linked pairs) are never
//! tightened: their hand-over happens in place.
//!
//! # Complexity
//! O(s log s) per dimension, s = slices on the node.

use std::collections::{BTreeMap, BTreeSet};

use super::{NodeCapacity, UsageProfile};
use crate::cp::{Contradiction, VariableStore};
use crate::models::Dimension;
use crate::problem::{Slice, SliceOwner};

/// Slices placed on one node for the current propagation round.
pub(crate) struct LocalScheduler<'a> {
    capacity: &'a NodeCapacity,
    consuming: Vec<&'a Slice>,
    demanding: Vec<&'a Slice>,
    /// Indices into `consuming` / `demanding` of linked slices.
    linked_consuming: BTreeSet<usize>,
    linked_demanding: BTreeSet<usize>,
    /// Whether an undecided demanding slice may still land here.
    uncertain: bool,
    horizon: i64,
}

impl<'a> LocalScheduler<'a> {
    pub(crate) fn new(capacity: &'a NodeCapacity, horizon: i64) -> Self {
        Self {
            capacity,
            consuming: Vec::new(),
            demanding: Vec::new(),
            linked_consuming: BTreeSet::new(),
            linked_demanding: BTreeSet::new(),
            uncertain: false,
            horizon,
        }
    }

    pub(crate) fn add_consuming(&mut self, slice: &'a Slice) -> usize {
        self.consuming.push(slice);
        self.consuming.len() - 1
    }

    pub(crate) fn add_demanding(&mut self, slice: &'a Slice) -> usize {
        self.demanding.push(slice);
        self.demanding.len() - 1
    }

    /// Marks a consuming and a demanding slice as one element staying put.
    pub(crate) fn link(&mut self, consuming: usize, demanding: usize) {
        self.linked_consuming.insert(consuming);
        self.linked_demanding.insert(demanding);
    }

    pub(crate) fn mark_uncertain(&mut self) {
        self.uncertain = true;
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.consuming.is_empty() && self.demanding.is_empty()
    }

    /// Runs consistency, tightening and dominance on every dimension.
    pub(crate) fn propagate(&self, store: &mut VariableStore) -> Result<(), Contradiction> {
        for dim in Dimension::ALL {
            self.check_and_tighten(store, dim)?;
        }
        if !self.uncertain {
            self.apply_dominance(store)?;
        }
        Ok(())
    }

    fn mandatory_profile(&self, store: &VariableStore, dim: Dimension) -> UsageProfile {
        let mut deltas = BTreeMap::new();
        let mut initial = 0;
        for c in &self.consuming {
            let h = c.height(dim);
            initial += h;
            *deltas.entry(store.min(c.end())).or_insert(0) -= h;
        }
        for d in &self.demanding {
            *deltas.entry(store.max(d.start())).or_insert(0) += d.height(dim);
        }
        UsageProfile::new(initial, &deltas, self.horizon)
    }

    fn maximum_profile(&self, store: &VariableStore, dim: Dimension) -> UsageProfile {
        let mut deltas = BTreeMap::new();
        let mut initial = 0;
        for c in &self.consuming {
            let h = c.height(dim);
            initial += h;
            *deltas.entry(store.max(c.end())).or_insert(0) -= h;
        }
        for d in &self.demanding {
            *deltas.entry(store.min(d.start())).or_insert(0) += d.height(dim);
        }
        UsageProfile::new(initial, &deltas, self.horizon)
    }

    fn check_and_tighten(&self, store: &mut VariableStore, dim: Dimension) -> Result<(), Contradiction> {
        let capacity = self.capacity.get(dim);
        let profile = self.mandatory_profile(store, dim);
        if let Some(overload) = profile.first_above(capacity, 0) {
            return Err(Contradiction::Capacity {
                node: self.capacity.id.clone(),
                time: overload.start,
            });
        }

        for (i, d) in self.demanding.iter().enumerate() {
            let h = d.height(dim);
            if h == 0 || self.linked_demanding.contains(&i) {
                continue;
            }
            let (lo, hi) = (store.min(d.start()), store.max(d.start()));
            if lo >= hi {
                continue;
            }
            // the profile already holds this slice from `hi` on
            if let Some(segment) = profile.last_above_before(capacity - h, hi) {
                store.set_min(d.start(), segment.end.min(hi))?;
            }
        }

        for (i, c) in self.consuming.iter().enumerate() {
            let h = c.height(dim);
            if h == 0 || self.linked_consuming.contains(&i) {
                continue;
            }
            let (lo, hi) = (store.min(c.end()), store.max(c.end()));
            if lo >= hi {
                continue;
            }
            if let Some(segment) = profile.first_above(capacity - h, lo) {
                store.set_max(c.end(), segment.start.max(lo))?;
            }
        }
        Ok(())
    }

    fn apply_dominance(&self, store: &mut VariableStore) -> Result<(), Contradiction> {
        let settled = Dimension::ALL
            .iter()
            .map(|&dim| {
                self.maximum_profile(store, dim)
                    .settled_from(self.capacity.get(dim))
            })
            .max()
            .unwrap_or(0);

        for (i, d) in self.demanding.iter().enumerate() {
            if d.owner != SliceOwner::Vm
                || d.is_empty()
                || self.linked_demanding.contains(&i)
                || store.is_fixed(d.start())
            {
                continue;
            }
            let bound = settled.max(store.min(d.start()));
            store.set_max(d.start(), bound)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::Model;

    const H: i64 = 20;

    fn capacity(cpu: i64, memory: i64) -> NodeCapacity {
        NodeCapacity::new("N1", cpu, memory)
    }

    #[test]
    fn test_consistent_node_passes() {
        let mut m = Model::new();
        let c = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (4, 4), H);
        let d = Slice::demanding(&mut m, "VM2", SliceOwner::Vm, &[0], (6, 6), H).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        local.add_consuming(&c);
        local.add_demanding(&d);
        assert!(local.propagate(m.store_mut()).is_ok());
    }

    #[test]
    fn test_mandatory_overload_fails() {
        let mut m = Model::new();
        let c = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (6, 1), H);
        let d = Slice::demanding(&mut m, "VM2", SliceOwner::Vm, &[0], (6, 1), H).unwrap();
        c.fix_end(m.store_mut(), 8).unwrap();
        m.store_mut().set_max(d.start(), 5).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        local.add_consuming(&c);
        local.add_demanding(&d);
        assert_eq!(
            local.propagate(m.store_mut()),
            Err(Contradiction::Capacity {
                node: "N1".into(),
                time: 5
            })
        );
    }

    #[test]
    fn test_demanding_start_pushed_after_overflow() {
        let mut m = Model::new();
        let c = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (2, 7), H);
        let d = Slice::demanding(&mut m, "VM2", SliceOwner::Vm, &[0], (1, 5), H).unwrap();
        m.store_mut().set_min(c.end(), 6).unwrap();
        m.store_mut().set_max(d.start(), 12).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        local.add_consuming(&c);
        local.add_demanding(&d);
        local.mark_uncertain();
        local.propagate(m.store_mut()).unwrap();
        // memory: 7 + 5 > 10 on [0, 6)
        assert_eq!(m.store().min(d.start()), 6);
        assert_eq!(m.store().max(d.start()), 12);
    }

    #[test]
    fn test_hand_over_at_shared_bound_is_kept() {
        let mut m = Model::new();
        let c = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (6, 6), H);
        let d = Slice::demanding(&mut m, "VM2", SliceOwner::Vm, &[0], (6, 6), H).unwrap();
        m.store_mut().set_min(c.end(), 5).unwrap();
        m.store_mut().set_max(d.start(), 5).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        local.add_consuming(&c);
        local.add_demanding(&d);
        local.mark_uncertain();
        // 6 on [0, H) as one merged segment; VM2 can still arrive at 5
        local.propagate(m.store_mut()).unwrap();
        assert_eq!(m.store().min(d.start()), 5);
        assert_eq!(m.store().max(d.start()), 5);
        assert_eq!(m.store().max(c.end()), 5);
    }

    #[test]
    fn test_consuming_end_pulled_before_overflow() {
        let mut m = Model::new();
        let c = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (5, 1), H);
        let d = Slice::demanding(&mut m, "VM2", SliceOwner::Vm, &[0], (8, 1), H).unwrap();
        m.store_mut().set_min(c.end(), 2).unwrap();
        d.fix_start(m.store_mut(), 9).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        local.add_consuming(&c);
        local.add_demanding(&d);
        local.propagate(m.store_mut()).unwrap();
        assert_eq!(m.store().max(c.end()), 9);
        assert_eq!(m.store().min(c.end()), 2);
    }

    #[test]
    fn test_linked_slices_are_not_tightened() {
        let mut m = Model::new();
        let c = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (6, 6), H);
        let d = Slice::demanding(&mut m, "VM1", SliceOwner::Vm, &[0], (6, 6), H).unwrap();
        m.store_mut().set_min(c.end(), 3).unwrap();
        m.store_mut().set_max(d.start(), 15).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        let ci = local.add_consuming(&c);
        let di = local.add_demanding(&d);
        local.link(ci, di);
        local.mark_uncertain();
        local.propagate(m.store_mut()).unwrap();
        assert_eq!(m.store().min(d.start()), 0);
        assert_eq!(m.store().max(c.end()), H);
    }

    #[test]
    fn test_dominance_bounds_arrivals() {
        let mut m = Model::new();
        let leaving = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (8, 8), H);
        let arriving = Slice::demanding(&mut m, "VM2", SliceOwner::Vm, &[0], (5, 5), H).unwrap();
        m.store_mut().set_max(leaving.end(), 6).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        local.add_consuming(&leaving);
        local.add_demanding(&arriving);
        local.propagate(m.store_mut()).unwrap();
        assert_eq!(m.store().max(arriving.start()), 6);
    }

    #[test]
    fn test_no_dominance_while_uncertain() {
        let mut m = Model::new();
        let leaving = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (8, 8), H);
        let arriving = Slice::demanding(&mut m, "VM2", SliceOwner::Vm, &[0], (5, 5), H).unwrap();
        m.store_mut().set_max(leaving.end(), 6).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        local.add_consuming(&leaving);
        local.add_demanding(&arriving);
        local.mark_uncertain();
        local.propagate(m.store_mut()).unwrap();
        assert_eq!(m.store().max(arriving.start()), H);
    }

    #[test]
    fn test_dominance_skips_node_slices() {
        let mut m = Model::new();
        let leaving = Slice::consuming(&mut m, "VM1", SliceOwner::Vm, 0, (8, 8), H);
        let shutdown = Slice::demanding(&mut m, "N1", SliceOwner::Node, &[0], (2, 2), H).unwrap();
        m.store_mut().set_max(leaving.end(), 6).unwrap();
        let cap = capacity(10, 10);
        let mut local = LocalScheduler::new(&cap, H);
        local.add_consuming(&leaving);
        local.add_demanding(&shutdown);
        local.propagate(m.store_mut()).unwrap();
        assert_eq!(m.store().max(shutdown.start()), H);
    }
}
