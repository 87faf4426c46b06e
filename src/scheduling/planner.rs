//! Cluster-wide slice scheduling.
//!
//! # Algorithm
//! Each round buckets the slices per node:
//! - a consuming slice goes to its (constant) host,
//! - a demanding slice goes to its hoster once fixed; while unfixed it
//!   marks every node still in its hoster domain as *uncertain*.
//!
//! A consuming and a demanding slice of the same element land in the same
//! bucket when the element stays on its node; they are linked. Every
//! bucket is then handed to a [`LocalScheduler`]. The profiles are rebuilt
//! from scratch on every round.

use tracing::trace;

use super::local::LocalScheduler;
use super::NodeCapacity;
use crate::cp::{Contradiction, Propagator, VarId, VariableStore};
use crate::problem::{Slice, SliceId};

/// Schedules every slice of the problem against node capacities.
#[derive(Debug, Clone)]
pub struct SlicesPlanner {
    capacities: Vec<NodeCapacity>,
    slices: Vec<Slice>,
    links: Vec<(SliceId, SliceId)>,
    horizon: i64,
}

impl SlicesPlanner {
    /// Creates the propagator.
    ///
    /// `capacities` is indexed by node index; `links` pairs the consuming
    /// and demanding slices of one action model.
    pub fn new(
        capacities: Vec<NodeCapacity>,
        slices: Vec<Slice>,
        links: Vec<(SliceId, SliceId)>,
        horizon: i64,
    ) -> Self {
        Self {
            capacities,
            slices,
            links,
            horizon,
        }
    }

    fn schedulers(&self, store: &VariableStore) -> Vec<LocalScheduler<'_>> {
        let mut locals: Vec<LocalScheduler<'_>> = self
            .capacities
            .iter()
            .map(|c| LocalScheduler::new(c, self.horizon))
            .collect();
        // position of each slice in its local scheduler
        let mut placed: Vec<Option<(usize, usize)>> = vec![None; self.slices.len()];

        for (i, slice) in self.slices.iter().enumerate() {
            let hoster = slice.hoster();
            match store.value(hoster) {
                Some(node) => {
                    let Some(local) = usize::try_from(node).ok().and_then(|n| locals.get_mut(n))
                    else {
                        continue;
                    };
                    let position = if slice.is_consuming() {
                        local.add_consuming(slice)
                    } else {
                        local.add_demanding(slice)
                    };
                    placed[i] = Some((node as usize, position));
                }
                None => {
                    for node in store.domain(hoster).values() {
                        if let Some(local) =
                            usize::try_from(node).ok().and_then(|n| locals.get_mut(n))
                        {
                            local.mark_uncertain();
                        }
                    }
                }
            }
        }

        for &(c, d) in &self.links {
            if let (Some((cn, ci)), Some((dn, di))) = (placed[c.index()], placed[d.index()]) {
                if cn == dn {
                    locals[cn].link(ci, di);
                }
            }
        }
        locals
    }
}

impl Propagator for SlicesPlanner {
    fn name(&self) -> &str {
        "slices-planner"
    }

    fn variables(&self) -> Vec<VarId> {
        self.slices
            .iter()
            .flat_map(|s| [s.hoster(), s.start(), s.end()])
            .collect()
    }

    fn propagate(&self, store: &mut VariableStore) -> Result<(), Contradiction> {
        let locals = self.schedulers(store);
        for local in locals.iter().filter(|l| !l.is_idle()) {
            local.propagate(store).inspect_err(|contradiction| {
                trace!(%contradiction, "local scheduling failed");
            })?;
        }
        Ok(())
    }
}
