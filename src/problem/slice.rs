//! Slices: node-bound resource intervals.
//!
//! A slice is the period during which an element holds CPU and memory on a
//! node. Its hoster, start, duration and end are decision variables with
//! `end = start + duration` always enforced; its heights are constants.
//!
//! - A *consuming* slice starts at 0 on the element's current host and ends
//!   when the element stops using it.
//! - A *demanding* slice ends at the horizon and starts when the element
//!   begins using its (new or kept) host.

use serde::{Deserialize, Serialize};

use crate::cp::{Contradiction, Model, Plus, VarId, VariableStore};
use crate::models::Dimension;

/// Handle to a slice of a [`super::ReconfigurationProblem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceId(pub(crate) usize);

impl SliceId {
    /// Position of the slice in its problem.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which end of the timeline a slice is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SliceKind {
    /// Anchored at time 0 on the current host.
    Consuming,
    /// Anchored at the horizon on the final host.
    Demanding,
}

/// Kind of element owning a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SliceOwner {
    /// A virtual machine.
    Vm,
    /// A node (boot or shutdown reservation).
    Node,
}

/// A resource interval on a node.
#[derive(Debug, Clone)]
pub struct Slice {
    /// Owning element ID.
    pub element: String,
    /// Owning element kind.
    pub owner: SliceOwner,
    /// Consuming or demanding.
    pub kind: SliceKind,
    /// CPU held during the slice.
    pub cpu: i64,
    /// Memory held during the slice.
    pub memory: i64,
    hoster: VarId,
    start: VarId,
    duration: VarId,
    end: VarId,
}

impl Slice {
    /// Consuming slice on node `host`, from 0 to a free end within the horizon.
    pub fn consuming(
        model: &mut Model,
        element: impl Into<String>,
        owner: SliceOwner,
        host: usize,
        (cpu, memory): (i64, i64),
        horizon: i64,
    ) -> Self {
        let element = element.into();
        let s = model.store_mut();
        let hoster = s.constant(format!("{element}.c.hoster"), host as i64);
        let start = s.constant(format!("{element}.c.start"), 0);
        let duration = s.new_int(format!("{element}.c.duration"), 0, horizon);
        let end = s.new_int(format!("{element}.c.end"), 0, horizon);
        model.post(Plus::new(start, duration, end));
        Self {
            element,
            owner,
            kind: SliceKind::Consuming,
            cpu,
            memory,
            hoster,
            start,
            duration,
            end,
        }
    }

    /// Demanding slice over `candidates`, from a free start to the horizon.
    ///
    /// Fails when there is no candidate.
    pub fn demanding(
        model: &mut Model,
        element: impl Into<String>,
        owner: SliceOwner,
        candidates: &[usize],
        (cpu, memory): (i64, i64),
        horizon: i64,
    ) -> Result<Self, Contradiction> {
        let element = element.into();
        let s = model.store_mut();
        let hoster = s.new_enum(
            format!("{element}.d.hoster"),
            candidates.iter().map(|&n| n as i64),
        )?;
        let start = s.new_int(format!("{element}.d.start"), 0, horizon);
        let duration = s.new_int(format!("{element}.d.duration"), 0, horizon);
        let end = s.constant(format!("{element}.d.end"), horizon);
        model.post(Plus::new(start, duration, end));
        Ok(Self {
            element,
            owner,
            kind: SliceKind::Demanding,
            cpu,
            memory,
            hoster,
            start,
            duration,
            end,
        })
    }

    /// Hosting node variable (node index).
    #[inline]
    pub fn hoster(&self) -> VarId {
        self.hoster
    }

    /// Start variable.
    #[inline]
    pub fn start(&self) -> VarId {
        self.start
    }

    /// Duration variable.
    #[inline]
    pub fn duration(&self) -> VarId {
        self.duration
    }

    /// End variable.
    #[inline]
    pub fn end(&self) -> VarId {
        self.end
    }

    /// Height along a dimension.
    pub fn height(&self, dimension: Dimension) -> i64 {
        match dimension {
            Dimension::Cpu => self.cpu,
            Dimension::Memory => self.memory,
        }
    }

    /// Whether the slice holds nothing.
    pub fn is_empty(&self) -> bool {
        self.cpu == 0 && self.memory == 0
    }

    /// Whether this is a consuming slice.
    pub fn is_consuming(&self) -> bool {
        self.kind == SliceKind::Consuming
    }

    /// Fixes the start.
    pub fn fix_start(&self, store: &mut VariableStore, value: i64) -> Result<(), Contradiction> {
        store.instantiate(self.start, value).map(|_| ())
    }

    /// Fixes the duration.
    pub fn fix_duration(&self, store: &mut VariableStore, value: i64) -> Result<(), Contradiction> {
        store.instantiate(self.duration, value).map(|_| ())
    }

    /// Fixes the end.
    pub fn fix_end(&self, store: &mut VariableStore, value: i64) -> Result<(), Contradiction> {
        store.instantiate(self.end, value).map(|_| ())
    }

    /// Fixes the hosting node.
    pub fn fix_hoster(&self, store: &mut VariableStore, node: usize) -> Result<(), Contradiction> {
        store.instantiate(self.hoster, node as i64).map(|_| ())
    }
}
