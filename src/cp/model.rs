//! Propagation fixpoint.
//!
//! A [`Model`] owns the variable store and the posted propagators. Each
//! propagator watches its variables; whenever a domain changes, every
//! watcher is queued, and the queue is drained until nothing changes or a
//! propagator fails.

use std::collections::VecDeque;

use super::{Contradiction, Propagator, VarId, VariableStore};

/// Variables plus the propagators constraining them.
#[derive(Default)]
pub struct Model {
    store: VariableStore,
    propagators: Vec<Box<dyn Propagator>>,
    watchers: Vec<Vec<usize>>,
    queue: VecDeque<usize>,
    queued: Vec<bool>,
    propagations: u64,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the variables.
    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    /// Write access to the variables.
    pub fn store_mut(&mut self) -> &mut VariableStore {
        &mut self.store
    }

    /// Posts a propagator and schedules its first run.
    pub fn post(&mut self, propagator: impl Propagator + 'static) {
        let index = self.propagators.len();
        for var in propagator.variables() {
            if self.watchers.len() <= var.index() {
                self.watchers.resize_with(var.index() + 1, Vec::new);
            }
            if !self.watchers[var.index()].contains(&index) {
                self.watchers[var.index()].push(index);
            }
        }
        self.propagators.push(Box::new(propagator));
        self.queued.push(false);
        self.enqueue(index);
    }

    fn enqueue(&mut self, index: usize) {
        if !self.queued[index] {
            self.queued[index] = true;
            self.queue.push_back(index);
        }
    }

    fn wake(&mut self, vars: Vec<VarId>) {
        for var in vars {
            let Some(watchers) = self.watchers.get(var.index()) else {
                continue;
            };
            for i in 0..watchers.len() {
                let index = self.watchers[var.index()][i];
                self.enqueue(index);
            }
        }
    }

    /// Runs the queued propagators to a fixpoint.
    ///
    /// On failure the queue is emptied; the store keeps whatever was
    /// narrowed before the failure, so callers backtrack with
    /// [`pop_level`](Self::pop_level).
    pub fn propagate(&mut self) -> Result<(), Contradiction> {
        let modified = self.store.take_modified();
        self.wake(modified);

        while let Some(index) = self.queue.pop_front() {
            self.queued[index] = false;
            self.propagations += 1;
            if let Err(contradiction) = self.propagators[index].propagate(&mut self.store) {
                tracing::trace!(
                    propagator = self.propagators[index].name(),
                    %contradiction,
                    "propagation failed"
                );
                self.queue.clear();
                self.queued.iter_mut().for_each(|q| *q = false);
                self.store.clear_modified();
                return Err(contradiction);
            }
            let modified = self.store.take_modified();
            self.wake(modified);
        }
        Ok(())
    }

    /// Saves the current domains.
    pub fn push_level(&mut self) {
        self.store.push_level();
    }

    /// Restores the domains saved by the last [`push_level`](Self::push_level).
    pub fn pop_level(&mut self) {
        self.store.pop_level();
        self.queue.clear();
        self.queued.iter_mut().for_each(|q| *q = false);
    }

    /// Number of saved states.
    pub fn level(&self) -> usize {
        self.store.level()
    }

    /// Number of posted propagators.
    pub fn propagator_count(&self) -> usize {
        self.propagators.len()
    }

    /// Number of propagator runs so far.
    pub fn propagations(&self) -> u64 {
        self.propagations
    }
}
