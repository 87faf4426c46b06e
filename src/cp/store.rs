//! Backtrackable variable store.
//!
//! Owns the domain of every integer variable. Each narrowing records the
//! previous domain on a trail so that [`VariableStore::pop_level`] restores
//! the state saved by the matching [`VariableStore::push_level`].
//!
//! # Invariants
//! - Domains only shrink between a `push_level` and its `pop_level`.
//! - A failed narrowing leaves the domain untouched and returns
//!   [`Contradiction::EmptyDomain`].

use std::collections::BTreeSet;
use std::fmt;

use super::{Contradiction, Domain};

/// Handle to a variable of a [`VariableStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    /// Position of the variable in its store.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Integer variables with a trail.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    domains: Vec<Domain>,
    names: Vec<String>,
    trail: Vec<(VarId, Domain)>,
    levels: Vec<usize>,
    modified: Vec<VarId>,
}

impl VariableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, name: impl Into<String>, domain: Domain) -> VarId {
        let id = VarId(self.domains.len());
        self.domains.push(domain);
        self.names.push(name.into());
        id
    }

    /// New variable over `[min, max]`. An inverted range is collapsed to `min`.
    pub fn new_int(&mut self, name: impl Into<String>, min: i64, max: i64) -> VarId {
        debug_assert!(min <= max, "inverted range [{min}, {max}]");
        let domain = Domain::interval(min, max).unwrap_or(Domain::singleton(min));
        self.add(name, domain)
    }

    /// New boolean (0/1) variable.
    pub fn new_bool(&mut self, name: impl Into<String>) -> VarId {
        self.add(name, Domain::Interval { min: 0, max: 1 })
    }

    /// New fixed variable.
    pub fn constant(&mut self, name: impl Into<String>, value: i64) -> VarId {
        self.add(name, Domain::singleton(value))
    }

    /// New variable over an explicit set of values.
    ///
    /// Fails when `values` is empty; the variable is allocated anyway so the
    /// error can name it.
    pub fn new_enum(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = i64>,
    ) -> Result<VarId, Contradiction> {
        match Domain::from_values(values) {
            Some(domain) => Ok(self.add(name, domain)),
            None => {
                let id = self.add(name, Domain::singleton(0));
                Err(Contradiction::EmptyDomain(id))
            }
        }
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether the store holds no variable.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// All variable handles, in creation order.
    pub fn vars(&self) -> impl Iterator<Item = VarId> {
        (0..self.domains.len()).map(VarId)
    }

    /// Name given at creation.
    pub fn name(&self, var: VarId) -> &str {
        &self.names[var.0]
    }

    /// Current domain.
    pub fn domain(&self, var: VarId) -> &Domain {
        &self.domains[var.0]
    }

    /// Current lower bound.
    #[inline]
    pub fn min(&self, var: VarId) -> i64 {
        self.domains[var.0].min()
    }

    /// Current upper bound.
    #[inline]
    pub fn max(&self, var: VarId) -> i64 {
        self.domains[var.0].max()
    }

    /// Whether a single value is left.
    #[inline]
    pub fn is_fixed(&self, var: VarId) -> bool {
        self.domains[var.0].is_fixed()
    }

    /// Value of a fixed variable.
    pub fn value(&self, var: VarId) -> Option<i64> {
        self.domains[var.0].value()
    }

    /// Whether `value` is still possible.
    pub fn contains(&self, var: VarId, value: i64) -> bool {
        self.domains[var.0].contains(value)
    }

    /// Number of values left.
    pub fn size(&self, var: VarId) -> u64 {
        self.domains[var.0].size()
    }

    /// Whether every variable is fixed.
    pub fn all_fixed(&self) -> bool {
        self.domains.iter().all(Domain::is_fixed)
    }

    /// Raises the lower bound. Returns whether the domain changed.
    pub fn set_min(&mut self, var: VarId, bound: i64) -> Result<bool, Contradiction> {
        if self.min(var) >= bound {
            return Ok(false);
        }
        let narrowed = self.domains[var.0].with_min(bound);
        self.update(var, narrowed)
    }

    /// Lowers the upper bound. Returns whether the domain changed.
    pub fn set_max(&mut self, var: VarId, bound: i64) -> Result<bool, Contradiction> {
        if self.max(var) <= bound {
            return Ok(false);
        }
        let narrowed = self.domains[var.0].with_max(bound);
        self.update(var, narrowed)
    }

    /// Fixes the variable to `value`.
    pub fn instantiate(&mut self, var: VarId, value: i64) -> Result<bool, Contradiction> {
        if !self.contains(var, value) {
            return Err(Contradiction::EmptyDomain(var));
        }
        self.update(var, Some(Domain::singleton(value)))
    }

    /// Removes `value` from the domain.
    pub fn remove_value(&mut self, var: VarId, value: i64) -> Result<bool, Contradiction> {
        if !self.contains(var, value) {
            return Ok(false);
        }
        let narrowed = self.domains[var.0].without(value);
        self.update(var, narrowed)
    }

    /// Keeps only the values of `values`.
    pub fn restrict(&mut self, var: VarId, values: &BTreeSet<i64>) -> Result<bool, Contradiction> {
        let narrowed = self.domains[var.0].restrict(values);
        self.update(var, narrowed)
    }

    /// Keeps only the values of `domain`.
    pub fn intersect(&mut self, var: VarId, domain: &Domain) -> Result<bool, Contradiction> {
        let narrowed = self.domains[var.0].intersect(domain);
        self.update(var, narrowed)
    }

    fn update(&mut self, var: VarId, narrowed: Option<Domain>) -> Result<bool, Contradiction> {
        let narrowed = narrowed.ok_or(Contradiction::EmptyDomain(var))?;
        let current = &self.domains[var.0];
        if narrowed == *current {
            return Ok(false);
        }
        debug_assert!(narrowed.is_subset_of(current), "{var} widened");
        if !self.levels.is_empty() {
            self.trail.push((var, current.clone()));
        }
        self.domains[var.0] = narrowed;
        self.modified.push(var);
        Ok(true)
    }

    /// Saves the current state.
    pub fn push_level(&mut self) {
        self.levels.push(self.trail.len());
    }

    /// Restores the state saved by the last [`push_level`](Self::push_level).
    pub fn pop_level(&mut self) {
        let Some(mark) = self.levels.pop() else {
            return;
        };
        while self.trail.len() > mark {
            if let Some((var, domain)) = self.trail.pop() {
                self.domains[var.0] = domain;
            }
        }
        self.modified.clear();
    }

    /// Number of saved states.
    pub fn level(&self) -> usize {
        self.levels.len()
    }

    /// Drains the variables modified since the last call.
    pub fn take_modified(&mut self) -> Vec<VarId> {
        std::mem::take(&mut self.modified)
    }

    /// Forgets pending modifications.
    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }
}
