//! Generic propagators.
//!
//! Bounds-consistent arithmetic ([`Plus`], [`LessOrEqual`], [`Maximum`],
//! [`Sum`]), reification ([`ReifiedEquality`], [`Select`]) and two global
//! constraints over sets of variables ([`AllDifferent`], [`AllEqual`]).

use super::{Contradiction, Propagator, VarId, VariableStore};

/// `z = x + y`.
#[derive(Debug, Clone)]
pub struct Plus {
    x: VarId,
    y: VarId,
    z: VarId,
}

impl Plus {
    /// Creates `z = x + y`.
    pub fn new(x: VarId, y: VarId, z: VarId) -> Self {
        Self { x, y, z }
    }
}

impl Propagator for Plus {
    fn name(&self) -> &str {
        "plus"
    }

    fn variables(&self) -> Vec<VarId> {
        vec![self.x, self.y, self.z]
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        let (x, y, z) = (self.x, self.y, self.z);
        s.set_min(z, s.min(x) + s.min(y))?;
        s.set_max(z, s.max(x) + s.max(y))?;
        s.set_min(x, s.min(z) - s.max(y))?;
        s.set_max(x, s.max(z) - s.min(y))?;
        s.set_min(y, s.min(z) - s.max(x))?;
        s.set_max(y, s.max(z) - s.min(x))?;
        Ok(())
    }
}

/// `x + offset <= y`.
#[derive(Debug, Clone)]
pub struct LessOrEqual {
    x: VarId,
    y: VarId,
    offset: i64,
}

impl LessOrEqual {
    /// Creates `x <= y`.
    pub fn new(x: VarId, y: VarId) -> Self {
        Self { x, y, offset: 0 }
    }

    /// Sets the offset added to `x`.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

impl Propagator for LessOrEqual {
    fn name(&self) -> &str {
        "less-or-equal"
    }

    fn variables(&self) -> Vec<VarId> {
        vec![self.x, self.y]
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        s.set_min(self.y, s.min(self.x) + self.offset)?;
        s.set_max(self.x, s.max(self.y) - self.offset)?;
        Ok(())
    }
}

/// `b <=> (x == value)` with `b` boolean.
#[derive(Debug, Clone)]
pub struct ReifiedEquality {
    b: VarId,
    x: VarId,
    value: i64,
}

impl ReifiedEquality {
    /// Creates `b <=> (x == value)`.
    pub fn new(b: VarId, x: VarId, value: i64) -> Self {
        Self { b, x, value }
    }
}

impl Propagator for ReifiedEquality {
    fn name(&self) -> &str {
        "reified-equality"
    }

    fn variables(&self) -> Vec<VarId> {
        vec![self.b, self.x]
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        match s.value(self.b) {
            Some(1) => {
                s.instantiate(self.x, self.value)?;
            }
            Some(_) => {
                s.remove_value(self.x, self.value)?;
            }
            None if !s.contains(self.x, self.value) => {
                s.instantiate(self.b, 0)?;
            }
            None if s.is_fixed(self.x) => {
                s.instantiate(self.b, 1)?;
            }
            None => {}
        }
        Ok(())
    }
}

/// `target = if b { if_true } else { if_false }` with `b` boolean.
#[derive(Debug, Clone)]
pub struct Select {
    b: VarId,
    target: VarId,
    if_true: i64,
    if_false: i64,
}

impl Select {
    /// Creates the selection.
    pub fn new(b: VarId, target: VarId, if_true: i64, if_false: i64) -> Self {
        Self {
            b,
            target,
            if_true,
            if_false,
        }
    }
}

impl Propagator for Select {
    fn name(&self) -> &str {
        "select"
    }

    fn variables(&self) -> Vec<VarId> {
        vec![self.b, self.target]
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        match s.value(self.b) {
            Some(1) => {
                s.instantiate(self.target, self.if_true)?;
            }
            Some(_) => {
                s.instantiate(self.target, self.if_false)?;
            }
            None => {
                let values = [self.if_true, self.if_false].into_iter().collect();
                s.restrict(self.target, &values)?;
                if self.if_true != self.if_false {
                    if !s.contains(self.target, self.if_true) {
                        s.instantiate(self.b, 0)?;
                    } else if !s.contains(self.target, self.if_false) {
                        s.instantiate(self.b, 1)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// `result = max(vars)`, `0` when `vars` is empty.
#[derive(Debug, Clone)]
pub struct Maximum {
    result: VarId,
    vars: Vec<VarId>,
}

impl Maximum {
    /// Creates `result = max(vars)`.
    pub fn new(result: VarId, vars: Vec<VarId>) -> Self {
        Self { result, vars }
    }
}

impl Propagator for Maximum {
    fn name(&self) -> &str {
        "maximum"
    }

    fn variables(&self) -> Vec<VarId> {
        let mut vars = self.vars.clone();
        vars.push(self.result);
        vars
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        if self.vars.is_empty() {
            s.instantiate(self.result, 0)?;
            return Ok(());
        }
        let lo = self.vars.iter().map(|&v| s.min(v)).max().unwrap_or(0);
        let hi = self.vars.iter().map(|&v| s.max(v)).max().unwrap_or(0);
        s.set_min(self.result, lo)?;
        s.set_max(self.result, hi)?;

        let bound = s.max(self.result);
        for &v in &self.vars {
            s.set_max(v, bound)?;
        }

        let floor = s.min(self.result);
        let mut supports = self.vars.iter().filter(|&&v| s.max(v) >= floor);
        match (supports.next(), supports.next()) {
            (None, _) => return Err(Contradiction::EmptyDomain(self.result)),
            (Some(&only), None) => {
                s.set_min(only, floor)?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// `result = sum(vars)`.
#[derive(Debug, Clone)]
pub struct Sum {
    result: VarId,
    vars: Vec<VarId>,
}

impl Sum {
    /// Creates `result = sum(vars)`.
    pub fn new(result: VarId, vars: Vec<VarId>) -> Self {
        Self { result, vars }
    }
}

impl Propagator for Sum {
    fn name(&self) -> &str {
        "sum"
    }

    fn variables(&self) -> Vec<VarId> {
        let mut vars = self.vars.clone();
        vars.push(self.result);
        vars
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        let lo: i64 = self.vars.iter().map(|&v| s.min(v)).sum();
        let hi: i64 = self.vars.iter().map(|&v| s.max(v)).sum();
        s.set_min(self.result, lo)?;
        s.set_max(self.result, hi)?;

        let (r_min, r_max) = (s.min(self.result), s.max(self.result));
        for &v in &self.vars {
            let (v_min, v_max) = (s.min(v), s.max(v));
            s.set_min(v, r_min - (hi - v_max))?;
            s.set_max(v, r_max - (lo - v_min))?;
        }
        Ok(())
    }
}

/// Pairwise distinct values (forward checking).
#[derive(Debug, Clone)]
pub struct AllDifferent {
    vars: Vec<VarId>,
}

impl AllDifferent {
    /// Creates the constraint.
    pub fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }
}

impl Propagator for AllDifferent {
    fn name(&self) -> &str {
        "all-different"
    }

    fn variables(&self) -> Vec<VarId> {
        self.vars.clone()
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        let mut changed = true;
        while changed {
            changed = false;
            for (i, &fixed) in self.vars.iter().enumerate() {
                let Some(value) = s.value(fixed) else {
                    continue;
                };
                for (j, &other) in self.vars.iter().enumerate() {
                    if i != j && s.remove_value(other, value)? {
                        changed = true;
                    }
                }
            }
        }
        Ok(())
    }
}

/// All variables take the same value.
#[derive(Debug, Clone)]
pub struct AllEqual {
    vars: Vec<VarId>,
}

impl AllEqual {
    /// Creates the constraint.
    pub fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }
}

impl Propagator for AllEqual {
    fn name(&self) -> &str {
        "all-equal"
    }

    fn variables(&self) -> Vec<VarId> {
        self.vars.clone()
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        let Some((&first, rest)) = self.vars.split_first() else {
            return Ok(());
        };
        let mut common = s.domain(first).clone();
        for &v in rest {
            common = common
                .intersect(s.domain(v))
                .ok_or(Contradiction::EmptyDomain(v))?;
        }
        for &v in &self.vars {
            s.intersect(v, &common)?;
        }
        Ok(())
    }
}
