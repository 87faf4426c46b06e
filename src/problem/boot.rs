//! Coupling between a node boot and the VMs arriving on the node.

use crate::cp::{Contradiction, Propagator, VarId, VariableStore};

/// Ties a node's boot to the demanding slices that may land on it.
///
/// - A demanding slice placed on the node starts once the boot is over.
/// - A demanding slice that cannot start after the boot loses the node.
/// - When `optional`: the boot happens iff a slice is placed on the node,
///   and a boot of duration 0 removes the node from every hoster.
#[derive(Debug, Clone)]
pub struct NodeBoot {
    name: String,
    node: i64,
    duration: VarId,
    end: VarId,
    cost: i64,
    optional: bool,
    arrivals: Vec<(VarId, VarId)>,
}

impl NodeBoot {
    /// Creates the coupling for node index `node`.
    ///
    /// `arrivals` lists the `(hoster, start)` variables of every demanding
    /// slice whose hoster may take the node.
    pub fn new(
        node_id: &str,
        node: usize,
        (duration, end): (VarId, VarId),
        cost: i64,
        optional: bool,
        arrivals: Vec<(VarId, VarId)>,
    ) -> Self {
        Self {
            name: format!("boot({node_id})"),
            node: node as i64,
            duration,
            end,
            cost,
            optional,
            arrivals,
        }
    }
}

impl Propagator for NodeBoot {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Vec<VarId> {
        let mut vars = vec![self.duration, self.end];
        for &(hoster, start) in &self.arrivals {
            vars.push(hoster);
            vars.push(start);
        }
        vars
    }

    fn propagate(&self, s: &mut VariableStore) -> Result<(), Contradiction> {
        if self.optional && self.cost > 0 {
            if s.value(self.duration) == Some(0) {
                for &(hoster, _) in &self.arrivals {
                    s.remove_value(hoster, self.node)?;
                }
                return Ok(());
            }
            if self
                .arrivals
                .iter()
                .any(|&(hoster, _)| s.value(hoster) == Some(self.node))
            {
                s.instantiate(self.duration, self.cost)?;
            } else if !self
                .arrivals
                .iter()
                .any(|&(hoster, _)| s.contains(hoster, self.node))
            {
                s.instantiate(self.duration, 0)?;
            }
        }

        let ready = s.min(self.end);
        for &(hoster, start) in &self.arrivals {
            if s.value(hoster) == Some(self.node) {
                s.set_min(start, ready)?;
            } else if s.contains(hoster, self.node) && s.max(start) < ready {
                s.remove_value(hoster, self.node)?;
            }
        }
        Ok(())
    }
}
