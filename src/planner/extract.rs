//! Projection of a solution onto a plan.

use crate::cp::Solution;
use crate::models::{ReconfigurationPlan, Reservation};
use crate::problem::ReconfigurationProblem;

/// Builds the plan a solution stands for.
///
/// 1. every non-empty slice becomes a reservation (consuming slices on
///    `[0, end)`, demanding slices on `[start, horizon)`),
/// 2. every model that is not a no-op yields a timed action,
/// 3. VMs to terminate leave the destination.
pub(crate) fn build_plan(problem: &ReconfigurationProblem, solution: &Solution) -> ReconfigurationPlan {
    let mut plan = ReconfigurationPlan::new(problem.source().clone());
    let horizon = problem.horizon();

    for slice in problem.slices().iter().filter(|s| !s.is_empty()) {
        let node = solution.value(slice.hoster()) as usize;
        let (start, end) = if slice.is_consuming() {
            (0, solution.value(slice.end()))
        } else {
            (solution.value(slice.start()), horizon)
        };
        if start < end {
            plan.add_reservation(Reservation {
                element: slice.element.clone(),
                node: problem.node_id(node).to_string(),
                start,
                end,
                cpu: slice.cpu,
                memory: slice.memory,
            });
        }
    }

    for action in problem
        .action_models()
        .iter()
        .filter_map(|m| m.to_action(solution, problem))
    {
        plan.add_action(action);
    }

    for vm in &problem.target().terminate {
        if problem.source().vm(vm).is_some() {
            plan.terminate(vm.as_str());
        }
    }
    plan
}
