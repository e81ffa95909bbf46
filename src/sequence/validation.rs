use super::Sequence;
use crate::step::{MacroBody, Step, StepId, StepKind};
use std::sync::Arc;

impl Sequence {
    /// Checks the chart's structural consistency: every step reachable from
    /// an initial step eventually loops back through an initial step, every
    /// step has at least one outgoing transition, every transition has at
    /// least one `next` and one `validation`, and every macro has a `first`
    /// step and more than one inner step.
    ///
    /// This cannot and does not check the user's logic — only the graph
    /// shape.
    pub fn is_valid(&self) -> bool {
        if self.inner.all_steps.is_empty() || self.inner.initial_steps.is_empty() {
            tracing::warn!("sequence has no steps, or no initial steps");
            return false;
        }
        let mut traversed: Vec<StepId> = Vec::new();
        let mut ok = true;
        let mut first = true;
        for kv in self.inner.initial_steps.iter() {
            let step = kv.value().clone();
            ok &= self.loop_check(&step, &mut traversed, !first);
            first = false;
        }
        if !ok {
            tracing::warn!("one of the initial steps does not loop back to an initial step");
        }
        ok
    }

    fn loop_check(&self, step: &Arc<Step>, traversed: &mut Vec<StepId>, check_traversed: bool) -> bool {
        let mut ok = !step.out().is_empty();
        if let StepKind::Macro(body) = step.kind() {
            ok &= check_macro(body);
        }

        if check_traversed && traversed.contains(&step.id()) {
            return true;
        }
        traversed.push(step.id());

        for t in step.out() {
            if t.nexts().is_empty() || t.validations().is_empty() {
                tracing::warn!(step = step.id(), "transition is missing nexts or validations");
                return false;
            }
            for &next_id in t.nexts() {
                let Some(next) = self.resolve(next_id) else {
                    tracing::warn!(step = step.id(), next = next_id, "transition targets an unknown step");
                    return false;
                };
                if next.is_initial() {
                    continue;
                }
                ok &= self.loop_check(&next, traversed, !step.is_initial());
            }
        }
        ok
    }
}

fn check_macro(body: &Arc<MacroBody>) -> bool {
    let steps = body.steps();
    let mut ok = body.first().is_some() && steps.len() > 1;
    if ok {
        for step in &steps {
            if !ok {
                break;
            }
            ok &= !step.out().is_empty();
        }
    }
    ok
}
