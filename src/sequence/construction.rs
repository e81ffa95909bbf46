use super::Sequence;
use crate::error::{Result, SfcError};
use crate::step::{Step, StepId, StepKind};
use crate::transition::Transition;
use std::sync::Arc;

impl Sequence {
    /// Adds `step` to the chart. Rejects a duplicate id and rejects mutation
    /// while the engine is running — the only structural-mutation guard this
    /// engine enforces; nothing below this boundary re-checks running state.
    pub fn add_step(&self, step: Arc<Step>) -> Result<()> {
        let _guard = self.inner.steps_guard.lock();
        if self.is_running() {
            return Err(SfcError::IllegalState(
                "cannot add a step while the sequence is running".into(),
            ));
        }
        let id = step.id();
        if self.inner.initial_steps.contains_key(&id) || self.inner.all_steps.contains_key(&id) {
            return Err(SfcError::InvalidArgument(format!(
                "step id {id} is already used in this sequence"
            )));
        }
        // A macro's inner steps land in `all_steps` too (see the `Macro` arm
        // below) and must clear the same duplicate check as any other step —
        // checked up front, before anything is mutated, so a colliding inner
        // id fails the whole `add_step` call instead of silently overwriting
        // whatever was already registered under that id.
        if let StepKind::Macro(body) = step.kind() {
            for inner_step in body.steps() {
                let inner_id = inner_step.id();
                if self.inner.initial_steps.contains_key(&inner_id)
                    || self.inner.all_steps.contains_key(&inner_id)
                {
                    return Err(SfcError::InvalidArgument(format!(
                        "macro {id}'s inner step id {inner_id} is already used in this sequence"
                    )));
                }
            }
        }
        // Every step (and, for a macro, every inner step) shares this
        // sequence's own `running` flag from here on, so `add_action`/
        // `add_transition` can refuse once the sequence starts without the
        // step needing a handle back to the whole `Sequence`.
        step.bind_owner_running(self.inner.running.clone());
        match step.kind() {
            StepKind::Initial => {
                self.inner.initial_steps.insert(id, step);
            }
            StepKind::Macro(body) => {
                for inner_step in body.steps() {
                    inner_step.bind_owner_running(self.inner.running.clone());
                    self.inner.all_steps.insert(inner_step.id(), inner_step);
                }
                self.inner.all_steps.insert(id, step);
            }
            StepKind::Default | StepKind::End => {
                self.inner.all_steps.insert(id, step);
            }
        }
        Ok(())
    }

    pub fn contains_step(&self, id: StepId) -> bool {
        self.inner.initial_steps.contains_key(&id) || self.inner.all_steps.contains_key(&id)
    }

    pub fn contains_transition(&self, transition: &Arc<Transition>) -> bool {
        let search = |map: &dashmap::DashMap<StepId, Arc<Step>>| {
            map.iter()
                .any(|kv| kv.value().out().iter().any(|t| Arc::ptr_eq(t, transition)))
        };
        search(&self.inner.initial_steps) || search(&self.inner.all_steps)
    }

    pub fn get_step(&self, id: StepId) -> Option<Arc<Step>> {
        self.inner
            .initial_steps
            .get(&id)
            .map(|r| r.value().clone())
            .or_else(|| self.inner.all_steps.get(&id).map(|r| r.value().clone()))
    }

    /// Same lookup as [`Sequence::get_step`] but checks `all_steps` first,
    /// matching the order the firing algorithm uses at run time.
    pub(crate) fn resolve(&self, id: StepId) -> Option<Arc<Step>> {
        self.inner
            .all_steps
            .get(&id)
            .map(|r| r.value().clone())
            .or_else(|| self.inner.initial_steps.get(&id).map(|r| r.value().clone()))
    }

    pub fn active_steps(&self) -> Vec<Arc<Step>> {
        let mut steps: Vec<Arc<Step>> = self
            .inner
            .all_steps
            .iter()
            .map(|kv| kv.value().clone())
            .collect();
        steps.extend(self.inner.initial_steps.iter().map(|kv| kv.value().clone()));
        steps.retain(|s| s.is_activated());
        steps
    }

    /// Copies `self`'s steps and transitions into `target`. Refuses if either
    /// sequence is running. No value-copy constructor is offered for
    /// `Sequence` itself (clone shares the running engine, see the type's
    /// docs) — this is the deliberate replacement.
    pub fn clone_graph_into(&self, target: &Sequence) -> Result<()> {
        if self.is_running() || target.is_running() {
            return Err(SfcError::IllegalState(
                "cannot copy a chart while either side is running".into(),
            ));
        }
        for kv in self.inner.initial_steps.iter() {
            target.add_step(kv.value().clone())?;
        }
        for kv in self.inner.all_steps.iter() {
            if target.contains_step(*kv.key()) {
                continue;
            }
            target.add_step(kv.value().clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Sequence;
    use crate::transition::Transition;

    fn loop_chart() -> Sequence {
        let seq = Sequence::new();
        let step0 = Step::initial(0);
        let step1 = Step::default_step(1);
        step0.add_transition(Arc::new(Transition::new(vec![1], vec![0]))).unwrap();
        step1.add_transition(Arc::new(Transition::new(vec![0], vec![1]))).unwrap();
        seq.add_step(step0).unwrap();
        seq.add_step(step1).unwrap();
        seq
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let seq = Sequence::new();
        seq.add_step(Step::default_step(0)).unwrap();
        let err = seq.add_step(Step::default_step(0)).unwrap_err();
        assert!(matches!(err, SfcError::InvalidArgument(_)));
    }

    #[test]
    fn duplicate_id_across_initial_and_default_is_rejected() {
        let seq = Sequence::new();
        seq.add_step(Step::initial(0)).unwrap();
        let err = seq.add_step(Step::default_step(0)).unwrap_err();
        assert!(matches!(err, SfcError::InvalidArgument(_)));
    }

    #[test]
    fn add_step_while_running_is_rejected() {
        let seq = Sequence::new();
        seq.inner.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = seq.add_step(Step::default_step(0)).unwrap_err();
        assert!(matches!(err, SfcError::IllegalState(_)));
    }

    #[test]
    fn macro_add_step_registers_inner_steps_and_itself() {
        let seq = Sequence::new();
        let body = crate::step::MacroBody::new();
        body.add_step(Step::default_step(1));
        body.add_step(Step::default_step(2));
        let macro_step = Step::new(10, StepKind::Macro(body));

        seq.add_step(macro_step).unwrap();

        assert!(seq.contains_step(10));
        assert!(seq.contains_step(1));
        assert!(seq.contains_step(2));
    }

    #[test]
    fn contains_transition_reflects_membership_in_some_steps_out_list() {
        let seq = loop_chart();
        let member = seq.get_step(0).unwrap().out()[0].clone();
        let stranger = Arc::new(Transition::new(vec![1], vec![0]));

        assert!(seq.contains_transition(&member));
        assert!(!seq.contains_transition(&stranger));
    }

    #[test]
    fn get_step_finds_both_initial_and_default_steps() {
        let seq = loop_chart();
        assert_eq!(seq.get_step(0).map(|s| s.id()), Some(0));
        assert_eq!(seq.get_step(1).map(|s| s.id()), Some(1));
        assert!(seq.get_step(99).is_none());
    }

    #[test]
    fn active_steps_returns_only_activated_steps() {
        let seq = loop_chart();
        assert!(seq.active_steps().is_empty());

        seq.get_step(1).unwrap().set_activated(true);
        let active = seq.active_steps();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), 1);
    }

    #[test]
    fn clone_graph_into_copies_steps_and_transitions() {
        let source = loop_chart();
        let target = Sequence::new();

        source.clone_graph_into(&target).unwrap();

        assert!(target.contains_step(0));
        assert!(target.contains_step(1));
        assert_eq!(target.get_step(0).unwrap().out().len(), 1);
    }

    #[test]
    fn clone_graph_into_refuses_while_either_side_is_running() {
        let source = loop_chart();
        let target = Sequence::new();
        source.inner.running.store(true, std::sync::atomic::Ordering::SeqCst);

        let err = source.clone_graph_into(&target).unwrap_err();
        assert!(matches!(err, SfcError::IllegalState(_)));
    }

    #[test]
    fn macro_with_an_inner_step_id_colliding_with_an_existing_step_is_rejected() {
        let seq = Sequence::new();
        seq.add_step(Step::default_step(1)).unwrap();

        let body = crate::step::MacroBody::new();
        // Id 1 is already registered above; this must not silently replace it.
        body.add_step(Step::default_step(1));
        body.add_step(Step::default_step(2));
        let macro_step = Step::new(10, StepKind::Macro(body));

        let err = seq.add_step(macro_step).unwrap_err();
        assert!(matches!(err, SfcError::InvalidArgument(_)));
        // The pre-existing step under id 1 must survive the rejected add_step
        // untouched, and the macro itself must not have been registered either.
        assert!(seq.contains_step(1));
        assert!(!seq.contains_step(10));
        assert!(!seq.contains_step(2));
    }

    #[test]
    fn clone_graph_into_does_not_let_the_target_sequence_steal_a_shared_steps_running_guard() {
        let source = loop_chart();
        let target = Sequence::new();
        source.clone_graph_into(&target).unwrap();

        // `add_step` on `target` must not rebind step 0's mutation guard away
        // from `source` (the sequence that first registered it) — flipping
        // only `target`'s running flag must not unlock mutation on a step
        // `source` still owns.
        target.inner.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let step0 = source.get_step(0).unwrap();
        assert!(step0
            .add_transition(Arc::new(Transition::new(vec![1], vec![0])))
            .is_ok());

        source.inner.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = step0
            .add_transition(Arc::new(Transition::new(vec![1], vec![0])))
            .unwrap_err();
        assert!(matches!(err, SfcError::IllegalState(_)));
    }
}
