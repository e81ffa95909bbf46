use super::Sequence;
use crate::step::StepId;
use std::sync::Arc;

impl Sequence {
    pub fn add_sequence_changed_callback(&self, cb: impl Fn(bool) + Send + Sync + 'static) {
        self.inner.sequence_changed_callbacks.lock().push(Arc::new(cb));
    }

    pub fn clear_sequence_changed_callbacks(&self) {
        self.inner.sequence_changed_callbacks.lock().clear();
    }

    pub fn add_step_changed_callback(&self, cb: impl Fn(StepId, bool) + Send + Sync + 'static) {
        self.inner.step_changed_callbacks.lock().push(Arc::new(cb));
    }

    pub fn clear_step_changed_callbacks(&self) {
        self.inner.step_changed_callbacks.lock().clear();
    }

    /// Snapshots the observer list under its mutex, drops the lock, then
    /// invokes each callback — a reentering observer (one that calls back
    /// into this sequence) cannot deadlock against the list it is iterating.
    pub(crate) fn fire_sequence_changed(&self, state: bool) {
        let callbacks = self.inner.sequence_changed_callbacks.lock().clone();
        for cb in callbacks {
            cb(state);
        }
    }

    /// Same snapshot-then-invoke discipline as
    /// [`Sequence::fire_sequence_changed`]. Silently does nothing once the
    /// sequence has already stopped: an activation guard dropping after an
    /// anomaly or a `stop()` call does not re-announce the step it is
    /// unwinding.
    pub(crate) fn fire_step_changed(&self, id: StepId, state: bool) {
        if !self.is_running() {
            return;
        }
        let callbacks = self.inner.step_changed_callbacks.lock().clone();
        for cb in callbacks {
            cb(id, state);
        }
    }
}
