use super::Sequence;
use crate::step::Step;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// The per-invocation handshake a predecessor hands to its successors: one
/// [`StepGate`] is created fresh by every `run_from` call and shared by
/// everything it forks.
pub(crate) struct StepGate {
    lock: Mutex<()>,
    cv: Condvar,
}

impl StepGate {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    pub fn notify_all(&self) {
        self.cv.notify_all();
    }

    /// Waits, polling `pred` at least every 100ms, until `pred` returns false.
    pub fn wait_while(&self, pred: impl Fn() -> bool) {
        let mut guard = self.lock.lock();
        while pred() {
            self.cv.wait_for(&mut guard, Duration::from_millis(100));
        }
    }
}

/// RAII guard: construction activates a step and fires its on-enter
/// callback; `Drop` deactivates it, fires the on-exit callback, and runs a
/// one-shot notification set by the caller (if any) before releasing.
pub(crate) struct ActivationGuard {
    sequence: Sequence,
    step: Arc<Step>,
    notify: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ActivationGuard {
    pub fn new(sequence: Sequence, step: Arc<Step>) -> Self {
        step.set_activated(true);
        sequence.fire_step_changed(step.id(), true);
        Self {
            sequence,
            step,
            notify: Mutex::new(None),
        }
    }

    pub fn set_notification(&self, f: impl FnOnce() + Send + 'static) {
        *self.notify.lock() = Some(Box::new(f));
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        self.step.set_activated(false);
        self.sequence.fire_step_changed(self.step.id(), false);
        if let Some(notify) = self.notify.lock().take() {
            notify();
        }
    }
}
