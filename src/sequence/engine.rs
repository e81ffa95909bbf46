use super::activation::{ActivationGuard, StepGate};
use super::{Sequence, CRAZY_LOOPING_STOP, CRAZY_PARALLELISM_STOP};
use crate::error::{Result, SfcError};
use crate::step::{Step, StepId, StepKind};
use crate::worker_pool::WorkerPool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

impl Sequence {
    /// Starts the engine from `init_step_id`.
    ///
    /// Rejects an `init_step_id` that is not a registered initial step,
    /// refuses to start if every outgoing transition of every step is
    /// already receptive (the chart would complete a full pass before
    /// anyone could observe it running), and refuses to start an invalid
    /// chart. Returns once the initial step has fired its first outgoing
    /// transition; everything downstream of that continues on the worker
    /// pool.
    pub fn start(&self, init_step_id: StepId) -> Result<()> {
        if !self.inner.initial_steps.contains_key(&init_step_id) {
            return Err(SfcError::InvalidArgument(format!(
                "step {init_step_id} is not a registered initial step"
            )));
        }

        let all_already_true = self
            .inner
            .all_steps
            .iter()
            .all(|kv| kv.value().out().iter().all(|t| t.receptivity().get()))
            && self
                .inner
                .initial_steps
                .iter()
                .all(|kv| kv.value().out().iter().all(|t| t.receptivity().get()));
        if all_already_true {
            return Err(SfcError::IllegalState(
                "refusing to start a sequence whose transitions are all already true".into(),
            ));
        }
        if !self.is_valid() {
            return Err(SfcError::IllegalState("refusing to start an invalid sequence".into()));
        }

        self.inner.running.store(true, Ordering::SeqCst);
        self.fire_sequence_changed(true);

        let pool = WorkerPool::new(self.inner.pool_size)?;
        *self.inner.pool.lock() = Some(pool);

        self.run_from(init_step_id, None);
        Ok(())
    }

    /// Stops the engine and drains the worker pool.
    ///
    /// Preserves a `stop_code` already latched by an anomaly: a clean stop
    /// never erases the reason a sequence actually came to halt.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        // Deliberately does not touch `stop_code`: it starts at NORMAL_STOP
        // and an anomaly latches it before this ever runs, so there is
        // nothing here to reset.
        if let Some(pool) = self.inner.pool.lock().take() {
            pool.shutdown();
        }
        self.fire_sequence_changed(false);
    }

    /// Latches an anomaly `stop_code` and the `SfcError` that names it. The
    /// error cannot be `?`-propagated to an unrelated caller from inside a
    /// pool worker, so it is logged and stashed for `Sequence::last_error`
    /// instead of raised — see `DESIGN.md`.
    fn latch_anomaly(&self, code: u32, error: SfcError) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.stop_code.store(code, Ordering::SeqCst);
        let message = error.to_string();
        *self.inner.last_error.lock() = Some(message.clone());
        tracing::error!(stop_code = code, message, "sequence stopped on anomaly");
        self.fire_sequence_changed(false);
    }

    /// The recursive firing routine. Runs `step_id`'s actions, waits out its
    /// predecessor's activation if any, then polls `step_id`'s outgoing
    /// transitions until one is receptive, counts the join arity on each of
    /// its `nexts`, and submits a fresh invocation to the worker pool for
    /// every `next` whose join quorum is met.
    pub(crate) fn run_from(&self, step_id: StepId, previous: Option<(Arc<Step>, Arc<StepGate>)>) {
        self.inner.active_workers.fetch_add(1, Ordering::SeqCst);
        if !self.is_running() {
            self.inner.active_workers.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        let Some(step_to_run) = self.resolve(step_id) else {
            tracing::error!(step_id, "attempted to run an unknown step id");
            self.inner.active_workers.fetch_sub(1, Ordering::SeqCst);
            return;
        };

        if !step_to_run.is_macro() {
            for action in step_to_run.actions() {
                action();
            }
        }

        if let Some((prev_step, prev_gate)) = &previous {
            prev_gate.wait_while(|| prev_step.is_activated() && self.is_running());
        }

        let guard = ActivationGuard::new(self.clone(), step_to_run.clone());
        tracing::debug!(step = step_id, "running step");

        let mut done = false;
        let mut about_to_run: Vec<Arc<Step>> = Vec::new();
        let cond_new = Arc::new(StepGate::new());

        while self.is_running() && !done {
            for t in step_to_run.out() {
                if !self.is_running() {
                    break;
                }
                if !t.receptivity().get() {
                    continue;
                }
                done = true;
                about_to_run = t.nexts().iter().filter_map(|id| self.resolve(*id)).collect();

                if about_to_run.len() > self.inner.pool_size {
                    self.inner.active_workers.fetch_sub(1, Ordering::SeqCst);
                    self.latch_anomaly(CRAZY_PARALLELISM_STOP, SfcError::CrazyParallelism);
                    return;
                }

                for next_step in &about_to_run {
                    let is_macro = next_step.is_macro();
                    if is_macro {
                        if let StepKind::Macro(body) = next_step.kind() {
                            if let Some(last_id) = body.last() {
                                self.inner
                                    .macro_deactivations
                                    .lock()
                                    .insert(last_id, next_step.id());
                            }
                        }
                    }
                    let target = if is_macro {
                        match next_step.kind() {
                            StepKind::Macro(body) => body.first_step().unwrap_or_else(|| next_step.clone()),
                            _ => next_step.clone(),
                        }
                    } else {
                        next_step.clone()
                    };

                    if !self.is_running() || target.is_activated() {
                        continue;
                    }

                    let required = t.validations().len() as u32;
                    let target_id = target.id();
                    let fire_child = {
                        let mut counts = self.inner.counts.lock();
                        let entry = counts.entry(target_id).or_insert((required, 0));
                        entry.1 += 1;
                        let fire = entry.1 == entry.0;
                        if fire {
                            entry.1 = 0;
                        }
                        fire
                    };

                    if !fire_child {
                        continue;
                    }

                    let idle = {
                        let pool_guard = self.inner.pool.lock();
                        pool_guard.as_ref().map(WorkerPool::idle_count).unwrap_or(0)
                    };
                    let active = self.inner.active_workers.load(Ordering::SeqCst);

                    if !self.is_running() {
                        continue;
                    }
                    if idle == 0 || active > self.inner.pool_size {
                        self.inner.active_workers.fetch_sub(1, Ordering::SeqCst);
                        self.latch_anomaly(CRAZY_LOOPING_STOP, SfcError::CrazyLooping);
                        return;
                    }

                    let seq = self.clone();
                    let prev_step = step_to_run.clone();
                    let gate = cond_new.clone();
                    self.submit(move || seq.run_from(target_id, Some((prev_step, gate))));
                }
                break;
            }

            if !self.is_running() {
                break;
            }
            thread::sleep(Duration::from_micros(self.polling_delay_us()));
        }

        if self.is_running() {
            let seq = self.clone();
            let step_id_captured = step_to_run.id();
            let gates_to_notify = about_to_run.clone();
            let gate_for_children = cond_new.clone();
            guard.set_notification(move || {
                if let Some(macro_id) = seq.inner.macro_deactivations.lock().remove(&step_id_captured) {
                    if let Some(macro_step) = seq.resolve(macro_id) {
                        seq.fire_step_changed(macro_id, macro_step.is_activated());
                    }
                }
                for successor in &gates_to_notify {
                    loop {
                        gate_for_children.notify_all();
                        if successor.is_activated() || !seq.is_running() {
                            break;
                        }
                    }
                }
            });
        }

        self.inner.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(pool) = self.inner.pool.lock().as_ref() {
            pool.execute(Box::new(job));
        }
    }
}
