mod activation;
mod callbacks;
mod construction;
mod engine;
mod validation;

use crate::step::{Step, StepId};
use crate::worker_pool::WorkerPool;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize};
use std::sync::Arc;

/// Normal, non-anomalous stop.
pub const NORMAL_STOP: u32 = 0;
/// A join completed with the worker pool exhausted. See
/// `Sequence::stop_code`.
pub const CRAZY_LOOPING_STOP: u32 = 666;
/// A fork's width exceeded the worker pool size. See `Sequence::stop_code`.
pub const CRAZY_PARALLELISM_STOP: u32 = 667;

type SequenceChangedCallback = Arc<dyn Fn(bool) + Send + Sync>;
type StepChangedCallback = Arc<dyn Fn(StepId, bool) + Send + Sync>;

pub(crate) struct SequenceInner {
    pool_size: usize,
    polling_delay_us: AtomicU64,
    /// Shared by `Arc` with every `Step` this sequence owns (see
    /// `Step::bind_owner_running`), so a step can refuse `add_action`/
    /// `add_transition` while its owner is running without holding a
    /// back-reference to the whole `Sequence`.
    running: Arc<AtomicBool>,
    stop_code: AtomicU32,
    active_workers: AtomicUsize,

    /// Serializes `add_step` against itself and against `start`; reads go
    /// straight through the concurrent maps below.
    steps_guard: Mutex<()>,
    initial_steps: DashMap<StepId, Arc<Step>>,
    all_steps: DashMap<StepId, Arc<Step>>,

    /// `(required, current)` join-arity counters per targeted step id.
    counts: Mutex<std::collections::HashMap<StepId, (u32, u32)>>,
    /// Maps a macro's `last` inner step id to the macro's own id, so that
    /// inner step's deactivation can also deactivate the enclosing macro.
    macro_deactivations: Mutex<std::collections::HashMap<StepId, StepId>>,

    pool: Mutex<Option<WorkerPool>>,

    sequence_changed_callbacks: Mutex<Vec<SequenceChangedCallback>>,
    step_changed_callbacks: Mutex<Vec<StepChangedCallback>>,

    last_error: Mutex<Option<String>>,
}

/// A chart plus its concurrent execution engine.
///
/// Cheap to clone: clones share the same running engine and the same graph,
/// they do not fork a second copy of it (see [`Sequence::clone_graph_into`]
/// for that).
#[derive(Clone)]
pub struct Sequence {
    pub(crate) inner: Arc<SequenceInner>,
}

impl Sequence {
    /// Builds a sequence with a worker pool sized to the host's hardware
    /// concurrency, polling receptivities every 100 microseconds.
    pub fn new() -> Self {
        SequenceBuilder::default().build()
    }

    pub fn with_pool_size(pool_size: usize) -> Self {
        SequenceBuilder::default().pool_size(pool_size).build()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .running
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn stop_code(&self) -> u32 {
        self.inner.stop_code.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    pub fn polling_delay_us(&self) -> u64 {
        self.inner
            .polling_delay_us
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn set_polling_delay_us(&self, delay: u64) {
        self.inner
            .polling_delay_us
            .store(delay, std::sync::atomic::Ordering::SeqCst);
    }

    /// The message recorded by the last anomaly this sequence's engine
    /// detected, if any. Ambient addition: a panic inside a pool worker
    /// cannot be `?`-propagated back to an unrelated caller, so the anomaly
    /// is logged via `tracing::error!` and also latched here for callers
    /// that want to inspect it after the fact.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Constructs a [`Sequence`] with non-default pool sizing or polling delay.
pub struct SequenceBuilder {
    pool_size: usize,
    polling_delay_us: u64,
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self {
            pool_size: num_cpus::get(),
            polling_delay_us: 100,
        }
    }
}

impl SequenceBuilder {
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn polling_delay_us(mut self, delay: u64) -> Self {
        self.polling_delay_us = delay;
        self
    }

    pub fn build(self) -> Sequence {
        Sequence {
            inner: Arc::new(SequenceInner {
                pool_size: self.pool_size,
                polling_delay_us: AtomicU64::new(self.polling_delay_us),
                running: Arc::new(AtomicBool::new(false)),
                stop_code: AtomicU32::new(NORMAL_STOP),
                active_workers: AtomicUsize::new(0),
                steps_guard: Mutex::new(()),
                initial_steps: DashMap::new(),
                all_steps: DashMap::new(),
                counts: Mutex::new(std::collections::HashMap::new()),
                macro_deactivations: Mutex::new(std::collections::HashMap::new()),
                pool: Mutex::new(None),
                sequence_changed_callbacks: Mutex::new(Vec::new()),
                step_changed_callbacks: Mutex::new(Vec::new()),
                last_error: Mutex::new(None),
            }),
        }
    }
}
