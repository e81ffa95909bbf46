use super::{Step, StepId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct Inner {
    order: Vec<StepId>,
    steps: HashMap<StepId, Arc<Step>>,
    first: Option<StepId>,
    last: Option<StepId>,
}

/// The inner ordered sub-chart of a `Macro` step. The first step added
/// becomes `first`; the most recently added becomes `last`.
pub struct MacroBody {
    inner: RwLock<Inner>,
}

impl MacroBody {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner {
                order: Vec::new(),
                steps: HashMap::new(),
                first: None,
                last: None,
            }),
        })
    }

    pub fn add_step(&self, step: Arc<Step>) {
        let mut inner = self.inner.write();
        if inner.steps.is_empty() {
            inner.first = Some(step.id());
        }
        inner.last = Some(step.id());
        inner.order.push(step.id());
        inner.steps.insert(step.id(), step);
    }

    pub fn contains_step(&self, id: StepId) -> bool {
        self.inner.read().steps.contains_key(&id)
    }

    pub fn first(&self) -> Option<StepId> {
        self.inner.read().first
    }

    pub fn last(&self) -> Option<StepId> {
        self.inner.read().last
    }

    pub fn first_step(&self) -> Option<Arc<Step>> {
        let inner = self.inner.read();
        inner.first.and_then(|id| inner.steps.get(&id).cloned())
    }

    pub fn last_step(&self) -> Option<Arc<Step>> {
        let inner = self.inner.read();
        inner.last.and_then(|id| inner.steps.get(&id).cloned())
    }

    /// Snapshot of inner steps, in insertion order.
    pub fn steps(&self) -> Vec<Arc<Step>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.steps.get(id).cloned())
            .collect()
    }

    pub fn is_activated(&self) -> bool {
        self.inner.read().steps.values().any(|s| s.is_activated())
    }
}
