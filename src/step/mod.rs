mod macro_body;

pub use macro_body::MacroBody;

use crate::error::{Result, SfcError};
use crate::transition::Transition;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifies a [`Step`] uniquely within the [`crate::Sequence`] that owns it.
pub type StepId = u32;

/// A step action: an externally supplied side effect run when the step is
/// reached, regardless of whether the step has finished its activation
/// handshake yet.
pub type Action = Arc<dyn Fn() + Send + Sync>;

/// Grafcet step kinds. `Macro` carries its own inner ordered sub-chart rather
/// than being a distinct subtype, since Rust has no use for a second runtime
/// type just to hold one extra field.
#[derive(Clone)]
pub enum StepKind {
    Initial,
    Default,
    End,
    Macro(Arc<MacroBody>),
}

/// A node of the chart: an activation flag, its actions, and its outgoing
/// transitions.
pub struct Step {
    id: StepId,
    kind: StepKind,
    activated: AtomicBool,
    actions: RwLock<Vec<Action>>,
    out: RwLock<Vec<Arc<Transition>>>,
    /// Set once by the owning [`crate::Sequence`] when this step is
    /// registered with `add_step`. `None` while the step is unattached (a
    /// step being assembled before it joins any sequence is always
    /// mutable); `Some(flag)` shares the sequence's own `running` atomic, so
    /// a step never needs a strong or weak handle back to its owner just to
    /// answer "is my sequence running".
    owner_running: RwLock<Option<Arc<AtomicBool>>>,
}

impl Step {
    pub fn new(id: StepId, kind: StepKind) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind,
            activated: AtomicBool::new(false),
            actions: RwLock::new(Vec::new()),
            out: RwLock::new(Vec::new()),
            owner_running: RwLock::new(None),
        })
    }

    pub fn initial(id: StepId) -> Arc<Self> {
        Self::new(id, StepKind::Initial)
    }

    pub fn default_step(id: StepId) -> Arc<Self> {
        Self::new(id, StepKind::Default)
    }

    pub fn end(id: StepId) -> Arc<Self> {
        Self::new(id, StepKind::End)
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn is_initial(&self) -> bool {
        matches!(self.kind, StepKind::Initial)
    }

    pub fn is_macro(&self) -> bool {
        matches!(self.kind, StepKind::Macro(_))
    }

    /// A macro is activated when any of its inner steps is; every other kind
    /// reports its own flag. Setting the flag on a macro is a no-op, mirroring
    /// that its activation is entirely a function of its inner chart.
    pub fn is_activated(&self) -> bool {
        match &self.kind {
            StepKind::Macro(body) => body.is_activated(),
            _ => self.activated.load(Ordering::SeqCst),
        }
    }

    pub fn set_activated(&self, activated: bool) {
        if matches!(self.kind, StepKind::Macro(_)) {
            return;
        }
        self.activated.store(activated, Ordering::SeqCst);
        tracing::trace!(step = self.id, activated, "step activation changed");
    }

    /// Binds this step to its owning sequence's `running` flag. Called by
    /// `Sequence::add_step`; a step never bound (one still being assembled,
    /// or one a caller builds and never registers) stays unconditionally
    /// mutable. The first bind wins and is never replaced: `add_step` shares
    /// the same `Arc<Step>` between sequences when it is reached through
    /// `Sequence::clone_graph_into`, and rebinding to whichever sequence
    /// happens to register it second would make `owner_is_running` answer
    /// for the wrong engine.
    pub(crate) fn bind_owner_running(&self, flag: Arc<AtomicBool>) {
        let mut owner = self.owner_running.write();
        if owner.is_none() {
            *owner = Some(flag);
        }
    }

    fn owner_is_running(&self) -> bool {
        self.owner_running
            .read()
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Appends `action` to this step's action list. Fails once this step's
    /// owning sequence is running — growing the action list concurrently
    /// with the engine iterating it would be undefined at the core level;
    /// this turns that into a checked error instead.
    pub fn add_action(&self, action: Action) -> Result<()> {
        if self.owner_is_running() {
            return Err(SfcError::IllegalState(format!(
                "cannot add an action to step {} while its sequence is running",
                self.id
            )));
        }
        self.actions.write().push(action);
        Ok(())
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.read().clone()
    }

    /// Attaches `t` to this step's outgoing set, and — recursively, to cover
    /// nested macros — to the last inner step of a macro as well. Fails
    /// under the same running-sequence guard as [`Step::add_action`].
    pub fn add_transition(self: &Arc<Self>, t: Arc<Transition>) -> Result<()> {
        if self.owner_is_running() {
            return Err(SfcError::IllegalState(format!(
                "cannot add a transition to step {} while its sequence is running",
                self.id
            )));
        }
        self.out.write().push(t.clone());
        if let StepKind::Macro(body) = &self.kind {
            if let Some(last) = body.last_step() {
                last.add_transition(t)?;
            }
        }
        Ok(())
    }

    pub fn out(&self) -> Vec<Arc<Transition>> {
        self.out.read().clone()
    }
}
