mod receptivity;

pub use receptivity::Receptivity;

use crate::step::StepId;
use parking_lot::Mutex;

/// How many of `validations` must complete before `nexts` is reached.
///
/// Present and independently settable, as the data model requires, but the
/// firing algorithm in [`crate::Sequence`] always gates a join on
/// `validations().len()` regardless of mode. See `DESIGN.md` for the
/// resolved-open-question note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    None,
    All,
    Any,
}

impl Default for ValidationMode {
    fn default() -> Self {
        ValidationMode::All
    }
}

/// An edge of the chart: a set of upstream steps that must all call in
/// (`validations`), a receptivity gate, and the step(s) reached once both are
/// satisfied (`nexts`).
pub struct Transition {
    nexts: Vec<StepId>,
    validations: Vec<StepId>,
    receptivity: Receptivity,
    validation_mode: Mutex<ValidationMode>,
}

impl Transition {
    pub fn new(nexts: Vec<StepId>, validations: Vec<StepId>) -> Self {
        Self::with_mode(nexts, validations, ValidationMode::default())
    }

    pub fn with_mode(nexts: Vec<StepId>, validations: Vec<StepId>, mode: ValidationMode) -> Self {
        Self {
            nexts,
            validations,
            receptivity: Receptivity::new(),
            validation_mode: Mutex::new(mode),
        }
    }

    pub fn nexts(&self) -> &[StepId] {
        &self.nexts
    }

    pub fn validations(&self) -> &[StepId] {
        &self.validations
    }

    pub fn receptivity(&self) -> &Receptivity {
        &self.receptivity
    }

    pub fn validation_mode(&self) -> ValidationMode {
        *self.validation_mode.lock()
    }

    pub fn set_validation_mode(&self, mode: ValidationMode) {
        *self.validation_mode.lock() = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_all() {
        let t = Transition::new(vec![1], vec![0]);
        assert_eq!(t.validation_mode(), ValidationMode::All);
    }

    #[test]
    fn validation_mode_round_trips() {
        let t = Transition::new(vec![1], vec![0]);
        t.set_validation_mode(ValidationMode::Any);
        assert_eq!(t.validation_mode(), ValidationMode::Any);
        t.set_validation_mode(ValidationMode::None);
        assert_eq!(t.validation_mode(), ValidationMode::None);
    }

    #[test]
    fn nexts_and_validations_are_exposed_verbatim() {
        let t = Transition::new(vec![1, 2, 3], vec![0]);
        assert_eq!(t.nexts(), &[1, 2, 3]);
        assert_eq!(t.validations(), &[0]);
    }

    #[test]
    fn receptivity_starts_false() {
        let t = Transition::new(vec![1], vec![0]);
        assert!(!t.receptivity().get());
    }
}
