use std::sync::atomic::{AtomicBool, Ordering};

/// The external boolean gate a [`super::Transition`] polls before it may
/// fire. Something outside this crate is expected to flip it.
#[derive(Debug, Default)]
pub struct Receptivity {
    state: AtomicBool,
}

impl Receptivity {
    pub fn new() -> Self {
        Self {
            state: AtomicBool::new(false),
        }
    }

    /// `true` means the transition's receptivity condition is currently met.
    pub fn get(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    pub fn set(&self, state: bool) {
        self.state.store(state, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_false() {
        assert!(!Receptivity::new().get());
        assert!(!Receptivity::default().get());
    }

    #[test]
    fn set_then_get_round_trips() {
        let r = Receptivity::new();
        r.set(true);
        assert!(r.get());
        r.set(false);
        assert!(!r.get());
    }
}
