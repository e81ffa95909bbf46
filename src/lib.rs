//! A concurrent Sequential Function Chart (Grafcet) execution engine.
//!
//! A chart is a bipartite graph of [`step::Step`]s and [`transition::Transition`]s:
//! steps hold actions and an activation flag, transitions gate progress on an
//! externally-set [`transition::Receptivity`] and on upstream steps' join
//! arity. [`sequence::Sequence`] owns the graph and runs it on a fixed-size
//! worker pool, detecting runaway fork/join anomalies rather than letting
//! them exhaust the pool silently.
//!
//! This crate does not decide what flips a receptivity, what a step's
//! actions do, or how to persist a chart — those are the caller's concern.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod sequence;
mod step;
mod transition;
mod worker_pool;

pub use error::{Result, SfcError};
pub use sequence::{Sequence, SequenceBuilder, CRAZY_LOOPING_STOP, CRAZY_PARALLELISM_STOP, NORMAL_STOP};
pub use step::{Action, MacroBody, Step, StepId, StepKind};
pub use transition::{Receptivity, Transition, ValidationMode};
