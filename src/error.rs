use thiserror::Error;

/// Errors produced by graph construction, validation and the engine itself.
#[derive(Debug, Error)]
pub enum SfcError {
    /// A step id was unknown, duplicated, or otherwise malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was attempted in a state that forbids it (mutate while
    /// running, start an invalid chart, start a chart with every transition
    /// already true).
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A fork crossed a transition whose next-step count exceeds the worker
    /// pool size. Sets `stop_code` to [`crate::CRAZY_PARALLELISM_STOP`].
    #[error("crazy parallelism: fork width exceeds pool size")]
    CrazyParallelism,

    /// A join completed but the worker pool had no idle worker left to carry
    /// it, or more invocations are in flight than the pool can host. Sets
    /// `stop_code` to [`crate::CRAZY_LOOPING_STOP`].
    #[error("crazy looping: pool exhausted on a completed join")]
    CrazyLooping,

    /// The worker pool's OS threads could not be spawned.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SfcError>;
