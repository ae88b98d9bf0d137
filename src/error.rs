//! Error types for the engine and controller layers.
//!
//! Capacity and configuration mistakes are programmer errors, not runtime
//! conditions callers are expected to recover from, so they panic via the
//! `must_*` family of controller methods rather than threading a `Result`
//! through every call site. Loader failures, by contrast, are an expected
//! runtime outcome and are always `Result`-returned.

use thiserror::Error;

/// Construction-time misconfiguration. Always fatal; callers are expected to
/// fix their configuration rather than handle this at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("capacity must be greater than zero")]
    CapacityInvalid,

    #[error("missing-key caching is not enabled for this cache")]
    MissingNotEnabled,
}

/// Wraps a loader's error type so it can flow through `HotCache`'s
/// `Result`-returning accessors without losing its original type.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct LoaderError<E>(#[from] pub E);

/// Everything [`crate::controller::HotCache`]'s fallible accessors can return.
#[derive(Debug, Error)]
pub enum ControllerError<E> {
    #[error("loader failed: {0}")]
    Loader(#[source] LoaderError<E>),

    #[error("revalidation loader failed: {0}")]
    Revalidation(#[source] LoaderError<E>),
}

impl<E> ControllerError<E> {
    pub fn loader(err: E) -> Self {
        ControllerError::Loader(LoaderError(err))
    }

    pub fn revalidation(err: E) -> Self {
        ControllerError::Revalidation(LoaderError(err))
    }
}
