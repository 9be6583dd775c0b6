//! Application-layer error types.

use engine_component::EntityId;
use engine_state::StateError;

use crate::frame::Phase;

/// Errors raised by a frame tick.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// At least one callback of a phase failed; later phases were skipped.
    #[error("{phase} phase of frame {frame} failed: {cause:#}")]
    Phase {
        /// The frame being processed.
        frame: u64,
        /// The phase that failed.
        phase: Phase,
        /// The first failure reported by the phase.
        cause: anyhow::Error,
    },

    /// Persisting the frame counter or timestamp failed.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Errors raised by rendering and physics backends.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend has no entity for an id the core expects it to know.
    #[error("{backend} backend has no entity for {entity}")]
    EntityUnavailable {
        /// Which backend (`"render"`, `"physics"`).
        backend: &'static str,
        /// The missing entity.
        entity: EntityId,
    },

    /// The backend rejected an operation.
    #[error("{backend} backend failed: {message}")]
    Failed {
        /// Which backend.
        backend: &'static str,
        /// What went wrong.
        message: String,
    },
}
