//! Component-layer error types.

use engine_state::StateError;

use crate::component::ComponentId;

/// Errors raised by the component registry.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// A record with this id is already registered.
    #[error("component {0} is already registered")]
    DuplicateId(ComponentId),

    /// The record exists but holds a different component kind.
    #[error("component {id} is a '{actual}', not a '{expected}'")]
    KindMismatch {
        /// The record that was looked up.
        id: ComponentId,
        /// The kind the caller asked for.
        expected: &'static str,
        /// The kind the record carries.
        actual: String,
    },

    /// The record was deleted; its value can no longer be written.
    #[error("component {0} is no longer registered")]
    NotRegistered(ComponentId),

    /// Storing the component value failed.
    #[error(transparent)]
    State(#[from] StateError),
}
