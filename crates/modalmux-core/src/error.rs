//! Core domain errors.

use crate::status::TaskStatus;
use thiserror::Error;

/// Core domain errors for modalmux.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status transition not on the lifecycle DAG was attempted.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// A payload no worker could act on.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
