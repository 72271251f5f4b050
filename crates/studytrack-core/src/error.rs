use std::fmt;

use thiserror::Error;

use crate::form::FieldErrors;
use crate::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Create,
    Update,
    Toggle,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Load => "load",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Toggle => "toggle",
            Operation::Delete => "delete",
        })
    }
}

/// Every way a store operation can fail. None of these leave the local
/// collection out of step with the last confirmed remote state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid task form: {0}")]
    Validation(FieldErrors),

    #[error("no signed-in user")]
    Unauthorized,

    #[error("remote {op} failed: {reason}")]
    Remote { op: Operation, reason: String },

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("task {0} already has a change in flight")]
    Busy(TaskId),
}

impl StoreError {
    pub fn remote(op: Operation, err: anyhow::Error) -> Self {
        StoreError::Remote {
            op,
            reason: format!("{err:#}"),
        }
    }

    /// Wording shown to the user when `op` ends with this error.
    pub fn user_message(&self, op: Operation) -> &'static str {
        match self {
            StoreError::Validation(_) => "Please fix the highlighted fields",
            StoreError::Unauthorized => "You need to be signed in",
            StoreError::NotFound(_) => "Task not found",
            StoreError::Busy(_) => "Another change to this task is still in progress",
            StoreError::Remote { .. } => match op {
                Operation::Load => "Failed to load your tasks",
                Operation::Create => "Failed to create task",
                Operation::Update | Operation::Toggle => "Failed to update task",
                Operation::Delete => "Failed to delete task",
            },
        }
    }
}
