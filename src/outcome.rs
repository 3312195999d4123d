//! Outcome signal for delete operations
//!
//! Deletes report success or failure instead of returning an error, so callers
//! can decide whether a failure is fatal. The underlying error is kept as the
//! cause when there is one.

use std::fmt;

use crate::error::{ComposerError, Result};

#[derive(Debug)]
pub enum DeleteOutcome {
    /// Rows removed, including cascaded ones
    Deleted { removed: usize },
    Failed {
        reason: String,
        source: Option<ComposerError>,
    },
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted { .. })
    }

    pub fn removed(&self) -> usize {
        match self {
            DeleteOutcome::Deleted { removed } => *removed,
            DeleteOutcome::Failed { .. } => 0,
        }
    }

    pub fn error(&self) -> Option<&ComposerError> {
        match self {
            DeleteOutcome::Failed { source, .. } => source.as_ref(),
            DeleteOutcome::Deleted { .. } => None,
        }
    }

    pub(crate) fn from_count(entity: &'static str, id: impl fmt::Display, result: Result<usize>) -> Self {
        match result {
            Ok(0) => {
                tracing::debug!(entity, %id, "nothing to delete");
                DeleteOutcome::Failed {
                    reason: format!("{entity} {id} not found"),
                    source: None,
                }
            }
            Ok(removed) => {
                tracing::info!(entity, %id, removed, "deleted");
                DeleteOutcome::Deleted { removed }
            }
            Err(err) => {
                tracing::warn!(entity, %id, error = %err, "delete failed");
                DeleteOutcome::Failed {
                    reason: err.to_string(),
                    source: Some(err),
                }
            }
        }
    }

    pub(crate) fn from_result(entity: &'static str, id: impl fmt::Display, result: Result<bool>) -> Self {
        Self::from_count(entity, id, result.map(usize::from))
    }
}

impl From<DeleteOutcome> for bool {
    fn from(outcome: DeleteOutcome) -> Self {
        outcome.is_deleted()
    }
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteOutcome::Deleted { removed } => write!(f, "deleted ({removed} removed)"),
            DeleteOutcome::Failed { reason, .. } => write!(f, "not deleted: {reason}"),
        }
    }
}
