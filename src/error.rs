//! Error types for the composition engine

use thiserror::Error;

/// Result type for use-case operations
pub type Result<T> = std::result::Result<T, ComposerError>;

/// Result type for storage adapter operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Use-case errors
#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Hierarchy violation: section {section} cannot be placed under {parent}")]
    HierarchyViolation { section: String, parent: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl ComposerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_hierarchy_violation(&self) -> bool {
        matches!(self, Self::HierarchyViolation { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidVersion(_))
    }
}

// Unique-constraint violations raised by the adapter surface as conflicts.
impl From<StoreError> for ComposerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Constraint(msg) => ComposerError::Conflict(msg),
            other => ComposerError::Storage(other),
        }
    }
}

/// Storage adapter errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
