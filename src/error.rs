// Error taxonomy shared by the orchestrator, the query builder and the stats engine.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// A single structural violation on a write payload, keyed by canonical field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Condition kinds the boundary maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    ValidationFailed,
    NotFound,
    DuplicateEntity,
    DependencyUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::ValidationFailed => "VALIDATION_FAILED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::DuplicateEntity => "DUPLICATE_ENTITY",
            ErrorKind::DependencyUnavailable => "DEPENDENCY_UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("validation failed: {}", summarize(.0))]
    ValidationFailed(Vec<FieldError>),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("duplicate {entity}: {detail}")]
    DuplicateEntity { entity: &'static str, detail: String },
    #[error("store unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
    /// Failure of a named report; the kind is the kind of the wrapped error.
    #[error("{operation} failed: {source}")]
    Report {
        operation: &'static str,
        #[source]
        source: Box<CatalogError>,
    },
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .join("; ")
}

impl CatalogError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn duplicate(entity: &'static str, detail: impl Into<String>) -> Self {
        Self::DuplicateEntity {
            entity,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CatalogError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            CatalogError::NotFound { .. } => ErrorKind::NotFound,
            CatalogError::DuplicateEntity { .. } => ErrorKind::DuplicateEntity,
            CatalogError::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            CatalogError::Internal(_) => ErrorKind::Internal,
            CatalogError::Report { source, .. } => source.kind(),
        }
    }

    /// Violated fields, looking through report wrappers.
    pub fn fields(&self) -> &[FieldError] {
        match self {
            CatalogError::ValidationFailed(fields) => fields,
            CatalogError::Report { source, .. } => source.fields(),
            _ => &[],
        }
    }

    /// Wrap with the name of the report that failed.
    pub fn in_operation(self, operation: &'static str) -> Self {
        Self::Report {
            operation,
            source: Box::new(self),
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            fields: self.fields().to_vec(),
        }
    }
}

/// Serializable failure body: condition kind, explanation and every violated field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl From<StoreError> for CatalogError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { collection, key } => Self::DuplicateEntity {
                entity: collection.entity_name(),
                detail: format!("unique key '{key}' already exists"),
            },
            StoreError::Unavailable(msg) => Self::DependencyUnavailable(msg),
            StoreError::Corrupt(msg) => Self::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
