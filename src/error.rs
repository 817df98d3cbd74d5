use std::path::PathBuf;

use thiserror::Error;

use crate::model::EntityKind;
use crate::validate::ValidationIssue;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Error type covering the different failure cases that can occur when the
/// catalog is loaded, edited, reconciled, or persisted.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Lookup miss for an instructor, module, or software entry.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Raised when a mutation would leave a dangling reference or duplicate.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Raised when the durable store cannot be parsed into the catalog shape.
    #[error("corrupt store {}: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    /// Raised when the pre-write backup could not be created. The save is
    /// aborted and the primary store is left untouched.
    #[error("failed to back up store to {}: {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raised when an import produced a candidate catalog with issues.
    #[error("reconciliation failed with {} issue(s)", .0.len())]
    ReconciliationFailed(Vec<ValidationIssue>),

    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when YAML serialization fails.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Raised when JSON serialization of CLI output fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl CatalogError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        CatalogError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Issues carried by a failed reconciliation, empty for every other error.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            CatalogError::ReconciliationFailed(issues) => issues,
            _ => &[],
        }
    }
}
