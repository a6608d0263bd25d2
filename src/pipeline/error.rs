//! Error types for the dropout pipeline.
//!
//! Only batch-fatal conditions live here. Recoverable issues (unseen categories,
//! indeterminate labels, duplicate columns) are collected in the processing report
//! instead of being raised.

use thiserror::Error;

/// Pipeline stage names, used to tag fatal errors with the first stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Clean,
    Reconcile,
    Grades,
    Encode,
    Label,
    Align,
    Score,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Clean => "clean",
            Stage::Reconcile => "reconcile",
            Stage::Grades => "grade metrics",
            Stage::Encode => "encode",
            Stage::Label => "label",
            Stage::Align => "align",
            Stage::Score => "score",
        };
        write!(f, "{}", name)
    }
}

/// Errors that abort a batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required canonical column is missing from an input relation.
    #[error("[{stage}] required column '{column}' missing from {table}")]
    Schema {
        stage: Stage,
        table: &'static str,
        column: String,
    },

    /// A required column exists but holds data that cannot be used (e.g. null keys).
    #[error("[{stage}] invalid value in {table}.{column} at row {row}: {message}")]
    InvalidValue {
        stage: Stage,
        table: &'static str,
        column: String,
        row: usize,
        message: String,
    },

    /// An external vocabulary or lookup table could not be loaded.
    #[error("[{stage}] vocabulary '{name}' unavailable: {reason}")]
    Vocabulary {
        stage: Stage,
        name: String,
        reason: String,
    },

    /// A value outside a fixed ordinal order.
    #[error("[encode] unseen {field} value '{value}' (expected one of: {expected})")]
    UnseenOrdinal {
        field: &'static str,
        value: String,
        expected: String,
    },

    /// A model artifact (schema, scaler, classifier) is malformed.
    #[error("[{stage}] model artifact '{name}' is invalid: {reason}")]
    Artifact {
        stage: Stage,
        name: String,
        reason: String,
    },

    #[error("dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn schema(stage: Stage, table: &'static str, column: impl Into<String>) -> Self {
        PipelineError::Schema {
            stage,
            table,
            column: column.into(),
        }
    }

    pub fn vocabulary(stage: Stage, name: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Vocabulary {
            stage,
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn artifact(stage: Stage, name: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Artifact {
            stage,
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Stage that raised the error, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Schema { stage, .. }
            | PipelineError::InvalidValue { stage, .. }
            | PipelineError::Vocabulary { stage, .. }
            | PipelineError::Artifact { stage, .. } => Some(*stage),
            PipelineError::UnseenOrdinal { .. } => Some(Stage::Encode),
            _ => None,
        }
    }
}

/// Result alias used across the pipeline modules.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = PipelineError::schema(Stage::Reconcile, "personal", "cycle");
        assert_eq!(
            err.to_string(),
            "[reconcile] required column 'cycle' missing from personal"
        );
        assert_eq!(err.stage(), Some(Stage::Reconcile));
    }

    #[test]
    fn test_unseen_ordinal_display() {
        let err = PipelineError::UnseenOrdinal {
            field: "academic_status",
            value: "Tercera Prueba".to_string(),
            expected: "Normal, Primera Prueba".to_string(),
        };
        assert!(err.to_string().contains("Tercera Prueba"));
        assert_eq!(err.stage(), Some(Stage::Encode));
    }

    #[test]
    fn test_vocabulary_error_display() {
        let err = PipelineError::vocabulary(Stage::Encode, "subject_categories", "file not found");
        assert_eq!(
            err.to_string(),
            "[encode] vocabulary 'subject_categories' unavailable: file not found"
        );
    }

    #[test]
    fn test_io_error_has_no_stage() {
        let err: PipelineError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(err.stage().is_none());
        assert!(err.to_string().contains("I/O error"));
    }
}
