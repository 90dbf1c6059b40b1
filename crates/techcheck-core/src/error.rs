// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for TechCheck.

use thiserror::Error;

use crate::types::{FailureKind, JobId, JobState};

/// The document could not be turned into pages at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("document is unreadable: {0}")]
    Unreadable(String),

    #[error("document is encrypted and requires a password")]
    Encrypted,
}

/// The annotated document could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("annotated document could not be written: {0}")]
    Unwritable(String),
}

/// Job Manager errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id} is not ready (state {state})")]
    NotReady { id: JobId, state: JobState },

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },
}

/// Top-level error type for all TechCheck operations.
#[derive(Debug, Error)]
pub enum TechcheckError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("worker failed: {0}")]
    Worker(String),
}

impl TechcheckError {
    /// Failure category recorded on a FAILED job.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Extraction(ExtractionError::Unreadable(_)) => FailureKind::Unreadable,
            Self::Extraction(ExtractionError::Encrypted) => FailureKind::Encrypted,
            Self::Annotation(AnnotationError::Unwritable(_)) => FailureKind::Unwritable,
            _ => FailureKind::Internal,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TechcheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kind_follows_variant() {
        let encrypted: TechcheckError = ExtractionError::Encrypted.into();
        assert_eq!(encrypted.failure_kind(), FailureKind::Encrypted);

        let unwritable: TechcheckError = AnnotationError::Unwritable("disk".into()).into();
        assert_eq!(unwritable.failure_kind(), FailureKind::Unwritable);

        let worker = TechcheckError::Worker("panicked".into());
        assert_eq!(worker.failure_kind(), FailureKind::Internal);
    }

    #[test]
    fn transparent_display_keeps_inner_text() {
        let err: TechcheckError = ExtractionError::Unreadable("no pages".into()).into();
        assert_eq!(err.to_string(), "document is unreadable: no pages");
    }
}
