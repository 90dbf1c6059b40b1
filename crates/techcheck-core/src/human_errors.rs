// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for thesis authors.
//
// Every pipeline failure is mapped to plain language with a clear suggestion.
// The technical error text is kept alongside, never replaced.

use crate::error::{AnnotationError, ExtractionError, JobError, TechcheckError};

/// A human-readable error with plain message and actionable suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What the author should try (shown as body text).
    pub suggestion: String,
}

impl HumanError {
    fn new(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}

/// Convert a `TechcheckError` into a `HumanError` an author can act on.
pub fn humanize_error(err: &TechcheckError) -> HumanError {
    match err {
        TechcheckError::Extraction(ExtractionError::Encrypted) => HumanError::new(
            "This PDF is password protected.",
            "Remove the password (export the thesis again without security settings), then upload the new PDF.",
        ),

        TechcheckError::Extraction(ExtractionError::Unreadable(detail)) => HumanError::new(
            "We couldn't read any pages of this file.",
            format!(
                "Make sure the file is a PDF exported from your word processor, not a scan or a renamed file. ({detail})"
            ),
        ),

        TechcheckError::Annotation(AnnotationError::Unwritable(detail)) => HumanError::new(
            "Your thesis was checked, but the marked-up copy could not be created.",
            format!("Try again; if it keeps failing, re-export the PDF. ({detail})"),
        ),

        TechcheckError::Job(JobError::NotFound(_)) => HumanError::new(
            "We couldn't find that validation run.",
            "Results are kept for a limited time. Upload the thesis again.",
        ),

        TechcheckError::Job(JobError::NotReady { state, .. }) => HumanError::new(
            "The check is still running.",
            format!("Current step: {state}. Wait a moment and ask again."),
        ),

        TechcheckError::Job(JobError::InvalidTransition { .. }) | TechcheckError::Worker(_) => {
            HumanError::new(
                "Something went wrong while checking your thesis.",
                "Upload the thesis again. If the problem persists, contact support.",
            )
        }

        TechcheckError::Config(detail) => HumanError::new(
            "The rule configuration is invalid.",
            format!("Fix the configuration file and try again. ({detail})"),
        ),

        TechcheckError::Yaml(inner) => HumanError::new(
            "The rule configuration is invalid.",
            format!("Fix the configuration file and try again. ({inner})"),
        ),

        TechcheckError::Serialization(inner) => HumanError::new(
            "The report could not be encoded.",
            format!("Try again. ({inner})"),
        ),

        TechcheckError::Io(inner) => HumanError::new(
            "A file could not be read or written.",
            format!("Check that the path exists and is writable. ({inner})"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypted_mentions_password() {
        let human = humanize_error(&ExtractionError::Encrypted.into());
        assert!(human.message.contains("password"));
    }

    #[test]
    fn unreadable_keeps_detail() {
        let human = humanize_error(&ExtractionError::Unreadable("no pages".into()).into());
        assert!(human.suggestion.contains("no pages"));
    }

    #[test]
    fn config_error_names_configuration() {
        let human = humanize_error(&TechcheckError::Config("bad value".into()));
        assert!(human.message.contains("configuration"));
        assert!(human.suggestion.contains("bad value"));
    }
}
