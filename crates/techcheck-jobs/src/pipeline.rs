// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Validation pipeline — extract, classify, evaluate, annotate.
//
// Each stage consumes the immutable output of the previous one. The caller
// is told when a stage begins so it can record the job transition; a
// refused transition stops the pipeline.

use std::sync::Arc;

use techcheck_core::config::TechcheckConfig;
use techcheck_core::error::Result;
use techcheck_core::types::{Document, Finding, JobState};
use techcheck_document::{Annotator, Extractor, PageClassifier};
use techcheck_rules::{Evaluator, JudgmentOracle, ValidationReport};
use tracing::{info, instrument};

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub document: Document,
    pub findings: Vec<Finding>,
    pub artifact: Vec<u8>,
    pub report: ValidationReport,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    extractor: Extractor,
    classifier: PageClassifier,
    evaluator: Evaluator,
    annotator: Annotator,
}

impl Pipeline {
    pub fn new(config: &TechcheckConfig) -> Self {
        Self {
            extractor: Extractor::new(config.extraction.clone()),
            classifier: PageClassifier::new(config.classification.clone()),
            evaluator: Evaluator::new(config.rules.clone()),
            annotator: Annotator::new(),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn JudgmentOracle>) -> Self {
        self.evaluator = self.evaluator.with_oracle(oracle);
        self
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Run every stage over `bytes`. `on_stage` is called with EXTRACTING,
    /// EVALUATING and ANNOTATING as each stage begins.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn run(
        &self,
        bytes: &[u8],
        mut on_stage: impl FnMut(JobState) -> Result<()>,
    ) -> Result<PipelineOutput> {
        on_stage(JobState::Extracting)?;
        let document = self.classifier.classify(self.extractor.extract(bytes)?);

        on_stage(JobState::Evaluating)?;
        let findings = self.evaluator.evaluate(&document);

        on_stage(JobState::Annotating)?;
        let artifact = self.annotator.annotate(&document, &findings)?;

        let report = ValidationReport::new(
            &document,
            self.evaluator.config().version.clone(),
            findings.clone(),
        );
        info!(summary = %report.summary_line(), "pipeline finished");
        Ok(PipelineOutput {
            document,
            findings,
            artifact,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use techcheck_core::TechcheckError;
    use techcheck_core::error::{ExtractionError, JobError};
    use techcheck_core::types::JobId;
    use techcheck_document::fixtures;

    #[test]
    fn stages_are_announced_in_order() {
        let mut stages = Vec::new();
        let output = Pipeline::default()
            .run(&fixtures::thesis_pdf(), |stage| {
                stages.push(stage);
                Ok(())
            })
            .expect("pipeline");
        assert_eq!(
            stages,
            vec![JobState::Extracting, JobState::Evaluating, JobState::Annotating]
        );
        assert!(output.findings.is_empty());
        assert!(output.report.passed());
        assert_eq!(output.report.page_count, 9);
        assert!(output.artifact.starts_with(b"%PDF"));
    }

    #[test]
    fn extraction_failure_stops_before_evaluation() {
        let mut stages = Vec::new();
        let err = Pipeline::default()
            .run(&fixtures::encrypted_pdf(), |stage| {
                stages.push(stage);
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TechcheckError::Extraction(ExtractionError::Encrypted)
        ));
        assert_eq!(stages, vec![JobState::Extracting]);
    }

    #[test]
    fn refused_transition_aborts_the_run() {
        let id = JobId::new();
        let err = Pipeline::default()
            .run(&fixtures::thesis_pdf(), |stage| match stage {
                JobState::Evaluating => Err(JobError::InvalidTransition {
                    id,
                    from: JobState::Failed,
                    to: stage,
                }
                .into()),
                _ => Ok(()),
            })
            .unwrap_err();
        assert!(matches!(err, TechcheckError::Job(_)));
    }
}
