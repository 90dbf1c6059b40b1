// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rule evaluator — runs every enabled rule against a classified document
// and merges the findings into a deterministic order.
//
// Rules only read the document, so they are evaluated in parallel (rayon).
// Results are collected in catalog order and then stably sorted by page
// (document-global findings first) and rule priority.

use std::sync::Arc;

use rayon::prelude::*;
use techcheck_core::config::RuleSetConfig;
use techcheck_core::types::{Document, Finding, Severity};
use tracing::{debug, info, instrument, warn};

use crate::catalog::enabled_rules;
use crate::checks::{self, Target, could_not_verify};
use crate::oracle::JudgmentOracle;
use crate::rule::Rule;

#[derive(Clone)]
pub struct Evaluator {
    config: RuleSetConfig,
    rules: Vec<Rule>,
    oracle: Option<Arc<dyn JudgmentOracle>>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("version", &self.config.version)
            .field("rules", &self.rules.len())
            .field("oracle", &self.oracle.is_some())
            .finish()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(RuleSetConfig::default())
    }
}

impl Evaluator {
    /// Evaluator for the enabled rules of `config`.
    pub fn new(config: RuleSetConfig) -> Self {
        let rules = enabled_rules(&config);
        Self {
            config,
            rules,
            oracle: None,
        }
    }

    /// Evaluator over an explicit rule list, in priority order.
    pub fn with_rules(config: RuleSetConfig, rules: Vec<Rule>) -> Self {
        Self {
            config,
            rules,
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn JudgmentOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &RuleSetConfig {
        &self.config
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Findings ordered by page (document-global first), then rule priority.
    /// Never fails: rules that cannot decide emit MINOR findings.
    #[instrument(skip_all, fields(pages = document.page_count(), rules = self.rules.len()))]
    pub fn evaluate(&self, document: &Document) -> Vec<Finding> {
        let per_rule: Vec<Vec<Finding>> = self
            .rules
            .par_iter()
            .map(|rule| self.evaluate_rule(rule, document))
            .collect();

        let mut ranked: Vec<(usize, Finding)> = per_rule
            .into_iter()
            .enumerate()
            .flat_map(|(priority, findings)| findings.into_iter().map(move |f| (priority, f)))
            .collect();
        ranked.sort_by_key(|(priority, finding)| (finding.page.unwrap_or(0), *priority));
        let findings: Vec<Finding> = ranked.into_iter().map(|(_, finding)| finding).collect();

        let count = |severity: Severity| findings.iter().filter(|f| f.severity == severity).count();
        info!(
            findings = findings.len(),
            critical = count(Severity::Critical),
            major = count(Severity::Major),
            minor = count(Severity::Minor),
            "evaluation complete"
        );
        findings
    }

    fn evaluate_rule(&self, rule: &Rule, document: &Document) -> Vec<Finding> {
        let targets = checks::targets(&rule.scope, document);
        let findings: Vec<Finding> = targets
            .iter()
            .flat_map(|target| {
                if rule.needs_judgment {
                    self.judge(rule, document, target)
                } else {
                    checks::run(rule, document, target)
                }
            })
            .collect();
        debug!(rule = %rule.id, targets = targets.len(), findings = findings.len(), "rule evaluated");
        findings
    }

    fn judge(&self, rule: &Rule, document: &Document, target: &Target<'_>) -> Vec<Finding> {
        let page = target.anchor();
        let page_index = page.map(|page| page.index);
        let Some(oracle) = &self.oracle else {
            return vec![could_not_verify(rule, page_index, "no judgment service configured")];
        };

        match oracle.judge(document, page, rule) {
            Ok(None) => Vec::new(),
            // The rule, not the oracle, owns id and severity.
            Ok(Some(finding)) => vec![Finding {
                rule_id: rule.id.clone(),
                severity: rule.severity,
                page: finding.page.or(page_index),
                ..finding
            }],
            Err(err) => {
                warn!(rule = %rule.id, %err, "judgment failed");
                vec![could_not_verify(rule, page_index, &err.to_string())]
            }
        }
    }
}

/// Evaluate with the default rule set.
pub fn evaluate(document: &Document) -> Vec<Finding> {
    Evaluator::default().evaluate(document)
}
