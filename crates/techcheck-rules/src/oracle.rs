// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Judgment oracle — optional external capability consulted for rules that
// cannot be decided deterministically.

use techcheck_core::types::{Document, Finding, Page};
use thiserror::Error;

use crate::rule::Rule;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("judgment service unavailable: {0}")]
    Unavailable(String),

    #[error("judgment service returned an unusable answer: {0}")]
    InvalidResponse(String),
}

/// Decides a `needs_judgment` rule for one page (or the whole document when
/// `page` is `None`). `Ok(None)` means the rule passes.
pub trait JudgmentOracle: Send + Sync {
    fn judge(
        &self,
        document: &Document,
        page: Option<&Page>,
        rule: &Rule,
    ) -> Result<Option<Finding>, OracleError>;
}

/// Adapts a closure into an oracle.
pub struct FnOracle<F>(pub F);

impl<F> JudgmentOracle for FnOracle<F>
where
    F: Fn(&Document, Option<&Page>, &Rule) -> Result<Option<Finding>, OracleError> + Send + Sync,
{
    fn judge(
        &self,
        document: &Document,
        page: Option<&Page>,
        rule: &Rule,
    ) -> Result<Option<Finding>, OracleError> {
        (self.0)(document, page, rule)
    }
}
