// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// techcheck-rules — Formatting rules for the TechCheck validator.
//
// Holds the rule model and the default catalog, the check implementations
// dispatched over the closed set of check kinds, the parallel evaluator,
// the optional judgment oracle seam, and the findings report.

pub mod catalog;
pub mod checks;
pub mod evaluator;
pub mod oracle;
pub mod report;
pub mod rule;

pub use catalog::{default_rules, enabled_rules};
pub use evaluator::{Evaluator, evaluate};
pub use oracle::{FnOracle, JudgmentOracle, OracleError};
pub use report::ValidationReport;
pub use rule::{Check, CustomCheck, Metric, Rule, Scope};
