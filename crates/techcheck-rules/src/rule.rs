// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rule model — what a rule applies to and which closed kind of check it runs.

use serde::{Deserialize, Serialize};
use techcheck_core::config::Bound;
use techcheck_core::types::{Edge, PageRole, Severity};

/// Which part of the document a rule is evaluated over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Once, with no page.
    Document,
    /// Once per page carrying one of the roles.
    Pages(Vec<PageRole>),
    /// Once per listed role, over all pages carrying that role together.
    Aggregate(Vec<PageRole>),
    /// Once per page, whatever its role.
    AllPages,
}

impl Scope {
    pub fn pages(roles: &[PageRole]) -> Self {
        Self::Pages(roles.to_vec())
    }

    pub fn aggregate(roles: &[PageRole]) -> Self {
        Self::Aggregate(roles.to_vec())
    }
}

/// A measured quantity compared by `Check::NumericRange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Margin on one edge, millimetres.
    Margin(Edge),
    /// Size of the page's dominant font, points.
    BodyFontSize,
    /// Whitespace-separated words across the scoped pages.
    WordCount,
    /// Median baseline pitch of body lines over single spacing.
    LineSpacing,
}

impl Metric {
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Margin(_) => "mm",
            Self::BodyFontSize => "pt",
            Self::WordCount => "words",
            Self::LineSpacing => "lines",
        }
    }
}

/// Predicates that do not fit the generic kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "predicate")]
pub enum CustomCheck {
    /// Some run on the title page is set in `family` at `size_pt` (and bold
    /// when required).
    TitleFont {
        family: String,
        aliases: Vec<String>,
        size_pt: f64,
        tolerance_pt: f64,
        bold: bool,
    },
    /// The title page carries the title in Slovenian and in English.
    BilingualTitle,
    /// Main-text pages carry sequential Arabic page numbers.
    PageNumbering,
    /// The dominant font belongs to one of the accepted families.
    BodyFontFamily { family: String, aliases: Vec<String> },
    /// A keywords line lists at least `min` entries.
    Keywords { min: usize },
    /// Every reference entry is in APA author-year form.
    ReferenceStyle,
    /// Reference entries are sorted by first author.
    ReferenceOrder,
    /// The page was parsed without extraction warnings.
    PageReadable,
    /// Chapters are numbered consistently. Only an oracle can decide.
    ChapterStructure,
}

/// The closed set of check kinds, dispatched by `checks::run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Check {
    /// The canonical string appears verbatim.
    CanonicalText {
        canonical: String,
        /// Edit distance still reported as malformed rather than missing.
        max_distance: usize,
    },
    NumericRange {
        metric: Metric,
        expected: f64,
        tolerance: f64,
        bound: Bound,
    },
    /// Some page carries the role.
    SectionPresent { role: PageRole },
    /// A main-text page opens a chapter with one of the headings.
    ChapterPresent { title: String, markers: Vec<String> },
    Custom(CustomCheck),
}

/// One formatting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub description: String,
    pub scope: Scope,
    pub check: Check,
    pub severity: Severity,
    /// Verdict comes from the judgment oracle, not from `check`.
    #[serde(default)]
    pub needs_judgment: bool,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        scope: Scope,
        check: Check,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            scope,
            check,
            severity,
            needs_judgment: false,
        }
    }

    pub fn needing_judgment(mut self) -> Self {
        self.needs_judgment = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_serialize_with_kind_tags() {
        let rule = Rule::new(
            "margins.left",
            "Left margin",
            Scope::pages(&[PageRole::Body]),
            Check::NumericRange {
                metric: Metric::Margin(Edge::Left),
                expected: 30.0,
                tolerance: 1.0,
                bound: Bound::Exact,
            },
            Severity::Major,
        );
        let json = serde_json::to_value(&rule).expect("serialize");
        assert_eq!(json["check"]["kind"], "numeric_range");
        assert_eq!(json["scope"]["pages"][0], "BODY");

        let custom = Check::Custom(CustomCheck::Keywords { min: 3 });
        let json = serde_json::to_value(&custom).expect("serialize");
        assert_eq!(json["kind"], "custom");
        assert_eq!(json["predicate"], "keywords");
        let back: Check = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, custom);
    }

    #[test]
    fn metric_units() {
        assert_eq!(Metric::Margin(Edge::Top).unit(), "mm");
        assert_eq!(Metric::WordCount.unit(), "words");
        assert_eq!(Metric::LineSpacing.unit(), "lines");
    }
}
