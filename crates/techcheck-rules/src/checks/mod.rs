// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Check dispatch — one match over the closed set of check kinds.

pub mod custom;
pub mod lines;
pub mod numeric;
pub mod strings;
pub mod structure;

use techcheck_core::types::{Document, Finding, Page, PageRole, Severity};

use crate::rule::{Check, Rule, Scope};

/// What a single evaluation of a rule looks at.
#[derive(Debug, Clone)]
pub enum Target<'a> {
    Document,
    Page(&'a Page),
    /// All pages carrying `role`, in page order.
    Role { role: PageRole, pages: Vec<&'a Page> },
}

impl<'a> Target<'a> {
    /// Pages in view; the whole document for `Target::Document`.
    pub fn pages(&self, document: &'a Document) -> Vec<&'a Page> {
        match self {
            Self::Document => document.pages.iter().collect(),
            Self::Page(page) => vec![*page],
            Self::Role { pages, .. } => pages.clone(),
        }
    }

    /// Page a finding about this target is reported on.
    pub fn anchor(&self) -> Option<&'a Page> {
        match self {
            Self::Document => None,
            Self::Page(page) => Some(*page),
            Self::Role { pages, .. } => pages.first().copied(),
        }
    }
}

/// Evaluation targets for a scope. Roles absent from the document produce
/// no targets; their absence is reported by the section rules.
pub fn targets<'a>(scope: &Scope, document: &'a Document) -> Vec<Target<'a>> {
    match scope {
        Scope::Document => vec![Target::Document],
        Scope::AllPages => document.pages.iter().map(Target::Page).collect(),
        Scope::Pages(roles) => document
            .pages
            .iter()
            .filter(|page| roles.contains(&page.role))
            .map(Target::Page)
            .collect(),
        Scope::Aggregate(roles) => roles
            .iter()
            .filter_map(|role| {
                let pages: Vec<&Page> = document.pages_with_role(*role).collect();
                (!pages.is_empty()).then_some(Target::Role { role: *role, pages })
            })
            .collect(),
    }
}

/// Run the deterministic check of `rule` against one target.
pub fn run(rule: &Rule, document: &Document, target: &Target<'_>) -> Vec<Finding> {
    match &rule.check {
        Check::CanonicalText {
            canonical,
            max_distance,
        } => strings::canonical_text(rule, document, target, canonical, *max_distance),
        Check::NumericRange {
            metric,
            expected,
            tolerance,
            bound,
        } => numeric::numeric_range(
            rule,
            document,
            target,
            numeric::Requirement {
                metric: *metric,
                expected: *expected,
                tolerance: *tolerance,
                bound: *bound,
            },
        ),
        Check::SectionPresent { role } => structure::section_present(rule, document, *role),
        Check::ChapterPresent { title, markers } => {
            structure::chapter_present(rule, document, title, markers)
        }
        Check::Custom(custom) => custom::run(rule, document, target, custom),
    }
}

/// The MINOR finding emitted when a rule cannot reach a verdict.
pub fn could_not_verify(rule: &Rule, page: Option<u32>, reason: &str) -> Finding {
    let finding = Finding::new(
        rule.id.clone(),
        Severity::Minor,
        format!("Could not verify: {} ({reason})", rule.description),
        "Check this requirement manually.",
    );
    match page {
        Some(page) => finding.on_page(page),
        None => finding,
    }
}

/// Finding with the rule's id and severity on the target's anchor page.
pub(crate) fn finding_for(
    rule: &Rule,
    target: &Target<'_>,
    message: impl Into<String>,
    fix: impl Into<String>,
) -> Finding {
    let finding = Finding::new(rule.id.clone(), rule.severity, message, fix);
    match target.anchor() {
        Some(page) => finding.on_page(page.index),
        None => finding,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use techcheck_core::types::{BBox, Document, Page, PageRole, TextRun};

    pub fn run(text: &str, x0: f64, baseline: f64, size: f64) -> TextRun {
        let width = text.chars().count() as f64 * size * 0.5;
        TextRun {
            text: text.into(),
            bbox: BBox::new(x0, baseline - 0.8 * size, x0 + width, baseline + 0.2 * size),
            font_name: "TimesNewRomanPSMT".into(),
            font_size: size,
            bold: false,
            italic: false,
            baseline,
            furniture: false,
        }
    }

    /// A page with one 12pt line per entry of `lines`, 30mm from the left.
    pub fn page(index: u32, role: PageRole, lines: &[&str]) -> Page {
        let runs: Vec<TextRun> = lines
            .iter()
            .enumerate()
            .map(|(i, text)| run(text, 85.04, 90.0 + i as f64 * 14.4, 12.0))
            .collect();
        let text = lines.join("\n");
        Page {
            index,
            width_pt: 595.276,
            height_pt: 841.89,
            text,
            runs,
            margins: None,
            dominant_font: None,
            role,
            warnings: Vec::new(),
        }
    }

    pub fn document(pages: Vec<Page>) -> Document {
        Document {
            content_hash: "test".into(),
            pages,
            ..Document::default()
        }
    }
}
