// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Required-section and required-chapter checks.

use techcheck_core::types::{Document, Finding, PageRole};

use super::lines::text_lines;
use super::strings::fold;
use crate::rule::Rule;

/// What to add when a section is missing.
fn remedy(role: PageRole) -> &'static str {
    match role {
        PageRole::Title => "Add a title page naming the university, faculty, author and thesis title.",
        PageRole::Declaration => {
            "Add the signed statement of authorship (IZJAVA O AVTORSTVU) after the title page."
        }
        PageRole::AbstractSl => "Add a Slovenian abstract headed POVZETEK, followed by keywords.",
        PageRole::AbstractEn => "Add an English abstract headed ABSTRACT, followed by keywords.",
        PageRole::Toc => "Add a table of contents headed KAZALO.",
        PageRole::References => "Add a reference list headed LITERATURA at the end of the thesis.",
        PageRole::Body => "Add the main text of the thesis.",
        PageRole::Appendix => "Add the appendices headed PRILOGE.",
        PageRole::Unknown => "Check the document structure.",
    }
}

/// Document-global: fires once, without a page, when no page has `role`.
pub fn section_present(rule: &Rule, document: &Document, role: PageRole) -> Vec<Finding> {
    if document.has_role(role) {
        return Vec::new();
    }
    vec![Finding::new(
        rule.id.clone(),
        rule.severity,
        format!("Required section '{}' is missing", role.label()),
        remedy(role),
    )]
}

/// Heading text without chapter numbering or trailing punctuation, folded.
fn heading_key(line: &str) -> String {
    let bare = line
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c.is_whitespace())
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    fold(bare)
}

/// Document-global: fires once, without a page, when no main-text line reads
/// as one of `markers`.
pub fn chapter_present(
    rule: &Rule,
    document: &Document,
    title: &str,
    markers: &[String],
) -> Vec<Finding> {
    let wanted: Vec<String> = markers.iter().map(|marker| fold(marker)).collect();
    let found = document
        .pages_with_role(PageRole::Body)
        .flat_map(text_lines)
        .any(|line| wanted.contains(&heading_key(&line.text)));
    if found {
        return Vec::new();
    }
    vec![Finding::new(
        rule.id.clone(),
        rule.severity,
        format!("Required chapter '{title}' is missing"),
        format!("Add a chapter headed {} to the main text.", title.to_uppercase()),
    )]
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{document, page};
    use super::*;
    use crate::rule::{Check, Scope};
    use techcheck_core::types::Severity;

    fn rule(role: PageRole) -> Rule {
        Rule::new(
            "section.declaration",
            "declaration",
            Scope::Document,
            Check::SectionPresent { role },
            Severity::Critical,
        )
    }

    #[test]
    fn missing_section_is_one_global_finding() {
        let doc = document(vec![
            page(1, PageRole::Title, &["UNIVERZA V LJUBLJANI"]),
            page(2, PageRole::Body, &["text"]),
        ]);
        let findings = section_present(&rule(PageRole::Declaration), &doc, PageRole::Declaration);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].page, None);
        assert_eq!(findings[0].location, None);
        assert!(findings[0].message.contains("missing"));
    }

    fn chapter_rule() -> Rule {
        Rule::new(
            "chapter.conclusion",
            "conclusion",
            Scope::Document,
            Check::ChapterPresent {
                title: "Zaključek".into(),
                markers: vec!["Zaključek".into(), "Conclusion".into()],
            },
            Severity::Critical,
        )
    }

    fn markers() -> Vec<String> {
        vec!["Zaključek".into(), "Conclusion".into()]
    }

    #[test]
    fn numbered_chapter_heading_is_found() {
        let doc = document(vec![
            page(6, PageRole::Body, &["1 UVOD", "Besedilo."]),
            page(9, PageRole::Body, &["5.  ZAKLJUCEK", "Sklepne misli."]),
        ]);
        assert!(chapter_present(&chapter_rule(), &doc, "Zaključek", &markers()).is_empty());
    }

    #[test]
    fn chapter_named_only_in_contents_or_prose_is_missing() {
        let doc = document(vec![
            page(5, PageRole::Toc, &["KAZALO", "5 ZAKLJUČEK 9"]),
            page(6, PageRole::Body, &["1 UVOD", "V zaključku povzamemo ugotovitve."]),
        ]);
        let findings = chapter_present(&chapter_rule(), &doc, "Zaključek", &markers());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].page, None);
        assert_eq!(findings[0].message, "Required chapter 'Zaključek' is missing");
    }

    #[test]
    fn present_section_passes() {
        let doc = document(vec![page(2, PageRole::Declaration, &["IZJAVA"])]);
        assert!(section_present(&rule(PageRole::Declaration), &doc, PageRole::Declaration).is_empty());
    }
}
