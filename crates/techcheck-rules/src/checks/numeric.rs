// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Numeric range checks with tolerance bands: margins, body font size, line
// spacing and word counts.

use techcheck_core::config::Bound;
use techcheck_core::types::{BBox, Document, Edge, Finding, MarginGuide, Page, TextRun};

use super::lines::{TextLine, text_lines};
use super::{Target, could_not_verify, finding_for};
use crate::rule::{Metric, Rule};

/// Baseline pitch of single-spaced Times text, in ems.
const SINGLE_SPACING_EM: f64 = 1.15;
/// Lines further apart than this (in ems) are separated by a break.
const MAX_PITCH_EM: f64 = 3.0;

/// Expected value of a `NumericRange` check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Requirement {
    pub metric: Metric,
    pub expected: f64,
    pub tolerance: f64,
    pub bound: Bound,
}

impl Requirement {
    fn value(&self, value: f64) -> String {
        match self.metric {
            Metric::WordCount => format!("{value:.0} {}", self.metric.unit()),
            Metric::LineSpacing => format!("{value:.2}"),
            _ => format!("{value:.1} {}", self.metric.unit()),
        }
    }

    fn phrase(&self) -> String {
        let expected = self.value(self.expected);
        match self.bound {
            Bound::Exact => expected,
            Bound::AtLeast => format!("at least {expected}"),
            Bound::AtMost => format!("at most {expected}"),
        }
    }
}

pub fn numeric_range(
    rule: &Rule,
    document: &Document,
    target: &Target<'_>,
    requirement: Requirement,
) -> Vec<Finding> {
    match requirement.metric {
        Metric::Margin(edge) => match target {
            Target::Page(page) => margin(rule, page, edge, requirement),
            _ => Vec::new(),
        },
        Metric::BodyFontSize => match target {
            Target::Page(page) => body_font_size(rule, page, requirement),
            _ => Vec::new(),
        },
        Metric::LineSpacing => match target {
            Target::Page(page) => line_spacing(rule, page, requirement),
            _ => Vec::new(),
        },
        Metric::WordCount => word_count(rule, document, target, requirement),
    }
}

fn margin(rule: &Rule, page: &Page, edge: Edge, requirement: Requirement) -> Vec<Finding> {
    let Some(margins) = page.margins else {
        return vec![could_not_verify(
            rule,
            Some(page.index),
            &format!("no body text to measure the {edge} margin"),
        )];
    };
    let measured = margins.get(edge);
    if requirement
        .bound
        .accepts(measured, requirement.expected, requirement.tolerance)
    {
        return Vec::new();
    }

    let finding = finding_for(
        rule,
        &Target::Page(page),
        format!(
            "{} margin must be {} (found {})",
            capitalize(edge.label()),
            requirement.phrase(),
            requirement.value(measured)
        ),
        format!(
            "Set the {edge} page margin to {} in the page layout settings.",
            requirement.value(requirement.expected)
        ),
    )
    .at(outermost_run(page, edge).map(|run| run.bbox))
    .with_margin_guide(MarginGuide {
        edge,
        expected_mm: requirement.expected,
    });
    vec![finding]
}

/// The content run closest to `edge`, which sets that margin.
pub fn outermost_run(page: &Page, edge: Edge) -> Option<&TextRun> {
    let key = |run: &TextRun| match edge {
        Edge::Left => run.bbox.x0,
        Edge::Right => -run.bbox.x1,
        Edge::Top => run.bbox.y0,
        Edge::Bottom => -run.bbox.y1,
    };
    page.content_runs()
        .min_by(|a, b| key(a).total_cmp(&key(b)))
}

fn body_font_size(rule: &Rule, page: &Page, requirement: Requirement) -> Vec<Finding> {
    let Some(font) = &page.dominant_font else {
        return vec![could_not_verify(
            rule,
            Some(page.index),
            "no font information on the page",
        )];
    };
    if requirement
        .bound
        .accepts(font.size, requirement.expected, requirement.tolerance)
    {
        return Vec::new();
    }

    let location = page
        .content_runs()
        .find(|run| run.font_name == font.name && (run.font_size - font.size).abs() < 0.01)
        .map(|run| run.bbox);
    vec![
        finding_for(
            rule,
            &Target::Page(page),
            format!(
                "Main text must be {} (found {})",
                requirement.phrase(),
                requirement.value(font.size)
            ),
            format!(
                "Set the body text to {}.",
                requirement.value(requirement.expected)
            ),
        )
        .at(location),
    ]
}

/// Median pitch between consecutive lines set in the page's body size. A
/// page with no such pair of lines is not judged.
fn line_spacing(rule: &Rule, page: &Page, requirement: Requirement) -> Vec<Finding> {
    let Some(font) = &page.dominant_font else {
        return vec![could_not_verify(
            rule,
            Some(page.index),
            "no font information on the page",
        )];
    };
    let is_body = |line: &TextLine| (line.font_size - font.size).abs() <= 0.5;
    let lines = text_lines(page);
    let pairs: Vec<(f64, BBox)> = lines
        .windows(2)
        .filter_map(|pair| {
            let [upper, lower] = pair else {
                return None;
            };
            let pitch = lower.baseline - upper.baseline;
            (is_body(upper) && is_body(lower) && pitch > 0.0 && pitch <= MAX_PITCH_EM * font.size)
                .then(|| {
                    (
                        pitch / (font.size * SINGLE_SPACING_EM),
                        upper.bbox.union(&lower.bbox),
                    )
                })
        })
        .collect();
    if pairs.is_empty() {
        return Vec::new();
    }

    let mut spacings: Vec<f64> = pairs.iter().map(|(spacing, _)| *spacing).collect();
    spacings.sort_by(f64::total_cmp);
    let measured = spacings[spacings.len() / 2];
    if requirement
        .bound
        .accepts(measured, requirement.expected, requirement.tolerance)
    {
        return Vec::new();
    }

    vec![
        finding_for(
            rule,
            &Target::Page(page),
            format!(
                "Body text line spacing must be {} (found {})",
                requirement.phrase(),
                requirement.value(measured)
            ),
            format!(
                "Set the paragraph line spacing to {} lines.",
                requirement.value(requirement.expected)
            ),
        )
        .at(pairs.first().map(|(_, bbox)| *bbox)),
    ]
}

fn word_count(
    rule: &Rule,
    document: &Document,
    target: &Target<'_>,
    requirement: Requirement,
) -> Vec<Finding> {
    let pages = target.pages(document);
    let words: usize = pages.iter().map(|page| page.word_count()).sum();
    if requirement
        .bound
        .accepts(words as f64, requirement.expected, requirement.tolerance)
    {
        return Vec::new();
    }

    let subject = match target {
        Target::Role { role, .. } => role.label().to_string(),
        _ => "document".to_string(),
    };
    let location: Option<BBox> = target.anchor().and_then(Page::content_bounds);
    vec![
        finding_for(
            rule,
            target,
            format!(
                "The {subject} must have {} (found {})",
                requirement.phrase(),
                requirement.value(words as f64)
            ),
            format!(
                "Shorten the {subject} to {}.",
                requirement.phrase()
            ),
        )
        .at(location),
    ]
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{document, page, run};
    use super::*;
    use crate::rule::{Check, Scope};
    use techcheck_core::types::{FontInfo, Margins, PageRole, Severity};

    fn margin_rule(edge: Edge, expected: f64, bound: Bound) -> (Rule, Requirement) {
        let requirement = Requirement {
            metric: Metric::Margin(edge),
            expected,
            tolerance: 1.0,
            bound,
        };
        let rule = Rule::new(
            format!("margins.{edge}"),
            "margin",
            Scope::pages(&[PageRole::Body]),
            Check::NumericRange {
                metric: requirement.metric,
                expected,
                tolerance: 1.0,
                bound,
            },
            Severity::Major,
        );
        (rule, requirement)
    }

    fn body_page(left_mm: f64) -> Page {
        let mut page = page(6, PageRole::Body, &[]);
        let x0 = left_mm / 25.4 * 72.0;
        page.runs = vec![
            run("Prvi odstavek besedila.", x0 + 20.0, 100.0, 12.0),
            run("Drugi odstavek.", x0, 114.4, 12.0),
        ];
        page.margins = Some(Margins {
            left: left_mm,
            right: 40.0,
            top: 30.0,
            bottom: 200.0,
        });
        page
    }

    #[test]
    fn left_margin_outside_tolerance_is_located_at_leftmost_run() {
        let (rule, requirement) = margin_rule(Edge::Left, 30.0, Bound::Exact);
        let page = body_page(20.0);
        let doc = document(vec![page.clone()]);
        let findings = numeric_range(&rule, &doc, &Target::Page(&page), requirement);

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.severity, Severity::Major);
        assert_eq!(finding.page, Some(6));
        assert_eq!(finding.location, Some(page.runs[1].bbox));
        assert_eq!(finding.message, "Left margin must be 30.0 mm (found 20.0 mm)");
        assert_eq!(
            finding.margin_guide,
            Some(MarginGuide {
                edge: Edge::Left,
                expected_mm: 30.0
            })
        );
    }

    #[test]
    fn margin_within_tolerance_passes() {
        let (rule, requirement) = margin_rule(Edge::Left, 30.0, Bound::Exact);
        let page = body_page(29.2);
        let doc = document(vec![page.clone()]);
        assert!(numeric_range(&rule, &doc, &Target::Page(&page), requirement).is_empty());
    }

    #[test]
    fn wide_margin_passes_at_least_bound() {
        let (rule, requirement) = margin_rule(Edge::Right, 25.0, Bound::AtLeast);
        let page = body_page(30.0);
        let doc = document(vec![page.clone()]);
        assert!(numeric_range(&rule, &doc, &Target::Page(&page), requirement).is_empty());
    }

    #[test]
    fn page_without_margins_cannot_be_verified() {
        let (rule, requirement) = margin_rule(Edge::Left, 30.0, Bound::Exact);
        let page = page(4, PageRole::Body, &[]);
        let doc = document(vec![page.clone()]);
        let findings = numeric_range(&rule, &doc, &Target::Page(&page), requirement);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Minor);
        assert!(findings[0].message.starts_with("Could not verify"));
    }

    #[test]
    fn font_size_uses_half_point_tolerance() {
        let requirement = Requirement {
            metric: Metric::BodyFontSize,
            expected: 12.0,
            tolerance: 0.5,
            bound: Bound::Exact,
        };
        let rule = Rule::new(
            "font.body_size",
            "size",
            Scope::pages(&[PageRole::Body]),
            Check::NumericRange {
                metric: Metric::BodyFontSize,
                expected: 12.0,
                tolerance: 0.5,
                bound: Bound::Exact,
            },
            Severity::Major,
        );
        let mut page = body_page(30.0);
        page.dominant_font = Some(FontInfo {
            name: "TimesNewRomanPSMT".into(),
            size: 12.4,
        });
        let doc = document(vec![page.clone()]);
        assert!(numeric_range(&rule, &doc, &Target::Page(&page), requirement).is_empty());

        page.dominant_font = Some(FontInfo {
            name: "TimesNewRomanPSMT".into(),
            size: 11.0,
        });
        let findings = numeric_range(&rule, &doc, &Target::Page(&page), requirement);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "Main text must be 12.0 pt (found 11.0 pt)");
    }

    #[test]
    fn word_count_joins_runs_within_a_line() {
        let requirement = Requirement {
            metric: Metric::WordCount,
            expected: 2.0,
            tolerance: 0.0,
            bound: Bound::AtMost,
        };
        let rule = Rule::new(
            "abstract_sl.word_count",
            "length",
            Scope::pages(&[PageRole::AbstractSl]),
            Check::NumericRange {
                metric: Metric::WordCount,
                expected: 2.0,
                tolerance: 0.0,
                bound: Bound::AtMost,
            },
            Severity::Major,
        );
        let mut abstract_page = page(3, PageRole::AbstractSl, &[]);
        let first = run("Digital", 85.0, 100.0, 12.0);
        let second = run("ni", first.bbox.x1, 100.0, 12.0);
        let third = run("razkorak", second.bbox.x1 + 6.0, 100.0, 12.0);
        abstract_page.runs = vec![first, second, third];
        let doc = document(vec![abstract_page.clone()]);
        let target = Target::Role {
            role: PageRole::AbstractSl,
            pages: vec![&abstract_page],
        };

        assert!(numeric_range(&rule, &doc, &target, requirement).is_empty());

        let strict = Requirement {
            expected: 1.0,
            ..requirement
        };
        let findings = numeric_range(&rule, &doc, &target, strict);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("found 2 words"));
    }

    fn spacing_rule() -> (Rule, Requirement) {
        let requirement = Requirement {
            metric: Metric::LineSpacing,
            expected: 1.5,
            tolerance: 0.25,
            bound: Bound::Exact,
        };
        let rule = Rule::new(
            "line_spacing.body",
            "spacing",
            Scope::pages(&[PageRole::Body]),
            Check::NumericRange {
                metric: Metric::LineSpacing,
                expected: 1.5,
                tolerance: 0.25,
                bound: Bound::Exact,
            },
            Severity::Major,
        );
        (rule, requirement)
    }

    fn spaced_page(pitch: f64) -> Page {
        let mut page = page(6, PageRole::Body, &[]);
        let mut heading = run("1 UVOD", 85.0, 90.0, 14.0);
        heading.bold = true;
        page.runs = vec![heading];
        for i in 0..4 {
            page.runs
                .push(run("besedilo odstavka", 85.0, 120.0 + i as f64 * pitch, 12.0));
        }
        page.dominant_font = Some(FontInfo {
            name: "TimesNewRomanPSMT".into(),
            size: 12.0,
        });
        page
    }

    #[test]
    fn one_and_a_half_spacing_passes() {
        let (rule, requirement) = spacing_rule();
        let page = spaced_page(12.0 * 1.15 * 1.5);
        let doc = document(vec![page.clone()]);
        assert!(numeric_range(&rule, &doc, &Target::Page(&page), requirement).is_empty());
    }

    #[test]
    fn single_spacing_is_reported_at_the_first_pair() {
        let (rule, requirement) = spacing_rule();
        let page = spaced_page(13.8);
        let doc = document(vec![page.clone()]);
        let findings = numeric_range(&rule, &doc, &Target::Page(&page), requirement);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Major);
        assert_eq!(
            findings[0].message,
            "Body text line spacing must be 1.50 (found 1.00)"
        );
        assert_eq!(
            findings[0].location,
            Some(page.runs[1].bbox.union(&page.runs[2].bbox))
        );
    }

    #[test]
    fn page_without_consecutive_body_lines_is_not_judged() {
        let (rule, requirement) = spacing_rule();
        let mut page = spaced_page(20.7);
        page.runs.truncate(2);
        let doc = document(vec![page.clone()]);
        assert!(numeric_range(&rule, &doc, &Target::Page(&page), requirement).is_empty());
    }

    #[test]
    fn capitalizes_edge_names() {
        assert_eq!(capitalize("bottom"), "Bottom");
        assert_eq!(capitalize(""), "");
    }
}
