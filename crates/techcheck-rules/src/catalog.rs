// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default rule catalog. List order is rule priority; ids are stable and
// referenced by `RuleSetConfig::disabled_rules`.

use techcheck_core::config::{Bound, RuleSetConfig};
use techcheck_core::types::{Edge, PageRole, Severity};

use crate::rule::{Check, CustomCheck, Metric, Rule, Scope};

/// Rule id of the required-section check for `role`.
pub fn section_rule_id(role: PageRole) -> String {
    let name = match role {
        PageRole::Title => "title",
        PageRole::Declaration => "declaration",
        PageRole::AbstractSl => "abstract_sl",
        PageRole::AbstractEn => "abstract_en",
        PageRole::Toc => "toc",
        PageRole::Body => "body",
        PageRole::References => "references",
        PageRole::Appendix => "appendix",
        PageRole::Unknown => "unknown",
    };
    format!("section.{name}")
}

/// Every rule of the rule set, including disabled ones, in priority order.
pub fn default_rules(config: &RuleSetConfig) -> Vec<Rule> {
    let mut rules: Vec<Rule> = config
        .required_sections
        .iter()
        .map(|role| {
            Rule::new(
                section_rule_id(*role),
                format!("The thesis contains a {} page", role.label()),
                Scope::Document,
                Check::SectionPresent { role: *role },
                Severity::Critical,
            )
        })
        .collect();

    for chapter in &config.required_chapters {
        rules.push(Rule::new(
            format!("chapter.{}", chapter.id),
            format!("The main text contains the chapter {}", chapter.title),
            Scope::Document,
            Check::ChapterPresent {
                title: chapter.title.clone(),
                markers: chapter.markers.clone(),
            },
            Severity::Critical,
        ));
    }

    rules.push(Rule::new(
        "identity.university_name",
        "The title page names the university exactly",
        Scope::pages(&[PageRole::Title]),
        Check::CanonicalText {
            canonical: config.university_name.clone(),
            max_distance: config.near_miss_distance,
        },
        Severity::Critical,
    ));
    rules.push(Rule::new(
        "identity.faculty_name",
        "The title page names the faculty exactly",
        Scope::pages(&[PageRole::Title]),
        Check::CanonicalText {
            canonical: config.faculty_name.clone(),
            max_distance: config.near_miss_distance,
        },
        Severity::Critical,
    ));
    rules.push(Rule::new(
        "title.font",
        "The thesis title is set in the required typeface, size and weight",
        Scope::pages(&[PageRole::Title]),
        Check::Custom(CustomCheck::TitleFont {
            family: config.title_font.family.clone(),
            aliases: config.title_font.aliases.clone(),
            size_pt: config.title_font.size_pt,
            tolerance_pt: config.body_font.tolerance_pt,
            bold: config.title_font.bold,
        }),
        Severity::Major,
    ));
    rules.push(Rule::new(
        "title.bilingual",
        "The title page gives the title in Slovenian and English",
        Scope::pages(&[PageRole::Title]),
        Check::Custom(CustomCheck::BilingualTitle),
        Severity::Major,
    ));

    let margins = &config.margins;
    for (edge, requirement) in [
        (Edge::Left, margins.left),
        (Edge::Right, margins.right),
        (Edge::Top, margins.top),
        (Edge::Bottom, margins.bottom),
    ] {
        rules.push(Rule::new(
            format!("margins.{}", edge.label()),
            format!("Body pages keep the required {} margin", edge.label()),
            Scope::pages(&[PageRole::Body]),
            Check::NumericRange {
                metric: Metric::Margin(edge),
                expected: requirement.expected_mm,
                tolerance: margins.tolerance_mm,
                bound: requirement.bound,
            },
            Severity::Major,
        ));
    }

    rules.push(Rule::new(
        "font.body_family",
        "Body text uses the required typeface",
        Scope::pages(&[PageRole::Body]),
        Check::Custom(CustomCheck::BodyFontFamily {
            family: config.body_font.family.clone(),
            aliases: config.body_font.aliases.clone(),
        }),
        Severity::Major,
    ));
    rules.push(Rule::new(
        "font.body_size",
        "Body text uses the required font size",
        Scope::pages(&[PageRole::Body]),
        Check::NumericRange {
            metric: Metric::BodyFontSize,
            expected: config.body_font.size_pt,
            tolerance: config.body_font.tolerance_pt,
            bound: Bound::Exact,
        },
        Severity::Major,
    ));
    rules.push(Rule::new(
        "line_spacing.body",
        "Body text uses the required line spacing",
        Scope::pages(&[PageRole::Body]),
        Check::NumericRange {
            metric: Metric::LineSpacing,
            expected: config.line_spacing.expected,
            tolerance: config.line_spacing.tolerance,
            bound: Bound::Exact,
        },
        Severity::Major,
    ));
    rules.push(Rule::new(
        "page_numbering",
        "Pages from the table of contents on carry consecutive Arabic numbers",
        Scope::Document,
        Check::Custom(CustomCheck::PageNumbering),
        Severity::Major,
    ));

    for (id, role) in [
        ("abstract_sl.word_count", PageRole::AbstractSl),
        ("abstract_en.word_count", PageRole::AbstractEn),
    ] {
        rules.push(Rule::new(
            id,
            format!("The {} stays within the word limit", role.label()),
            Scope::aggregate(&[role]),
            Check::NumericRange {
                metric: Metric::WordCount,
                expected: config.abstract_max_words as f64,
                tolerance: 0.0,
                bound: Bound::AtMost,
            },
            Severity::Major,
        ));
    }

    rules.push(Rule::new(
        "abstract.keywords",
        "Each abstract lists enough keywords",
        Scope::aggregate(&[PageRole::AbstractSl, PageRole::AbstractEn]),
        Check::Custom(CustomCheck::Keywords {
            min: config.min_keywords,
        }),
        Severity::Major,
    ));
    rules.push(Rule::new(
        "references.style",
        "Reference entries follow APA author-year style",
        Scope::pages(&[PageRole::References]),
        Check::Custom(CustomCheck::ReferenceStyle),
        Severity::Major,
    ));
    rules.push(Rule::new(
        "references.order",
        "Reference entries are in alphabetical order",
        Scope::aggregate(&[PageRole::References]),
        Check::Custom(CustomCheck::ReferenceOrder),
        Severity::Minor,
    ));
    rules.push(Rule::new(
        "extraction.page_unreadable",
        "Every page could be read",
        Scope::AllPages,
        Check::Custom(CustomCheck::PageReadable),
        Severity::Minor,
    ));
    rules.push(
        Rule::new(
            "judgment.chapter_structure",
            "Chapters are numbered and ordered consistently",
            Scope::Document,
            Check::Custom(CustomCheck::ChapterStructure),
            Severity::Minor,
        )
        .needing_judgment(),
    );

    rules
}

/// Rules of `config` that are switched on, in priority order.
pub fn enabled_rules(config: &RuleSetConfig) -> Vec<Rule> {
    default_rules(config)
        .into_iter()
        .filter(|rule| config.is_enabled(&rule.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let rules = default_rules(&RuleSetConfig::default());
        let ids: HashSet<&str> = rules.iter().map(|rule| rule.id.as_str()).collect();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn critical_rules_are_sections_or_canonical_names() {
        for rule in default_rules(&RuleSetConfig::default()) {
            if rule.severity == Severity::Critical {
                assert!(
                    matches!(
                        rule.check,
                        Check::SectionPresent { .. }
                            | Check::ChapterPresent { .. }
                            | Check::CanonicalText { .. }
                    ),
                    "{} is critical",
                    rule.id
                );
            }
        }
    }

    #[test]
    fn judgment_rule_is_disabled_by_default() {
        let config = RuleSetConfig::default();
        let all = default_rules(&config);
        let enabled = enabled_rules(&config);
        assert_eq!(all.len(), enabled.len() + 1);
        assert!(all.iter().any(|rule| rule.needs_judgment));
        assert!(!enabled.iter().any(|rule| rule.needs_judgment));
    }

    #[test]
    fn section_rules_follow_required_sections() {
        let config = RuleSetConfig {
            required_sections: vec![PageRole::Declaration],
            ..RuleSetConfig::default()
        };
        let ids: Vec<String> = default_rules(&config)
            .into_iter()
            .filter(|rule| matches!(rule.check, Check::SectionPresent { .. }))
            .map(|rule| rule.id)
            .collect();
        assert_eq!(ids, vec!["section.declaration"]);
    }

    #[test]
    fn chapter_rules_follow_required_chapters() {
        let rules = default_rules(&RuleSetConfig::default());
        let chapters: Vec<&Rule> = rules
            .iter()
            .filter(|rule| matches!(rule.check, Check::ChapterPresent { .. }))
            .collect();
        let ids: Vec<&str> = chapters.iter().map(|rule| rule.id.as_str()).collect();
        assert_eq!(ids, vec!["chapter.introduction", "chapter.conclusion"]);
        assert!(chapters.iter().all(|rule| rule.severity == Severity::Critical));
    }

    #[test]
    fn layout_rules_are_major() {
        let rules = default_rules(&RuleSetConfig::default());
        for id in ["line_spacing.body", "page_numbering", "title.bilingual", "title.font"] {
            let rule = rules.iter().find(|rule| rule.id == id).expect(id);
            assert_eq!(rule.severity, Severity::Major, "{id}");
        }
    }

    #[test]
    fn margin_rules_carry_configured_values() {
        let rules = default_rules(&RuleSetConfig::default());
        let left = rules.iter().find(|rule| rule.id == "margins.left").unwrap();
        assert_eq!(
            left.check,
            Check::NumericRange {
                metric: Metric::Margin(Edge::Left),
                expected: 30.0,
                tolerance: 1.0,
                bound: Bound::Exact,
            }
        );
    }
}
