// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page classifier — assigns a semantic role to every page from heading
// markers, position in the document and citation density.

use std::sync::LazyLock;

use regex::Regex;
use techcheck_core::config::ClassificationConfig;
use techcheck_core::types::{Document, Page, PageRole};
use tracing::{debug, info, instrument};

/// Roles in tie-break order: a page matching several markers takes the
/// first role listed here.
const ROLE_PRIORITY: [PageRole; 8] = [
    PageRole::Title,
    PageRole::Declaration,
    PageRole::AbstractSl,
    PageRole::AbstractEn,
    PageRole::Toc,
    PageRole::References,
    PageRole::Appendix,
    PageRole::Body,
];

const TITLE_MARKERS: &[&str] = &["UNIVERZA", "UNIVERSITY", "FAKULTETA", "FACULTY"];
const DECLARATION_MARKERS: &[&str] = &["IZJAVA", "DECLARATION", "STATEMENT OF AUTHORSHIP"];
const ABSTRACT_SL_MARKERS: &[&str] = &["POVZETEK"];
const ABSTRACT_EN_MARKERS: &[&str] = &["ABSTRACT", "SUMMARY"];
const TOC_MARKERS: &[&str] = &["KAZALO", "CONTENTS"];
const REFERENCE_MARKERS: &[&str] = &[
    "VIRI",
    "LITERATURA",
    "REFERENCES",
    "BIBLIOGRAPHY",
    "BIBLIOGRAFIJA",
];
const APPENDIX_MARKERS: &[&str] = &["PRILOGA", "PRILOGE", "APPENDIX", "APPENDICES"];

/// Lines longer than this are prose, not headings.
const MAX_HEADING_WORDS: usize = 8;

/// A reference list entry: `Surname, X. ... 2019` or `[12] ...`.
static CITATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\[\d+\]|\p{Lu}[\p{L}'’\-]+,\s.*\b(19|20)\d{2}[a-z]?\b)")
        .expect("citation pattern")
});

/// Assigns `PageRole`s.
#[derive(Debug, Clone, Default)]
pub struct PageClassifier {
    config: ClassificationConfig,
}

impl PageClassifier {
    pub fn new(config: ClassificationConfig) -> Self {
        Self { config }
    }

    /// Return the document with a role on every page. Never fails.
    #[instrument(skip_all, fields(pages = document.pages.len()))]
    pub fn classify(&self, mut document: Document) -> Document {
        let roles = self.assign_roles(&document.pages);
        for (page, role) in document.pages.iter_mut().zip(roles) {
            page.role = role;
        }

        let mut counts = [0usize; 9];
        for page in &document.pages {
            counts[page.role as usize] += 1;
        }
        info!(
            title = counts[PageRole::Title as usize],
            body = counts[PageRole::Body as usize],
            references = counts[PageRole::References as usize],
            "classification complete"
        );
        document
    }

    fn assign_roles(&self, pages: &[Page]) -> Vec<PageRole> {
        let mut roles = vec![PageRole::Unknown; pages.len()];
        let mut window_end = self.config.front_matter_pages as usize;
        let mut title_taken = false;
        let mut front_matter_len = 0;

        // Front matter: the first pages, extended while consecutive pages keep
        // matching front-matter markers.
        for (i, page) in pages.iter().enumerate() {
            if i >= window_end {
                break;
            }
            front_matter_len = i + 1;
            let headings = heading_lines(page, self.config.heading_lines);
            let mut candidates = front_matter_candidates(&headings);
            if title_taken {
                candidates.retain(|role| *role != PageRole::Title);
            }
            let role = match best_role(&candidates) {
                Some(role) => {
                    if i + 1 == window_end {
                        window_end += 1;
                    }
                    role
                }
                None if i == 0 => PageRole::Title,
                None => self.later_role(page),
            };
            title_taken |= role == PageRole::Title;
            debug!(page = page.index, %role, "front matter page");
            roles[i] = role;
        }

        for (i, page) in pages.iter().enumerate().skip(front_matter_len) {
            roles[i] = self.later_role(page);
        }

        self.extend_references(pages, &mut roles);
        roles
    }

    /// Role of a page outside the front matter, before reference anchoring.
    fn later_role(&self, page: &Page) -> PageRole {
        let headings = heading_lines(page, self.config.heading_lines);
        let table: [(PageRole, &[&str]); 2] = [
            (PageRole::References, REFERENCE_MARKERS),
            (PageRole::Appendix, APPENDIX_MARKERS),
        ];
        let candidates: Vec<PageRole> = table
            .iter()
            .filter(|(_, markers)| headings.iter().any(|line| matches_heading(line, markers)))
            .map(|(role, _)| *role)
            .collect();
        match best_role(&candidates) {
            Some(role) => role,
            None if page.content_runs().next().is_some() => PageRole::Body,
            None => PageRole::Unknown,
        }
    }

    /// Mark citation-dominated pages that continue a reference heading, and
    /// the trailing citation-dominated block (ignoring trailing appendices).
    /// Front-matter roles are never overwritten.
    fn extend_references(&self, pages: &[Page], roles: &mut [PageRole]) {
        for i in 1..pages.len() {
            if roles[i - 1] == PageRole::References
                && roles[i] == PageRole::Body
                && self.citation_dominated(&pages[i])
            {
                roles[i] = PageRole::References;
            }
        }

        let mut i = pages.len();
        while i > 0 && matches!(roles[i - 1], PageRole::Appendix | PageRole::Unknown) {
            i -= 1;
        }
        while i > 0
            && matches!(roles[i - 1], PageRole::Body | PageRole::References)
            && self.citation_dominated(&pages[i - 1])
        {
            roles[i - 1] = PageRole::References;
            i -= 1;
        }
    }

    fn citation_dominated(&self, page: &Page) -> bool {
        let lines = content_lines(page);
        if lines.is_empty() {
            return false;
        }
        let citations = lines
            .iter()
            .filter(|line| CITATION_LINE.is_match(line))
            .count();
        citations >= self.config.min_citation_lines
            && citations as f64 / lines.len() as f64 >= self.config.citation_line_ratio
    }
}

/// Classify with the default configuration.
pub fn classify(document: Document) -> Document {
    PageClassifier::default().classify(document)
}

fn front_matter_candidates(headings: &[String]) -> Vec<PageRole> {
    let table: [(PageRole, &[&str]); 5] = [
        (PageRole::Title, TITLE_MARKERS),
        (PageRole::Declaration, DECLARATION_MARKERS),
        (PageRole::AbstractSl, ABSTRACT_SL_MARKERS),
        (PageRole::AbstractEn, ABSTRACT_EN_MARKERS),
        (PageRole::Toc, TOC_MARKERS),
    ];
    table
        .iter()
        .filter(|(_, markers)| headings.iter().any(|line| matches_heading(line, markers)))
        .map(|(role, _)| *role)
        .collect()
}

fn best_role(candidates: &[PageRole]) -> Option<PageRole> {
    ROLE_PRIORITY
        .iter()
        .find(|role| candidates.contains(role))
        .copied()
}

/// A short line containing one of the markers as a word (or phrase).
fn matches_heading(line: &str, markers: &[&str]) -> bool {
    let words: Vec<String> = line
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_uppercase()
        })
        .filter(|word| !word.is_empty())
        .collect();
    if words.is_empty() || words.len() > MAX_HEADING_WORDS {
        return false;
    }
    let joined = format!(" {} ", words.join(" "));
    markers
        .iter()
        .any(|marker| joined.contains(&format!(" {marker} ")))
}

/// Text lines built from content runs only (no headers or page numbers).
fn content_lines(page: &Page) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut last_baseline: Option<(f64, f64)> = None;
    for run in page.content_runs() {
        let same_line = last_baseline.is_some_and(|(baseline, size)| {
            (run.baseline - baseline).abs() <= 0.5 * size.min(run.font_size)
        });
        match lines.last_mut() {
            Some(line) if same_line => {
                line.push(' ');
                line.push_str(&run.text);
            }
            _ => lines.push(run.text.clone()),
        }
        last_baseline = Some((run.baseline, run.font_size));
    }
    lines
}

fn heading_lines(page: &Page, count: usize) -> Vec<String> {
    content_lines(page).into_iter().take(count).collect()
}
