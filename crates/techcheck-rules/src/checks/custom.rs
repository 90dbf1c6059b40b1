// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Named predicates: title font and languages, body typeface, page numbering,
// keywords, reference list style and order, page readability.

use std::sync::LazyLock;

use regex::Regex;
use techcheck_core::types::{BBox, Document, Finding, Page, PageRole, TextRun, family_key};

use super::lines::{TextLine, text_lines};
use super::strings::fold;
use super::{Target, could_not_verify, finding_for};
use crate::rule::{CustomCheck, Rule};

/// `Ključne besede: a, b, c` or `Keywords: a, b, c`.
static KEYWORDS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(ključne\s+besede|kljucne\s+besede|key\s*words)\s*:\s*(.*)$")
        .expect("keywords pattern")
});

/// Start of a reference entry: `Surname, `, `[12]` or `12. `.
static ENTRY_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\[\d+\]|\d+\.\s|\p{Lu}[\p{L}'’\-]+,\s)").expect("entry pattern")
});

/// APA author-year: `Surname, I. ... (2019).` or `(n. d.)`.
static APA_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\p{Lu}[\p{L}'’\-]+,\s(\p{Lu}\.\s?)+.*\((\d{4}[a-z]?|n\.\s?d\.)\)")
        .expect("APA pattern")
});

/// A roman numeral on its own.
static ROMAN_NUMERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[ivxlcdm]+$").expect("roman numeral pattern"));

const ENGLISH_WORDS: &[&str] = &[
    "the", "of", "and", "for", "on", "to", "with", "a", "an", "among", "between", "from", "by",
    "at", "as", "is", "its", "their", "towards",
];
const SLOVENIAN_WORDS: &[&str] = &[
    "v", "na", "za", "pri", "med", "ter", "ki", "od", "do", "z", "s", "o", "po", "kot", "ali",
    "je", "so", "se", "iz", "k", "h",
];
const ENGLISH_SUFFIXES: &[&str] = &["tion", "ing", "ness", "ship", "ity"];
const SLOVENIAN_SUFFIXES: &[&str] = &["ost", "ija", "ih", "ega", "emu"];

/// Share of the page height, at the top and bottom, where a page number
/// may sit.
const NUMBER_BAND: f64 = 0.12;

pub fn run(
    rule: &Rule,
    document: &Document,
    target: &Target<'_>,
    check: &CustomCheck,
) -> Vec<Finding> {
    match check {
        CustomCheck::TitleFont {
            family,
            aliases,
            size_pt,
            tolerance_pt,
            bold,
        } => title_font(
            rule,
            document,
            target,
            TitleStyle {
                family,
                aliases,
                size_pt: *size_pt,
                tolerance_pt: *tolerance_pt,
                bold: *bold,
            },
        ),
        CustomCheck::BilingualTitle => match target {
            Target::Page(page) => bilingual_title(rule, page),
            _ => Vec::new(),
        },
        CustomCheck::PageNumbering => page_numbering(rule, document),
        CustomCheck::BodyFontFamily { family, aliases } => match target {
            Target::Page(page) => body_font_family(rule, page, family, aliases),
            _ => Vec::new(),
        },
        CustomCheck::Keywords { min } => keywords(rule, document, target, *min),
        CustomCheck::ReferenceStyle => reference_style(rule, target),
        CustomCheck::ReferenceOrder => reference_order(rule, document, target),
        CustomCheck::PageReadable => match target {
            Target::Page(page) => page_readable(rule, page),
            _ => Vec::new(),
        },
        CustomCheck::ChapterStructure => vec![could_not_verify(
            rule,
            target.anchor().map(|page| page.index),
            "requires judgment",
        )],
    }
}

struct TitleStyle<'a> {
    family: &'a str,
    aliases: &'a [String],
    size_pt: f64,
    tolerance_pt: f64,
    bold: bool,
}

impl TitleStyle<'_> {
    fn matches(&self, run: &TextRun) -> bool {
        let family = family_key(&run.font_name);
        (run.font_size - self.size_pt).abs() <= self.tolerance_pt
            && (run.bold || !self.bold)
            && std::iter::once(self.family)
                .chain(self.aliases.iter().map(String::as_str))
                .any(|name| family_key(name) == family)
    }

    fn describe(&self) -> String {
        let weight = if self.bold { " bold" } else { "" };
        format!("{} {:.0} pt{weight}", self.family, self.size_pt)
    }
}

fn title_font(
    rule: &Rule,
    document: &Document,
    target: &Target<'_>,
    style: TitleStyle<'_>,
) -> Vec<Finding> {
    let pages = target.pages(document);
    let runs: Vec<_> = pages
        .iter()
        .flat_map(|page| page.content_runs())
        .filter(|run| !run.text.trim().is_empty())
        .collect();
    if runs.is_empty() {
        return vec![could_not_verify(
            rule,
            target.anchor().map(|page| page.index),
            "the title page has no text",
        )];
    }
    if runs.iter().any(|run| style.matches(run)) {
        return Vec::new();
    }

    let largest = runs
        .iter()
        .max_by(|a, b| a.font_size.total_cmp(&b.font_size));
    let found = largest.map_or_else(String::new, |run| {
        format!(
            " (largest text is {:.1} pt{} {})",
            run.font_size,
            if run.bold { " bold" } else { "" },
            run.font_name
        )
    });
    let wanted = style.describe();
    vec![
        finding_for(
            rule,
            target,
            format!("Title must be {wanted}{found}"),
            format!("Set the thesis title in {wanted}."),
        )
        .at(largest.map(|run| run.bbox)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Slovenian,
    English,
}

impl Language {
    fn other(self) -> Self {
        match self {
            Self::Slovenian => Self::English,
            Self::English => Self::Slovenian,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Slovenian => "Slovenian",
            Self::English => "English",
        }
    }
}

/// Language of a line from function words, word endings and Slovenian
/// letters. `None` when the evidence is even.
fn language_of(line: &str) -> Option<Language> {
    let words: Vec<String> = line
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|word| !word.is_empty())
        .collect();
    let mut english = 0;
    let mut slovenian = usize::from(line.chars().any(|c| "čšžČŠŽ".contains(c)));
    for word in &words {
        english += usize::from(ENGLISH_WORDS.contains(&word.as_str()));
        slovenian += usize::from(SLOVENIAN_WORDS.contains(&word.as_str()));
        if word.chars().count() > 4 {
            english += usize::from(ENGLISH_SUFFIXES.iter().any(|s| word.ends_with(s)));
            slovenian += usize::from(SLOVENIAN_SUFFIXES.iter().any(|s| word.ends_with(s)));
        }
    }
    match english.cmp(&slovenian) {
        std::cmp::Ordering::Greater => Some(Language::English),
        std::cmp::Ordering::Less => Some(Language::Slovenian),
        std::cmp::Ordering::Equal => None,
    }
}

/// The main title is the text set in the page's largest size. Some other
/// mixed-case line of two or more words must carry the title in the other
/// language.
fn bilingual_title(rule: &Rule, page: &Page) -> Vec<Finding> {
    let lines = text_lines(page);
    let Some(largest) = lines.iter().map(|line| line.font_size).max_by(f64::total_cmp) else {
        return Vec::new();
    };
    let (main, rest): (Vec<&TextLine>, Vec<&TextLine>) = lines
        .iter()
        .partition(|line| (line.font_size - largest).abs() < 0.5);
    let main_text = main
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let main_language = language_of(&main_text).unwrap_or(Language::Slovenian);
    let wanted = main_language.other();

    let translated = rest.iter().any(|line| {
        line.text.split_whitespace().count() >= 2
            && line.text.chars().any(char::is_lowercase)
            && language_of(&line.text) == Some(wanted)
    });
    if translated {
        return Vec::new();
    }

    let location = main.iter().map(|line| line.bbox).reduce(|a, b| a.union(&b));
    vec![
        finding_for(
            rule,
            &Target::Page(page),
            format!(
                "The title page must give the title in Slovenian and English ({} title not found)",
                wanted.name()
            ),
            format!(
                "Add the {} version of the title below the {} title.",
                wanted.name(),
                main_language.name()
            ),
        )
        .at(location),
    ]
}

/// The page number of `page`: a numeric run in the header or footer band.
/// `Err` carries a roman numeral found instead.
fn page_number(page: &Page) -> Option<Result<(u32, BBox), BBox>> {
    let band = NUMBER_BAND * page.height_pt;
    let candidates: Vec<&TextRun> = page
        .runs
        .iter()
        .filter(|run| {
            run.furniture || run.bbox.y1 <= band || run.bbox.y0 >= page.height_pt - band
        })
        .collect();
    let arabic = candidates.iter().rev().find_map(|run| {
        let text = run.text.trim();
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        text.parse::<u32>().ok().map(|number| (number, run.bbox))
    });
    if let Some(found) = arabic {
        return Some(Ok(found));
    }
    candidates
        .iter()
        .find(|run| ROMAN_NUMERAL.is_match(run.text.trim()))
        .map(|run| Err(run.bbox))
}

/// Contents, main text, references and appendices carry page numbers that
/// grow with the page index.
fn page_numbering(rule: &Rule, document: &Document) -> Vec<Finding> {
    let numbered_roles = [
        PageRole::Toc,
        PageRole::Body,
        PageRole::References,
        PageRole::Appendix,
    ];
    let pages: Vec<&Page> = document
        .pages
        .iter()
        .filter(|page| numbered_roles.contains(&page.role))
        .collect();

    let mut findings = Vec::new();
    let mut missing: Vec<u32> = Vec::new();
    let mut roman: Option<(u32, BBox)> = None;
    let mut break_found = false;
    let mut previous: Option<(u32, u32)> = None;

    for page in &pages {
        match page_number(page) {
            None => missing.push(page.index),
            Some(Err(bbox)) => {
                roman.get_or_insert((page.index, bbox));
            }
            Some(Ok((number, bbox))) => {
                if let Some((index, last)) = previous {
                    let expected = last.saturating_add(page.index.saturating_sub(index));
                    if number != expected && !break_found {
                        break_found = true;
                        findings.push(
                            Finding::new(
                                rule.id.clone(),
                                rule.severity,
                                format!(
                                    "Page number {number} does not follow {last} (expected {expected})"
                                ),
                                "Number the pages consecutively with Arabic numerals.",
                            )
                            .on_page(page.index)
                            .at(Some(bbox)),
                        );
                    }
                }
                previous = Some((page.index, number));
            }
        }
    }

    if let Some((index, bbox)) = roman {
        findings.push(
            Finding::new(
                rule.id.clone(),
                rule.severity,
                format!("Page {index} is numbered with a roman numeral"),
                "Use Arabic page numbers from the table of contents onwards.",
            )
            .on_page(index)
            .at(Some(bbox)),
        );
    }
    if let Some(first) = missing.first() {
        let others = match missing.len() {
            1 => String::new(),
            n => format!(" ({n} pages without a number)"),
        };
        findings.push(
            Finding::new(
                rule.id.clone(),
                rule.severity,
                format!("Page {first} has no page number{others}"),
                "Insert page numbers in the footer of every page from the table of contents on.",
            )
            .on_page(*first),
        );
    }
    findings
}

fn body_font_family(rule: &Rule, page: &Page, family: &str, aliases: &[String]) -> Vec<Finding> {
    let Some(font) = &page.dominant_font else {
        return vec![could_not_verify(
            rule,
            Some(page.index),
            "no font information on the page",
        )];
    };
    let found = font.family();
    let accepted = std::iter::once(family)
        .chain(aliases.iter().map(String::as_str))
        .any(|name| family_key(name) == found);
    if accepted {
        return Vec::new();
    }

    let location = page
        .content_runs()
        .find(|run| run.font_name == font.name)
        .map(|run| run.bbox);
    vec![
        finding_for(
            rule,
            &Target::Page(page),
            format!("Main text must use {family} (found {})", font.name),
            format!("Set the body text in {family}."),
        )
        .at(location),
    ]
}

/// Keyword list starting on the line that matched, continued on following
/// lines while the previous one ends with a separator.
fn keyword_list(lines: &[TextLine]) -> Option<(Vec<String>, BBox)> {
    let start = lines
        .iter()
        .position(|line| KEYWORDS_LINE.is_match(&line.text))?;
    let captures = KEYWORDS_LINE.captures(&lines[start].text)?;
    let mut raw = captures.get(2).map_or("", |m| m.as_str()).to_string();
    let mut bbox = lines[start].bbox;

    for line in &lines[start + 1..] {
        let trimmed = raw.trim_end();
        if !(trimmed.ends_with(',') || trimmed.ends_with(';')) {
            break;
        }
        raw.push(' ');
        raw.push_str(&line.text);
        bbox = bbox.union(&line.bbox);
    }

    let keywords = raw
        .split([',', ';'])
        .map(|word| word.trim().trim_end_matches('.').trim())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect();
    Some((keywords, bbox))
}

fn keywords(rule: &Rule, document: &Document, target: &Target<'_>, min: usize) -> Vec<Finding> {
    let lines: Vec<TextLine> = target
        .pages(document)
        .into_iter()
        .flat_map(text_lines)
        .collect();
    let subject = match target {
        Target::Role { role, .. } => role.label(),
        _ => "abstract",
    };

    match keyword_list(&lines) {
        None => vec![finding_for(
            rule,
            target,
            format!("No keywords found in the {subject}"),
            format!("Add a keywords line (\"Ključne besede: ...\" or \"Keywords: ...\") with at least {min} keywords."),
        )],
        Some((found, _)) if found.len() >= min => Vec::new(),
        Some((found, bbox)) => vec![
            finding_for(
                rule,
                target,
                format!(
                    "Minimum {min} keywords required in the {subject} (found {})",
                    found.len()
                ),
                format!("List at least {min} keywords separated by commas."),
            )
            .at(Some(bbox)),
        ],
    }
}

/// One reference list entry with its (possibly multi-line) box.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub page: u32,
    pub text: String,
    pub bbox: BBox,
}

/// Entries of a reference list. Lines before the first entry (the heading)
/// are ignored; lines not starting an entry continue the previous one.
pub fn reference_entries(lines: &[TextLine]) -> Vec<ReferenceEntry> {
    let mut entries: Vec<ReferenceEntry> = Vec::new();
    for line in lines {
        if ENTRY_START.is_match(&line.text) {
            entries.push(ReferenceEntry {
                page: line.page,
                text: line.text.clone(),
                bbox: line.bbox,
            });
        } else if let Some(entry) = entries.last_mut() {
            // Continuations only merge boxes on the same page.
            if entry.page == line.page {
                entry.bbox = entry.bbox.union(&line.bbox);
            }
            entry.text.push(' ');
            entry.text.push_str(&line.text);
        }
    }
    entries
}

fn reference_style(rule: &Rule, target: &Target<'_>) -> Vec<Finding> {
    let Target::Page(page) = target else {
        return Vec::new();
    };
    let entries = reference_entries(&text_lines(page));
    if entries.is_empty() {
        return if page.has_text() {
            vec![could_not_verify(
                rule,
                Some(page.index),
                "no reference entries recognised",
            )]
        } else {
            Vec::new()
        };
    }

    entries
        .iter()
        .filter(|entry| !APA_ENTRY.is_match(&entry.text))
        .map(|entry| {
            finding_for(
                rule,
                target,
                format!(
                    "Reference is not in APA author-year style: \"{}\"",
                    excerpt(&entry.text, 60)
                ),
                "Format the entry as: Surname, I. (Year). Title. Place: Publisher.",
            )
            .at(Some(entry.bbox))
        })
        .collect()
}

fn reference_order(rule: &Rule, document: &Document, target: &Target<'_>) -> Vec<Finding> {
    let lines: Vec<TextLine> = target
        .pages(document)
        .into_iter()
        .flat_map(text_lines)
        .collect();
    let entries = reference_entries(&lines);
    // Numbered lists follow citation order, not the alphabet.
    if entries.iter().any(|entry| {
        entry
            .text
            .trim_start()
            .starts_with(|c: char| c == '[' || c.is_ascii_digit())
    }) {
        return Vec::new();
    }

    let keys: Vec<String> = entries
        .iter()
        .map(|entry| fold(entry.text.split(',').next().unwrap_or("")))
        .collect();
    let Some(i) = (1..keys.len()).find(|&i| keys[i] < keys[i - 1]) else {
        return Vec::new();
    };

    let finding = Finding::new(
        rule.id.clone(),
        rule.severity,
        format!(
            "References are not in alphabetical order: \"{}\" follows \"{}\"",
            excerpt(&entries[i].text, 40),
            excerpt(&entries[i - 1].text, 40)
        ),
        "Sort the reference list alphabetically by the first author's surname.",
    )
    .on_page(entries[i].page)
    .at(Some(entries[i].bbox));
    vec![finding]
}

fn page_readable(rule: &Rule, page: &Page) -> Vec<Finding> {
    if page.warnings.is_empty() {
        return Vec::new();
    }
    vec![finding_for(
        rule,
        &Target::Page(page),
        format!(
            "Page {} could not be fully read: {}",
            page.index,
            page.warnings.join("; ")
        ),
        "Re-export the PDF from the word processor and check this page manually.",
    )]
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
