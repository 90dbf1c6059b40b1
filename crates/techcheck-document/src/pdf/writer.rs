// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — render the findings summary page with `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`. The annotator merges the result into the annotated
// thesis with lopdf.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use techcheck_core::types::{Finding, Severity, pt_to_mm};
use tracing::{debug, instrument, warn};
use unicode_normalization::UnicodeNormalization;

const MARGIN_MM: f32 = 20.0;

/// One laid-out line of the summary.
#[derive(Debug, Clone, PartialEq)]
struct SummaryLine {
    text: String,
    size: f32,
    indent_mm: f32,
    bold: bool,
}

/// Renders findings that have no location on the page as a listing grouped
/// by severity.
#[derive(Debug, Clone)]
pub struct SummaryWriter {
    width_mm: f32,
    height_mm: f32,
    title: String,
}

impl Default for SummaryWriter {
    fn default() -> Self {
        Self::a4()
    }
}

impl SummaryWriter {
    pub fn a4() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            title: "Formatting findings".into(),
        }
    }

    /// Match the summary page to the thesis page size (in points).
    pub fn with_page_size(mut self, width_pt: f64, height_pt: f64) -> Self {
        if width_pt > 0.0 && height_pt > 0.0 {
            self.width_mm = pt_to_mm(width_pt) as f32;
            self.height_mm = pt_to_mm(height_pt) as f32;
        }
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Render `findings` onto as many pages as needed. Always at least one.
    #[instrument(skip_all, fields(findings = findings.len()))]
    pub fn render(&self, findings: &[&Finding]) -> Vec<u8> {
        let lines = self.layout(findings);
        let (page_w, page_h) = (Mm(self.width_mm), Mm(self.height_mm));
        let page_h_pt = page_h.into_pt().0;
        let margin_pt = Mm(MARGIN_MM).into_pt().0;
        let bottom_limit = margin_pt;

        let mut pages: Vec<PdfPage> = Vec::new();
        let mut ops: Vec<Op> = Vec::new();
        let mut y_pt = page_h_pt - margin_pt;

        for line in &lines {
            let line_height = line.size * 1.35;
            if y_pt - line_height < bottom_limit && !ops.is_empty() {
                pages.push(PdfPage::new(page_w, page_h, std::mem::take(&mut ops)));
                y_pt = page_h_pt - margin_pt;
            }
            y_pt -= line_height;
            if line.text.is_empty() {
                continue;
            }

            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(Mm(MARGIN_MM + line.indent_mm).into_pt().0),
                    y: Pt(y_pt),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(line.size),
                font: builtin_font(line.bold),
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(line.text.clone())],
                font: builtin_font(line.bold),
            });
            ops.push(Op::EndTextSection);
        }
        if !ops.is_empty() || pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        let mut doc = PdfDocument::new(&self.title);
        doc.with_pages(pages);
        debug!(lines = lines.len(), pages = doc.pages.len(), "summary layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "printpdf reported warnings");
        }
        output
    }

    fn layout(&self, findings: &[&Finding]) -> Vec<SummaryLine> {
        let text_width_mm = self.width_mm - 2.0 * MARGIN_MM;
        let mut lines = vec![
            SummaryLine {
                text: latin1(&self.title),
                size: 16.0,
                indent_mm: 0.0,
                bold: true,
            },
            blank(),
        ];

        for severity in Severity::ALL {
            let group: Vec<&&Finding> = findings.iter().filter(|f| f.severity == severity).collect();
            if group.is_empty() {
                continue;
            }
            lines.push(SummaryLine {
                text: format!("{} ({})", severity.label(), group.len()),
                size: 13.0,
                indent_mm: 0.0,
                bold: true,
            });
            for finding in group {
                let head = match finding.page {
                    Some(page) => format!("[{}] page {page}: {}", finding.rule_id, finding.message),
                    None => format!("[{}] {}", finding.rule_id, finding.message),
                };
                push_wrapped(&mut lines, &head, 10.0, 4.0, text_width_mm);
                if !finding.fix.is_empty() {
                    let fix = format!("Fix: {}", finding.fix);
                    push_wrapped(&mut lines, &fix, 9.0, 8.0, text_width_mm);
                }
            }
            lines.push(blank());
        }
        lines
    }
}

fn builtin_font(bold: bool) -> BuiltinFont {
    if bold {
        BuiltinFont::HelveticaBold
    } else {
        BuiltinFont::Helvetica
    }
}

fn blank() -> SummaryLine {
    SummaryLine {
        text: String::new(),
        size: 10.0,
        indent_mm: 0.0,
        bold: false,
    }
}

fn push_wrapped(lines: &mut Vec<SummaryLine>, text: &str, size: f32, indent_mm: f32, width_mm: f32) {
    // Average Helvetica glyph width is roughly half the font size.
    let avg_char_width_mm = 0.50 * size * 0.3528;
    let max_chars = (((width_mm - indent_mm) / avg_char_width_mm) as usize).max(10);
    for text in wrap_text(&latin1(text), max_chars) {
        lines.push(SummaryLine {
            text,
            size,
            indent_mm,
            bold: false,
        });
    }
}

/// Built-in fonts only cover Latin-1: decompose accented letters and drop
/// the combining marks, replacing anything else outside the range.
fn latin1(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            if (c as u32) < 0x100 {
                vec![c]
            } else {
                let base: Vec<char> = c.nfd().filter(|d| (*d as u32) < 0x100).collect();
                if base.is_empty() { vec!['?'] } else { base }
            }
        })
        .collect()
}

// -- Text wrapping helper -----------------------------------------------------

/// Wrap a multi-line string so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first, then performs simple word-wrap within each
/// paragraph. Words longer than `max_width` are force-broken.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current_line = String::with_capacity(max_width);
        let mut current_len = 0;

        for word in words {
            let word_len = word.chars().count();
            if word_len > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(max_width).peekable();
                while let Some(chunk) = chunks.next() {
                    let chunk: String = chunk.iter().collect();
                    if chunks.peek().is_some() {
                        result.push(chunk);
                    } else {
                        current_len = chunk.chars().count();
                        current_line = chunk;
                    }
                }
            } else if current_line.is_empty() {
                current_line.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::take(&mut current_line));
                current_line.push_str(word);
                current_len = word_len;
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule: &str, severity: Severity) -> Finding {
        Finding::new(rule, severity, format!("{rule} failed"), "Correct it.")
    }

    #[test]
    fn wrap_respects_width_and_force_breaks() {
        let lines = wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
        let lines = wrap_text("abcdefghijkl", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "kl"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn wrap_counts_characters_not_bytes() {
        let lines = wrap_text("čččč šššš", 4);
        assert_eq!(lines, vec!["čččč", "šššš"]);
    }

    #[test]
    fn latin1_folds_slovene_letters() {
        assert_eq!(latin1("DRUŽBENE VEDE, Ključne"), "DRUZBENE VEDE, Kljucne");
        assert_eq!(latin1("café"), "café");
        assert_eq!(latin1("→"), "?");
    }

    #[test]
    fn layout_groups_by_severity_in_order() {
        let minor = finding("references.order", Severity::Minor);
        let critical = finding("section.declaration", Severity::Critical);
        let writer = SummaryWriter::a4();
        let lines = writer.layout(&[&minor, &critical]);
        let headings: Vec<&str> = lines
            .iter()
            .filter(|line| line.bold)
            .map(|line| line.text.as_str())
            .collect();
        assert_eq!(headings, vec!["Formatting findings", "CRITICAL (1)", "MINOR (1)"]);
    }

    #[test]
    fn render_produces_loadable_pdf() {
        let findings: Vec<Finding> = (0..120)
            .map(|i| finding(&format!("rule.{i}"), Severity::Major))
            .collect();
        let refs: Vec<&Finding> = findings.iter().collect();
        let bytes = SummaryWriter::a4().render(&refs);
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);

        let empty = SummaryWriter::a4().render(&[]);
        let doc = lopdf::Document::load_mem(&empty).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
