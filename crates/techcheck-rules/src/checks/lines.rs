// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text lines with their boxes, rebuilt from a page's content runs.

use techcheck_core::types::{BBox, Page};

/// One visual line of content text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub page: u32,
    pub text: String,
    pub bbox: BBox,
    /// Baseline and size of the line's first run.
    pub baseline: f64,
    pub font_size: f64,
}

/// Content lines of `page` in reading order. Runs on one line are joined
/// with a space when separated by a visible gap.
pub fn text_lines(page: &Page) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut last: Option<(f64, f64, f64)> = None;

    for run in page.content_runs() {
        let text = run.text.trim();
        if text.is_empty() {
            continue;
        }
        let same_line = last.is_some_and(|(baseline, size, _)| {
            (run.baseline - baseline).abs() <= 0.5 * size.min(run.font_size)
        });
        match lines.last_mut() {
            Some(line) if same_line => {
                let previous_x1 = last.map_or(run.bbox.x0, |(_, _, x1)| x1);
                if run.bbox.x0 - previous_x1 > 0.1 * run.font_size {
                    line.text.push(' ');
                }
                line.text.push_str(text);
                line.bbox = line.bbox.union(&run.bbox);
            }
            _ => lines.push(TextLine {
                page: page.index,
                text: text.to_string(),
                bbox: run.bbox,
                baseline: run.baseline,
                font_size: run.font_size,
            }),
        }
        last = Some((run.baseline, run.font_size, run.bbox.x1));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use techcheck_core::types::{PageRole, TextRun};

    fn run(text: &str, x0: f64, x1: f64, baseline: f64) -> TextRun {
        TextRun {
            text: text.into(),
            bbox: BBox::new(x0, baseline - 9.6, x1, baseline + 2.4),
            font_name: "TimesNewRomanPSMT".into(),
            font_size: 12.0,
            bold: false,
            italic: false,
            baseline,
            furniture: false,
        }
    }

    #[test]
    fn runs_on_one_baseline_form_one_line() {
        let mut footer = run("3", 290.0, 296.0, 800.0);
        footer.furniture = true;
        let page = Page {
            index: 3,
            width_pt: 595.0,
            height_pt: 842.0,
            text: String::new(),
            runs: vec![
                run("UNIVERZA", 85.0, 140.0, 100.0),
                run("V LJUBLJANI", 144.0, 220.0, 100.2),
                run("Magistrsko delo", 85.0, 170.0, 130.0),
                footer,
            ],
            margins: None,
            dominant_font: None,
            role: PageRole::Title,
            warnings: Vec::new(),
        };
        let lines = text_lines(&page);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "UNIVERZA V LJUBLJANI");
        assert_eq!(lines[0].bbox.x0, 85.0);
        assert_eq!(lines[0].bbox.x1, 220.0);
        assert_eq!(lines[1].page, 3);
        assert_eq!(lines[1].baseline, 130.0);
        assert_eq!(lines[1].font_size, 12.0);
    }
}
