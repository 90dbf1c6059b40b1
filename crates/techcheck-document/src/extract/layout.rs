// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page layout — furniture detection, margins, dominant font and line text.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use techcheck_core::config::ExtractionConfig;
use techcheck_core::types::{FontInfo, Margins, TextRun, pt_to_mm};

/// Digit runs and standalone roman numerals, which vary between pages.
static NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+|\b[ivxlcdm]+\b").expect("numbering pattern"));

/// Key identifying a run that may recur on every page.
fn furniture_key(run: &TextRun, page_height: f64, bucket: f64) -> (i64, String) {
    let relative = (run.bbox.y0 + run.bbox.y1) / 2.0 / page_height.max(1.0);
    let slot = (relative / bucket.max(1e-6)).floor() as i64;
    let text = NUMBERING.replace_all(run.text.trim(), "#").to_lowercase();
    (slot, text)
}

/// Flag runs whose key recurs on more than `furniture_page_ratio` of the
/// pages (and on at least two pages) as headers, footers or page numbers.
pub fn mark_furniture(pages: &mut [(f64, Vec<TextRun>)], config: &ExtractionConfig) {
    let page_count = pages.len();
    if page_count < 2 {
        return;
    }

    let mut seen: HashMap<(i64, String), usize> = HashMap::new();
    for (height, runs) in pages.iter() {
        let keys: HashSet<_> = runs
            .iter()
            .map(|run| furniture_key(run, *height, config.furniture_bucket))
            .collect();
        for key in keys {
            *seen.entry(key).or_default() += 1;
        }
    }

    let threshold = config.furniture_page_ratio * page_count as f64;
    for (height, runs) in pages.iter_mut() {
        for run in runs.iter_mut() {
            let key = furniture_key(run, *height, config.furniture_bucket);
            let count = seen.get(&key).copied().unwrap_or(0);
            run.furniture = count >= 2 && count as f64 > threshold;
        }
    }
}

/// Margins in millimetres from the page edges to the nearest non-furniture
/// run. `None` when the page has no such run.
pub fn compute_margins(runs: &[TextRun], width_pt: f64, height_pt: f64) -> Option<Margins> {
    let mut content = runs.iter().filter(|run| !run.furniture);
    let first = content.next()?;
    let mut bounds = first.bbox;
    for run in content {
        bounds = bounds.union(&run.bbox);
    }
    Some(Margins {
        left: pt_to_mm(bounds.x0.max(0.0)),
        right: pt_to_mm((width_pt - bounds.x1).max(0.0)),
        top: pt_to_mm(bounds.y0.max(0.0)),
        bottom: pt_to_mm((height_pt - bounds.y1).max(0.0)),
    })
}

/// The (font, size) covering the most characters of content text.
pub fn dominant_font(runs: &[TextRun]) -> Option<FontInfo> {
    let mut coverage: BTreeMap<(String, i64), usize> = BTreeMap::new();
    for run in runs.iter().filter(|run| !run.furniture) {
        let chars = run.text.chars().filter(|c| !c.is_whitespace()).count();
        let key = (run.font_name.clone(), (run.font_size * 100.0).round() as i64);
        *coverage.entry(key).or_default() += chars;
    }
    // Ties go to the first key in order, so the choice is deterministic.
    let mut best: Option<(&(String, i64), usize)> = None;
    for (key, chars) in &coverage {
        if best.is_none_or(|(_, most)| *chars > most) {
            best = Some((key, *chars));
        }
    }
    best.filter(|(_, chars)| *chars > 0)
        .map(|((name, size), _)| FontInfo {
            name: name.clone(),
            size: *size as f64 / 100.0,
        })
}

/// Sort runs into reading order (line by line, then left to right).
pub fn reading_order(runs: &mut [TextRun], tolerance: f64) {
    runs.sort_by(|a, b| {
        a.baseline
            .total_cmp(&b.baseline)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    // Runs on one line may differ in baseline by up to the tolerance; order
    // those by x without disturbing the line order.
    let mut start = 0;
    while start < runs.len() {
        let mut end = start + 1;
        while end < runs.len() && runs[end].baseline - runs[start].baseline <= tolerance {
            end += 1;
        }
        runs[start..end].sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        start = end;
    }
}

/// Page text: runs on one line joined (with a space where there is a word
/// gap), lines separated by newlines. Expects runs in reading order.
pub fn page_text(runs: &[TextRun], config: &ExtractionConfig) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut previous: Option<&TextRun> = None;

    for run in runs {
        match previous {
            Some(prev) if same_line(prev, run, config) => {
                let gap = run.bbox.x0 - prev.bbox.x1;
                if gap > config.word_gap_em * prev.font_size.max(run.font_size) {
                    current.push(' ');
                }
                current.push_str(&run.text);
            }
            Some(_) => {
                lines.push(std::mem::take(&mut current));
                current.push_str(&run.text);
            }
            None => current.push_str(&run.text),
        }
        previous = Some(run);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

fn same_line(a: &TextRun, b: &TextRun, config: &ExtractionConfig) -> bool {
    // Superscripts sit up to half an em off the baseline.
    let tolerance = config
        .baseline_tolerance_pt
        .max(0.5 * a.font_size.min(b.font_size));
    (a.baseline - b.baseline).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use techcheck_core::types::BBox;

    fn run(text: &str, x0: f64, y0: f64, x1: f64) -> TextRun {
        TextRun {
            text: text.into(),
            bbox: BBox::new(x0, y0, x1, y0 + 12.0),
            font_name: "Times-Roman".into(),
            font_size: 12.0,
            bold: false,
            italic: false,
            baseline: y0 + 9.6,
            furniture: false,
        }
    }

    #[test]
    fn margins_measure_nearest_run() {
        let runs = vec![run("a", 85.04, 70.87, 300.0), run("b", 100.0, 400.0, 524.4)];
        let margins = compute_margins(&runs, 595.276, 841.89).unwrap();
        assert!((margins.left - 30.0).abs() < 0.01);
        assert!((margins.top - 25.0).abs() < 0.01);
        assert!((margins.right - 25.0).abs() < 0.01);
        assert!(margins.bottom > 100.0);
    }

    #[test]
    fn margins_are_none_without_content() {
        assert!(compute_margins(&[], 595.0, 842.0).is_none());
        let mut footer = run("1", 290.0, 800.0, 296.0);
        footer.furniture = true;
        assert!(compute_margins(&[footer], 595.0, 842.0).is_none());
    }

    #[test]
    fn closer_run_never_increases_margin() {
        let mut runs = vec![run("a", 85.0, 80.0, 400.0)];
        let before = compute_margins(&runs, 595.0, 842.0).unwrap();
        runs.push(run("b", 40.0, 60.0, 560.0));
        let after = compute_margins(&runs, 595.0, 842.0).unwrap();
        assert!(after.left <= before.left);
        assert!(after.top <= before.top);
        assert!(after.right <= before.right);
        assert!(after.bottom <= before.bottom);
    }

    #[test]
    fn page_numbers_and_headers_become_furniture() {
        let config = ExtractionConfig::default();
        let mut pages: Vec<(f64, Vec<TextRun>)> = (1..=4)
            .map(|n| {
                (
                    842.0,
                    vec![
                        run("Magistrsko delo", 85.0, 40.0, 200.0),
                        run(&format!("Body text {n}a"), 85.0, 100.0 + n as f64 * 30.0, 400.0),
                        run(&n.to_string(), 290.0, 800.0, 296.0),
                    ],
                )
            })
            .collect();
        mark_furniture(&mut pages, &config);
        for (_, runs) in &pages {
            assert!(runs[0].furniture, "header");
            assert!(!runs[1].furniture, "body");
            assert!(runs[2].furniture, "page number");
        }
    }

    #[test]
    fn single_page_has_no_furniture() {
        let mut pages = vec![(842.0, vec![run("1", 290.0, 800.0, 296.0)])];
        mark_furniture(&mut pages, &ExtractionConfig::default());
        assert!(!pages[0].1[0].furniture);
    }

    #[test]
    fn dominant_font_counts_characters() {
        let mut heading = run("Heading", 85.0, 80.0, 200.0);
        heading.font_size = 16.0;
        let body = run("a much longer body paragraph", 85.0, 120.0, 400.0);
        let font = dominant_font(&[heading, body]).unwrap();
        assert_eq!(font.name, "Times-Roman");
        assert_eq!(font.size, 12.0);
    }

    #[test]
    fn page_text_joins_lines_in_reading_order() {
        let config = ExtractionConfig::default();
        let mut runs = vec![
            run("second", 85.0, 120.0, 130.0),
            run("LJUBLJANI", 160.0, 80.0, 230.0),
            run("UNIVERZA V", 85.0, 80.0, 155.0),
        ];
        reading_order(&mut runs, config.baseline_tolerance_pt);
        assert_eq!(page_text(&runs, &config), "UNIVERZA V LJUBLJANI\nsecond");
    }
}
