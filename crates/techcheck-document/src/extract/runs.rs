// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run grouping — merges positioned glyphs into text runs that share one font
// and one baseline.

use std::sync::Arc;

use techcheck_core::config::ExtractionConfig;
use techcheck_core::types::{BBox, TextRun};

use super::fonts::FontMetrics;

/// A glyph in page coordinates (points, origin top-left).
#[derive(Debug, Clone)]
pub(crate) struct PlacedGlyph {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub baseline: f64,
    pub size: f64,
    pub font: Arc<FontMetrics>,
}

impl PlacedGlyph {
    fn is_blank(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }

    fn top(&self) -> f64 {
        self.baseline - self.font.ascent / 1000.0 * self.size
    }

    fn bottom(&self) -> f64 {
        self.baseline - self.font.descent / 1000.0 * self.size
    }
}

/// Font size rounded to hundredths of a point, compared as an integer.
fn size_key(size: f64) -> i64 {
    (size * 100.0).round() as i64
}

struct OpenRun {
    text: String,
    x0: f64,
    x1: f64,
    top: f64,
    bottom: f64,
    baseline: f64,
    size: f64,
    font: Arc<FontMetrics>,
}

impl OpenRun {
    fn start(glyph: &PlacedGlyph) -> Self {
        Self {
            text: glyph.text.clone(),
            x0: glyph.x0,
            x1: glyph.x1,
            top: glyph.top(),
            bottom: glyph.bottom(),
            baseline: glyph.baseline,
            size: glyph.size,
            font: Arc::clone(&glyph.font),
        }
    }

    fn same_attributes(&self, glyph: &PlacedGlyph, baseline_tolerance: f64) -> bool {
        self.font.name == glyph.font.name
            && self.font.bold == glyph.font.bold
            && self.font.italic == glyph.font.italic
            && size_key(self.size) == size_key(glyph.size)
            && (self.baseline - glyph.baseline).abs() <= baseline_tolerance
    }

    fn push(&mut self, glyph: &PlacedGlyph, word_gap: f64) {
        let gap = glyph.x0 - self.x1;
        if gap > word_gap
            && !self.text.ends_with(char::is_whitespace)
            && !glyph.text.starts_with(char::is_whitespace)
        {
            self.text.push(' ');
        }
        self.text.push_str(&glyph.text);
        // Spaces carry text but not extent.
        if !glyph.is_blank() {
            self.x1 = self.x1.max(glyph.x1);
            self.x0 = self.x0.min(glyph.x0);
            self.top = self.top.min(glyph.top());
            self.bottom = self.bottom.max(glyph.bottom());
        }
    }

    fn finish(self, width: f64, height: f64) -> Option<TextRun> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        let bbox = BBox::new(
            self.x0.max(0.0),
            self.top.max(0.0),
            self.x1.min(width),
            self.bottom.min(height),
        );
        if !bbox.is_valid() {
            return None;
        }
        Some(TextRun {
            text,
            bbox,
            font_name: self.font.name.clone(),
            font_size: size_key(self.size) as f64 / 100.0,
            bold: self.font.bold,
            italic: self.font.italic,
            baseline: self.baseline,
            furniture: false,
        })
    }
}

/// Group glyphs (in content order) into runs.
///
/// A glyph joins the open run when font name, size, bold and italic match,
/// the baseline is within tolerance and the horizontal gap is at most
/// `merge_gap_em` ems. Runs lying entirely off the page are dropped.
pub(crate) fn group_runs(
    glyphs: &[PlacedGlyph],
    config: &ExtractionConfig,
    width: f64,
    height: f64,
) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut open: Option<OpenRun> = None;

    for glyph in glyphs {
        if let Some(run) = open.as_mut() {
            let gap = glyph.x0 - run.x1;
            let em = run.size.max(f64::EPSILON);
            let joins = run.same_attributes(glyph, config.baseline_tolerance_pt)
                && gap <= config.merge_gap_em * em
                && gap >= -em;
            if joins {
                run.push(glyph, config.word_gap_em * em);
                continue;
            }
        }
        if let Some(done) = open.take().and_then(|run| run.finish(width, height)) {
            runs.push(done);
        }
        if !glyph.is_blank() {
            open = Some(OpenRun::start(glyph));
        }
    }
    if let Some(done) = open.and_then(|run| run.finish(width, height)) {
        runs.push(done);
    }
    runs
}
