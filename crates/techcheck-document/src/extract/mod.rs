// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Feature extractor — turns PDF bytes into a `Document` of pages with text
// runs, margins and dominant fonts.
//
// Pages are interpreted independently (in parallel when enabled) and merged
// by page index. A page whose content cannot be parsed becomes an empty page
// carrying a warning; only a document with no parseable page is an error.

pub mod fonts;
pub mod interpreter;
pub mod layout;
pub mod runs;

use std::sync::Arc;

use lopdf::ObjectId;
use rayon::prelude::*;
use techcheck_core::config::ExtractionConfig;
use techcheck_core::error::ExtractionError;
use techcheck_core::integrity::fingerprint;
use techcheck_core::types::{Document, Page, PageRole, TextRun};
use tracing::{debug, info, instrument, warn};

use crate::pdf::reader::{PageGeometry, PdfError, PdfReader};
use interpreter::Interpreter;
use runs::{PlacedGlyph, group_runs};

pub use layout::compute_margins;

/// Extracts layout features from PDF documents.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractionConfig,
}

/// Runs of one page before document-wide passes.
struct PageDraft {
    index: u32,
    geometry: PageGeometry,
    runs: Vec<TextRun>,
    warnings: Vec<String>,
    parsed: bool,
}

impl PageDraft {
    fn failed(index: u32, reason: impl std::fmt::Display) -> Self {
        Self {
            index,
            geometry: PageGeometry::A4,
            runs: Vec::new(),
            warnings: vec![format!("page could not be parsed: {reason}")],
            parsed: false,
        }
    }
}

impl Extractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract a `Document` from PDF bytes.
    ///
    /// The result depends only on `data` and the configuration.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn extract(&self, data: &[u8]) -> Result<Document, ExtractionError> {
        let reader = PdfReader::from_bytes(data)?;
        let indexed: Vec<(u32, ObjectId)> = reader
            .page_ids()
            .iter()
            .enumerate()
            .map(|(i, id)| (i as u32 + 1, *id))
            .collect();

        let mut drafts: Vec<PageDraft> = if self.config.parallel {
            // Each worker thread opens its own reader; object ids are stable
            // across loads of the same bytes.
            indexed
                .par_iter()
                .map_init(
                    || PdfReader::from_bytes(data).ok(),
                    |local, (index, id)| match local {
                        Some(local) => self.extract_page(local, *index, *id),
                        None => PageDraft::failed(*index, "document could not be reopened"),
                    },
                )
                .collect()
        } else {
            indexed
                .iter()
                .map(|(index, id)| self.extract_page(&reader, *index, *id))
                .collect()
        };
        drafts.sort_by_key(|draft| draft.index);

        let parsed = drafts.iter().filter(|draft| draft.parsed).count();
        let recovered_text = drafts.iter().any(|draft| !draft.runs.is_empty());
        if reader.has_encryption_marker() && !recovered_text {
            warn!(parsed, "encrypted document yielded no text");
            return Err(ExtractionError::Encrypted);
        }
        if parsed == 0 {
            return Err(ExtractionError::Unreadable(format!(
                "none of the {} pages could be parsed",
                drafts.len()
            )));
        }

        let mut furniture_input: Vec<(f64, Vec<TextRun>)> = drafts
            .iter_mut()
            .map(|draft| (draft.geometry.height, std::mem::take(&mut draft.runs)))
            .collect();
        layout::mark_furniture(&mut furniture_input, &self.config);

        let mut warnings = Vec::new();
        let pages: Vec<Page> = drafts
            .into_iter()
            .zip(furniture_input)
            .map(|(draft, (_, mut runs))| {
                for warning in &draft.warnings {
                    warnings.push(format!("page {}: {warning}", draft.index));
                }
                layout::reading_order(&mut runs, self.config.baseline_tolerance_pt);
                let text = layout::page_text(&runs, &self.config);
                Page {
                    index: draft.index,
                    width_pt: draft.geometry.width,
                    height_pt: draft.geometry.height,
                    margins: layout::compute_margins(
                        &runs,
                        draft.geometry.width,
                        draft.geometry.height,
                    ),
                    dominant_font: layout::dominant_font(&runs),
                    text,
                    runs,
                    role: PageRole::Unknown,
                    warnings: draft.warnings,
                }
            })
            .collect();

        let run_count: usize = pages.iter().map(|page| page.runs.len()).sum();
        info!(
            pages = pages.len(),
            parsed,
            runs = run_count,
            "extraction complete"
        );

        Ok(Document {
            content_hash: fingerprint(data),
            pages,
            warnings,
            source: Arc::new(data.to_vec()),
        })
    }

    fn extract_page(&self, reader: &PdfReader, index: u32, page_id: ObjectId) -> PageDraft {
        let geometry = match reader.page_geometry(page_id) {
            Ok(geometry) => geometry,
            Err(err) => {
                warn!(index, %err, "unusable MediaBox, assuming A4");
                PageGeometry::A4
            }
        };

        match self.page_runs(reader, page_id, &geometry) {
            Ok((runs, skipped)) => {
                let mut warnings = Vec::new();
                if skipped > 0 {
                    warnings.push(format!("{skipped} content operators could not be applied"));
                }
                debug!(index, runs = runs.len(), skipped, "page extracted");
                PageDraft {
                    index,
                    geometry,
                    runs,
                    warnings,
                    parsed: true,
                }
            }
            Err(err) => {
                warn!(index, %err, "page could not be parsed");
                PageDraft {
                    geometry,
                    ..PageDraft::failed(index, err)
                }
            }
        }
    }

    fn page_runs(
        &self,
        reader: &PdfReader,
        page_id: ObjectId,
        geometry: &PageGeometry,
    ) -> Result<(Vec<TextRun>, usize), PdfError> {
        let content = reader.page_content(page_id)?;
        let resources = reader.page_resources(page_id)?;

        let mut interpreter = Interpreter::new(reader.document(), self.config.max_xobject_depth);
        interpreter.run_page(&content, resources)?;
        let skipped = interpreter.skipped;

        let glyphs: Vec<PlacedGlyph> = interpreter
            .into_glyphs()
            .into_iter()
            .map(|glyph| {
                let (x0, baseline) = geometry.to_page(glyph.x0, glyph.baseline);
                let (x1, _) = geometry.to_page(glyph.x1, glyph.baseline);
                PlacedGlyph {
                    text: glyph.text,
                    x0,
                    x1,
                    baseline,
                    size: glyph.size,
                    font: glyph.font,
                }
            })
            .collect();

        Ok((
            group_runs(&glyphs, &self.config, geometry.width, geometry.height),
            skipped,
        ))
    }
}

/// Extract with the default configuration.
pub fn extract(data: &[u8]) -> Result<Document, ExtractionError> {
    Extractor::default().extract(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FixturePage};

    #[test]
    fn extracts_runs_and_margins_from_fixture() {
        let bytes = fixtures::build(&[FixturePage::body("Prvi odstavek besedila.")]);
        let document = extract(&bytes).unwrap();

        assert_eq!(document.page_count(), 1);
        let page = &document.pages[0];
        assert_eq!(page.index, 1);
        assert!(page.text.contains("Prvi odstavek besedila."));
        let margins = page.margins.expect("margins");
        assert!((margins.left - 30.0).abs() < 0.1, "left = {}", margins.left);
        assert!(margins.top > 24.9, "top = {}", margins.top);
        let font = page.dominant_font.as_ref().expect("font");
        assert_eq!(font.name, "TimesNewRomanPSMT");
        assert_eq!(font.size, 12.0);
        for run in &page.runs {
            assert!(run.bbox.is_valid());
        }
    }

    #[test]
    fn non_ascii_text_decodes_through_to_unicode() {
        let bytes = fixtures::build(&[FixturePage::new().line("FAKULTETA ZA DRUŽBENE VEDE", 30.0, 40.0, 12.0)]);
        let document = extract(&bytes).unwrap();
        assert_eq!(document.pages[0].text, "FAKULTETA ZA DRUŽBENE VEDE");
    }

    #[test]
    fn extraction_is_idempotent() {
        let bytes = fixtures::thesis_pdf();
        let first = extract(&bytes).unwrap();
        let second = extract(&bytes).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.content_hash, fingerprint(&bytes));
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let bytes = fixtures::thesis_pdf();
        let parallel = extract(&bytes).unwrap();
        let sequential = Extractor::new(ExtractionConfig {
            parallel: false,
            ..ExtractionConfig::default()
        })
        .extract(&bytes)
        .unwrap();
        assert_eq!(parallel.pages, sequential.pages);
    }

    #[test]
    fn page_numbers_are_furniture_and_excluded_from_margins() {
        let bytes = fixtures::thesis_pdf();
        let document = extract(&bytes).unwrap();
        let body = document
            .pages
            .iter()
            .find(|page| page.text.contains("UVOD"))
            .expect("body page");
        assert!(body.runs.iter().any(|run| run.furniture));
        let margins = body.margins.expect("margins");
        assert!(margins.bottom > 25.0, "bottom = {}", margins.bottom);
    }

    #[test]
    fn broken_page_degrades_to_empty_page() {
        let bytes = fixtures::build_with_broken_page(&[FixturePage::body("dobra stran")], 2);
        let document = extract(&bytes).unwrap();
        assert_eq!(document.page_count(), 2);
        let broken = document.page(2).unwrap();
        assert!(broken.runs.is_empty());
        assert!(broken.margins.is_none());
        assert!(!broken.warnings.is_empty());
        assert!(!document.warnings.is_empty());
    }

    #[test]
    fn encrypted_document_is_rejected() {
        let err = extract(&fixtures::encrypted_pdf()).unwrap_err();
        assert_eq!(err, ExtractionError::Encrypted);
    }

    #[test]
    fn empty_input_is_unreadable() {
        assert!(matches!(extract(b""), Err(ExtractionError::Unreadable(_))));
    }
}
