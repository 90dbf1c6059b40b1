// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Annotator — overlay findings onto a copy of the submitted thesis.
//
// Located findings become Square annotations (with a Popup carrying the
// message and fix), margin findings also get a dashed Line at the required
// margin, and findings without a location are listed on summary pages
// appended at the end. Page content streams are never touched: only /Annots
// arrays change and new pages are added.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId, StringFormat};
use techcheck_core::error::AnnotationError;
use techcheck_core::types::{BBox, Document, Edge, Finding, MarginGuide, Severity, mm_to_pt};
use tracing::{debug, info, instrument, warn};

use crate::pdf::reader::{self, PageGeometry, PdfError};
use crate::pdf::writer::SummaryWriter;

/// Padding around a located finding's box, in points.
pub const DEFAULT_PADDING_PT: f64 = 2.0;

const AUTHOR: &str = "TechCheck";

/// Stroke colour for a severity (DeviceRGB).
pub fn severity_color(severity: Severity) -> [f32; 3] {
    match severity {
        Severity::Critical => [1.0, 0.0, 0.0],
        Severity::Major => [1.0, 0.5, 0.0],
        Severity::Minor => [1.0, 0.9, 0.0],
    }
}

#[derive(Debug, Clone)]
pub struct Annotator {
    padding_pt: f64,
    summary: SummaryWriter,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            padding_pt: DEFAULT_PADDING_PT,
            summary: SummaryWriter::a4(),
        }
    }
}

impl Annotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_padding(mut self, padding_pt: f64) -> Self {
        self.padding_pt = padding_pt.max(0.0);
        self
    }

    /// Produce annotated document bytes.
    ///
    /// Overlays that cannot be placed are skipped with a warning; only a
    /// failure to reopen or serialise the document is an error.
    #[instrument(skip_all, fields(pages = document.page_count(), findings = findings.len()))]
    pub fn annotate(
        &self,
        document: &Document,
        findings: &[Finding],
    ) -> Result<Vec<u8>, AnnotationError> {
        let mut pdf = PdfDocument::load_mem(document.source_bytes()).map_err(|err| {
            AnnotationError::Unwritable(format!("source document could not be reopened: {err}"))
        })?;
        let page_ids = pdf.get_pages();

        let mut per_page: BTreeMap<ObjectId, Vec<Object>> = BTreeMap::new();
        let mut unlocated: Vec<&Finding> = Vec::new();
        let mut skipped = 0usize;

        for finding in findings {
            let (Some(page), Some(location)) = (finding.page, finding.location) else {
                unlocated.push(finding);
                continue;
            };
            let Some(&page_id) = page_ids.get(&page) else {
                warn!(rule = %finding.rule_id, page, "finding refers to a missing page");
                skipped += 1;
                continue;
            };
            let geometry = reader::page_geometry(&pdf, page_id).unwrap_or(PageGeometry::A4);

            let Some(square) = self.square_annotation(finding, location, &geometry) else {
                warn!(rule = %finding.rule_id, page, ?location, "overlay outside the page, skipped");
                skipped += 1;
                continue;
            };
            let refs = per_page.entry(page_id).or_default();
            refs.extend(add_with_popup(&mut pdf, square, finding));

            if let Some(guide) = finding.margin_guide {
                match margin_line(finding, guide, &geometry) {
                    Some(line) => refs.push(Object::Reference(pdf.add_object(line))),
                    None => warn!(rule = %finding.rule_id, page, "margin guide off the page"),
                }
            }
        }

        let mut placed = 0usize;
        for (page_id, refs) in per_page {
            placed += refs.len();
            if let Err(err) = push_annotations(&mut pdf, page_id, refs) {
                warn!(?page_id, %err, "could not attach annotations to page");
            }
        }

        let mut summary_pages = 0;
        if !unlocated.is_empty() {
            let writer = match document.pages.first() {
                Some(first) => self.summary.clone().with_page_size(first.width_pt, first.height_pt),
                None => self.summary.clone(),
            };
            match append_summary(&mut pdf, &writer, &unlocated) {
                Ok(count) => summary_pages = count,
                Err(err) => warn!(%err, "summary page could not be appended"),
            }
        }

        let mut output = Vec::new();
        pdf.save_to(&mut output)
            .map_err(|err| AnnotationError::Unwritable(err.to_string()))?;

        info!(
            annotations = placed,
            skipped,
            unlocated = unlocated.len(),
            summary_pages,
            "annotation complete"
        );
        Ok(output)
    }

    fn square_annotation(
        &self,
        finding: &Finding,
        location: BBox,
        geometry: &PageGeometry,
    ) -> Option<Dictionary> {
        if !location.fits_within(geometry.width, geometry.height) {
            return None;
        }
        let padded = location.expand(self.padding_pt);
        let padded = BBox::new(
            padded.x0,
            padded.y0,
            padded.x1.min(geometry.width),
            padded.y1.min(geometry.height),
        );
        let rect = user_rect(&padded, geometry);

        let mut dict = annotation_base("Square", rect, finding);
        dict.set("BS", border(1.5, false));
        Some(dict)
    }
}

/// Add `square` with a Popup child; returns the references to attach.
fn add_with_popup(pdf: &mut PdfDocument, square: Dictionary, finding: &Finding) -> [Object; 2] {
    let square_rect = square.get(b"Rect").ok().cloned();
    let square_id = pdf.add_object(square);

    let mut popup = Dictionary::new();
    popup.set("Type", Object::Name(b"Annot".to_vec()));
    popup.set("Subtype", Object::Name(b"Popup".to_vec()));
    popup.set("Parent", Object::Reference(square_id));
    popup.set("Open", Object::Boolean(false));
    if let Some(rect) = square_rect {
        popup.set("Rect", rect);
    }
    popup.set("NM", text_string(&format!("{}-popup", finding.rule_id)));
    let popup_id = pdf.add_object(popup);

    if let Ok(Object::Dictionary(dict)) = pdf.get_object_mut(square_id) {
        dict.set("Popup", Object::Reference(popup_id));
    }
    [Object::Reference(square_id), Object::Reference(popup_id)]
}

/// Dashed line at the required distance from `guide.edge`.
fn margin_line(finding: &Finding, guide: MarginGuide, geometry: &PageGeometry) -> Option<Dictionary> {
    let offset = mm_to_pt(guide.expected_mm);
    let (start, end) = match guide.edge {
        Edge::Left => ((offset, 0.0), (offset, geometry.height)),
        Edge::Right => ((geometry.width - offset, 0.0), (geometry.width - offset, geometry.height)),
        Edge::Top => ((0.0, offset), (geometry.width, offset)),
        Edge::Bottom => ((0.0, geometry.height - offset), (geometry.width, geometry.height - offset)),
    };
    let inside = |(x, y): (f64, f64)| {
        (0.0..=geometry.width).contains(&x) && (0.0..=geometry.height).contains(&y)
    };
    if !inside(start) || !inside(end) {
        return None;
    }

    let (x1, y1) = geometry.to_user(start.0, start.1);
    let (x2, y2) = geometry.to_user(end.0, end.1);
    let rect = [
        x1.min(x2) - 1.0,
        y1.min(y2) - 1.0,
        x1.max(x2) + 1.0,
        y1.max(y2) + 1.0,
    ];

    let mut dict = annotation_base("Line", rect, finding);
    dict.set(
        "L",
        Object::Array(vec![real(x1), real(y1), real(x2), real(y2)]),
    );
    dict.set("BS", border(0.75, true));
    dict.set(
        "Contents",
        text_string(&format!(
            "Required {} margin: {:.0} mm",
            guide.edge.label(),
            guide.expected_mm
        )),
    );
    Some(dict)
}

fn annotation_base(subtype: &str, rect: [f64; 4], finding: &Finding) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Annot".to_vec()));
    dict.set("Subtype", Object::Name(subtype.as_bytes().to_vec()));
    dict.set("Rect", Object::Array(rect.iter().map(|v| real(*v)).collect()));
    dict.set(
        "C",
        Object::Array(
            severity_color(finding.severity)
                .iter()
                .map(|c| Object::Real(*c as _))
                .collect(),
        ),
    );
    // Print flag.
    dict.set("F", Object::Integer(4));
    dict.set("T", text_string(AUTHOR));
    dict.set("Subj", text_string(finding.severity.label()));
    dict.set("NM", text_string(&finding.rule_id));
    dict.set("Contents", text_string(&comment(finding)));
    dict
}

fn comment(finding: &Finding) -> String {
    if finding.fix.is_empty() {
        format!("{}: {}", finding.severity, finding.message)
    } else {
        format!("{}: {}\nFix: {}", finding.severity, finding.message, finding.fix)
    }
}

fn border(width: f64, dashed: bool) -> Object {
    let mut bs = Dictionary::new();
    bs.set("W", real(width));
    if dashed {
        bs.set("S", Object::Name(b"D".to_vec()));
        bs.set("D", Object::Array(vec![Object::Integer(3), Object::Integer(2)]));
    } else {
        bs.set("S", Object::Name(b"S".to_vec()));
    }
    Object::Dictionary(bs)
}

/// `[llx lly urx ury]` in user space for a page-space box.
fn user_rect(bbox: &BBox, geometry: &PageGeometry) -> [f64; 4] {
    let (llx, lly) = geometry.to_user(bbox.x0, bbox.y1);
    let (urx, ury) = geometry.to_user(bbox.x1, bbox.y0);
    [llx, lly, urx, ury]
}

fn real(value: f64) -> Object {
    Object::Real(value as _)
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Append annotation references to a page's /Annots, which may be an inline
/// array, a reference to an array, or absent.
fn push_annotations(
    pdf: &mut PdfDocument,
    page_id: ObjectId,
    refs: Vec<Object>,
) -> Result<(), PdfError> {
    let existing = pdf
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|err| PdfError(format!("failed to get page dictionary: {err}")))?
        .get(b"Annots")
        .ok()
        .cloned();

    match existing {
        Some(Object::Reference(array_id)) => match pdf.get_object_mut(array_id) {
            Ok(Object::Array(items)) => {
                items.extend(refs);
                Ok(())
            }
            _ => Err(PdfError::new("/Annots reference does not point to an array")),
        },
        Some(Object::Array(mut items)) => {
            items.extend(refs);
            set_page_annots(pdf, page_id, items)
        }
        _ => set_page_annots(pdf, page_id, refs),
    }
}

fn set_page_annots(pdf: &mut PdfDocument, page_id: ObjectId, items: Vec<Object>) -> Result<(), PdfError> {
    match pdf.get_object_mut(page_id) {
        Ok(Object::Dictionary(dict)) => {
            dict.set("Annots", Object::Array(items));
            Ok(())
        }
        _ => Err(PdfError::new("page object is not a dictionary")),
    }
}

fn append_summary(
    pdf: &mut PdfDocument,
    writer: &SummaryWriter,
    findings: &[&Finding],
) -> Result<usize, PdfError> {
    let bytes = writer.render(findings);
    let summary = PdfDocument::load_mem(&bytes)
        .map_err(|err| PdfError(format!("summary page could not be reloaded: {err}")))?;
    let count = reader::append_pages(&summary, pdf)?;
    debug!(count, "summary pages appended");
    Ok(count)
}

/// Annotate with the default padding.
pub fn annotate(document: &Document, findings: &[Finding]) -> Result<Vec<u8>, AnnotationError> {
    Annotator::default().annotate(document, findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::fixtures::{self, FixturePage};

    fn located(page: u32, bbox: BBox) -> Finding {
        Finding::new(
            "margins.left",
            Severity::Major,
            "Left margin is 20.0 mm, expected 30 mm",
            "Set the left margin to 30 mm.",
        )
        .on_page(page)
        .at(Some(bbox))
    }

    fn page_annots(bytes: &[u8], page: u32) -> Vec<Dictionary> {
        let pdf = PdfDocument::load_mem(bytes).unwrap();
        let page_id = pdf.get_pages()[&page];
        let dict = pdf.get_object(page_id).unwrap().as_dict().unwrap();
        let Ok(annots) = dict.get(b"Annots") else {
            return Vec::new();
        };
        let annots = reader::resolve(&pdf, annots).as_array().unwrap();
        annots
            .iter()
            .map(|obj| reader::resolve(&pdf, obj).as_dict().unwrap().clone())
            .collect()
    }

    fn subtype(dict: &Dictionary) -> Vec<u8> {
        dict.get(b"Subtype").unwrap().as_name().unwrap().to_vec()
    }

    #[test]
    fn located_finding_adds_square_and_popup_without_touching_text() {
        let document = extract(&fixtures::thesis_pdf()).unwrap();
        let run = document.pages[5].runs[0].clone();
        let bytes = annotate(&document, &[located(6, run.bbox)]).unwrap();

        let annotated = extract(&bytes).unwrap();
        assert_eq!(annotated.page_count(), document.page_count());
        for (before, after) in document.pages.iter().zip(&annotated.pages) {
            assert_eq!(before.text, after.text);
        }

        let annots = page_annots(&bytes, 6);
        let kinds: Vec<Vec<u8>> = annots.iter().map(subtype).collect();
        assert_eq!(kinds, vec![b"Square".to_vec(), b"Popup".to_vec()]);
        let color = annots[0].get(b"C").unwrap().as_array().unwrap();
        assert_eq!(color.len(), 3);
        assert!(page_annots(&bytes, 5).is_empty());
    }

    #[test]
    fn square_rect_is_padded_and_flipped_to_user_space() {
        let bbox = BBox::new(85.0, 100.0, 200.0, 112.0);
        let finding = located(1, bbox);
        let square = Annotator::default()
            .square_annotation(&finding, bbox, &PageGeometry::A4)
            .unwrap();
        let rect: Vec<f64> = square
            .get(b"Rect")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|obj| reader::object_to_f64(obj).unwrap())
            .collect();
        let height = PageGeometry::A4.height;
        assert!((rect[0] - 83.0).abs() < 1e-3);
        assert!((rect[1] - (height - 114.0)).abs() < 1e-3);
        assert!((rect[2] - 202.0).abs() < 1e-3);
        assert!((rect[3] - (height - 98.0)).abs() < 1e-3);
    }

    #[test]
    fn margin_guide_adds_line_annotation() {
        let document = extract(&fixtures::thesis_pdf()).unwrap();
        let run = document.pages[5].runs[0].clone();
        let finding = located(6, run.bbox).with_margin_guide(MarginGuide {
            edge: Edge::Left,
            expected_mm: 30.0,
        });
        let bytes = annotate(&document, &[finding]).unwrap();
        let kinds: Vec<Vec<u8>> = page_annots(&bytes, 6).iter().map(subtype).collect();
        assert!(kinds.contains(&b"Line".to_vec()));
    }

    #[test]
    fn unlocated_findings_append_summary_page() {
        let document = extract(&fixtures::thesis_pdf()).unwrap();
        let missing = Finding::new(
            "section.declaration",
            Severity::Critical,
            "Required section DECLARATION is missing",
            "Add the signed declaration of authorship.",
        );
        let bytes = annotate(&document, &[missing]).unwrap();
        let pdf = PdfDocument::load_mem(&bytes).unwrap();
        assert_eq!(pdf.get_pages().len(), document.page_count() + 1);

        let annotated = extract(&bytes).unwrap();
        for (before, after) in document.pages.iter().zip(&annotated.pages) {
            assert_eq!(before.text, after.text);
        }
    }

    #[test]
    fn no_findings_keeps_page_count() {
        let document = extract(&fixtures::thesis_pdf()).unwrap();
        let bytes = annotate(&document, &[]).unwrap();
        let pdf = PdfDocument::load_mem(&bytes).unwrap();
        assert_eq!(pdf.get_pages().len(), document.page_count());
    }

    #[test]
    fn out_of_page_overlay_is_skipped() {
        let document = extract(&fixtures::build(&[FixturePage::body("kratko")])).unwrap();
        let outside = located(1, BBox::new(500.0, 100.0, 900.0, 120.0));
        let missing_page = located(7, BBox::new(10.0, 10.0, 20.0, 20.0));
        let bytes = annotate(&document, &[outside, missing_page]).unwrap();
        assert!(page_annots(&bytes, 1).is_empty());
        let pdf = PdfDocument::load_mem(&bytes).unwrap();
        assert_eq!(pdf.get_pages().len(), 1);
    }

    #[test]
    fn existing_annots_reference_is_extended() {
        let bytes = fixtures::build(&[FixturePage::body("besedilo")]);
        let mut pdf = PdfDocument::load_mem(&bytes).unwrap();
        let page_id = pdf.get_pages()[&1];
        let mut link = Dictionary::new();
        link.set("Type", Object::Name(b"Annot".to_vec()));
        link.set("Subtype", Object::Name(b"Link".to_vec()));
        let link_id = pdf.add_object(link);
        let array_id = pdf.add_object(Object::Array(vec![Object::Reference(link_id)]));
        if let Ok(Object::Dictionary(dict)) = pdf.get_object_mut(page_id) {
            dict.set("Annots", Object::Reference(array_id));
        }

        push_annotations(&mut pdf, page_id, vec![Object::Null]).unwrap();
        let items = pdf.get_object(array_id).unwrap().as_array().unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn non_ascii_comments_use_utf16() {
        assert!(matches!(
            text_string("ok"),
            Object::String(ref bytes, StringFormat::Literal) if bytes == b"ok"
        ));
        let Object::String(bytes, StringFormat::Hexadecimal) = text_string("Ž") else {
            panic!("expected hex string");
        };
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x01, 0x7D]);
    }

    #[test]
    fn unreadable_source_is_unwritable() {
        let err = annotate(&Document::default(), &[]).unwrap_err();
        assert!(matches!(err, AnnotationError::Unwritable(_)));
    }
}
