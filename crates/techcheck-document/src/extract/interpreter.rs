// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content stream interpreter — walks page operators and emits positioned
// glyphs in PDF user space.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::fonts::FontMetrics;
use crate::pdf::reader::{PdfError, decode_stream, object_to_f64, resolve};

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let v: Vec<f64> = operands[..6]
            .iter()
            .map(|o| object_to_f64(o).ok())
            .collect::<Option<_>>()?;
        Some(Self {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of the transformed unit vertical vector.
    fn vertical_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// One shown glyph in user space.
#[derive(Debug, Clone)]
pub(crate) struct Glyph {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub baseline: f64,
    /// Font size after text matrix and CTM scaling.
    pub size: f64,
    pub font: Arc<FontMetrics>,
}

#[derive(Debug, Clone)]
struct TextState {
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
    font: Option<Arc<FontMetrics>>,
    size: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            size: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// Interprets content streams of one page, including nested Form XObjects.
pub(crate) struct Interpreter<'a> {
    doc: &'a Document,
    max_depth: u32,
    fonts: HashMap<FontKey, Arc<FontMetrics>>,
    glyphs: Vec<Glyph>,
    /// Operators that could not be applied.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FontKey {
    Object(ObjectId),
    Inline(usize, Vec<u8>),
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a Document, max_depth: u32) -> Self {
        Self {
            doc,
            max_depth,
            fonts: HashMap::new(),
            glyphs: Vec::new(),
            skipped: 0,
        }
    }

    pub fn into_glyphs(self) -> Vec<Glyph> {
        self.glyphs
    }

    /// Run a page's content stream.
    pub fn run_page(&mut self, content: &[u8], resources: Option<&Dictionary>) -> Result<(), PdfError> {
        self.run(content, resources, Matrix::IDENTITY, 0)
    }

    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&Dictionary>,
        ctm: Matrix,
        depth: u32,
    ) -> Result<(), PdfError> {
        let content = Content::decode(content)
            .map_err(|err| PdfError(format!("failed to decode content stream: {err}")))?;

        let mut state = GraphicsState {
            ctm,
            text: TextState::default(),
        };
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let operands = op.operands.as_slice();
            let number = |i: usize| operands.get(i).and_then(|o| object_to_f64(o).ok());

            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => match Matrix::from_operands(operands) {
                    Some(m) => state.ctm = m.then(&state.ctm),
                    None => self.skipped += 1,
                },
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    let name = operands.first().and_then(|o| o.as_name().ok());
                    match (name, number(1)) {
                        (Some(name), Some(size)) => {
                            state.text.font = Some(self.font(resources, name));
                            state.text.size = size;
                        }
                        _ => self.skipped += 1,
                    }
                }
                "Td" | "TD" => match (number(0), number(1)) {
                    (Some(tx), Some(ty)) => {
                        if op.operator == "TD" {
                            state.text.leading = -ty;
                        }
                        tlm = Matrix::translate(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                    _ => self.skipped += 1,
                },
                "Tm" => match Matrix::from_operands(operands) {
                    Some(m) => {
                        tlm = m;
                        tm = m;
                    }
                    None => self.skipped += 1,
                },
                "T*" => {
                    tlm = Matrix::translate(0.0, -state.text.leading).then(&tlm);
                    tm = tlm;
                }
                "TL" => state.text.leading = number(0).unwrap_or(state.text.leading),
                "Tc" => state.text.char_spacing = number(0).unwrap_or(state.text.char_spacing),
                "Tw" => state.text.word_spacing = number(0).unwrap_or(state.text.word_spacing),
                "Tz" => {
                    state.text.horizontal_scale =
                        number(0).map(|v| v / 100.0).unwrap_or(state.text.horizontal_scale)
                }
                "Ts" => state.text.rise = number(0).unwrap_or(state.text.rise),
                "Tj" => match operands.first() {
                    Some(Object::String(bytes, _)) => self.show(bytes, &state, &mut tm),
                    _ => self.skipped += 1,
                },
                "'" => {
                    tlm = Matrix::translate(0.0, -state.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, &state, &mut tm);
                    }
                }
                "\"" => {
                    state.text.word_spacing = number(0).unwrap_or(state.text.word_spacing);
                    state.text.char_spacing = number(1).unwrap_or(state.text.char_spacing);
                    tlm = Matrix::translate(0.0, -state.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(bytes, &state, &mut tm);
                    }
                }
                "TJ" => match operands.first() {
                    Some(Object::Array(items)) => {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes, &state, &mut tm),
                                other => {
                                    if let Ok(adjust) = object_to_f64(other) {
                                        let tx = -adjust / 1000.0
                                            * state.text.size
                                            * state.text.horizontal_scale;
                                        tm = Matrix::translate(tx, 0.0).then(&tm);
                                    }
                                }
                            }
                        }
                    }
                    _ => self.skipped += 1,
                },
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.do_xobject(resources, name, state.ctm, depth);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Emit glyphs for one string operand and advance the text matrix.
    fn show(&mut self, bytes: &[u8], state: &GraphicsState, tm: &mut Matrix) {
        let text = &state.text;
        let font = text
            .font
            .clone()
            .unwrap_or_else(|| Arc::new(FontMetrics::unknown()));
        let single_byte = !font.two_byte;

        for (code, chunk) in font.decode(bytes) {
            let w0 = font.width(code) / 1000.0;
            let glyph_width = w0 * text.size * text.horizontal_scale;
            let to_user = tm.then(&state.ctm);
            let (x0, baseline) = to_user.apply(0.0, text.rise);
            let (x1, _) = to_user.apply(glyph_width, text.rise);

            if !chunk.is_empty() {
                self.glyphs.push(Glyph {
                    text: chunk,
                    x0: x0.min(x1),
                    x1: x0.max(x1),
                    baseline,
                    size: text.size * to_user.vertical_scale(),
                    font: Arc::clone(&font),
                });
            }

            let word_spacing = if single_byte && code == 32 {
                text.word_spacing
            } else {
                0.0
            };
            let advance = (w0 * text.size + text.char_spacing + word_spacing) * text.horizontal_scale;
            *tm = Matrix::translate(advance, 0.0).then(tm);
        }
    }

    fn do_xobject(&mut self, resources: Option<&Dictionary>, name: &[u8], ctm: Matrix, depth: u32) {
        if depth >= self.max_depth {
            warn!(depth, "form XObject nesting too deep, skipping");
            self.skipped += 1;
            return;
        }
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|obj| resolve(doc, obj).as_stream().ok())
        else {
            self.skipped += 1;
            return;
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|subtype| subtype == b"Form")
            .unwrap_or(false);
        if !is_form {
            return;
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_array().ok())
            .and_then(|values| Matrix::from_operands(values))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .or(resources);

        match decode_stream(stream) {
            Ok(bytes) => {
                if let Err(err) = self.run(&bytes, form_resources, matrix.then(&ctm), depth + 1) {
                    debug!(%err, "form XObject content skipped");
                    self.skipped += 1;
                }
            }
            Err(err) => {
                debug!(%err, "form XObject stream unreadable");
                self.skipped += 1;
            }
        }
    }

    fn font(&mut self, resources: Option<&Dictionary>, name: &[u8]) -> Arc<FontMetrics> {
        let doc = self.doc;
        let Some(entry) = resources
            .and_then(|res| res.get(b"Font").ok())
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .and_then(|fonts| fonts.get(name).ok())
        else {
            return Arc::new(FontMetrics::unknown());
        };

        let key = match entry {
            Object::Reference(id) => FontKey::Object(*id),
            _ => FontKey::Inline(resources.map_or(0, |r| r as *const Dictionary as usize), name.to_vec()),
        };
        if let Some(cached) = self.fonts.get(&key) {
            return Arc::clone(cached);
        }

        let metrics = match resolve(doc, entry).as_dict() {
            Ok(dict) => FontMetrics::from_dict(doc, dict),
            Err(_) => FontMetrics::unknown(),
        };
        let metrics = Arc::new(metrics);
        self.fonts.insert(key, Arc::clone(&metrics));
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(content: &[u8]) -> Vec<Glyph> {
        let doc = Document::with_version("1.5");
        let mut interpreter = Interpreter::new(&doc, 4);
        interpreter.run_page(content, None).unwrap();
        interpreter.into_glyphs()
    }

    #[test]
    fn matrix_composition_applies_left_first() {
        let scale = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        let m = Matrix::translate(10.0, 0.0).then(&scale);
        assert_eq!(m.apply(0.0, 0.0), (20.0, 0.0));
        let m = scale.then(&Matrix::translate(10.0, 0.0));
        assert_eq!(m.apply(1.0, 0.0), (12.0, 0.0));
    }

    #[test]
    fn td_positions_and_advances_glyphs() {
        let glyphs = run(b"BT /F1 10 Tf 100 700 Td (AB) Tj ET");
        assert_eq!(glyphs.len(), 2);
        assert!((glyphs[0].x0 - 100.0).abs() < 1e-9);
        // Default width is half an em.
        assert!((glyphs[0].x1 - 105.0).abs() < 1e-9);
        assert!((glyphs[1].x0 - 105.0).abs() < 1e-9);
        assert!((glyphs[0].baseline - 700.0).abs() < 1e-9);
        assert!((glyphs[0].size - 10.0).abs() < 1e-9);
    }

    #[test]
    fn cm_and_tm_scale_font_size() {
        let glyphs = run(b"q 2 0 0 2 0 0 cm BT /F1 6 Tf 1 0 0 1 50 300 Tm (x) Tj ET Q");
        assert_eq!(glyphs.len(), 1);
        assert!((glyphs[0].x0 - 100.0).abs() < 1e-9);
        assert!((glyphs[0].baseline - 600.0).abs() < 1e-9);
        assert!((glyphs[0].size - 12.0).abs() < 1e-9);
    }

    #[test]
    fn tj_array_kerning_moves_pen() {
        let glyphs = run(b"BT /F1 10 Tf 0 0 Td [(A) -1000 (B)] TJ ET");
        assert_eq!(glyphs.len(), 2);
        // 5pt advance plus 10pt of negative kerning.
        assert!((glyphs[1].x0 - 15.0).abs() < 1e-9);
    }

    #[test]
    fn leading_and_next_line_operators() {
        let glyphs = run(b"BT /F1 10 Tf 14 TL 72 700 Td (a) Tj T* (b) Tj (c) ' ET");
        let baselines: Vec<f64> = glyphs.iter().map(|g| g.baseline).collect();
        assert_eq!(baselines, vec![700.0, 686.0, 672.0]);
        assert!(glyphs.iter().all(|g| (g.x0 - 72.0).abs() < 1e-9));
    }

    #[test]
    fn graphics_state_restores_ctm() {
        let glyphs = run(b"q 1 0 0 1 50 0 cm Q BT /F1 10 Tf 10 10 Td (a) Tj ET");
        assert!((glyphs[0].x0 - 10.0).abs() < 1e-9);
    }
}
