// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic thesis PDFs for tests and benchmarks.
//
// Pages are described as positioned lines (millimetres from the top-left
// corner) and written with lopdf. Every font has a fixed advance of half an
// em so run widths are predictable, and non-ASCII characters go through a
// shared ToUnicode CMap.

use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use techcheck_core::types::mm_to_pt;

pub const A4_WIDTH: f64 = 595.276;
pub const A4_HEIGHT: f64 = 841.89;

/// Ascent used by the extractor for fonts without a descriptor.
const ASCENT_EM: f64 = 0.8;
/// Baseline pitch of single-spaced text, in ems.
const SINGLE_SPACING_EM: f64 = 1.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureFont {
    Times,
    TimesBold,
    Arial,
}

impl FixtureFont {
    const ALL: [FixtureFont; 3] = [FixtureFont::Times, FixtureFont::TimesBold, FixtureFont::Arial];

    fn resource(&self) -> &'static str {
        match self {
            Self::Times => "F1",
            Self::TimesBold => "F2",
            Self::Arial => "F3",
        }
    }

    fn base_font(&self) -> &'static str {
        match self {
            Self::Times => "TimesNewRomanPSMT",
            Self::TimesBold => "TimesNewRomanPS-BoldMT",
            Self::Arial => "ArialMT",
        }
    }
}

/// One line of text; `top_mm` is the top of the glyph boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureLine {
    pub text: String,
    pub x_mm: f64,
    pub top_mm: f64,
    pub size: f64,
    pub font: FixtureFont,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixturePage {
    pub lines: Vec<FixtureLine>,
    cursor_mm: f64,
    body_font: FixtureFont,
    body_size: f64,
    line_spacing: f64,
    left_mm: f64,
}

impl Default for FixturePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FixturePage {
    /// Empty page; flowing text starts 25mm from the top at a 30mm left
    /// margin, with paragraphs set at 1.5 line spacing.
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            cursor_mm: 25.0,
            body_font: FixtureFont::Times,
            body_size: 12.0,
            line_spacing: 1.5,
            left_mm: 30.0,
        }
    }

    /// One paragraph of body text.
    pub fn body(text: &str) -> Self {
        Self::new().paragraph(&[text])
    }

    /// Font used by `paragraph`.
    pub fn with_body_font(mut self, font: FixtureFont, size: f64) -> Self {
        self.body_font = font;
        self.body_size = size;
        self
    }

    /// Line spacing used by `paragraph`, as a multiple of single spacing.
    pub fn with_line_spacing(mut self, spacing: f64) -> Self {
        self.line_spacing = spacing;
        self
    }

    /// Left edge used by `paragraph` and `heading`.
    pub fn with_left_margin(mut self, left_mm: f64) -> Self {
        self.left_mm = left_mm;
        self
    }

    /// A Times line at an absolute position.
    pub fn line(self, text: &str, x_mm: f64, top_mm: f64, size: f64) -> Self {
        self.styled_line(text, x_mm, top_mm, size, FixtureFont::Times)
    }

    pub fn styled_line(
        mut self,
        text: &str,
        x_mm: f64,
        top_mm: f64,
        size: f64,
        font: FixtureFont,
    ) -> Self {
        self.lines.push(FixtureLine {
            text: text.to_string(),
            x_mm,
            top_mm,
            size,
            font,
        });
        self.cursor_mm = self.cursor_mm.max(top_mm + line_height_mm(size));
        self
    }

    /// A bold 14pt heading at the flow position.
    pub fn heading(self, text: &str) -> Self {
        let (x, top) = (self.left_mm, self.cursor_mm);
        self.styled_line(text, x, top, 14.0, FixtureFont::TimesBold)
    }

    /// Lines of body text at the flow position.
    pub fn paragraph(mut self, lines: &[&str]) -> Self {
        for text in lines {
            let (x, top, size, font) = (self.left_mm, self.cursor_mm, self.body_size, self.body_font);
            let pitch_mm = size * SINGLE_SPACING_EM * self.line_spacing * 25.4 / 72.0;
            self = self.styled_line(text, x, top, size, font);
            self.cursor_mm = top + pitch_mm;
        }
        self
    }

    /// Arabic page number centred in the footer.
    pub fn page_number(mut self, number: u32) -> Self {
        let text = number.to_string();
        let width_mm = text.chars().count() as f64 * 6.0 * 25.4 / 72.0;
        self.lines.push(FixtureLine {
            text,
            x_mm: 105.0 - width_mm / 2.0,
            top_mm: 280.0,
            size: 12.0,
            font: FixtureFont::Times,
        });
        self
    }
}

fn line_height_mm(size: f64) -> f64 {
    size * 1.2 * 25.4 / 72.0
}

/// Non-ASCII characters mapped to single-byte codes from 0x80 upward.
struct Encoding {
    extra: BTreeMap<char, u8>,
}

impl Encoding {
    fn for_pages(pages: &[FixturePage]) -> Self {
        let mut extra = BTreeMap::new();
        let mut next: u16 = 0x80;
        for c in pages.iter().flat_map(|p| p.lines.iter()).flat_map(|l| l.text.chars()) {
            if (c as u32) < 0x7F || extra.contains_key(&c) || next > 0xFF {
                continue;
            }
            extra.insert(c, next as u8);
            next += 1;
        }
        Self { extra }
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| match c as u32 {
                code if code < 0x7F => code as u8,
                _ => self.extra.get(&c).copied().unwrap_or(b'?'),
            })
            .collect()
    }

    fn cmap(&self) -> Vec<u8> {
        let mut out = String::from(
            "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
             1 begincodespacerange\n<00> <FF>\nendcodespacerange\n",
        );
        let entries: Vec<_> = self.extra.iter().collect();
        for chunk in entries.chunks(100) {
            out.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for (c, code) in chunk {
                let mut units = [0u16; 2];
                let dst: String = c
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|unit| format!("{unit:04X}"))
                    .collect();
                out.push_str(&format!("<{code:02X}> <{dst}>\n"));
            }
            out.push_str("endbfchar\n");
        }
        out.push_str("endcmap\nend\nend\n");
        out.into_bytes()
    }
}

fn page_content(page: &FixturePage, encoding: &Encoding) -> Vec<u8> {
    let mut content = String::new();
    for line in &page.lines {
        let x = mm_to_pt(line.x_mm);
        let baseline = mm_to_pt(line.top_mm) + ASCENT_EM * line.size;
        let hex: String = encoding
            .encode(&line.text)
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect();
        content.push_str(&format!(
            "BT /{} {} Tf 1 0 0 1 {:.3} {:.3} Tm <{}> Tj ET\n",
            line.font.resource(),
            line.size,
            x,
            A4_HEIGHT - baseline,
            hex
        ));
    }
    content.into_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Damage {
    None,
    Page(usize),
    Encrypted,
}

fn assemble(pages: &[FixturePage], damage: Damage) -> Vec<u8> {
    let encoding = Encoding::for_pages(pages);
    let mut doc = Document::with_version("1.7");
    let pages_id: ObjectId = doc.new_object_id();

    let to_unicode = doc.add_object(Stream::new(lopdf::Dictionary::new(), encoding.cmap()));
    let mut fonts = lopdf::Dictionary::new();
    for font in FixtureFont::ALL {
        let widths: Vec<Object> = (0..256).map(|_| Object::Integer(500)).collect();
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => font.base_font(),
            "FirstChar" => 0,
            "LastChar" => 255,
            "Widths" => widths,
            "ToUnicode" => to_unicode,
        });
        fonts.set(font.resource(), id);
    }
    let resources = doc.add_object(dictionary! { "Font" => Object::Dictionary(fonts) });

    let mut kids: Vec<Object> = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        let broken = match damage {
            Damage::Page(at) => at == i + 1,
            Damage::Encrypted => true,
            Damage::None => false,
        };
        let content_id = if broken {
            // A dictionary where a content stream belongs.
            doc.add_object(dictionary! { "Length" => 0 })
        } else {
            doc.add_object(Stream::new(
                lopdf::Dictionary::new(),
                page_content(page, &encoding),
            ))
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(A4_WIDTH as _), Object::Real(A4_HEIGHT as _)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if damage == Damage::Encrypted {
        let filler = |byte: u8| Object::String(vec![byte; 32], StringFormat::Hexadecimal);
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "O" => filler(0xA5),
            "U" => filler(0x5A),
            "P" => -3904,
        });
        doc.trailer.set("Encrypt", encrypt_id);
        doc.trailer.set(
            "ID",
            vec![filler(0x11), filler(0x11)],
        );
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("fixture PDF serializes");
    buf
}

/// Serialize pages into a PDF.
pub fn build(pages: &[FixturePage]) -> Vec<u8> {
    assemble(pages, Damage::None)
}

/// Like `build`, plus an undecodable page inserted at 1-based `position`.
pub fn build_with_broken_page(pages: &[FixturePage], position: usize) -> Vec<u8> {
    let mut all = pages.to_vec();
    let at = position.clamp(1, all.len() + 1) - 1;
    all.insert(at, FixturePage::new());
    assemble(&all, Damage::Page(at + 1))
}

/// A thesis whose trailer declares standard encryption and whose page
/// contents cannot be read.
pub fn encrypted_pdf() -> Vec<u8> {
    assemble(&thesis_pages(), Damage::Encrypted)
}

/// Abstract body text with exactly `words` words.
pub fn filler_words(words: usize) -> Vec<String> {
    let vocabulary = ["raziskava", "pokaže", "da", "starejši", "odrasli", "uporabljajo", "splet"];
    let all: Vec<&str> = (0..words).map(|i| vocabulary[i % vocabulary.len()]).collect();
    all.chunks(9).map(|chunk| chunk.join(" ")).collect()
}

/// A compliant nine-page thesis laid out to the default rule set.
pub fn thesis_pages() -> Vec<FixturePage> {
    let title = FixturePage::new()
        .styled_line("UNIVERZA V LJUBLJANI", 30.0, 25.0, 14.0, FixtureFont::TimesBold)
        .styled_line("FAKULTETA ZA DRUŽBENE VEDE", 30.0, 32.0, 14.0, FixtureFont::TimesBold)
        .line("Ana Novak", 30.0, 100.0, 12.0)
        .styled_line(
            "Digitalna pismenost starejših odraslih",
            30.0,
            120.0,
            16.0,
            FixtureFont::TimesBold,
        )
        .line("Digital Literacy of Older Adults", 30.0, 130.0, 14.0)
        .line("Magistrsko delo", 30.0, 140.0, 12.0)
        .line("Ljubljana, 2024", 30.0, 250.0, 12.0);

    let declaration = FixturePage::new()
        .heading("IZJAVA O AVTORSTVU")
        .paragraph(&[
            "Podpisana Ana Novak izjavljam, da sem avtorica magistrskega dela",
            "z naslovom Digitalna pismenost starejših odraslih in da je delo",
            "rezultat mojega samostojnega raziskovalnega dela.",
        ])
        .page_number(2);

    let abstract_sl_text = filler_words(120);
    let abstract_sl_lines: Vec<&str> = abstract_sl_text.iter().map(String::as_str).collect();
    let abstract_sl = FixturePage::new()
        .heading("POVZETEK")
        .paragraph(&abstract_sl_lines)
        .paragraph(&["Ključne besede: digitalna pismenost, starejši odrasli, učenje."])
        .page_number(3);

    let abstract_en = FixturePage::new()
        .heading("ABSTRACT")
        .paragraph(&[
            "The thesis examines how older adults in Slovenia acquire digital",
            "skills and which forms of support they use in everyday life.",
        ])
        .paragraph(&["Keywords: digital literacy, older adults, lifelong learning."])
        .page_number(4);

    let toc = FixturePage::new()
        .heading("KAZALO")
        .paragraph(&[
            "1 UVOD 6",
            "2 METODOLOGIJA 7",
            "3 ZAKLJUČEK 7",
            "LITERATURA 8",
            "PRILOGE 9",
        ])
        .page_number(5);

    let introduction = FixturePage::new()
        .heading("1 UVOD")
        .paragraph(&[
            "Digitalna pismenost je pogoj za dejavno vključenost v družbo",
            "(Novak, 2020). Starejši odrasli se pri tem soočajo z ovirami, ki",
            "jih literatura opisuje kot digitalni razkorak (Horvat, 2019).",
        ])
        .page_number(6);

    let methodology = FixturePage::new()
        .heading("2 METODOLOGIJA")
        .paragraph(&[
            "Podatke smo zbrali s polstrukturiranimi intervjuji z dvajsetimi",
            "udeleženci, starimi od 65 do 80 let (Kovač in Zupan, 2021).",
        ])
        .heading("3 ZAKLJUČEK")
        .paragraph(&[
            "Starejši odrasli digitalne spretnosti najlažje pridobijo ob",
            "podpori bližnjih in v organiziranih tečajih.",
        ])
        .page_number(7);

    let references = FixturePage::new()
        .heading("LITERATURA")
        .paragraph(&[
            "Horvat, J. (2019). Digitalni razkorak. Ljubljana: FDV.",
            "Kovač, M. in Zupan, T. (2021). Starejši in splet. Maribor: UM.",
            "Novak, A. (2020). Pismenost v digitalni dobi. Koper: UP.",
        ])
        .page_number(8);

    let appendix = FixturePage::new()
        .heading("PRILOGE")
        .paragraph(&["Priloga A: Vprašalnik za intervju"])
        .page_number(9);

    vec![
        title,
        declaration,
        abstract_sl,
        abstract_en,
        toc,
        introduction,
        methodology,
        references,
        appendix,
    ]
}

pub fn thesis_pdf() -> Vec<u8> {
    build(&thesis_pages())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_maps_slovenian_letters_above_ascii() {
        let pages = vec![FixturePage::body("čžš č")];
        let encoding = Encoding::for_pages(&pages);
        assert_eq!(encoding.encode("ač"), vec![b'a', 0x80]);
        let cmap = String::from_utf8(encoding.cmap()).unwrap();
        assert!(cmap.contains("<80> <010D>"));
    }

    #[test]
    fn filler_has_requested_word_count() {
        let words: usize = filler_words(300).iter().map(|l| l.split_whitespace().count()).sum();
        assert_eq!(words, 300);
    }

    #[test]
    fn thesis_fixture_loads() {
        let doc = Document::load_mem(&thesis_pdf()).unwrap();
        assert_eq!(doc.get_pages().len(), 9);
    }
}
