// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font metrics — glyph widths, style flags, and string decoding for the fonts
// referenced by page resources.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use techcheck_core::types::strip_subset_prefix;

use crate::pdf::reader::{decode_stream, object_to_f64, resolve};

/// Width used when a font declares none, in glyph space (1/1000 em).
const DEFAULT_WIDTH: f64 = 500.0;
const DEFAULT_ASCENT: f64 = 800.0;
const DEFAULT_DESCENT: f64 = -200.0;

// FontDescriptor /Flags bits.
const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

/// Everything the interpreter needs to know about one font resource.
#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    /// BaseFont with any subset prefix removed.
    pub name: String,
    pub bold: bool,
    pub italic: bool,
    /// Type0 fonts use two-byte codes.
    pub two_byte: bool,
    pub ascent: f64,
    pub descent: f64,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
    to_unicode: Option<ToUnicodeMap>,
}

impl FontMetrics {
    /// Metrics for a font resource that could not be resolved.
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".into(),
            bold: false,
            italic: false,
            two_byte: false,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: DEFAULT_WIDTH,
            to_unicode: None,
        }
    }

    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let mut metrics = Self::unknown();

        if let Ok(base) = font.get(b"BaseFont").and_then(Object::as_name) {
            metrics.name = strip_subset_prefix(&String::from_utf8_lossy(base)).to_string();
        }

        let subtype = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|name| name.to_vec())
            .unwrap_or_default();
        metrics.two_byte = subtype == b"Type0";

        let descriptor_owner = if metrics.two_byte {
            let descendant = font
                .get(b"DescendantFonts")
                .map(|obj| resolve(doc, obj))
                .and_then(Object::as_array)
                .ok()
                .and_then(|fonts| fonts.first())
                .and_then(|obj| resolve(doc, obj).as_dict().ok());
            if let Some(cid_font) = descendant {
                metrics.read_cid_widths(doc, cid_font);
                cid_font
            } else {
                font
            }
        } else {
            metrics.read_simple_widths(doc, font);
            font
        };

        if let Some(descriptor) = descriptor_owner
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
        {
            metrics.read_descriptor(doc, descriptor);
        }

        let (name_bold, name_italic) = style_from_name(&metrics.name);
        metrics.bold |= name_bold;
        metrics.italic |= name_italic;

        metrics.to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_stream().ok())
            .and_then(|stream| decode_stream(stream).ok())
            .map(|bytes| ToUnicodeMap::parse(&bytes));

        metrics
    }

    fn read_simple_widths(&mut self, doc: &Document, font: &Dictionary) {
        self.first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|obj| object_to_f64(resolve(doc, obj)).ok())
            .map(|value| value.max(0.0) as u32)
            .unwrap_or(0);
        if let Ok(widths) = font
            .get(b"Widths")
            .map(|obj| resolve(doc, obj))
            .and_then(Object::as_array)
        {
            self.widths = widths
                .iter()
                .map(|w| object_to_f64(resolve(doc, w)).unwrap_or(DEFAULT_WIDTH))
                .collect();
        }
    }

    /// `/DW` and the `/W` array of a CIDFont: `c [w1 w2 ...]` or `c_first c_last w`.
    fn read_cid_widths(&mut self, doc: &Document, cid_font: &Dictionary) {
        self.default_width = cid_font
            .get(b"DW")
            .ok()
            .and_then(|obj| object_to_f64(resolve(doc, obj)).ok())
            .unwrap_or(1000.0);

        let Ok(entries) = cid_font
            .get(b"W")
            .map(|obj| resolve(doc, obj))
            .and_then(Object::as_array)
        else {
            return;
        };

        let mut i = 0;
        while i < entries.len() {
            let Ok(first) = object_to_f64(resolve(doc, &entries[i])) else {
                break;
            };
            let first = first as u32;
            match entries.get(i + 1).map(|obj| resolve(doc, obj)) {
                Some(Object::Array(list)) => {
                    for (offset, w) in list.iter().enumerate() {
                        let Some(cid) = u32::try_from(offset)
                            .ok()
                            .and_then(|offset| first.checked_add(offset))
                        else {
                            break;
                        };
                        if let Ok(width) = object_to_f64(resolve(doc, w)) {
                            self.cid_widths.insert(cid, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let (Ok(last), Some(Ok(width))) = (
                        object_to_f64(last),
                        entries.get(i + 2).map(|w| object_to_f64(resolve(doc, w))),
                    ) else {
                        break;
                    };
                    for cid in first..=(last as u32).min(first.saturating_add(0xFFFF)) {
                        self.cid_widths.insert(cid, width);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    fn read_descriptor(&mut self, doc: &Document, descriptor: &Dictionary) {
        let number = |key: &[u8]| {
            descriptor
                .get(key)
                .ok()
                .and_then(|obj| object_to_f64(resolve(doc, obj)).ok())
        };
        if let Some(flags) = number(b"Flags") {
            let flags = flags as i64;
            self.bold |= flags & FLAG_FORCE_BOLD != 0;
            self.italic |= flags & FLAG_ITALIC != 0;
        }
        if let Some(angle) = number(b"ItalicAngle") {
            self.italic |= angle.abs() > 0.5;
        }
        if let Some(weight) = number(b"FontWeight") {
            self.bold |= weight >= 600.0;
        }
        if let Some(ascent) = number(b"Ascent").filter(|a| *a > 0.0) {
            self.ascent = ascent;
        }
        if let Some(descent) = number(b"Descent").filter(|d| *d < 0.0) {
            self.descent = descent;
        }
    }

    /// Advance width of a character code in glyph space (1/1000 em).
    pub fn width(&self, code: u32) -> f64 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|slot| self.widths.get(slot as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Split a string operand into character codes with their Unicode text.
    pub fn decode(&self, bytes: &[u8]) -> Vec<(u32, String)> {
        let codes: Vec<u32> = if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        };

        codes
            .into_iter()
            .map(|code| {
                let text = self
                    .to_unicode
                    .as_ref()
                    .and_then(|map| map.lookup(code))
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        if self.two_byte {
                            char::from_u32(code).map(String::from).unwrap_or_default()
                        } else {
                            winansi_char(code as u8).to_string()
                        }
                    });
                (code, text)
            })
            .collect()
    }
}

fn style_from_name(name: &str) -> (bool, bool) {
    let lower = name.to_lowercase();
    let bold = ["bold", "black", "heavy", "semibold", "demi"]
        .iter()
        .any(|token| lower.contains(token));
    let italic = lower.contains("italic") || lower.contains("oblique");
    (bold, italic)
}

/// WinAnsi decoding; codes outside the 0x80-0x9F block map as Latin-1.
fn winansi_char(code: u8) -> char {
    const HIGH: [char; 32] = [
        '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž',
        '\u{FFFD}', '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
        '\u{FFFD}', 'ž', 'Ÿ',
    ];
    match code {
        0x80..=0x9F => HIGH[(code - 0x80) as usize],
        _ => char::from(code),
    }
}

/// Code-to-text table parsed from a `/ToUnicode` CMap.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ToUnicodeMap {
    entries: HashMap<u32, String>,
}

impl ToUnicodeMap {
    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.entries.get(&code).map(String::as_str)
    }

    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize_cmap(data);
        let mut map = Self::default();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                CmapToken::Keyword(word) if word == "beginbfchar" => {
                    i += 1;
                    while i + 1 < tokens.len() {
                        match (&tokens[i], &tokens[i + 1]) {
                            (CmapToken::Hex(src), CmapToken::Hex(dst)) => {
                                map.entries.insert(code_of(src), utf16_text(dst));
                                i += 2;
                            }
                            _ => break,
                        }
                    }
                }
                CmapToken::Keyword(word) if word == "beginbfrange" => {
                    i += 1;
                    while i + 2 < tokens.len() {
                        let (CmapToken::Hex(lo), CmapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1])
                        else {
                            break;
                        };
                        let (lo, hi) = (code_of(lo), code_of(hi));
                        match &tokens[i + 2] {
                            CmapToken::Hex(dst) => {
                                let base = utf16_units(dst);
                                let hi = hi.min(lo.saturating_add(0xFFFF));
                                for (offset, code) in (lo..=hi).enumerate() {
                                    let mut units = base.clone();
                                    if let Some(last) = units.last_mut() {
                                        *last = last.wrapping_add(offset as u16);
                                    }
                                    map.entries
                                        .insert(code, String::from_utf16_lossy(&units));
                                }
                            }
                            CmapToken::Array(list) => {
                                for (code, dst) in (lo..=hi).zip(list) {
                                    map.entries.insert(code, utf16_text(dst));
                                }
                            }
                            CmapToken::Keyword(_) => break,
                        }
                        i += 3;
                    }
                }
                _ => i += 1,
            }
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CmapToken {
    Hex(Vec<u8>),
    Array(Vec<Vec<u8>>),
    Keyword(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CmapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) != Some(&b'<') => {
                let (bytes, next) = read_hex(data, i + 1);
                tokens.push(CmapToken::Hex(bytes));
                i = next;
            }
            b'[' => {
                let mut list = Vec::new();
                i += 1;
                while i < data.len() && data[i] != b']' {
                    if data[i] == b'<' {
                        let (bytes, next) = read_hex(data, i + 1);
                        list.push(bytes);
                        i = next;
                    } else {
                        i += 1;
                    }
                }
                tokens.push(CmapToken::Array(list));
                i += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < data.len() && data[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                tokens.push(CmapToken::Keyword(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
            _ => i += 1,
        }
    }
    tokens
}

/// Read hex digits up to `>`; returns the bytes and the index after `>`.
fn read_hex(data: &[u8], start: usize) -> (Vec<u8>, usize) {
    let mut digits = Vec::new();
    let mut i = start;
    while i < data.len() && data[i] != b'>' {
        if let Some(value) = (data[i] as char).to_digit(16) {
            digits.push(value as u8);
        }
        i += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    let bytes = digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect();
    (bytes, i + 1)
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| acc << 8 | u32::from(*b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from(*hi) << 8 | u16::from(*lo),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn style_flags_from_name_and_descriptor() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Cambria",
            "FontDescriptor" => Object::Dictionary(dictionary! {
                "Flags" => FLAG_FORCE_BOLD | FLAG_ITALIC,
            }),
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert!(metrics.bold);
        assert!(metrics.italic);

        let named = dictionary! { "Subtype" => "Type1", "BaseFont" => "Times-BoldItalic" };
        let metrics = FontMetrics::from_dict(&doc, &named);
        assert!(metrics.bold && metrics.italic);
    }

    #[test]
    fn simple_widths_follow_first_char() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
            "FirstChar" => 65,
            "Widths" => vec![722.into(), 667.into()],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.width(65), 722.0);
        assert_eq!(metrics.width(66), 667.0);
        assert_eq!(metrics.width(67), DEFAULT_WIDTH);
        assert_eq!(metrics.width(10), DEFAULT_WIDTH);
    }

    #[test]
    fn to_unicode_bfchar_and_bfrange() {
        let cmap = b"/CIDInit /ProcSet findresource begin
            1 begincodespacerange <00> <FF> endcodespacerange
            2 beginbfchar <80> <010D> <81> <017E> endbfchar
            1 beginbfrange <41> <43> <0061> endbfrange
            1 beginbfrange <90> <91> [<0161> <0160>] endbfrange
            endcmap";
        let map = ToUnicodeMap::parse(cmap);
        assert_eq!(map.lookup(0x80), Some("č"));
        assert_eq!(map.lookup(0x81), Some("ž"));
        assert_eq!(map.lookup(0x42), Some("b"));
        assert_eq!(map.lookup(0x91), Some("Š"));
        assert_eq!(map.lookup(0x44), None);
    }

    #[test]
    fn ranges_at_the_top_of_the_code_space_do_not_overflow() {
        let cmap = b"1 beginbfrange <FFFFFFFF> <FFFFFFFF> <0041> endbfrange
            1 beginbfrange <FFFFFFFE> <FFFFFFFF> [<0042> <0043>] endbfrange";
        let map = ToUnicodeMap::parse(cmap);
        assert_eq!(map.lookup(u32::MAX - 1), Some("B"));
        assert_eq!(map.lookup(u32::MAX), Some("C"));

        let doc = Document::with_version("1.5");
        let top = i64::from(u32::MAX);
        let font = dictionary! {
            "Subtype" => "Type0",
            "BaseFont" => "TimesNewRomanPSMT",
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "Subtype" => "CIDFontType2",
                "W" => vec![
                    (top - 1).into(),
                    Object::Array(vec![250.into(), 333.into(), 444.into()]),
                    top.into(),
                    top.into(),
                    555.into(),
                ],
            })],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.width(u32::MAX - 1), 250.0);
        assert_eq!(metrics.width(u32::MAX), 555.0);
    }

    #[test]
    fn decode_falls_back_to_winansi() {
        let metrics = FontMetrics::unknown();
        let decoded: String = metrics
            .decode(b"Dru\x9ebe")
            .into_iter()
            .map(|(_, text)| text)
            .collect();
        assert_eq!(decoded, "Družbe");
    }

    #[test]
    fn type0_uses_two_byte_codes_and_cid_widths() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "Type0",
            "BaseFont" => "AAAAAA+TimesNewRomanPSMT",
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "Subtype" => "CIDFontType2",
                "DW" => 600,
                "W" => vec![3.into(), Object::Array(vec![250.into(), 333.into()]), 10.into(), 12.into(), 444.into()],
            })],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.name, "TimesNewRomanPSMT");
        assert!(metrics.two_byte);
        assert_eq!(metrics.width(3), 250.0);
        assert_eq!(metrics.width(4), 333.0);
        assert_eq!(metrics.width(11), 444.0);
        assert_eq!(metrics.width(99), 600.0);
        let decoded = metrics.decode(&[0x00, 0x41, 0x01, 0x0D]);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].1, "A");
        assert_eq!(decoded[1].1, "č");
    }
}
