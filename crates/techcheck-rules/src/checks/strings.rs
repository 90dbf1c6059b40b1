// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical string checks: exact, case- and diacritic-sensitive matching
// with "malformed" reporting for near misses.

use techcheck_core::types::{BBox, Document, Finding};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::lines::text_lines;
use super::{Target, finding_for};
use crate::rule::Rule;

/// Lower-case with diacritics removed: `Družbene` becomes `druzbene`.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Levenshtein distance over characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Closest candidate to a canonical string found in some line.
#[derive(Debug, Clone, PartialEq)]
pub struct NearMiss {
    pub found: String,
    pub distance: usize,
    pub bbox: BBox,
}

/// Best near miss among word windows of `lines` whose word count is within
/// one of the canonical's. A window qualifies when it is at most
/// `max_distance` edits away or equal after folding case and diacritics.
pub fn near_miss<'a>(
    lines: impl IntoIterator<Item = (&'a str, BBox)>,
    canonical: &str,
    max_distance: usize,
) -> Option<NearMiss> {
    let target_words = canonical.split_whitespace().count().max(1);
    let folded_canonical = fold(canonical);
    let mut best: Option<NearMiss> = None;

    for (line, bbox) in lines {
        let words: Vec<&str> = line.split_whitespace().collect();
        for size in target_words.saturating_sub(1).max(1)..=target_words + 1 {
            for window in words.windows(size) {
                let candidate = window.join(" ");
                let distance = edit_distance(&candidate, canonical);
                let qualifies = distance <= max_distance || fold(&candidate) == folded_canonical;
                if qualifies && best.as_ref().is_none_or(|b| distance < b.distance) {
                    best = Some(NearMiss {
                        found: candidate,
                        distance,
                        bbox,
                    });
                }
            }
        }
    }
    best
}

pub fn canonical_text(
    rule: &Rule,
    document: &Document,
    target: &Target<'_>,
    canonical: &str,
    max_distance: usize,
) -> Vec<Finding> {
    let lines: Vec<_> = target
        .pages(document)
        .into_iter()
        .flat_map(text_lines)
        .collect();

    if lines.iter().any(|line| line.text.contains(canonical)) {
        return Vec::new();
    }

    let candidates = lines.iter().map(|line| (line.text.as_str(), line.bbox));
    let finding = match near_miss(candidates, canonical, max_distance) {
        Some(miss) => finding_for(
            rule,
            target,
            format!("Malformed \"{canonical}\": found \"{}\"", miss.found),
            format!("Write it exactly as \"{canonical}\"."),
        )
        .at(Some(miss.bbox)),
        None => finding_for(
            rule,
            target,
            format!("Missing \"{canonical}\""),
            format!("Add \"{canonical}\" exactly as written here."),
        ),
    };
    vec![finding]
}
