// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the TechCheck validation pipeline.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

/// Millimetres per PDF point (1pt = 1/72 inch).
pub const MM_PER_PT: f64 = 25.4 / 72.0;

/// Convert PDF points to millimetres.
pub fn pt_to_mm(pt: f64) -> f64 {
    pt * MM_PER_PT
}

/// Convert millimetres to PDF points.
pub fn mm_to_pt(mm: f64) -> f64 {
    mm / MM_PER_PT
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box in page space: points, origin top-left, y grows
/// downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Non-negative coordinates and strictly positive extent.
    pub fn is_valid(&self) -> bool {
        self.x0 >= 0.0 && self.y0 >= 0.0 && self.x1 > self.x0 && self.y1 > self.y0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Grow the box by `pad` on every side, clamping at the page origin.
    pub fn expand(&self, pad: f64) -> BBox {
        BBox {
            x0: (self.x0 - pad).max(0.0),
            y0: (self.y0 - pad).max(0.0),
            x1: self.x1 + pad,
            y1: self.y1 + pad,
        }
    }

    /// Whether the box lies entirely within a `width` x `height` page.
    pub fn fits_within(&self, width: f64, height: f64) -> bool {
        self.is_valid() && self.x1 <= width && self.y1 <= height
    }
}

// ---------------------------------------------------------------------------
// Extracted layout
// ---------------------------------------------------------------------------

/// A contiguous span of text sharing one font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub bbox: BBox,
    /// Base font name with any subset prefix removed.
    pub font_name: String,
    pub font_size: f64,
    pub bold: bool,
    pub italic: bool,
    /// Baseline y in page space (points from the top edge).
    pub baseline: f64,
    /// Running header, footer or page number recurring across pages.
    #[serde(default)]
    pub furniture: bool,
}

/// One page edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Distances from each page edge to the nearest body text, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Margins {
    pub fn get(&self, edge: Edge) -> f64 {
        match edge {
            Edge::Left => self.left,
            Edge::Right => self.right,
            Edge::Top => self.top,
            Edge::Bottom => self.bottom,
        }
    }
}

/// Dominant font of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontInfo {
    pub name: String,
    pub size: f64,
}

impl FontInfo {
    /// Normalised family, see [`family_key`].
    pub fn family(&self) -> String {
        family_key(&self.name)
    }
}

/// Remove a six-letter subset tag (`ABCDEF+Times`).
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => {
            rest
        }
        _ => name,
    }
}

/// Family key for comparing font names: `TimesNewRomanPS-BoldMT` and
/// `Times New Roman,Bold` both become `timesnewroman`.
pub fn family_key(name: &str) -> String {
    let base = strip_subset_prefix(name);
    let family = base.split(['-', ',']).next().unwrap_or(base);
    let mut family = family.trim().to_string();
    for suffix in ["MT", "PS"] {
        if family.len() > suffix.len() && family.ends_with(suffix) {
            family.truncate(family.len() - suffix.len());
        }
    }
    family
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Semantic role of a page within the thesis structure.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageRole {
    Title,
    Declaration,
    AbstractSl,
    AbstractEn,
    Toc,
    Body,
    References,
    Appendix,
    #[default]
    Unknown,
}

impl PageRole {
    /// Human-readable section name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Title => "title page",
            Self::Declaration => "author's declaration",
            Self::AbstractSl => "Slovenian abstract (povzetek)",
            Self::AbstractEn => "English abstract",
            Self::Toc => "table of contents",
            Self::Body => "body",
            Self::References => "references",
            Self::Appendix => "appendix",
            Self::Unknown => "unclassified page",
        }
    }
}

impl fmt::Display for PageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One extracted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub index: u32,
    pub width_pt: f64,
    pub height_pt: f64,
    /// Page text, line by line in reading order.
    pub text: String,
    pub runs: Vec<TextRun>,
    /// `None` when the page has no qualifying text.
    pub margins: Option<Margins>,
    pub dominant_font: Option<FontInfo>,
    #[serde(default)]
    pub role: PageRole,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Page {
    /// A page that contributed no layout data, e.g. because its content
    /// stream could not be parsed.
    pub fn empty(index: u32, width_pt: f64, height_pt: f64, warning: impl Into<String>) -> Self {
        Self {
            index,
            width_pt,
            height_pt,
            text: String::new(),
            runs: Vec::new(),
            margins: None,
            dominant_font: None,
            role: PageRole::Unknown,
            warnings: vec![warning.into()],
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Runs that are not headers, footers or page numbers.
    pub fn content_runs(&self) -> impl Iterator<Item = &TextRun> {
        self.runs.iter().filter(|run| !run.furniture)
    }

    /// Non-empty text lines, trimmed.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines().map(str::trim).filter(|line| !line.is_empty())
    }

    /// Content runs joined into lines. Runs on one baseline are glued
    /// together, with a space only across a visible word gap.
    pub fn content_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        let mut previous: Option<&TextRun> = None;
        for run in self.content_runs() {
            let same_line = previous.is_some_and(|prev| {
                (prev.baseline - run.baseline).abs() <= 0.5 * prev.font_size.min(run.font_size)
            });
            match (previous, lines.last_mut()) {
                (Some(prev), Some(line)) if same_line => {
                    let gap = run.bbox.x0 - prev.bbox.x1;
                    if gap > WORD_GAP_EM * prev.font_size.max(run.font_size) {
                        line.push(' ');
                    }
                    line.push_str(&run.text);
                }
                _ => lines.push(run.text.clone()),
            }
            previous = Some(run);
        }
        lines
    }

    /// Words in the content text. A word hyphenated at a line end counts once.
    pub fn word_count(&self) -> usize {
        let mut words = 0;
        let mut carried = false;
        for line in self.content_lines() {
            let count = line.split_whitespace().count();
            words += count - usize::from(carried && count > 0);
            carried = ends_hyphenated(&line);
        }
        words
    }

    /// Union of all content run boxes.
    pub fn content_bounds(&self) -> Option<BBox> {
        self.content_runs()
            .map(|run| run.bbox)
            .reduce(|acc, bbox| acc.union(&bbox))
    }
}

/// Horizontal gap, in ems, that separates two words on a line.
const WORD_GAP_EM: f64 = 0.15;

fn ends_hyphenated(line: &str) -> bool {
    let mut chars = line.trim_end().chars().rev();
    matches!(chars.next(), Some('-' | '\u{AD}')) && chars.next().is_some_and(char::is_alphabetic)
}

/// An extracted document. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// SHA-256 of the input bytes.
    pub content_hash: String,
    pub pages: Vec<Page>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Original document bytes, kept for the annotator.
    #[serde(skip)]
    pub source: Arc<Vec<u8>>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up a page by its 1-based index.
    pub fn page(&self, index: u32) -> Option<&Page> {
        self.pages.iter().find(|page| page.index == index)
    }

    pub fn pages_with_role(&self, role: PageRole) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(move |page| page.role == role)
    }

    pub fn has_role(&self, role: PageRole) -> bool {
        self.pages.iter().any(|page| page.role == role)
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_slice()
    }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// How much a finding matters. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Must fix.
    Critical,
    /// Important formatting issue.
    Major,
    /// Style recommendation.
    Minor,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::Major, Severity::Minor];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Major => "MAJOR",
            Self::Minor => "MINOR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a margin should sit, drawn by the annotator as a guide line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginGuide {
    pub edge: Edge,
    pub expected_mm: f64,
}

/// One reported deviation from a formatting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    /// 1-based page index, `None` for document-global findings.
    pub page: Option<u32>,
    pub location: Option<BBox>,
    pub message: String,
    pub fix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_guide: Option<MarginGuide>,
}

impl Finding {
    /// A document-global finding without location.
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            page: None,
            location: None,
            message: message.into(),
            fix: fix.into(),
            margin_guide: None,
        }
    }

    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn at(mut self, location: Option<BBox>) -> Self {
        self.location = location;
        self
    }

    pub fn with_margin_guide(mut self, guide: MarginGuide) -> Self {
        self.margin_guide = Some(guide);
        self
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Unique identifier for a validation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle states of a validation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Extracting,
    Evaluating,
    Annotating,
    Done,
    Failed,
}

impl JobState {
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Extracting => 1,
            Self::Evaluating => 2,
            Self::Annotating => 3,
            Self::Done | Self::Failed => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Forward-only transitions: each stage advances to the next one, and any
    /// non-terminal state may fail.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed => true,
            Self::Pending => false,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Extracting => "EXTRACTING",
            Self::Evaluating => "EVALUATING",
            Self::Annotating => "ANNOTATING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Why a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unreadable,
    Encrypted,
    Unwritable,
    Internal,
}

/// Failure record of a FAILED job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    /// Error text, preserved verbatim.
    pub reason: String,
    /// Plain-language advice for the submitter.
    pub suggestion: String,
}

/// A timestamped state change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: JobState,
    pub at: DateTime<Utc>,
}

/// One end-to-end validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Content hash of the submitted document.
    pub document_hash: String,
    pub state: JobState,
    pub transitions: Vec<Transition>,
    pub findings: Option<Arc<Vec<Finding>>>,
    #[serde(skip)]
    pub artifact: Option<Arc<Vec<u8>>>,
    pub failure: Option<JobFailure>,
}

impl Job {
    pub fn new(document_hash: String) -> Self {
        Self {
            id: JobId::new(),
            document_hash,
            state: JobState::Pending,
            transitions: vec![Transition {
                state: JobState::Pending,
                at: Utc::now(),
            }],
            findings: None,
            artifact: None,
            failure: None,
        }
    }

    /// Move to `next`, recording the transition time.
    pub fn advance(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_advance_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.transitions.push(Transition {
            state: next,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Time the job reached DONE or FAILED.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        if !self.state.is_terminal() {
            return None;
        }
        self.transitions.last().map(|t| t.at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_prefix_is_stripped() {
        assert_eq!(strip_subset_prefix("ABCDEF+TimesNewRomanPSMT"), "TimesNewRomanPSMT");
        assert_eq!(strip_subset_prefix("Abcdef+Times"), "Abcdef+Times");
        assert_eq!(strip_subset_prefix("Helvetica"), "Helvetica");
    }

    #[test]
    fn family_key_normalises_vendor_names() {
        assert_eq!(family_key("TimesNewRomanPSMT"), "timesnewroman");
        assert_eq!(family_key("XYZABC+TimesNewRomanPS-BoldMT"), "timesnewroman");
        assert_eq!(family_key("Times New Roman,Bold"), "timesnewroman");
        assert_eq!(family_key("Times-Roman"), "times");
        assert_eq!(family_key("ArialMT"), "arial");
    }

    fn run(text: &str, x0: f64, furniture: bool) -> TextRun {
        TextRun {
            text: text.into(),
            bbox: BBox::new(x0, 100.0, x0 + 50.0, 112.0),
            font_name: "TimesNewRomanPSMT".into(),
            font_size: 12.0,
            bold: false,
            italic: false,
            baseline: 110.0,
            furniture,
        }
    }

    #[test]
    fn bbox_validity() {
        assert!(BBox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!BBox::new(-1.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!BBox::new(2.0, 0.0, 2.0, 1.0).is_valid());
    }

    #[test]
    fn bbox_expand_clamps_at_origin() {
        let expanded = BBox::new(1.0, 1.0, 10.0, 10.0).expand(3.0);
        assert_eq!(expanded, BBox::new(0.0, 0.0, 13.0, 13.0));
    }

    #[test]
    fn unit_conversion_round_trips() {
        assert!((pt_to_mm(72.0) - 25.4).abs() < 1e-9);
        assert!((mm_to_pt(pt_to_mm(123.0)) - 123.0).abs() < 1e-9);
    }

    #[test]
    fn content_runs_skip_furniture() {
        let mut page = Page::empty(1, 595.0, 842.0, "x");
        page.runs = vec![run("Body", 85.0, false), run("12", 290.0, true)];
        let texts: Vec<_> = page.content_runs().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Body"]);
        assert_eq!(page.word_count(), 1);
    }

    #[test]
    fn words_split_across_runs_count_once() {
        let mut page = Page::empty(1, 595.0, 842.0, "x");
        let piece = |text: &str, x0: f64, x1: f64, baseline: f64| TextRun {
            bbox: BBox::new(x0, baseline - 10.0, x1, baseline + 2.0),
            baseline,
            ..run(text, x0, false)
        };
        page.runs = vec![
            piece("razi", 85.0, 105.0, 110.0),
            piece("skava", 105.0, 135.0, 110.0),
            piece("je na-", 140.0, 175.0, 110.0),
            piece("daljevala delo.", 85.0, 170.0, 124.0),
        ];
        assert_eq!(page.content_lines(), vec!["raziskava je na-", "daljevala delo."]);
        assert_eq!(page.word_count(), 4);
    }

    #[test]
    fn job_transitions_are_forward_only() {
        let mut job = Job::new("abc".into());
        job.advance(JobState::Extracting).expect("extracting");
        assert!(job.advance(JobState::Annotating).is_err());
        assert!(job.advance(JobState::Pending).is_err());
        job.advance(JobState::Evaluating).expect("evaluating");
        job.advance(JobState::Annotating).expect("annotating");
        job.advance(JobState::Done).expect("done");
        assert!(job.finished_at().is_some());
        assert!(job.advance(JobState::Failed).is_err());
        assert_eq!(job.transitions.len(), 5);
    }

    #[test]
    fn any_stage_may_fail() {
        let mut job = Job::new("abc".into());
        job.advance(JobState::Failed).expect("fail from pending");
        assert!(job.state.is_terminal());
        assert!(job.advance(JobState::Extracting).is_err());
    }

    #[test]
    fn severity_orders_most_severe_first() {
        let mut all = vec![Severity::Minor, Severity::Critical, Severity::Major];
        all.sort();
        assert_eq!(all, Severity::ALL.to_vec());
    }

    #[test]
    fn page_role_serializes_screaming_snake() {
        let json = serde_json::to_string(&PageRole::AbstractSl).expect("serialize");
        assert_eq!(json, "\"ABSTRACT_SL\"");
    }

    #[test]
    fn fresh_pages_have_no_role() {
        assert_eq!(PageRole::default(), PageRole::Unknown);
        assert_eq!(Page::empty(1, 595.0, 842.0, "x").role, PageRole::Unknown);
    }
}
