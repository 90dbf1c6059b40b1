// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration: extraction thresholds, classifier heuristics, the
// versioned rule set, and job manager limits. Every section has defaults that
// reproduce the FDV thesis guidelines, so a config file only needs to name
// the values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Result, TechcheckError};
use crate::types::PageRole;

/// Complete TechCheck configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechcheckConfig {
    pub extraction: ExtractionConfig,
    pub classification: ClassificationConfig,
    pub rules: RuleSetConfig,
    pub jobs: JobConfig,
}

impl TechcheckConfig {
    /// Load from a `.json`, `.yaml` or `.yml` file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let config = match extension.as_deref() {
            Some("json") => Self::from_json_str(&raw)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw)?,
            other => {
                return Err(TechcheckError::Config(format!(
                    "unsupported config format {:?} (expected .json, .yaml or .yml)",
                    other.unwrap_or("")
                )));
            }
        };

        info!(rules_version = %config.rules.version, "configuration loaded");
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        let rules = &self.rules;
        if rules.margins.tolerance_mm < 0.0 || rules.body_font.tolerance_pt < 0.0 {
            return Err(TechcheckError::Config(
                "tolerances must not be negative".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.extraction.furniture_page_ratio) {
            return Err(TechcheckError::Config(
                "extraction.furniture_page_ratio must be in [0, 1)".into(),
            ));
        }
        if self.jobs.worker_slots == 0 {
            return Err(TechcheckError::Config(
                "jobs.worker_slots must be at least 1".into(),
            ));
        }
        debug!("configuration validated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Largest horizontal gap between glyphs merged into one run, in ems of
    /// the run's font size.
    pub merge_gap_em: f64,
    /// Gaps wider than this (in ems) insert a space when merging.
    pub word_gap_em: f64,
    /// Baselines closer than this (points) count as the same line.
    pub baseline_tolerance_pt: f64,
    /// A run recurring on more than this share of pages is page furniture.
    pub furniture_page_ratio: f64,
    /// Vertical bucket size for furniture matching, as a fraction of page
    /// height.
    pub furniture_bucket: f64,
    /// Nesting limit for form XObjects.
    pub max_xobject_depth: u32,
    /// Extract pages on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            merge_gap_em: 0.6,
            word_gap_em: 0.15,
            baseline_tolerance_pt: 0.5,
            furniture_page_ratio: 0.5,
            furniture_bucket: 0.02,
            max_xobject_depth: 8,
            parallel: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Pages checked for front-matter markers (title, declaration,
    /// abstracts, contents).
    pub front_matter_pages: u32,
    /// Leading non-empty lines treated as a page's heading.
    pub heading_lines: usize,
    /// Share of lines that must look like citations for a page to count as
    /// a reference list.
    pub citation_line_ratio: f64,
    /// Minimum citation-like lines on a reference page.
    pub min_citation_lines: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            front_matter_pages: 3,
            heading_lines: 3,
            citation_line_ratio: 0.4,
            min_citation_lines: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// How a measured value is compared with the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// Within ±tolerance of the expected value.
    Exact,
    /// No less than expected minus tolerance.
    AtLeast,
    /// No more than expected plus tolerance.
    AtMost,
}

impl Bound {
    /// Whether `measured` satisfies the bound.
    pub fn accepts(&self, measured: f64, expected: f64, tolerance: f64) -> bool {
        match self {
            Self::Exact => (measured - expected).abs() <= tolerance,
            Self::AtLeast => measured >= expected - tolerance,
            Self::AtMost => measured <= expected + tolerance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginRequirement {
    pub expected_mm: f64,
    pub bound: Bound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginRequirements {
    pub left: MarginRequirement,
    pub right: MarginRequirement,
    pub top: MarginRequirement,
    pub bottom: MarginRequirement,
    pub tolerance_mm: f64,
}

impl Default for MarginRequirements {
    fn default() -> Self {
        Self {
            left: MarginRequirement {
                expected_mm: 30.0,
                bound: Bound::Exact,
            },
            right: MarginRequirement {
                expected_mm: 25.0,
                bound: Bound::AtLeast,
            },
            top: MarginRequirement {
                expected_mm: 25.0,
                bound: Bound::AtLeast,
            },
            bottom: MarginRequirement {
                expected_mm: 25.0,
                bound: Bound::AtLeast,
            },
            tolerance_mm: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyFontRequirement {
    pub family: String,
    /// Other family names accepted as the same typeface.
    pub aliases: Vec<String>,
    pub size_pt: f64,
    pub tolerance_pt: f64,
}

impl Default for BodyFontRequirement {
    fn default() -> Self {
        Self {
            family: "Times New Roman".into(),
            aliases: vec!["Times".into(), "Times-Roman".into()],
            size_pt: 12.0,
            tolerance_pt: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleFontRequirement {
    pub family: String,
    pub aliases: Vec<String>,
    pub size_pt: f64,
    pub bold: bool,
}

impl Default for TitleFontRequirement {
    fn default() -> Self {
        Self {
            family: "Times New Roman".into(),
            aliases: vec!["Times".into(), "Times-Roman".into()],
            size_pt: 16.0,
            bold: true,
        }
    }
}

/// Line spacing of body text as a multiple of single spacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSpacingRequirement {
    pub expected: f64,
    pub tolerance: f64,
}

impl Default for LineSpacingRequirement {
    fn default() -> Self {
        Self {
            expected: 1.5,
            tolerance: 0.25,
        }
    }
}

/// A chapter the main text must contain, found by its heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredChapter {
    /// Suffix of the rule id, `chapter.<id>`.
    pub id: String,
    /// Heading named in messages.
    pub title: String,
    /// Accepted headings, compared without numbering, case or diacritics.
    pub markers: Vec<String>,
}

impl RequiredChapter {
    pub fn new(id: &str, title: &str, markers: &[&str]) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            markers: markers.iter().map(|marker| marker.to_string()).collect(),
        }
    }
}

/// Versioned, externally supplied rule values. Changing these never needs a
/// rebuild; rule logic lives in `techcheck-rules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSetConfig {
    pub version: String,
    pub university_name: String,
    pub faculty_name: String,
    /// Largest edit distance still reported as a malformed (rather than
    /// missing) canonical string.
    pub near_miss_distance: usize,
    pub margins: MarginRequirements,
    pub body_font: BodyFontRequirement,
    pub title_font: TitleFontRequirement,
    pub line_spacing: LineSpacingRequirement,
    pub abstract_max_words: usize,
    pub min_keywords: usize,
    pub required_sections: Vec<PageRole>,
    pub required_chapters: Vec<RequiredChapter>,
    /// Rule ids switched off for this rule set.
    pub disabled_rules: Vec<String>,
}

impl Default for RuleSetConfig {
    fn default() -> Self {
        Self {
            version: "fdv-2024.1".into(),
            university_name: "UNIVERZA V LJUBLJANI".into(),
            faculty_name: "FAKULTETA ZA DRUŽBENE VEDE".into(),
            near_miss_distance: 2,
            margins: MarginRequirements::default(),
            body_font: BodyFontRequirement::default(),
            title_font: TitleFontRequirement::default(),
            line_spacing: LineSpacingRequirement::default(),
            abstract_max_words: 250,
            min_keywords: 3,
            required_sections: vec![
                PageRole::Title,
                PageRole::Declaration,
                PageRole::AbstractSl,
                PageRole::AbstractEn,
                PageRole::Toc,
                PageRole::References,
            ],
            required_chapters: vec![
                RequiredChapter::new("introduction", "Uvod", &["Uvod", "Introduction"]),
                RequiredChapter::new(
                    "conclusion",
                    "Zaključek",
                    &["Zaključek", "Sklep", "Sklepne ugotovitve", "Conclusion"],
                ),
            ],
            disabled_rules: vec!["judgment.chapter_structure".into()],
        }
    }
}

impl RuleSetConfig {
    pub fn is_enabled(&self, rule_id: &str) -> bool {
        !self.disabled_rules.iter().any(|id| id == rule_id)
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// How long terminal jobs stay queryable.
    pub retention_secs: u64,
    /// How often the eviction task runs.
    pub eviction_interval_secs: u64,
    /// Jobs allowed to run their pipeline at the same time.
    pub worker_slots: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            eviction_interval_secs: 60,
            worker_slots: 4,
        }
    }
}
