// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Validation report — the JSON record of one evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use techcheck_core::types::{Document, Finding, FontInfo, Margins, PageRole, Severity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub major: usize,
    pub minor: usize,
}

impl SeverityCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        findings.iter().fold(Self::default(), |mut counts, finding| {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Major => counts.major += 1,
                Severity::Minor => counts.minor += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.critical + self.major + self.minor
    }
}

/// Per-page layout facts as measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub index: u32,
    pub role: PageRole,
    pub margins: Option<Margins>,
    pub dominant_font: Option<FontInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub document_hash: String,
    pub rule_set_version: String,
    pub page_count: usize,
    pub pages: Vec<PageSummary>,
    pub counts: SeverityCounts,
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ValidationReport {
    pub fn new(document: &Document, rule_set_version: impl Into<String>, findings: Vec<Finding>) -> Self {
        let pages = document
            .pages
            .iter()
            .map(|page| PageSummary {
                index: page.index,
                role: page.role,
                margins: page.margins,
                dominant_font: page.dominant_font.clone(),
                warnings: page.warnings.clone(),
            })
            .collect();
        Self {
            document_hash: document.content_hash.clone(),
            rule_set_version: rule_set_version.into(),
            page_count: document.page_count(),
            pages,
            counts: SeverityCounts::tally(&findings),
            findings,
            warnings: document.warnings.clone(),
            generated_at: Utc::now(),
        }
    }

    /// No CRITICAL or MAJOR findings.
    pub fn passed(&self) -> bool {
        self.counts.critical == 0 && self.counts.major == 0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} page(s), {} finding(s): {} critical, {} major, {} minor [{}]",
            self.page_count,
            self.counts.total(),
            self.counts.critical,
            self.counts.major,
            self.counts.minor,
            if self.passed() { "PASS" } else { "FAIL" }
        )
    }
}
