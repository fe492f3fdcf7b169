//! The stage-2 reviewer's output: a structured review with sanitized,
//! policy-filterable findings.

use serde::{Deserialize, Serialize};

use crate::plan::RiskEstimate;

/// Finding priority. `0` is critical (most severe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const CRITICAL: Priority = Priority(0);
    pub const WARNING: Priority = Priority(1);
    pub const INFO: Priority = Priority(2);

    /// Construct from a raw `0..=2` value.
    pub fn new(value: u8) -> Option<Self> {
        if value <= 2 { Some(Priority(value)) } else { None }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value).ok_or_else(|| format!("priority must be 0, 1, or 2, got {value}"))
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

/// The category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingType {
    Bug,
    Security,
    Performance,
    Style,
    Tests,
    Docs,
}

/// One reviewer-generated finding against a specific file (and optional
/// line range).
///
/// Invariant: if `start_line` is `None`, `end_line` must also be `None`.
/// If `file` matches the sensitive-path predicate, `suggested_patch` is
/// forced to `None` by the sanitizer (not by this type — the wire format
/// allows the LLM to propose one, which the sanitizer then strips).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub priority: Priority,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub file: String,
    #[serde(default)]
    pub start_line: Option<u32>,
    #[serde(default)]
    pub end_line: Option<u32>,
    pub message: String,
    pub evidence: String,
    #[serde(default)]
    pub suggested_patch: Option<String>,
}

impl Finding {
    /// `true` iff the line-range invariant holds (`start_line.is_none()`
    /// implies `end_line.is_none()`).
    pub fn has_valid_line_range(&self) -> bool {
        self.start_line.is_some() || self.end_line.is_none()
    }

    /// Render the `file:start-end` location string used by the markdown
    /// renderer, or just `file` when no line range is present.
    pub fn location(&self) -> String {
        match (self.start_line, self.end_line) {
            (Some(start), Some(end)) if start != end => format!("{}:{}-{}", self.file, start, end),
            (Some(start), _) => format!("{}:{}", self.file, start),
            _ => self.file.clone(),
        }
    }
}

/// A single ticket's compliance assessment against the PR's changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCompliance {
    pub ticket_key: String,
    pub ticket_summary: String,
    #[serde(default)]
    pub fully_compliant: Vec<String>,
    #[serde(default)]
    pub not_compliant: Vec<String>,
    #[serde(default)]
    pub needs_human_verification: Vec<String>,
}

/// Stage-2 (reviewer) output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub summary: String,
    pub overall_risk: RiskEstimate,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub suggested_tests: Vec<String>,
    #[serde(default)]
    pub risk_hotspots: Vec<String>,
    #[serde(default)]
    pub files_reviewed: Vec<String>,
    #[serde(default)]
    pub files_skipped: Vec<String>,
    #[serde(default)]
    pub truncation_note: Option<String>,
    #[serde(default)]
    pub not_reviewed: Option<String>,
    #[serde(default)]
    pub ticket_compliance: Option<Vec<TicketCompliance>>,
}

impl Review {
    /// Findings whose line-range invariant is violated. A well-formed
    /// reviewer output has none; used by validation before trusting the
    /// review for rendering.
    pub fn findings_with_invalid_line_ranges(&self) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| !f.has_valid_line_range())
            .collect()
    }
}
