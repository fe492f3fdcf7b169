//! The stage-1 planner's output: a risk-ranked triage plan over the PR's
//! changed files.

use serde::{Deserialize, Serialize};

/// The planner's coarse risk estimate, used only for token-budget
/// allocation. When the planner and reviewer disagree on overall risk,
/// the reviewer's value is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskEstimate {
    Low,
    Medium,
    High,
}

/// A file flagged by the planner as worth close attention, with a citation
/// (function name, line range, or token pattern — enforced by prompt, not
/// this validator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotspot {
    pub file: String,
    pub reason: String,
}

/// A group of related files the reviewer should examine together, with a
/// suggested token budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCluster {
    pub cluster_label: String,
    pub files: Vec<String>,
    pub token_budget: u32,
}

/// Stage-1 (planner) output. Every filename referenced must appear in the
/// input [`crate::PRContext`]; this is enforced at validation time by
/// [`TriagePlan::validate_against_context`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriagePlan {
    pub risk_ranking: Vec<String>,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
    #[serde(default)]
    pub file_clusters: Vec<FileCluster>,
    #[serde(default)]
    pub skip_files: Vec<String>,
    pub overall_risk_estimate: RiskEstimate,
}

impl TriagePlan {
    /// Validate that every filename the plan references appears among
    /// `known_files` (typically `PRContext::changed_files`' filenames).
    /// Returns the set of unknown filenames, if any.
    pub fn unknown_filenames<'a>(&'a self, known_files: &[String]) -> Vec<&'a str> {
        let mut unknown = Vec::new();
        let mut check = |name: &'a str| {
            if !known_files.iter().any(|k| k == name) {
                unknown.push(name);
            }
        };
        for f in &self.risk_ranking {
            check(f.as_str());
        }
        for h in &self.hotspots {
            check(h.file.as_str());
        }
        for c in &self.file_clusters {
            for f in &c.files {
                check(f.as_str());
            }
        }
        for f in &self.skip_files {
            check(f.as_str());
        }
        unknown
    }

    /// `true` iff every referenced filename is known.
    pub fn validate_against_context(&self, known_files: &[String]) -> bool {
        self.unknown_filenames(known_files).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> TriagePlan {
        TriagePlan {
            risk_ranking: vec!["src/lib.rs".to_string()],
            hotspots: vec![Hotspot {
                file: "src/lib.rs".to_string(),
                reason: "new auth branch at line 42".to_string(),
            }],
            file_clusters: vec![FileCluster {
                cluster_label: "auth".to_string(),
                files: vec!["src/lib.rs".to_string()],
                token_budget: 2048,
            }],
            skip_files: vec![],
            overall_risk_estimate: RiskEstimate::Medium,
        }
    }

    #[test]
    fn known_files_validate() {
        let known = vec!["src/lib.rs".to_string()];
        assert!(plan().validate_against_context(&known));
    }

    #[test]
    fn unknown_filename_is_reported() {
        let known = vec!["src/other.rs".to_string()];
        let p = plan();
        let unknown = p.unknown_filenames(&known);
        assert_eq!(unknown, vec!["src/lib.rs"]);
        assert!(!p.validate_against_context(&known));
    }

    #[test]
    fn risk_estimate_serializes_lowercase() {
        let json = serde_json::to_string(&RiskEstimate::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
