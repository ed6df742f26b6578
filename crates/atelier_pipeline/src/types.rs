//! Core types shared across the step pipeline.

use serde::{Deserialize, Serialize};

/// A code artifact extracted from raw model output.
///
/// Ephemeral until merged into the artifact store; merging is
/// last-writer-wins by path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedArtifact {
    /// Normalized, separator-clean relative path.
    pub path: String,
    pub content: String,
    /// Lowercase language tag ("typescript", "python", ...); best-effort.
    pub language: String,
}

impl ParsedArtifact {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language: language.into(),
        }
    }
}

/// Severity of a validation finding.
///
/// Ordering is contractual: `Critical > Warning > Info`. Any critical
/// finding blocks acceptance regardless of the numeric score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One validation finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
    /// Offending artifact, when the finding is file-specific.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}

impl ValidationIssue {
    pub fn new(severity: Severity, message: impl Into<String>, path: Option<&str>) -> Self {
        Self {
            severity,
            message: message.into(),
            artifact_path: path.map(String::from),
        }
    }
}

/// Severity-scored validation report for one artifact batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// 0-100; starts at 100 and loses a fixed penalty per finding.
    pub score: u32,
    /// Findings in rule order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// A report with no findings.
    pub fn clean() -> Self {
        Self {
            score: 100,
            issues: Vec::new(),
        }
    }

    pub fn critical_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count()
    }

    /// Acceptance rule: score at least 50 and zero critical findings.
    pub fn is_acceptable(&self) -> bool {
        self.score >= 50 && self.critical_count() == 0
    }

    /// Whether this report improves on another: strictly fewer critical
    /// findings, or the same criticals with a strictly higher score.
    pub fn improves_on(&self, other: &ValidationReport) -> bool {
        let (a, b) = (self.critical_count(), other.critical_count());
        a < b || (a == b && self.score > other.score)
    }

    /// Messages of all critical findings, in order.
    pub fn critical_messages(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .map(|i| i.message.as_str())
            .collect()
    }
}

/// The result of executing one agent step.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// The raw (or corrected) assistant text.
    pub content: String,
    /// Artifacts extracted from a generation step; empty otherwise.
    pub artifacts: Vec<ParsedArtifact>,
    /// Issues that remain after correction, surfaced instead of blocking.
    pub warnings: Vec<String>,
}
