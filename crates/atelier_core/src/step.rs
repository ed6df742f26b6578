//! Step kinds for agent nodes.
//!
//! Each agent node in a workflow graph is tagged with a `StepKind` that
//! selects the role instructions and downstream handling for that step.
//! The enum is closed: every consumer (prompt selection, parser routing,
//! validator rules, correction directives) matches on it exhaustively,
//! so adding a kind surfaces every place that needs a decision.

use serde::{Deserialize, Serialize};

/// The role a step plays in the agent pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Break the request down into an ordered task list.
    Planning,
    /// Produce code artifacts from the plan.
    CodeGeneration,
    /// Review generated artifacts for quality issues.
    Review,
    /// Audit generated artifacts for security issues.
    SecurityAudit,
    /// Summarize build/run instructions for the generated artifacts.
    Execution,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Planning => "planning",
            StepKind::CodeGeneration => "code_generation",
            StepKind::Review => "review",
            StepKind::SecurityAudit => "security_audit",
            StepKind::Execution => "execution",
        }
    }

    /// Get the display name for this step kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            StepKind::Planning => "Planner",
            StepKind::CodeGeneration => "Code Generator",
            StepKind::Review => "Reviewer",
            StepKind::SecurityAudit => "Security Auditor",
            StepKind::Execution => "Execution Engineer",
        }
    }

    /// Whether this kind produces code artifacts that must be parsed
    /// and validated.
    pub fn is_generation(&self) -> bool {
        matches!(self, StepKind::CodeGeneration)
    }

    /// Get the default order of steps in the full pipeline.
    pub fn default_order() -> Vec<StepKind> {
        vec![
            StepKind::Planning,
            StepKind::CodeGeneration,
            StepKind::Review,
            StepKind::SecurityAudit,
            StepKind::Execution,
        ]
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
