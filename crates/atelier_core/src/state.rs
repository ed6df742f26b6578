//! Workflow execution state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution status of a workflow run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Run has not started, or was stopped cooperatively.
    Idle,
    /// Run is walking the graph.
    Running,
    /// Run is suspended at a human decision node.
    WaitingHuman,
    /// Run reached an end node.
    Completed,
    /// Run halted on an error.
    Error,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl ExecutionStatus {
    /// Whether this status ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Snapshot of a workflow run.
///
/// Mutated only by the executor; hosts observe it through the
/// state-change notification or by asking the executor for a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowExecutionState {
    pub status: ExecutionStatus,
    /// Node currently being executed (or suspended on).
    pub current_node_id: Option<String>,
    /// Nodes visited so far, in visit order. A node revisited through a
    /// retry loop appears once per visit.
    pub visited_nodes: Vec<String>,
    /// Error that halted the run, if any.
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times a node was visited.
    pub fn visit_count(&self, node_id: &str) -> usize {
        self.visited_nodes.iter().filter(|n| *n == node_id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Error.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::WaitingHuman.is_terminal());
        assert!(!ExecutionStatus::Idle.is_terminal());
    }

    #[test]
    fn test_visit_count() {
        let mut state = WorkflowExecutionState::new();
        state.visited_nodes = vec!["a".into(), "b".into(), "a".into()];
        assert_eq!(state.visit_count("a"), 2);
        assert_eq!(state.visit_count("b"), 1);
        assert_eq!(state.visit_count("c"), 0);
    }
}
