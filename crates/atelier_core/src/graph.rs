//! Workflow graph definitions.
//!
//! A workflow is a directed graph of nodes (agent steps, human decision
//! points, conditional branches) connected by edges that may carry a
//! routing condition. The executor walks this graph; this module only
//! defines the in-memory shape and its integrity rules. Serialization of
//! graphs to disk is a host concern, so everything here derives serde
//! but nothing reads or writes files.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::step::StepKind;

/// An option presented at a human decision node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionOption {
    pub id: String,
    pub label: String,
}

impl DecisionOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// The kind of a workflow node, with per-kind payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry marker. Exactly one per graph.
    Start,
    /// Terminal marker. Reaching it completes the run.
    End,
    /// An agent step handled by the step handler.
    Agent { step: StepKind },
    /// A suspension point resolved by an external decision.
    HumanDecision {
        question: String,
        options: Vec<DecisionOption>,
    },
    /// Routes on the previous step's output without invoking an agent.
    Conditional,
}

/// A node in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// A routing condition attached to an edge.
///
/// Conditions form a closed set rather than a string expression language;
/// the executor matches them exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCondition {
    /// Matches when a human decision resolved with this option id.
    OptionIs(String),
    /// Matches when the previous output contains this text.
    OutputContains(String),
    /// Matches when the previous output equals this text exactly
    /// (surrounding whitespace ignored).
    OutputEquals(String),
}

impl EdgeCondition {
    /// Evaluate the condition against the routing input.
    ///
    /// For decision nodes the input is the resolved option id; for agent
    /// and conditional nodes it is the previous step's output.
    pub fn matches(&self, input: &str) -> bool {
        match self {
            EdgeCondition::OptionIs(id) => input == id,
            EdgeCondition::OutputContains(text) => input.contains(text.as_str()),
            EdgeCondition::OutputEquals(text) => input.trim() == text.trim(),
        }
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EdgeCondition>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: EdgeCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// A directed workflow graph.
///
/// Edge declaration order is significant: the executor advances along the
/// first edge (unconditional, or whose condition matches) in the order
/// edges were added.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Add a node.
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a start node.
    pub fn start(self, id: impl Into<String>) -> Self {
        self.node(Node::new(id, NodeKind::Start))
    }

    /// Add an end node.
    pub fn end(self, id: impl Into<String>) -> Self {
        self.node(Node::new(id, NodeKind::End))
    }

    /// Add an agent node.
    pub fn agent(self, id: impl Into<String>, step: StepKind) -> Self {
        self.node(Node::new(id, NodeKind::Agent { step }))
    }

    /// Add a human decision node.
    pub fn decision(
        self,
        id: impl Into<String>,
        question: impl Into<String>,
        options: Vec<DecisionOption>,
    ) -> Self {
        self.node(Node::new(
            id,
            NodeKind::HumanDecision {
                question: question.into(),
                options,
            },
        ))
    }

    /// Add a conditional routing node.
    pub fn conditional(self, id: impl Into<String>) -> Self {
        self.node(Node::new(id, NodeKind::Conditional))
    }

    /// Add an unconditional edge.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    /// Add a conditional edge.
    pub fn edge_if(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: EdgeCondition,
    ) -> Self {
        self.edges.push(Edge::new(from, to).with_condition(condition));
        self
    }

    /// Look up a node by id.
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The single start node, if the graph has exactly one.
    pub fn start_node(&self) -> Option<&Node> {
        let mut starts = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Start));
        match (starts.next(), starts.next()) {
            (Some(node), None) => Some(node),
            _ => None,
        }
    }

    /// Outgoing edges of a node, in declaration order.
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Validate graph integrity.
    ///
    /// Checks: unique node ids, exactly one start node, edge endpoints
    /// exist, every non-end node has at least one outgoing edge, decision
    /// options are non-empty and each option has a matching edge.
    pub fn validate(&self) -> CoreResult<()> {
        if self.nodes.is_empty() {
            return Err(CoreError::integrity("graph has no nodes"));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(CoreError::integrity(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let start_count = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Start))
            .count();
        if start_count != 1 {
            return Err(CoreError::integrity(format!(
                "graph must have exactly one start node, found {}",
                start_count
            )));
        }

        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(CoreError::integrity(format!(
                        "edge references unknown node '{}'",
                        endpoint
                    )));
                }
            }
        }

        let mut outgoing: HashMap<&str, usize> = HashMap::new();
        for edge in &self.edges {
            *outgoing.entry(edge.from.as_str()).or_default() += 1;
        }

        for node in &self.nodes {
            if matches!(node.kind, NodeKind::End) {
                continue;
            }
            if outgoing.get(node.id.as_str()).copied().unwrap_or(0) == 0 {
                return Err(CoreError::integrity(format!(
                    "node '{}' has no outgoing edge",
                    node.id
                )));
            }
            if let NodeKind::HumanDecision { ref options, .. } = node.kind {
                if options.is_empty() {
                    return Err(CoreError::integrity(format!(
                        "decision node '{}' has no options",
                        node.id
                    )));
                }
                for option in options {
                    let has_edge = self.edges_from(&node.id).any(|e| {
                        matches!(&e.condition, Some(EdgeCondition::OptionIs(id)) if *id == option.id)
                            || e.condition.is_none()
                    });
                    if !has_edge {
                        return Err(CoreError::integrity(format!(
                            "decision node '{}' option '{}' has no matching edge",
                            node.id, option.id
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Predefined workflow graphs.
pub struct Workflows;

impl Workflows {
    /// Full pipeline: plan → generate → review → security audit → execute.
    pub fn full_pipeline() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("Full Pipeline").start("start");
        let mut prev = "start".to_string();
        for kind in StepKind::default_order() {
            let id = kind.as_str().to_string();
            graph = graph.agent(&id, kind).edge(&prev, &id);
            prev = id;
        }
        graph.end("end").edge(&prev, "end")
    }

    /// Generation with a review gate: a human approves or requests a
    /// regeneration loop.
    pub fn gated_generation() -> WorkflowGraph {
        WorkflowGraph::new("Gated Generation")
            .start("start")
            .agent("plan", StepKind::Planning)
            .agent("generate", StepKind::CodeGeneration)
            .decision(
                "approve",
                "Accept the generated code?",
                vec![
                    DecisionOption::new("accept", "Accept"),
                    DecisionOption::new("retry", "Regenerate"),
                ],
            )
            .end("end")
            .edge("start", "plan")
            .edge("plan", "generate")
            .edge("generate", "approve")
            .edge_if("approve", "end", EdgeCondition::OptionIs("accept".into()))
            .edge_if(
                "approve",
                "generate",
                EdgeCondition::OptionIs("retry".into()),
            )
    }
}
