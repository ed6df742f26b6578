//! Workflow graph executor.
//!
//! Walks a validated [`WorkflowGraph`](crate::graph::WorkflowGraph) from
//! its start node until a terminal node, an error, or a cooperative stop.
//! Agent nodes are delegated to the host [`StepHandler`]; human decision
//! nodes genuinely suspend on the host [`DecisionHandler`] future until
//! it resolves with an option id. All state mutation happens here, and
//! every mutation fires the host state-change hook.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::{CoreError, CoreResult};
use crate::graph::{EdgeCondition, Node, NodeKind, WorkflowGraph};
use crate::handler::{DecisionHandler, StepHandler, WorkflowHooks};
use crate::state::{ExecutionStatus, WorkflowExecutionState};

/// No-op hooks used when the host does not install any.
struct NullHooks;

impl WorkflowHooks for NullHooks {}

/// Executes a workflow graph on behalf of a host.
///
/// One executor owns one run's state. There is no parallel node
/// execution: later steps depend on artifacts produced by earlier ones,
/// so traversal is a single logical thread that only suspends at the
/// model-call boundary and at decision nodes.
pub struct WorkflowGraphExecutor {
    graph: WorkflowGraph,
    steps: Arc<dyn StepHandler>,
    decisions: Arc<dyn DecisionHandler>,
    hooks: Arc<dyn WorkflowHooks>,
    state: Arc<RwLock<WorkflowExecutionState>>,
    stop_requested: Arc<AtomicBool>,
}

impl WorkflowGraphExecutor {
    /// Create an executor for the given graph and handlers.
    pub fn new(
        graph: WorkflowGraph,
        steps: Arc<dyn StepHandler>,
        decisions: Arc<dyn DecisionHandler>,
    ) -> Self {
        Self {
            graph,
            steps,
            decisions,
            hooks: Arc::new(NullHooks),
            state: Arc::new(RwLock::new(WorkflowExecutionState::new())),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Install observation hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn WorkflowHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Get a snapshot of the current execution state.
    pub async fn state(&self) -> WorkflowExecutionState {
        self.state.read().await.clone()
    }

    /// Request a cooperative stop.
    ///
    /// The flag is observed at node boundaries only; an in-flight model
    /// call or pending decision is not aborted. A stopped run returns to
    /// `Idle` and can be started again.
    pub fn stop(&self) {
        debug!("Stop requested for workflow '{}'", self.graph.name);
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Run the workflow for the given request text.
    ///
    /// Returns the final state snapshot. Any error is recorded in
    /// `last_error` with status `Error` before it propagates.
    pub async fn start(&self, request: &str) -> CoreResult<WorkflowExecutionState> {
        self.graph.validate()?;

        // Check-and-set under one write lock so two concurrent start()
        // calls cannot both pass the guard.
        let snapshot = {
            let mut state = self.state.write().await;
            if matches!(
                state.status,
                ExecutionStatus::Running | ExecutionStatus::WaitingHuman
            ) {
                return Err(CoreError::InvalidState(format!(
                    "workflow '{}' is already running",
                    self.graph.name
                )));
            }
            *state = WorkflowExecutionState::new();
            state.status = ExecutionStatus::Running;
            state.started_at = Some(Utc::now());
            state.clone()
        };
        self.hooks.on_state_change(&snapshot);

        info!("Starting workflow '{}'", self.graph.name);

        match self.traverse(request).await {
            Ok(state) => Ok(state),
            Err(e) => {
                error!("Workflow '{}' halted: {}", self.graph.name, e);
                self.mutate(|s| {
                    s.status = ExecutionStatus::Error;
                    s.last_error = Some(e.to_string());
                    s.completed_at = Some(Utc::now());
                })
                .await;
                Err(e)
            }
        }
    }

    async fn traverse(&self, request: &str) -> CoreResult<WorkflowExecutionState> {
        // validate() guarantees exactly one start node.
        let mut current = self
            .graph
            .start_node()
            .ok_or_else(|| CoreError::integrity("no start node"))?
            .id
            .clone();
        let mut previous_output: Option<String> = None;

        loop {
            if self.stop_requested.swap(false, Ordering::SeqCst) {
                info!("Workflow '{}' stopped at node boundary", self.graph.name);
                self.mutate(|s| {
                    s.status = ExecutionStatus::Idle;
                    s.current_node_id = None;
                })
                .await;
                return Ok(self.state().await);
            }

            let node = self
                .graph
                .find_node(&current)
                .ok_or_else(|| CoreError::NodeNotFound(current.clone()))?
                .clone();

            self.mutate(|s| s.current_node_id = Some(node.id.clone())).await;

            let routing_input = match &node.kind {
                NodeKind::Start => previous_output.clone().unwrap_or_default(),
                NodeKind::End => {
                    self.mutate(|s| {
                        s.visited_nodes.push(node.id.clone());
                        s.status = ExecutionStatus::Completed;
                        s.current_node_id = None;
                        s.completed_at = Some(Utc::now());
                    })
                    .await;
                    info!("Workflow '{}' completed", self.graph.name);
                    return Ok(self.state().await);
                }
                NodeKind::Agent { step } => {
                    info!("Executing agent node '{}' ({})", node.id, step);
                    let output = self
                        .steps
                        .execute_step(*step, request, previous_output.as_deref())
                        .await
                        .map_err(|e| CoreError::StepExecutionFailed {
                            node: node.id.clone(),
                            message: e.to_string(),
                        })?;
                    previous_output = Some(output.clone());
                    output
                }
                NodeKind::HumanDecision { question, options } => {
                    self.mutate(|s| s.status = ExecutionStatus::WaitingHuman).await;
                    info!("Suspending at decision node '{}'", node.id);

                    let chosen = self
                        .decisions
                        .decide(&node.id, question, options)
                        .await
                        .map_err(|e| CoreError::DecisionFailed {
                            node: node.id.clone(),
                            message: e.to_string(),
                        })?;

                    if !options.iter().any(|o| o.id == chosen) {
                        return Err(CoreError::integrity(format!(
                            "decision node '{}' resolved with unknown option '{}'",
                            node.id, chosen
                        )));
                    }

                    self.mutate(|s| s.status = ExecutionStatus::Running).await;
                    debug!("Decision node '{}' resolved with '{}'", node.id, chosen);
                    chosen
                }
                NodeKind::Conditional => previous_output.clone().unwrap_or_default(),
            };

            if !matches!(node.kind, NodeKind::End) {
                self.mutate(|s| s.visited_nodes.push(node.id.clone())).await;
            }

            current = self.next_node(&node, &routing_input)?;
        }
    }

    /// Select the next node: first edge in declaration order that is
    /// unconditional or whose condition matches the routing input.
    fn next_node(&self, node: &Node, routing_input: &str) -> CoreResult<String> {
        for edge in self.graph.edges_from(&node.id) {
            let taken = match &edge.condition {
                None => true,
                Some(condition) => condition.matches(routing_input),
            };
            if taken {
                debug!("Advancing '{}' -> '{}'", edge.from, edge.to);
                return Ok(edge.to.clone());
            }
        }

        Err(CoreError::integrity(format!(
            "no edge from node '{}' matches the current output",
            node.id
        )))
    }

    async fn mutate(&self, f: impl FnOnce(&mut WorkflowExecutionState)) {
        let snapshot = {
            let mut state = self.state.write().await;
            f(&mut state);
            state.clone()
        };
        self.hooks.on_state_change(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DecisionOption, Workflows};
    use crate::handler::HookLogLevel;
    use crate::step::StepKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Step handler that records invocations and replies with a fixed
    /// per-kind output.
    struct ScriptedSteps {
        calls: Mutex<Vec<(StepKind, Option<String>)>>,
        fail_on: Option<StepKind>,
    }

    impl ScriptedSteps {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(step: StepKind) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: Some(step),
            }
        }
    }

    #[async_trait]
    impl StepHandler for ScriptedSteps {
        async fn execute_step(
            &self,
            step: StepKind,
            _input: &str,
            previous_output: Option<&str>,
        ) -> CoreResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push((step, previous_output.map(String::from)));
            if self.fail_on == Some(step) {
                return Err(CoreError::StepExecutionFailed {
                    node: step.as_str().to_string(),
                    message: "scripted failure".to_string(),
                });
            }
            Ok(format!("output of {}", step))
        }
    }

    /// Decision handler that resolves with a fixed option id.
    struct FixedDecision {
        option: String,
    }

    #[async_trait]
    impl DecisionHandler for FixedDecision {
        async fn decide(
            &self,
            _node_id: &str,
            _question: &str,
            _options: &[DecisionOption],
        ) -> CoreResult<String> {
            Ok(self.option.clone())
        }
    }

    /// Decision handler that answers "retry" once, then "accept".
    struct RetryOnceDecision {
        answered: Mutex<bool>,
    }

    #[async_trait]
    impl DecisionHandler for RetryOnceDecision {
        async fn decide(
            &self,
            _node_id: &str,
            _question: &str,
            _options: &[DecisionOption],
        ) -> CoreResult<String> {
            let mut answered = self.answered.lock().unwrap();
            if *answered {
                Ok("accept".to_string())
            } else {
                *answered = true;
                Ok("retry".to_string())
            }
        }
    }

    struct RecordingHooks {
        statuses: Mutex<Vec<ExecutionStatus>>,
    }

    impl WorkflowHooks for RecordingHooks {
        fn on_state_change(&self, state: &WorkflowExecutionState) {
            self.statuses.lock().unwrap().push(state.status);
        }

        fn on_log(&self, _message: &str, _level: HookLogLevel) {}
    }

    fn executor(
        graph: WorkflowGraph,
        steps: ScriptedSteps,
        decision_option: &str,
    ) -> WorkflowGraphExecutor {
        WorkflowGraphExecutor::new(
            graph,
            Arc::new(steps),
            Arc::new(FixedDecision {
                option: decision_option.to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_full_pipeline_visits_every_node_once() {
        let exec = executor(Workflows::full_pipeline(), ScriptedSteps::new(), "accept");
        let state = exec.start("build a todo app").await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Completed);
        assert_eq!(state.visited_nodes.len(), 7); // start + 5 agents + end
        for node in &state.visited_nodes {
            assert_eq!(state.visit_count(node), 1, "node {} revisited", node);
        }
        assert!(state.last_error.is_none());
        assert!(state.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_previous_output_threads_between_agents() {
        let steps = Arc::new(ScriptedSteps::new());
        let exec = WorkflowGraphExecutor::new(
            Workflows::full_pipeline(),
            steps.clone(),
            Arc::new(FixedDecision {
                option: "accept".into(),
            }),
        );
        exec.start("request").await.unwrap();

        let calls = steps.calls.lock().unwrap();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0], (StepKind::Planning, None));
        assert_eq!(
            calls[1],
            (
                StepKind::CodeGeneration,
                Some("output of planning".to_string())
            )
        );
    }

    #[tokio::test]
    async fn test_step_failure_halts_with_error() {
        let exec = executor(
            Workflows::full_pipeline(),
            ScriptedSteps::failing_on(StepKind::Review),
            "accept",
        );
        let err = exec.start("request").await.unwrap_err();
        assert!(matches!(err, CoreError::StepExecutionFailed { .. }));

        let state = exec.state().await;
        assert_eq!(state.status, ExecutionStatus::Error);
        assert!(state.last_error.unwrap().contains("scripted failure"));
        // Halted at review; security audit and execution never ran.
        assert!(!state.visited_nodes.contains(&"review".to_string()));
    }

    #[tokio::test]
    async fn test_decision_routes_matching_edge() {
        let exec = executor(Workflows::gated_generation(), ScriptedSteps::new(), "accept");
        let state = exec.start("request").await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Completed);
        assert_eq!(state.visit_count("generate"), 1);
        assert_eq!(state.visit_count("approve"), 1);
    }

    #[tokio::test]
    async fn test_decision_retry_loop_revisits_generation() {
        let exec = WorkflowGraphExecutor::new(
            Workflows::gated_generation(),
            Arc::new(ScriptedSteps::new()),
            Arc::new(RetryOnceDecision {
                answered: Mutex::new(false),
            }),
        );
        let state = exec.start("request").await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Completed);
        assert_eq!(state.visit_count("generate"), 2);
        assert_eq!(state.visit_count("approve"), 2);
    }

    #[tokio::test]
    async fn test_unknown_decision_option_is_integrity_error() {
        let exec = executor(Workflows::gated_generation(), ScriptedSteps::new(), "maybe");
        let err = exec.start("request").await.unwrap_err();

        assert!(matches!(err, CoreError::GraphIntegrity(_)));
        assert!(err.to_string().contains("maybe"));
        assert_eq!(exec.state().await.status, ExecutionStatus::Error);
    }

    #[tokio::test]
    async fn test_waiting_human_status_is_observed() {
        let hooks = Arc::new(RecordingHooks {
            statuses: Mutex::new(Vec::new()),
        });
        let exec = WorkflowGraphExecutor::new(
            Workflows::gated_generation(),
            Arc::new(ScriptedSteps::new()),
            Arc::new(FixedDecision {
                option: "accept".into(),
            }),
        )
        .with_hooks(hooks.clone());

        exec.start("request").await.unwrap();

        let statuses = hooks.statuses.lock().unwrap();
        assert!(statuses.contains(&ExecutionStatus::WaitingHuman));
        assert_eq!(statuses.last(), Some(&ExecutionStatus::Completed));
    }

    #[tokio::test]
    async fn test_second_start_while_suspended_is_rejected() {
        /// Decision handler that suspends until the test releases it.
        struct GatedDecision {
            gate: Arc<tokio::sync::Notify>,
        }

        #[async_trait]
        impl DecisionHandler for GatedDecision {
            async fn decide(
                &self,
                _node_id: &str,
                _question: &str,
                _options: &[DecisionOption],
            ) -> CoreResult<String> {
                self.gate.notified().await;
                Ok("accept".to_string())
            }
        }

        let gate = Arc::new(tokio::sync::Notify::new());
        let exec = Arc::new(WorkflowGraphExecutor::new(
            Workflows::gated_generation(),
            Arc::new(ScriptedSteps::new()),
            Arc::new(GatedDecision { gate: gate.clone() }),
        ));

        let runner = {
            let exec = exec.clone();
            tokio::spawn(async move { exec.start("request").await })
        };

        while exec.state().await.status != ExecutionStatus::WaitingHuman {
            tokio::task::yield_now().await;
        }

        let err = exec.start("request").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        gate.notify_one();
        let state = runner.await.unwrap().unwrap();
        assert_eq!(state.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_stop_is_observed_at_node_boundary() {
        let exec = executor(Workflows::full_pipeline(), ScriptedSteps::new(), "accept");
        exec.stop();
        let state = exec.start("request").await.unwrap();

        // Flag was set before start; the run stops at the first boundary.
        assert_eq!(state.status, ExecutionStatus::Idle);
        assert!(state.visited_nodes.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_graph_rejected_before_traversal() {
        let graph = WorkflowGraph::new("broken")
            .start("start")
            .agent("plan", StepKind::Planning)
            .end("end")
            .edge("start", "plan");

        let exec = executor(graph, ScriptedSteps::new(), "accept");
        let err = exec.start("request").await.unwrap_err();
        assert!(matches!(err, CoreError::GraphIntegrity(_)));
    }

    #[tokio::test]
    async fn test_conditional_node_routes_on_previous_output() {
        let graph = WorkflowGraph::new("branch")
            .start("start")
            .agent("plan", StepKind::Planning)
            .conditional("route")
            .end("done")
            .end("other")
            .edge("start", "plan")
            .edge("plan", "route")
            .edge_if(
                "route",
                "done",
                EdgeCondition::OutputContains("planning".into()),
            )
            .edge("route", "other");

        let exec = executor(graph, ScriptedSteps::new(), "accept");
        let state = exec.start("request").await.unwrap();

        // ScriptedSteps emits "output of planning", so the conditional
        // matches the first edge.
        assert!(state.visited_nodes.contains(&"done".to_string()));
        assert!(!state.visited_nodes.contains(&"other".to_string()));
    }
}
