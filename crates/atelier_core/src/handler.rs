//! Host callback traits consumed by the executor.
//!
//! The executor owns traversal and state; everything with an opinion
//! about *what happens* at a node is supplied by the host through these
//! traits. The step handler is normally bound to the agent step pipeline,
//! and the decision handler to whatever surface collects the human's
//! answer (a CLI prompt, a UI event, a channel).

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::CoreResult;
use crate::graph::DecisionOption;
use crate::state::WorkflowExecutionState;
use crate::step::StepKind;

/// Executes one agent step and returns its textual output.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Run a step of the given kind.
    ///
    /// `input` is the accumulated request text for the run;
    /// `previous_output` is the output of the last agent step, if any.
    async fn execute_step(
        &self,
        step: StepKind,
        input: &str,
        previous_output: Option<&str>,
    ) -> CoreResult<String>;
}

/// Resolves a human decision node.
///
/// The returned future suspends the run until the host resolves it with
/// an option id. Hosts without an interactive surface can complete it
/// from a channel; the executor never polls.
#[async_trait]
pub trait DecisionHandler: Send + Sync {
    async fn decide(
        &self,
        node_id: &str,
        question: &str,
        options: &[DecisionOption],
    ) -> CoreResult<String>;
}

/// Log severity forwarded to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Observation hooks fired by the executor.
///
/// All methods have no-op defaults so hosts implement only what they
/// observe. `on_state_change` fires after every state mutation.
pub trait WorkflowHooks: Send + Sync {
    fn on_state_change(&self, _state: &WorkflowExecutionState) {}

    fn on_log(&self, _message: &str, _level: HookLogLevel) {}
}

/// Hooks implementation that forwards logs to `tracing` and ignores
/// state changes.
#[derive(Debug, Default)]
pub struct TracingHooks;

impl WorkflowHooks for TracingHooks {
    fn on_log(&self, message: &str, level: HookLogLevel) {
        match level {
            HookLogLevel::Debug => debug!("{}", message),
            HookLogLevel::Info => info!("{}", message),
            HookLogLevel::Warn => warn!("{}", message),
            HookLogLevel::Error => error!("{}", message),
        }
    }
}
