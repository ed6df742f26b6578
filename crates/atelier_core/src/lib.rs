//! # atelier_core
//!
//! Workflow graph executor for Atelier.
//!
//! This crate provides the directed workflow graph model, the execution
//! state machine, and the executor that walks a graph of agent steps,
//! human decision points, and conditional branches.
//!
//! # Architecture
//!
//! - **Graph**: typed nodes and edges with integrity validation
//! - **State**: status, visited nodes, and last error for one run
//! - **Handlers**: host traits for step execution, decisions, and hooks
//! - **Executor**: traversal with suspension, cooperative stop, halt on
//!   error
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use atelier_core::{WorkflowGraphExecutor, Workflows};
//!
//! let executor = WorkflowGraphExecutor::new(
//!     Workflows::full_pipeline(),
//!     step_handler,     // Arc<dyn StepHandler>, e.g. the agent pipeline
//!     decision_handler, // Arc<dyn DecisionHandler>
//! );
//! let state = executor.start("build a todo app").await?;
//! ```

pub mod error;
pub mod executor;
pub mod graph;
pub mod handler;
pub mod state;
pub mod step;

// Re-export main types for convenience
pub use error::{CoreError, CoreResult};
pub use executor::WorkflowGraphExecutor;
pub use graph::{DecisionOption, Edge, EdgeCondition, Node, NodeKind, WorkflowGraph, Workflows};
pub use handler::{DecisionHandler, HookLogLevel, StepHandler, TracingHooks, WorkflowHooks};
pub use state::{ExecutionStatus, WorkflowExecutionState};
pub use step::StepKind;
