//! Agent step pipeline: one model-backed step, end to end.
//!
//! Composes prompt assembly, context prioritization, response caching,
//! artifact extraction, validation, and bounded self-correction behind
//! the single-step contract the workflow executor consumes.

pub mod cache;
pub mod corrector;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod prioritizer;
pub mod prompts;
pub mod store;
pub mod types;
pub mod validator;

pub use cache::{CachedResult, ResponseCache};
pub use corrector::{AutoCorrector, CorrectionResult};
pub use error::{PipelineError, PipelineResult};
pub use parser::CodeArtifactParser;
pub use pipeline::AgentStepPipeline;
pub use prioritizer::{ContextPrioritizer, ContextSelection, SelectedArtifact};
pub use store::{ArtifactStore, MergeAction};
pub use types::{ParsedArtifact, Severity, StepOutcome, ValidationIssue, ValidationReport};
pub use validator::ArtifactValidator;
