//! CLI command definitions.

use clap::{Parser, Subcommand};

pub mod run;
pub mod validate;

/// Atelier - multi-step AI code generation workflows
#[derive(Parser)]
#[command(name = "atelier")]
#[command(version, about = "Atelier - multi-step AI code generation workflows")]
#[command(long_about = r#"
Atelier runs a workflow graph of agent steps (planning, code generation,
review, security audit, execution notes) against a model provider,
extracting and validating code artifacts along the way.

COMMANDS:
  run       → Execute a workflow for a request and write the artifacts
  validate  → Check a workflow graph file for integrity problems

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Graph validation failure
  4 - Workflow execution error

Set OPENAI_API_KEY or ANTHROPIC_API_KEY to select a provider;
ATELIER_LLM_MODEL overrides the default model.
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a workflow for a request
    Run(run::RunArgs),

    /// Validate a workflow graph file
    Validate(validate::ValidateArgs),
}
