//! Run command - execute a workflow and write its artifacts.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Args;
use tracing::{info, warn};

use atelier_core::{
    CoreError, CoreResult, DecisionHandler, DecisionOption, StepHandler, TracingHooks,
    WorkflowGraph, WorkflowGraphExecutor, Workflows,
};
use atelier_llm::HttpLlmClient;
use atelier_pipeline::AgentStepPipeline;

#[derive(Args)]
pub struct RunArgs {
    /// What to build
    request: String,

    /// Workflow graph file (YAML); overrides --workflow
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Built-in workflow to run
    #[arg(long, default_value = "full-pipeline")]
    workflow: String,

    /// Directory to write generated artifacts into
    #[arg(short, long, default_value = "generated")]
    out: PathBuf,

    /// Pre-answered decision, repeatable (e.g. --decision gate=accept)
    #[arg(long = "decision", value_name = "NODE=OPTION")]
    decisions: Vec<String>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let graph = load_graph(&args)?;
    info!("Running workflow '{}'", graph.name);

    let llm = HttpLlmClient::from_env().context("no model provider configured")?;
    let pipeline = Arc::new(AgentStepPipeline::new(Arc::new(llm)));

    let decisions = Arc::new(CliDecisions {
        preset: parse_decisions(&args.decisions)?,
    });

    let executor = WorkflowGraphExecutor::new(
        graph,
        pipeline.clone() as Arc<dyn StepHandler>,
        decisions,
    )
    .with_hooks(Arc::new(TracingHooks));

    let state = executor.start(&args.request).await?;

    println!("\n✅ Workflow completed ({} node(s) visited)", state.visited_nodes.len());

    let store = pipeline.artifacts();
    if store.is_empty() {
        println!("   No artifacts were generated.");
        return Ok(());
    }

    std::fs::create_dir_all(&args.out)?;
    let mut written = 0usize;
    for artifact in store.all() {
        let Some(target) = safe_join(&args.out, &artifact.path) else {
            warn!("Skipping artifact with unsafe path '{}'", artifact.path);
            continue;
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &artifact.content)
            .with_context(|| format!("writing {}", target.display()))?;
        println!("   📄 {}", artifact.path);
        written += 1;
    }
    println!("   {} file(s) written to {}", written, args.out.display());

    Ok(())
}

fn load_graph(args: &RunArgs) -> Result<WorkflowGraph> {
    if let Some(path) = &args.graph {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading graph file {}", path.display()))?;
        let graph: WorkflowGraph = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing graph file {}", path.display()))?;
        return Ok(graph);
    }

    match args.workflow.as_str() {
        "full-pipeline" => Ok(Workflows::full_pipeline()),
        "gated-generation" => Ok(Workflows::gated_generation()),
        other => bail!("unknown workflow '{}'", other),
    }
}

fn parse_decisions(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut preset = HashMap::new();
    for pair in pairs {
        let Some((node, option)) = pair.split_once('=') else {
            bail!("invalid --decision argument '{}', expected NODE=OPTION", pair);
        };
        preset.insert(node.to_string(), option.to_string());
    }
    Ok(preset)
}

/// Join an artifact path under the output root, rejecting absolute
/// paths and parent traversal.
fn safe_join(root: &Path, artifact_path: &str) -> Option<PathBuf> {
    let relative = Path::new(artifact_path);
    let clean = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if clean {
        Some(root.join(relative))
    } else {
        None
    }
}

/// Decisions answered from `--decision` flags, falling back to an
/// interactive prompt on stdin.
struct CliDecisions {
    preset: HashMap<String, String>,
}

#[async_trait]
impl DecisionHandler for CliDecisions {
    async fn decide(
        &self,
        node_id: &str,
        question: &str,
        options: &[DecisionOption],
    ) -> CoreResult<String> {
        if let Some(choice) = self.preset.get(node_id) {
            info!("Decision '{}' answered from arguments: {}", node_id, choice);
            return Ok(choice.clone());
        }

        println!("\n❓ {}", question);
        for option in options {
            println!("   [{}] {}", option.id, option.label);
        }
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let node = node_id.to_string();
        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|e| CoreError::DecisionFailed {
            node,
            message: e.to_string(),
        })??;

        Ok(line.trim().to_string())
    }
}
