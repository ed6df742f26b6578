//! Validate command - check a workflow graph file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use atelier_core::{NodeKind, WorkflowGraph};

#[derive(Args)]
pub struct ValidateArgs {
    /// Workflow graph file (YAML)
    graph: PathBuf,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.graph)
        .with_context(|| format!("reading graph file {}", args.graph.display()))?;
    let graph: WorkflowGraph = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing graph file {}", args.graph.display()))?;

    println!("📋 Validating workflow '{}'...", graph.name);

    if let Err(e) = graph.validate() {
        anyhow::bail!("graph validation failed: {}", e);
    }

    let agents = graph
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Agent { .. }))
        .count();
    let decisions = graph
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::HumanDecision { .. }))
        .count();

    println!(
        "✅ Graph is valid: {} node(s) ({} agent, {} decision), {} edge(s)",
        graph.nodes.len(),
        agents,
        decisions,
        graph.edges.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use atelier_core::Workflows;

    fn write_graph(graph: &WorkflowGraph) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_yaml::to_string(graph).unwrap().as_bytes())
            .unwrap();
        file
    }

    #[tokio::test]
    async fn test_validate_accepts_builtin_workflow() {
        let file = write_graph(&Workflows::full_pipeline());
        let result = execute(ValidateArgs {
            graph: file.path().to_path_buf(),
        })
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_validate_rejects_graph_without_start() {
        let graph = WorkflowGraph::new("broken");
        let file = write_graph(&graph);
        let err = execute(ValidateArgs {
            graph: file.path().to_path_buf(),
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }

    #[tokio::test]
    async fn test_validate_reports_missing_file() {
        let err = execute(ValidateArgs {
            graph: PathBuf::from("/nonexistent/graph.yaml"),
        })
        .await
        .unwrap_err();
        assert!(format!("{:#}", err).contains("reading graph file"));
    }
}
