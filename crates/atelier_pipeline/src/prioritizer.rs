//! Context selection under a character budget.
//!
//! Later steps want to see the artifacts produced so far, but prompts
//! have a finite budget. The prioritizer scores each artifact, then
//! greedily packs the highest-priority ones. At most one artifact is
//! truncated (the one straddling the budget boundary, with a visible
//! marker); everything else is either included in full or recorded by
//! name in `dropped`.

use tracing::debug;

use crate::types::ParsedArtifact;

/// Marker appended to a truncated artifact; counts against the budget.
pub const TRUNCATION_MARKER: &str = "\n[... truncated ...]";

/// Minimum useful content to keep when truncating; below this the
/// artifact is dropped instead.
const MIN_TRUNCATED_CHARS: usize = 120;

/// Content above this size is deprioritized.
const LARGE_FILE_CHARS: usize = 8_000;

/// One artifact chosen for the prompt context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedArtifact {
    pub path: String,
    pub content: String,
    pub truncated: bool,
}

/// Outcome of a selection pass.
#[derive(Debug, Clone, Default)]
pub struct ContextSelection {
    pub selected: Vec<SelectedArtifact>,
    /// Characters of selected content, markers included.
    pub total_chars: usize,
    /// Paths excluded entirely, names only.
    pub dropped: Vec<String>,
}

impl ContextSelection {
    /// Render the selection as a prompt block.
    pub fn as_prompt_block(&self) -> String {
        let mut block = String::new();
        for artifact in &self.selected {
            block.push_str(&format!("--- {} ---\n{}\n", artifact.path, artifact.content));
        }
        if !self.dropped.is_empty() {
            block.push_str(&format!("(omitted: {})\n", self.dropped.join(", ")));
        }
        block
    }
}

/// Scores and packs artifacts into a character budget.
#[derive(Debug, Default)]
pub struct ContextPrioritizer;

impl ContextPrioritizer {
    pub fn new() -> Self {
        Self
    }

    /// Select artifacts for the prompt, highest priority first.
    pub fn select(
        &self,
        artifacts: &[ParsedArtifact],
        request_text: &str,
        max_chars: usize,
    ) -> ContextSelection {
        let mut ranked: Vec<&ParsedArtifact> = artifacts.iter().collect();
        // Stable sort on (priority desc, path asc) keeps ties deterministic.
        ranked.sort_by(|a, b| {
            priority(b, request_text)
                .cmp(&priority(a, request_text))
                .then_with(|| a.path.cmp(&b.path))
        });

        let mut selection = ContextSelection::default();
        let mut budget_exhausted = false;

        for artifact in ranked {
            if budget_exhausted {
                selection.dropped.push(artifact.path.clone());
                continue;
            }

            let remaining = max_chars - selection.total_chars;
            if artifact.content.len() <= remaining {
                selection.total_chars += artifact.content.len();
                selection.selected.push(SelectedArtifact {
                    path: artifact.path.clone(),
                    content: artifact.content.clone(),
                    truncated: false,
                });
                continue;
            }

            // Boundary artifact: truncate if enough room remains for a
            // useful prefix, otherwise drop. Either way, nothing later
            // fits in full.
            budget_exhausted = true;
            if remaining >= MIN_TRUNCATED_CHARS + TRUNCATION_MARKER.len() {
                let keep = floor_char_boundary(&artifact.content, remaining - TRUNCATION_MARKER.len());
                let content = format!("{}{}", &artifact.content[..keep], TRUNCATION_MARKER);
                selection.total_chars += content.len();
                selection.selected.push(SelectedArtifact {
                    path: artifact.path.clone(),
                    content,
                    truncated: true,
                });
            } else {
                selection.dropped.push(artifact.path.clone());
            }
        }

        debug!(
            "Context selection: {} included, {} dropped, {}/{} chars",
            selection.selected.len(),
            selection.dropped.len(),
            selection.total_chars,
            max_chars
        );
        selection
    }
}

fn priority(artifact: &ParsedArtifact, request_text: &str) -> i32 {
    let mut score = 20;
    let path = artifact.path.to_lowercase();
    let file_name = path.rsplit('/').next().unwrap_or(&path);
    let stem = file_name.split('.').next().unwrap_or(file_name);

    let request = request_text.to_lowercase();
    if !stem.is_empty() && (request.contains(file_name) || request.contains(stem)) {
        score += 100;
    }

    let entry_names = ["index", "main", "app", "layout", "page"];
    if entry_names.contains(&stem) {
        score += 50;
    }

    let state_markers = ["store", "context", "state", "provider", "reducer"];
    if state_markers.iter().any(|m| path.contains(m)) {
        score += 30;
    }

    let config_like = path.ends_with(".json")
        || path.ends_with(".yml")
        || path.ends_with(".yaml")
        || path.contains(".config.")
        || file_name.starts_with(".env");
    if config_like {
        score -= 15;
    }

    if artifact.content.len() > LARGE_FILE_CHARS {
        score -= 25;
    }

    score
}

/// Largest index `<= max` that is a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut index = max;
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(path: &str, content: &str) -> ParsedArtifact {
        ParsedArtifact::new(path, content, "typescript")
    }

    #[test]
    fn test_budget_is_never_exceeded() {
        let artifacts = vec![
            artifact("src/a.ts", &"a".repeat(400)),
            artifact("src/b.ts", &"b".repeat(400)),
            artifact("src/c.ts", &"c".repeat(400)),
        ];
        let selection = ContextPrioritizer::new().select(&artifacts, "", 1000);
        assert!(selection.total_chars <= 1000);
    }

    #[test]
    fn test_file_named_in_request_ranks_first() {
        let artifacts = vec![
            artifact("src/index.ts", "entry"),
            artifact("src/cart.ts", "cart logic"),
        ];
        let selection =
            ContextPrioritizer::new().select(&artifacts, "fix the bug in cart.ts", 10_000);
        assert_eq!(selection.selected[0].path, "src/cart.ts");
    }

    #[test]
    fn test_entry_files_outrank_plain_files() {
        let artifacts = vec![
            artifact("src/helpers.ts", "x"),
            artifact("src/App.tsx", "x"),
        ];
        let selection = ContextPrioritizer::new().select(&artifacts, "", 10_000);
        assert_eq!(selection.selected[0].path, "src/App.tsx");
    }

    #[test]
    fn test_config_files_rank_below_source() {
        let artifacts = vec![
            artifact("package.json", "{}"),
            artifact("src/util.ts", "export const u = 1;"),
        ];
        let selection = ContextPrioritizer::new().select(&artifacts, "", 10_000);
        assert_eq!(selection.selected[0].path, "src/util.ts");
    }

    #[test]
    fn test_boundary_artifact_is_truncated_with_marker() {
        let artifacts = vec![
            artifact("src/App.tsx", &"a".repeat(500)),
            artifact("src/big.ts", &"b".repeat(5_000)),
        ];
        let selection = ContextPrioritizer::new().select(&artifacts, "", 1_000);

        assert!(selection.total_chars <= 1_000);
        let truncated: Vec<_> = selection.selected.iter().filter(|s| s.truncated).collect();
        assert_eq!(truncated.len(), 1);
        assert!(truncated[0].content.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_every_artifact_lands_in_exactly_one_bucket() {
        let artifacts = vec![
            artifact("src/a.ts", &"a".repeat(300)),
            artifact("src/b.ts", &"b".repeat(300)),
            artifact("src/c.ts", &"c".repeat(300)),
            artifact("src/d.ts", &"d".repeat(300)),
        ];
        let selection = ContextPrioritizer::new().select(&artifacts, "", 700);

        let mut seen: Vec<String> = selection
            .selected
            .iter()
            .map(|s| s.path.clone())
            .chain(selection.dropped.iter().cloned())
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["src/a.ts", "src/b.ts", "src/c.ts", "src/d.ts"]);
    }

    #[test]
    fn test_tiny_budget_drops_everything() {
        let artifacts = vec![artifact("src/a.ts", &"a".repeat(300))];
        let selection = ContextPrioritizer::new().select(&artifacts, "", 50);
        assert!(selection.selected.is_empty());
        assert_eq!(selection.dropped, vec!["src/a.ts"]);
        assert_eq!(selection.total_chars, 0);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let artifacts = vec![
            artifact("src/a.ts", "same priority"),
            artifact("src/b.ts", "same priority"),
        ];
        let prioritizer = ContextPrioritizer::new();
        let first = prioritizer.select(&artifacts, "", 10_000);
        let second = prioritizer.select(&artifacts, "", 10_000);
        assert_eq!(first.selected, second.selected);
        assert_eq!(first.dropped, second.dropped);
    }

    #[test]
    fn test_prompt_block_names_omitted_files() {
        let artifacts = vec![
            artifact("src/a.ts", &"a".repeat(300)),
            artifact("src/b.ts", &"b".repeat(300)),
        ];
        let selection = ContextPrioritizer::new().select(&artifacts, "", 320);
        let block = selection.as_prompt_block();
        assert!(block.contains("--- src/a.ts ---"));
        assert!(block.contains("omitted: src/b.ts"));
    }
}
