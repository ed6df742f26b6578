//! Rule-based validation of generated artifact batches.
//!
//! Rules are ordered and independent: structural first, then
//! environment conventions, then hygiene. Each finding subtracts a
//! fixed penalty from a score that starts at 100 and floors at 0.
//! Severity ordering is contractual (any critical finding blocks
//! acceptance regardless of score); the point values themselves are
//! empirically chosen and may be recalibrated.

use std::collections::BTreeSet;

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::store::ArtifactStore;
use crate::types::{ParsedArtifact, Severity, ValidationIssue, ValidationReport};

// Penalty table. Ordering of severities matters more than the numbers.
const PENALTY_DUPLICATE_DEFAULT_EXPORT: u32 = 25;
const PENALTY_UNRESOLVED_IMPORT: u32 = 20;
const PENALTY_EXPORT_IMPORT_MISMATCH: u32 = 20;
const PENALTY_MISSING_CLIENT_DIRECTIVE: u32 = 15;
const PENALTY_SERVER_API_IN_CLIENT: u32 = 15;
const PENALTY_EMBEDDED_SECRET: u32 = 25;
const PENALTY_DYNAMIC_EVAL: u32 = 20;
const PENALTY_UNSAFE_MARKUP: u32 = 10;
const PENALTY_INCOMPLETE_MARKER: u32 = 10;
const PENALTY_SHORT_FILE: u32 = 5;
const PENALTY_MISSING_ITERATION_KEY: u32 = 5;
const PENALTY_NON_NULL_ASSERTION: u32 = 5;
const PENALTY_DEBUG_STATEMENT: u32 = 5;

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?m)^\s*import\s+(?:([A-Za-z_$][\w$]*)\s*,?\s*)?(?:\{([^}]*)\}\s*)?(?:from\s*)?['"]([^'"]+)['"]"#,
        )
        .unwrap()
    })
}

fn secret_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(password|secret|api[_-]?key|token)\s*[=:]\s*['"][^'"]+['"]"#).unwrap()
    })
}

fn jsx_map_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // .map((item) => <li>...  without a key attribute on the same line
    RE.get_or_init(|| Regex::new(r"\.map\(\s*\(?[\w,\s{}:]*\)?\s*=>\s*[\s(]*<").unwrap())
}

/// Validates an artifact batch against the accumulated store.
#[derive(Debug, Default)]
pub struct ArtifactValidator;

impl ArtifactValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run every rule over the batch. The store supplies already-merged
    /// artifacts so cross-file rules see the whole project.
    pub fn validate(&self, batch: &[ParsedArtifact], store: &ArtifactStore) -> ValidationReport {
        let mut issues = Vec::new();

        let known_paths: BTreeSet<String> = batch
            .iter()
            .map(|a| a.path.clone())
            .chain(store.paths())
            .collect();

        for artifact in batch {
            self.check_structure(artifact, batch, store, &known_paths, &mut issues);
        }
        for artifact in batch {
            self.check_conventions(artifact, &mut issues);
        }
        for artifact in batch {
            self.check_hygiene(artifact, &mut issues);
        }

        let score = issues
            .iter()
            .fold(100u32, |score, issue| score.saturating_sub(penalty(issue)));

        debug!(
            "Validated {} artifact(s): score {}, {} issue(s)",
            batch.len(),
            score,
            issues.len()
        );

        ValidationReport { score, issues }
    }

    /// Relative import specs in the batch that resolve to no known
    /// artifact. The corrector enumerates these in its directive.
    pub fn missing_import_paths(
        &self,
        batch: &[ParsedArtifact],
        store: &ArtifactStore,
    ) -> Vec<String> {
        let known_paths: BTreeSet<String> = batch
            .iter()
            .map(|a| a.path.clone())
            .chain(store.paths())
            .collect();

        let mut missing = Vec::new();
        for artifact in batch.iter().filter(|a| is_script(a)) {
            for import in parse_imports(&artifact.content) {
                if !import.source.starts_with('.') {
                    continue;
                }
                let resolved = resolve_relative(&artifact.path, &import.source);
                if match_known_path(&resolved, &known_paths).is_none()
                    && !missing.contains(&resolved)
                {
                    missing.push(resolved);
                }
            }
        }
        missing
    }

    fn check_structure(
        &self,
        artifact: &ParsedArtifact,
        batch: &[ParsedArtifact],
        store: &ArtifactStore,
        known_paths: &BTreeSet<String>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if !is_script(artifact) {
            return;
        }

        if artifact.content.matches("export default").count() > 1 {
            issues.push(ValidationIssue::new(
                Severity::Critical,
                format!("'{}' declares more than one default export", artifact.path),
                Some(&artifact.path),
            ));
        }

        for import in parse_imports(&artifact.content) {
            if !import.source.starts_with('.') {
                continue;
            }
            let resolved = resolve_relative(&artifact.path, &import.source);
            let Some(target_path) = match_known_path(&resolved, known_paths) else {
                issues.push(ValidationIssue::new(
                    Severity::Critical,
                    format!(
                        "'{}' imports '{}' which is not in the generated file set",
                        artifact.path, import.source
                    ),
                    Some(&artifact.path),
                ));
                continue;
            };

            if target_path.ends_with(".css") || target_path.ends_with(".json") {
                continue;
            }
            let Some(target) = batch
                .iter()
                .find(|a| a.path == target_path)
                .cloned()
                .or_else(|| store.get(&target_path).cloned())
            else {
                continue;
            };

            if import.default_name.is_some() && !target.content.contains("export default") {
                issues.push(ValidationIssue::new(
                    Severity::Critical,
                    format!(
                        "'{}' default-imports from '{}', which has no default export",
                        artifact.path, target_path
                    ),
                    Some(&artifact.path),
                ));
            }
            for name in &import.named {
                if !exports_name(&target.content, name) {
                    issues.push(ValidationIssue::new(
                        Severity::Critical,
                        format!(
                            "'{}' imports '{{ {} }}' from '{}', which does not export it",
                            artifact.path, name, target_path
                        ),
                        Some(&artifact.path),
                    ));
                }
            }
        }
    }

    fn check_conventions(&self, artifact: &ParsedArtifact, issues: &mut Vec<ValidationIssue>) {
        if !is_script(artifact) {
            return;
        }
        let content = &artifact.content;

        let uses_interactivity = content.contains("useState(")
            || content.contains("useEffect(")
            || content.contains("useRef(")
            || content.contains("onClick=");
        let server_routed = artifact.path.starts_with("app/") || artifact.path.starts_with("src/app/");
        let has_client_directive = content
            .lines()
            .take(3)
            .any(|l| l.contains("\"use client\"") || l.contains("'use client'"));

        if server_routed && uses_interactivity && !has_client_directive {
            issues.push(ValidationIssue::new(
                Severity::Critical,
                format!(
                    "'{}' uses interactive hooks but is missing the 'use client' directive",
                    artifact.path
                ),
                Some(&artifact.path),
            ));
        }

        if has_client_directive {
            for module in ["fs", "path", "child_process", "net"] {
                let single = format!("from '{}'", module);
                let double = format!("from \"{}\"", module);
                if content.contains(&single) || content.contains(&double) {
                    issues.push(ValidationIssue::new(
                        Severity::Critical,
                        format!(
                            "'{}' is a client file but imports the server-only module '{}'",
                            artifact.path, module
                        ),
                        Some(&artifact.path),
                    ));
                }
            }
        }
    }

    fn check_hygiene(&self, artifact: &ParsedArtifact, issues: &mut Vec<ValidationIssue>) {
        let content = &artifact.content;
        let path = &artifact.path;

        if secret_regex().is_match(content) {
            issues.push(ValidationIssue::new(
                Severity::Critical,
                format!("'{}' contains what looks like an embedded secret", path),
                Some(path),
            ));
        }
        if content.contains("eval(") || content.contains("new Function(") {
            issues.push(ValidationIssue::new(
                Severity::Critical,
                format!("'{}' uses dynamic code evaluation", path),
                Some(path),
            ));
        }
        if content.contains("dangerouslySetInnerHTML") || content.contains(".innerHTML =") {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                format!("'{}' injects raw markup", path),
                Some(path),
            ));
        }

        let incomplete = ["// TODO", "// FIXME", "// rest of", "/* ... */", "your code here"];
        if incomplete.iter().any(|m| content.contains(m)) || content.trim().ends_with("...") {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                format!("'{}' contains incomplete-code markers", path),
                Some(path),
            ));
        }

        if content.trim().len() < 20 {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                format!("'{}' is suspiciously short", path),
                Some(path),
            ));
        }

        if is_script(artifact) {
            for line in content.lines() {
                if jsx_map_regex().is_match(line) && !content.contains("key=") {
                    issues.push(ValidationIssue::new(
                        Severity::Warning,
                        format!("'{}' renders a list without iteration keys", path),
                        Some(path),
                    ));
                    break;
                }
            }

            if content.contains("!.") {
                issues.push(ValidationIssue::new(
                    Severity::Warning,
                    format!("'{}' uses unchecked non-null assertions", path),
                    Some(path),
                ));
            }

            if content.contains("console.log(") || content.contains("debugger") {
                issues.push(ValidationIssue::new(
                    Severity::Warning,
                    format!("'{}' contains leftover debug statements", path),
                    Some(path),
                ));
            }
        }
    }
}

fn penalty(issue: &ValidationIssue) -> u32 {
    // Penalties keyed by message class keeps the table in one place.
    let m = issue.message.as_str();
    if m.contains("default export") && m.contains("more than one") {
        PENALTY_DUPLICATE_DEFAULT_EXPORT
    } else if m.contains("not in the generated file set") {
        PENALTY_UNRESOLVED_IMPORT
    } else if m.contains("does not export") || m.contains("no default export") {
        PENALTY_EXPORT_IMPORT_MISMATCH
    } else if m.contains("'use client'") {
        PENALTY_MISSING_CLIENT_DIRECTIVE
    } else if m.contains("server-only module") {
        PENALTY_SERVER_API_IN_CLIENT
    } else if m.contains("embedded secret") {
        PENALTY_EMBEDDED_SECRET
    } else if m.contains("dynamic code evaluation") {
        PENALTY_DYNAMIC_EVAL
    } else if m.contains("raw markup") {
        PENALTY_UNSAFE_MARKUP
    } else if m.contains("incomplete-code") {
        PENALTY_INCOMPLETE_MARKER
    } else if m.contains("suspiciously short") {
        PENALTY_SHORT_FILE
    } else if m.contains("iteration keys") {
        PENALTY_MISSING_ITERATION_KEY
    } else if m.contains("non-null assertions") {
        PENALTY_NON_NULL_ASSERTION
    } else {
        PENALTY_DEBUG_STATEMENT
    }
}

fn is_script(artifact: &ParsedArtifact) -> bool {
    matches!(artifact.language.as_str(), "javascript" | "typescript")
        || [".js", ".jsx", ".ts", ".tsx"]
            .iter()
            .any(|ext| artifact.path.ends_with(ext))
}

#[derive(Debug)]
struct ParsedImport {
    default_name: Option<String>,
    named: Vec<String>,
    source: String,
}

fn parse_imports(content: &str) -> Vec<ParsedImport> {
    import_regex()
        .captures_iter(content)
        .map(|caps| ParsedImport {
            default_name: caps.get(1).map(|m| m.as_str().to_string()),
            named: caps
                .get(2)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|n| {
                            n.trim()
                                .trim_start_matches("type ")
                                .split_whitespace()
                                .next()
                                .unwrap_or_default()
                                .to_string()
                        })
                        .filter(|n| !n.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            source: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
        .collect()
}

/// Resolve `./` and `../` segments of an import spec against the
/// importer's directory.
fn resolve_relative(importer: &str, spec: &str) -> String {
    let mut segments: Vec<&str> = importer.split('/').collect();
    segments.pop(); // file name

    for part in spec.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Match a resolved import against known paths, trying the usual
/// extension and index-file suffixes.
fn match_known_path(resolved: &str, known: &BTreeSet<String>) -> Option<String> {
    if known.contains(resolved) {
        return Some(resolved.to_string());
    }
    const SUFFIXES: [&str; 10] = [
        ".ts", ".tsx", ".js", ".jsx", ".css", ".json", "/index.ts", "/index.tsx", "/index.js",
        "/index.jsx",
    ];
    SUFFIXES
        .iter()
        .map(|suffix| format!("{}{}", resolved, suffix))
        .find(|candidate| known.contains(candidate))
}

fn exports_name(content: &str, name: &str) -> bool {
    let patterns = [
        format!("export const {}", name),
        format!("export let {}", name),
        format!("export function {}", name),
        format!("export async function {}", name),
        format!("export class {}", name),
        format!("export interface {}", name),
        format!("export type {}", name),
        format!("export enum {}", name),
    ];
    if patterns.iter().any(|p| content.contains(p)) {
        return true;
    }
    // export { a, b as c }
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"export\s*\{([^}]*)\}").unwrap());
    re.captures_iter(content).any(|caps| {
        caps[1]
            .split(',')
            .filter_map(|n| n.split_whitespace().last())
            .any(|n| n == name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_of(files: &[(&str, &str)]) -> Vec<ParsedArtifact> {
        files
            .iter()
            .map(|(path, content)| ParsedArtifact::new(*path, *content, "typescript"))
            .collect()
    }

    fn validate(files: &[(&str, &str)]) -> ValidationReport {
        ArtifactValidator::new().validate(&batch_of(files), &ArtifactStore::new())
    }

    #[test]
    fn test_clean_batch_is_acceptable() {
        let report = validate(&[(
            "src/App.tsx",
            "export default function App() {\n  return <div>ok</div>;\n}\n",
        )]);
        assert_eq!(report.score, 100);
        assert!(report.is_acceptable());
    }

    #[test]
    fn test_duplicate_default_export_is_critical_and_names_the_file() {
        let report = validate(&[(
            "src/App.tsx",
            "export default function App() { return null; }\nexport default App;\n",
        )]);
        assert!(!report.is_acceptable());
        assert_eq!(report.critical_count(), 1);
        assert!(report.issues[0].message.contains("src/App.tsx"));
        assert_eq!(report.issues[0].artifact_path.as_deref(), Some("src/App.tsx"));
    }

    #[test]
    fn test_unresolved_relative_import_is_critical() {
        let report = validate(&[(
            "src/App.tsx",
            "import { helper } from './helpers';\nexport default function App() { return helper(); }\n",
        )]);
        assert!(report
            .critical_messages()
            .iter()
            .any(|m| m.contains("./helpers")));
    }

    #[test]
    fn test_resolved_import_with_matching_export_passes() {
        let report = validate(&[
            (
                "src/App.tsx",
                "import { helper } from './helpers';\nexport default function App() { return helper(); }\n",
            ),
            ("src/helpers.ts", "export const helper = () => 42;\n"),
        ]);
        assert_eq!(report.critical_count(), 0);
    }

    #[test]
    fn test_named_import_without_matching_export_is_critical() {
        let report = validate(&[
            (
                "src/App.tsx",
                "import { missing } from './helpers';\nexport default function App() { return missing(); }\n",
            ),
            ("src/helpers.ts", "export const helper = () => 42;\n"),
        ]);
        assert!(report
            .critical_messages()
            .iter()
            .any(|m| m.contains("missing")));
    }

    #[test]
    fn test_default_import_without_default_export_is_critical() {
        let report = validate(&[
            (
                "src/App.tsx",
                "import Helper from './helpers';\nexport default function App() { return <Helper />; }\n",
            ),
            ("src/helpers.tsx", "export const Helper = () => null;\n"),
        ]);
        assert!(report
            .critical_messages()
            .iter()
            .any(|m| m.contains("no default export")));
    }

    #[test]
    fn test_store_contents_resolve_imports() {
        let mut store = ArtifactStore::new();
        store.merge(&batch_of(&[(
            "src/helpers.ts",
            "export const helper = () => 1;\n",
        )]));
        let batch = batch_of(&[(
            "src/App.tsx",
            "import { helper } from './helpers';\nexport default function App() { return helper(); }\n",
        )]);
        let report = ArtifactValidator::new().validate(&batch, &store);
        assert_eq!(report.critical_count(), 0);
    }

    #[test]
    fn test_missing_use_client_directive() {
        let report = validate(&[(
            "app/page.tsx",
            "import { useState } from 'react';\nexport default function Page() {\n  const [n] = useState(0);\n  return <div>{n}</div>;\n}\n",
        )]);
        assert!(report
            .critical_messages()
            .iter()
            .any(|m| m.contains("'use client'")));
    }

    #[test]
    fn test_server_module_in_client_file() {
        let report = validate(&[(
            "src/App.tsx",
            "'use client';\nimport fs from 'fs';\nexport default function App() { return null; }\n",
        )]);
        assert!(report
            .critical_messages()
            .iter()
            .any(|m| m.contains("server-only module 'fs'")));
    }

    #[test]
    fn test_embedded_secret_is_critical() {
        let report = validate(&[(
            "src/config.ts",
            "export const apiKey = 'sk-123456789';\nexport const other = 1;\n",
        )]);
        assert!(report
            .critical_messages()
            .iter()
            .any(|m| m.contains("embedded secret")));
    }

    #[test]
    fn test_debug_statement_is_warning_only() {
        let report = validate(&[(
            "src/App.tsx",
            "export default function App() {\n  console.log('here');\n  return null;\n}\n",
        )]);
        assert_eq!(report.critical_count(), 0);
        assert_eq!(report.score, 95);
        assert!(report.is_acceptable());
    }

    #[test]
    fn test_score_is_monotonically_non_increasing() {
        let clean = "export default function App() {\n  return <div>ok</div>;\n}\n";
        let with_debug =
            "export default function App() {\n  console.log('x');\n  return <div>ok</div>;\n}\n";
        let with_debug_and_eval =
            "export default function App() {\n  console.log('x');\n  eval('1');\n  return <div>ok</div>;\n}\n";

        let s0 = validate(&[("src/App.tsx", clean)]).score;
        let s1 = validate(&[("src/App.tsx", with_debug)]).score;
        let s2 = validate(&[("src/App.tsx", with_debug_and_eval)]).score;
        assert!(s0 >= s1);
        assert!(s1 >= s2);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let rotten = "import X from './nope';\nimport { y } from './also-nope';\nexport default 1;\nexport default 2;\neval('x');\nconst apiKey = 'leaked-value';\nconsole.log('x');\n";
        let report = validate(&[("src/bad.ts", rotten)]);
        assert_eq!(report.score, 0);
        assert!(!report.is_acceptable());
    }

    #[test]
    fn test_missing_import_paths_are_enumerated_once() {
        let batch = batch_of(&[
            (
                "src/App.tsx",
                "import { a } from './lib/a';\nimport { b } from './lib/a';\nexport default function App() { return a(b); }\n",
            ),
        ]);
        let missing =
            ArtifactValidator::new().missing_import_paths(&batch, &ArtifactStore::new());
        assert_eq!(missing, vec!["src/lib/a"]);
    }

    #[test]
    fn test_relative_resolution_handles_parent_segments() {
        assert_eq!(
            resolve_relative("src/components/Button.tsx", "../lib/utils"),
            "src/lib/utils"
        );
        assert_eq!(resolve_relative("src/App.tsx", "./store"), "src/store");
    }
}
