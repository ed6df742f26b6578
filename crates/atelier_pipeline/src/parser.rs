//! Code artifact extraction from raw model output.
//!
//! The parser is a pure function over text: no side effects, no state,
//! identical input always yields identical artifacts. It scans fenced
//! code regions and resolves each region's path by priority:
//!
//! 1. an explicit path-marker comment inside the region
//! 2. an emphasized filename on the line immediately before the fence
//! 3. content-signature rules (structural markers that imply a
//!    conventional file)
//! 4. a numbered fallback keyed on the content type
//!
//! Regions that read as prose rather than code are rejected. Text with
//! no fences at all falls back to unfenced path-marker sections, or to a
//! single artifact when the whole blob looks like one importable unit.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::ParsedArtifact;

/// One fenced region as scanned from the raw text.
#[derive(Debug)]
struct FencedRegion {
    /// Info string after the opening fence, lowercased.
    tag: String,
    body: String,
    /// Last non-blank line before the opening fence.
    preceding: Option<String>,
}

fn marker_regexes() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // // src/App.tsx | # path: app.py | -- schema.sql
            Regex::new(
                r"(?i)^\s*(?://|#|--)\s*(?:path|file(?:name)?)?\s*:?\s*([\w@\\./-]+\.[A-Za-z][A-Za-z0-9]*)\s*$",
            )
            .unwrap(),
            // /* src/index.css */
            Regex::new(r"^\s*/\*\s*([\w@\\./-]+\.[A-Za-z][A-Za-z0-9]*)\s*\*/\s*$").unwrap(),
            // <!-- index.html -->
            Regex::new(r"^\s*<!--\s*([\w@\\./-]+\.[A-Za-z][A-Za-z0-9]*)\s*-->\s*$").unwrap(),
        ]
    })
}

fn emphasis_regexes() -> &'static [Regex; 4] {
    static RE: OnceLock<[Regex; 4]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // **src/App.tsx**
            Regex::new(r"\*\*([\w@\\./-]+\.[A-Za-z][A-Za-z0-9]*)\*\*").unwrap(),
            // `src/App.tsx`
            Regex::new(r"`([\w@\\./-]+\.[A-Za-z][A-Za-z0-9]*)`").unwrap(),
            // ### File: src/App.tsx
            Regex::new(r"(?i)^#{1,6}\s*(?:file:?\s*)?([\w@\\./-]+\.[A-Za-z][A-Za-z0-9]*)\s*$")
                .unwrap(),
            // src/App.tsx:
            Regex::new(r"^([\w@\\./-]+\.[A-Za-z][A-Za-z0-9]*):?\s*$").unwrap(),
        ]
    })
}

/// Extracts `(path, content, language)` artifacts from raw generation
/// text. Stateless; construct once and reuse freely.
#[derive(Debug, Default)]
pub struct CodeArtifactParser;

impl CodeArtifactParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse raw model output into artifacts.
    pub fn parse(&self, text: &str) -> Vec<ParsedArtifact> {
        let regions = scan_fenced_regions(text);

        if regions.is_empty() {
            return self.parse_unfenced(text);
        }

        let mut artifacts = Vec::new();
        let mut fallback_index = 0usize;

        for region in &regions {
            if is_prose(region) {
                continue;
            }

            let path = resolve_path(region).unwrap_or_else(|| {
                fallback_index += 1;
                format!("artifact_{}.{}", fallback_index, extension_for(region))
            });

            artifacts.push(ParsedArtifact::new(
                normalize_path(&path),
                region.body.trim_end().to_string(),
                language_for(region),
            ));
        }

        artifacts
    }

    /// Fallbacks for text with no fenced regions at all.
    fn parse_unfenced(&self, text: &str) -> Vec<ParsedArtifact> {
        let sections = split_at_path_markers(text);
        if !sections.is_empty() {
            return sections
                .into_iter()
                .map(|(path, content)| {
                    let language = language_from_extension(&path);
                    ParsedArtifact::new(normalize_path(&path), content.trim().to_string(), language)
                })
                .collect();
        }

        if looks_like_importable_unit(text) {
            let content = trim_at_last_balanced_brace(text.trim());
            let region = FencedRegion {
                tag: String::new(),
                body: content.to_string(),
                preceding: None,
            };
            let path = path_from_signature(&region)
                .unwrap_or_else(|| format!("artifact_1.{}", extension_for(&region)));
            return vec![ParsedArtifact::new(
                normalize_path(&path),
                content.to_string(),
                language_for(&region),
            )];
        }

        Vec::new()
    }
}

/// Scan triple-backtick fenced regions, keeping the preceding line for
/// emphasized-filename resolution.
fn scan_fenced_regions(text: &str) -> Vec<FencedRegion> {
    let mut regions = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    let mut tag = String::new();
    let mut preceding: Option<String> = None;
    let mut last_nonblank: Option<String> = None;
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            if in_fence {
                regions.push(FencedRegion {
                    tag: std::mem::take(&mut tag),
                    body: body.join("\n"),
                    preceding: preceding.take(),
                });
                body.clear();
                in_fence = false;
            } else {
                tag = trimmed.trim_start_matches('`').trim().to_lowercase();
                preceding = last_nonblank.clone();
                in_fence = true;
            }
            continue;
        }

        if in_fence {
            body.push(line);
        } else if !line.trim().is_empty() {
            last_nonblank = Some(line.trim().to_string());
        }
    }

    // An unterminated fence still yields its body.
    if in_fence && !body.is_empty() {
        regions.push(FencedRegion {
            tag,
            body: body.join("\n"),
            preceding,
        });
    }

    regions
}

/// Tokens that mark a body as code rather than prose.
fn has_structural_token(body: &str) -> bool {
    const KEYWORDS: [&str; 10] = [
        "import ", "export ", "def ", "class ", "function ", "fn ", "const ", "let ", "return",
        "func ",
    ];
    body.contains('{')
        || body.contains('}')
        || body.contains(';')
        || body.contains('=')
        || body.contains("</")
        || body.contains("/>")
        || KEYWORDS.iter().any(|k| body.contains(k))
}

/// Tags for data formats whose bodies are plain key/value mappings and
/// carry no code-style tokens.
fn is_data_language(tag: &str) -> bool {
    matches!(
        tag,
        "yaml" | "yml" | "json" | "toml" | "ini" | "env" | "properties"
    )
}

/// Reject regions that read as prose: markdown-heading-led bodies, or a
/// declared code language with no structural token at all.
fn is_prose(region: &FencedRegion) -> bool {
    // A declared data format is structural on its own; `key: value`
    // mappings have none of the code tokens below.
    if is_data_language(&region.tag) {
        return false;
    }

    // Declared-code languages, untagged blocks, and heading-led bodies
    // alike must show at least one structural token.
    !has_structural_token(&region.body)
}

/// Resolve a region's path by the documented priority; `None` means the
/// caller assigns a numbered fallback.
fn resolve_path(region: &FencedRegion) -> Option<String> {
    path_from_marker(&region.body)
        .or_else(|| path_from_preceding(region.preceding.as_deref()))
        .or_else(|| path_from_signature(region))
}

/// Priority (a): explicit path-marker comment in the first lines of the
/// region.
fn path_from_marker(body: &str) -> Option<String> {
    for line in body.lines().filter(|l| !l.trim().is_empty()).take(3) {
        for re in marker_regexes() {
            if let Some(caps) = re.captures(line) {
                let candidate = caps.get(1)?.as_str();
                if is_plausible_path(candidate) {
                    return Some(candidate.to_string());
                }
            }
        }
    }
    None
}

/// Priority (b): emphasized filename on the line before the fence.
fn path_from_preceding(preceding: Option<&str>) -> Option<String> {
    let line = preceding?;
    for re in emphasis_regexes() {
        if let Some(caps) = re.captures(line) {
            let candidate = caps.get(1)?.as_str();
            if is_plausible_path(candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// Priority (c): structural markers implying a conventional file.
fn path_from_signature(region: &FencedRegion) -> Option<String> {
    let body = &region.body;
    let typed = is_typescript(region);

    if body.contains("<!DOCTYPE html") || body.contains("<html") {
        return Some("index.html".to_string());
    }
    if body.contains("\"dependencies\"") && body.contains("\"name\"") {
        return Some("package.json".to_string());
    }
    if body.contains("\"compilerOptions\"") {
        return Some("tsconfig.json".to_string());
    }
    if body.contains("@tailwind") {
        return Some("src/index.css".to_string());
    }
    if body.contains("createRoot(") || body.contains("ReactDOM.render") {
        return Some(if typed { "src/main.tsx" } else { "src/main.jsx" }.to_string());
    }
    if body.contains("export default function App")
        || (body.contains("function App(") && body.contains("export default"))
        || (body.contains("const App") && body.contains("export default App"))
    {
        return Some(if typed { "src/App.tsx" } else { "src/App.jsx" }.to_string());
    }
    if body.contains("if __name__") {
        return Some("main.py".to_string());
    }
    if body.contains("fn main()") {
        return Some("src/main.rs".to_string());
    }
    if body.contains("package main") && body.contains("func main") {
        return Some("main.go".to_string());
    }

    None
}

fn is_typescript(region: &FencedRegion) -> bool {
    matches!(region.tag.as_str(), "ts" | "tsx" | "typescript")
        || region.body.contains("interface ")
        || region.body.contains(": string")
        || region.body.contains(": number")
        || region.body.contains("<Props>")
}

/// A path candidate must carry an extension and no URL scheme.
fn is_plausible_path(candidate: &str) -> bool {
    let has_extension = candidate
        .rsplit('.')
        .next()
        .map(|ext| !ext.is_empty() && ext.len() <= 12 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false);
    has_extension && candidate.contains('.') && !candidate.contains("://")
}

/// Normalize separators: backslashes to slashes, no leading `./` or `/`.
fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.starts_with("./") {
        normalized = normalized[2..].to_string();
    }
    let normalized = normalized.trim_start_matches('/');
    let mut out = String::with_capacity(normalized.len());
    let mut prev_slash = false;
    for c in normalized.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

fn language_for(region: &FencedRegion) -> String {
    match region.tag.as_str() {
        "js" | "jsx" | "javascript" => "javascript".to_string(),
        "ts" | "tsx" | "typescript" => "typescript".to_string(),
        "py" | "python" => "python".to_string(),
        "rs" | "rust" => "rust".to_string(),
        "go" | "golang" => "go".to_string(),
        "html" => "html".to_string(),
        "css" => "css".to_string(),
        "json" => "json".to_string(),
        "yaml" | "yml" => "yaml".to_string(),
        "sql" => "sql".to_string(),
        "sh" | "bash" | "shell" => "shell".to_string(),
        "" => infer_language(&region.body),
        other => other.to_string(),
    }
}

fn infer_language(body: &str) -> String {
    if body.contains("def ") && body.contains(':') && !body.contains('{') {
        "python".to_string()
    } else if body.contains("fn ") && body.contains("->") {
        "rust".to_string()
    } else if body.contains("interface ") || body.contains(": string") {
        "typescript".to_string()
    } else if body.contains("function ") || body.contains("=>") || body.contains("const ") {
        "javascript".to_string()
    } else if body.contains("<html") || body.contains("<!DOCTYPE") {
        "html".to_string()
    } else {
        "text".to_string()
    }
}

fn extension_for(region: &FencedRegion) -> &'static str {
    match language_for(region).as_str() {
        "javascript" => "js",
        "typescript" => "ts",
        "python" => "py",
        "rust" => "rs",
        "go" => "go",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "yaml" => "yml",
        "sql" => "sql",
        "shell" => "sh",
        _ => "txt",
    }
}

fn language_from_extension(path: &str) -> String {
    let ext = path.rsplit('.').next().unwrap_or_default().to_lowercase();
    let region = FencedRegion {
        tag: ext,
        body: String::new(),
        preceding: None,
    };
    language_for(&region)
}

/// Unfenced fallback: split the blob into sections at bare path-marker
/// comment lines.
fn split_at_path_markers(text: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();

    for line in text.lines() {
        let marker = marker_regexes()
            .iter()
            .find_map(|re| re.captures(line))
            .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .filter(|candidate| is_plausible_path(candidate));

        match marker {
            Some(path) => sections.push((path, Vec::new())),
            None => {
                if let Some((_, content)) = sections.last_mut() {
                    content.push(line);
                }
            }
        }
    }

    sections
        .into_iter()
        .map(|(path, lines)| (path, lines.join("\n")))
        .filter(|(_, content)| !content.trim().is_empty())
        .collect()
}

/// Whether a whole unfenced blob looks like one importable code unit.
fn looks_like_importable_unit(text: &str) -> bool {
    let head: String = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(5)
        .collect::<Vec<_>>()
        .join("\n");
    let opens_like_code = head.contains("import ")
        || head.contains("export ")
        || head.contains("function ")
        || head.contains("class ")
        || head.contains("def ")
        || head.contains("fn ")
        || head.contains("const ");
    opens_like_code && has_structural_token(text)
}

/// Trim trailing non-code chatter after the last balanced closing brace.
///
/// If braces never balance (or the content has none, e.g. Python), the
/// text is returned unchanged.
fn trim_at_last_balanced_brace(text: &str) -> &str {
    let mut depth: i64 = 0;
    let mut entered = false;
    let mut last_balanced_end = None;

    for (index, c) in text.char_indices() {
        match c {
            '{' => {
                depth += 1;
                entered = true;
            }
            '}' => {
                depth -= 1;
                if entered && depth == 0 {
                    last_balanced_end = Some(index + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    match last_balanced_end {
        Some(end) if depth <= 0 => &text[..end],
        _ => text,
    }
}
