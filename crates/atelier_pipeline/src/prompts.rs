//! Role instructions per step kind.
//!
//! Each step kind carries a system prompt that frames the model's role,
//! and a reshaping rule that turns the previous step's output into the
//! form the current step expects (a planning output becomes an explicit
//! task list before it reaches generation).

use atelier_core::StepKind;

/// Get the system prompt for a step kind.
pub fn system_prompt(step: StepKind) -> &'static str {
    match step {
        StepKind::Planning => PLANNER_SYSTEM_PROMPT,
        StepKind::CodeGeneration => GENERATOR_SYSTEM_PROMPT,
        StepKind::Review => REVIEWER_SYSTEM_PROMPT,
        StepKind::SecurityAudit => SECURITY_SYSTEM_PROMPT,
        StepKind::Execution => EXECUTION_SYSTEM_PROMPT,
    }
}

/// Reshape the previous step's output for the current step.
///
/// Kind-pairing rules:
/// - generation receives the plan as an explicit numbered task list
/// - review and audit receive the previous output labelled as the
///   material under inspection
/// - execution receives it as the deliverable to describe
/// - planning ignores previous output entirely
pub fn reshape_previous(step: StepKind, previous_output: Option<&str>) -> Option<String> {
    let previous = previous_output?.trim();
    if previous.is_empty() {
        return None;
    }

    match step {
        StepKind::Planning => None,
        StepKind::CodeGeneration => Some(format!(
            "Implement every task in this plan:\n{}",
            as_task_list(previous)
        )),
        StepKind::Review => Some(format!("Material under review:\n\n{}", previous)),
        StepKind::SecurityAudit => Some(format!("Material under audit:\n\n{}", previous)),
        StepKind::Execution => Some(format!(
            "Deliverable produced by the previous steps:\n\n{}",
            previous
        )),
    }
}

/// Turn free-form planning output into a numbered task list.
///
/// Lines that already look like list items keep their text; prose
/// paragraphs become one task each.
fn as_task_list(plan: &str) -> String {
    let mut tasks = Vec::new();
    for line in plan.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let stripped = trimmed
            .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == ' ')
            .trim_start_matches(['-', '*'])
            .trim();
        if !stripped.is_empty() {
            tasks.push(stripped.to_string());
        }
    }

    tasks
        .iter()
        .enumerate()
        .map(|(i, task)| format!("{}. {}", i + 1, task))
        .collect::<Vec<_>>()
        .join("\n")
}

// System prompts for each step kind

const PLANNER_SYSTEM_PROMPT: &str = r#"You are the Planner in Atelier, a multi-step code generation pipeline.

Your role is to:
1. Break the user's request into a short, ordered list of implementation tasks
2. Name the files the implementation will need
3. Call out constraints the generator must respect

Guidelines:
- Output a numbered task list, one concrete task per line
- Be specific about file names and responsibilities
- Do not write code; the generator step does that
"#;

const GENERATOR_SYSTEM_PROMPT: &str = r#"You are the Code Generator in Atelier, a multi-step code generation pipeline.

Your role is to:
1. Produce complete, runnable code for every task in the plan
2. Emit each file as a fenced code block
3. Start each block with a comment naming the file path

Guidelines:
- One fenced code block per file, with the language tag on the fence
- The first line inside each block is a comment with the file path, e.g. // src/App.tsx
- Generate complete files, never fragments or placeholders
- Include imports, error handling, and exports
"#;

const REVIEWER_SYSTEM_PROMPT: &str = r#"You are the Reviewer in Atelier, a multi-step code generation pipeline.

Your role is to:
1. Review the generated code for correctness and quality
2. Check imports, exports, and cross-file references
3. Identify bugs, dead code, and convention violations

Guidelines:
- Be specific: name the file and the problem
- Prioritize defects over style preferences
- Suggest a concrete fix for every problem you raise
"#;

const SECURITY_SYSTEM_PROMPT: &str = r#"You are the Security Auditor in Atelier, a multi-step code generation pipeline.

Your role is to:
1. Audit the generated code for vulnerabilities
2. Check for embedded secrets, dynamic code evaluation, and unsafe markup injection
3. Review input validation and data handling

Guidelines:
- Name the file and line pattern for every finding
- Give a remediation step per finding
- Consider the OWASP Top 10
"#;

const EXECUTION_SYSTEM_PROMPT: &str = r#"You are the Execution Engineer in Atelier, a multi-step code generation pipeline.

Your role is to:
1. Describe how to install, build, and run the generated project
2. List the exact commands in order
3. Note runtime prerequisites and environment variables

Guidelines:
- Assume a clean machine; list every command
- Keep it short: commands first, prose second
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_prompt() {
        for kind in StepKind::default_order() {
            let prompt = system_prompt(kind);
            assert!(prompt.contains(kind.display_name()), "{}", kind);
        }
    }

    #[test]
    fn test_plan_reshapes_to_task_list() {
        let plan = "- set up the project\n\n2. add the App component\nWire up state";
        let reshaped = reshape_previous(StepKind::CodeGeneration, Some(plan)).unwrap();
        assert!(reshaped.contains("1. set up the project"));
        assert!(reshaped.contains("2. add the App component"));
        assert!(reshaped.contains("3. Wire up state"));
    }

    #[test]
    fn test_planning_ignores_previous_output() {
        assert!(reshape_previous(StepKind::Planning, Some("anything")).is_none());
    }

    #[test]
    fn test_empty_previous_output_is_dropped() {
        assert!(reshape_previous(StepKind::Review, Some("   ")).is_none());
        assert!(reshape_previous(StepKind::Review, None).is_none());
    }
}
