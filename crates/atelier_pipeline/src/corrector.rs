//! Bounded self-correction of failed generation output.
//!
//! When a validation report is not acceptable, the corrector re-issues
//! the generation request with a directive that enumerates every
//! critical finding and every missing file. The directive escalates
//! across attempts and sampling temperature drops with each one. The
//! best-scoring result always wins, original included.

use tracing::{debug, info, warn};

use atelier_llm::{CallOptions, LlmClient, Message};

use crate::error::PipelineResult;
use crate::parser::CodeArtifactParser;
use crate::store::ArtifactStore;
use crate::types::{ParsedArtifact, ValidationReport};
use crate::validator::ArtifactValidator;

/// Attempt budget; correction stops early on acceptability.
const MAX_ATTEMPTS: u32 = 2;

/// Sampling temperature per attempt, lowered as directives escalate.
const ATTEMPT_TEMPERATURES: [f32; MAX_ATTEMPTS as usize] = [0.3, 0.1];

/// A candidate generation result with its validation report.
#[derive(Debug, Clone)]
pub struct CorrectionResult {
    pub content: String,
    pub artifacts: Vec<ParsedArtifact>,
    pub report: ValidationReport,
    /// Correction attempts actually spent (0 when the original won
    /// without any model call).
    pub attempts: u32,
}

/// Re-issues corrective generation requests with escalating directives.
pub struct AutoCorrector {
    parser: CodeArtifactParser,
    validator: ArtifactValidator,
}

impl Default for AutoCorrector {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoCorrector {
    pub fn new() -> Self {
        Self {
            parser: CodeArtifactParser::new(),
            validator: ArtifactValidator::new(),
        }
    }

    /// Correct a generation result that failed validation.
    ///
    /// `conversation` is the original request as sent to the model;
    /// each attempt extends it with the prior output and a directive
    /// as a new turn. Returns the best-scoring result seen, which is
    /// the original when no attempt improves on it.
    pub async fn correct(
        &self,
        llm: &dyn LlmClient,
        conversation: &[Message],
        original: CorrectionResult,
        store: &ArtifactStore,
    ) -> PipelineResult<CorrectionResult> {
        let mut best = original.clone();
        let mut latest = original;

        for attempt in 1..=MAX_ATTEMPTS {
            let missing = self.validator.missing_import_paths(&latest.artifacts, store);
            let directive = directive_for(attempt, &latest.report, &missing);

            info!(
                "Correction attempt {}/{}: {} critical issue(s), {} missing file(s)",
                attempt,
                MAX_ATTEMPTS,
                latest.report.critical_count(),
                missing.len()
            );

            let mut messages = conversation.to_vec();
            messages.push(Message::assistant(latest.content.clone()));
            messages.push(Message::user(directive));

            let options = CallOptions::default()
                .with_temperature(ATTEMPT_TEMPERATURES[(attempt - 1) as usize]);
            let response = llm.call(&messages, &options).await?;

            let artifacts = self.parser.parse(&response.content);
            let report = self.validator.validate(&artifacts, store);
            debug!(
                "Attempt {} scored {} ({} critical)",
                attempt,
                report.score,
                report.critical_count()
            );

            latest = CorrectionResult {
                content: response.content,
                artifacts,
                report,
                attempts: attempt,
            };

            if latest.report.improves_on(&best.report) {
                best = latest.clone();
            }

            if latest.report.is_acceptable() {
                return Ok(latest);
            }
        }

        if best.attempts == 0 {
            warn!("No correction attempt improved on the original output");
        }
        Ok(best)
    }

    /// One-shot recovery for generation output that parsed to zero
    /// artifacts despite looking like it contains code.
    pub async fn recover_empty_parse(
        &self,
        llm: &dyn LlmClient,
        conversation: &[Message],
        prior_output: &str,
    ) -> PipelineResult<(String, Vec<ParsedArtifact>)> {
        info!("Generation output contained code markers but no extractable artifacts; re-requesting");

        let mut messages = conversation.to_vec();
        messages.push(Message::assistant(prior_output.to_string()));
        messages.push(Message::user(
            "Your previous reply did not contain any extractable files. Resend the complete \
             implementation as fenced code blocks, one block per file, with the first line of \
             each block a comment naming the file path (for example // src/App.tsx). Do not \
             include any prose outside the code blocks.",
        ));

        let options = CallOptions::default().with_temperature(ATTEMPT_TEMPERATURES[0]);
        let response = llm.call(&messages, &options).await?;
        let artifacts = self.parser.parse(&response.content);
        Ok((response.content, artifacts))
    }
}

/// Build the corrective directive for one attempt.
///
/// Critical issue messages appear verbatim; missing files are listed
/// with an explicit instruction to create them. The second attempt uses
/// stronger framing.
fn directive_for(attempt: u32, report: &ValidationReport, missing: &[String]) -> String {
    let mut directive = if attempt < MAX_ATTEMPTS {
        String::from(
            "The code you produced failed validation. Fix every issue listed below and resend \
             all affected files, complete.\n",
        )
    } else {
        String::from(
            "FINAL ATTEMPT. The output MUST resolve every issue below. Resend every affected \
             file in full, with no placeholders and no omissions.\n",
        )
    };

    let criticals = report.critical_messages();
    if !criticals.is_empty() {
        directive.push_str("\nCritical issues:\n");
        for message in criticals {
            directive.push_str("- ");
            directive.push_str(message);
            directive.push('\n');
        }
    }

    if !missing.is_empty() {
        directive.push_str("\nMissing files that must be created:\n");
        for path in missing {
            directive.push_str("- ");
            directive.push_str(path);
            directive.push('\n');
        }
    }

    directive
}
