//! Narrative module
//!
//! Drafts Methods, Results and Executive Summary prose from the study
//! configuration and model summary via an injected `NarrativeService`.

pub mod client;
pub mod parser;
pub mod prompt;

// Re-export commonly used types
pub use client::{
    ChatCompletionClient, ChatMessage, NarrativeService, Role, ScriptedNarrativeService,
    DEFAULT_BASE_URL, DEFAULT_MODEL,
};
pub use parser::{parse_sections, NarrativeSections, SectionState};

use crate::analysis::ModelSummary;
use crate::config::StudyConfig;
use crate::errors::{Result, SynthError};
use tracing::info;

/// Ask the service for draft prose and split the reply into sections
///
/// One call per invocation, no retry. A reply without recognizable labels
/// yields empty sections rather than an error.
pub async fn generate_methods_results_text(
    service: &dyn NarrativeService,
    config: &StudyConfig,
    model_summary: &ModelSummary,
    text_examples: Option<&str>,
) -> Result<NarrativeSections> {
    let messages = prompt::build_messages(config, model_summary, text_examples);
    let reply = service.complete(&messages).await?;
    if reply.trim().is_empty() {
        return Err(SynthError::NarrativeService(
            "Reply contained no content".to_string(),
        ));
    }

    let sections = parse_sections(&reply);
    info!(
        methods = sections.methods.len(),
        results = sections.results.len(),
        executive_summary = sections.executive_summary.len(),
        "Parsed narrative sections"
    );
    Ok(sections)
}
