//! Prompt composition for the narrative stage

use crate::analysis::ModelSummary;
use crate::config::StudyConfig;
use crate::narrative::client::ChatMessage;

/// System message sent ahead of the study prompt
pub const SYSTEM_PROMPT: &str = "You are an expert biostatistician and scientific writer.";

fn format_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{}'", i)).collect();
    format!("[{}]", quoted.join(", "))
}

fn format_estimates(pairs: &[(String, f64)]) -> String {
    let entries: Vec<String> = pairs
        .iter()
        .map(|(name, value)| format!("'{}': {}", name, value))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Study design, model summary, optional excerpts and the task block
pub fn build_prompt(
    config: &StudyConfig,
    model_summary: &ModelSummary,
    text_examples: Option<&str>,
) -> String {
    let mut prompt = format!(
        r#"
You are helping write a scientific manuscript for a longitudinal mental-health / behavioral study.

STUDY DESIGN:
- ID column: {id}
- Time variable: {time}
- Outcome(s): {outcomes}
- Grouping variable: {group}
- Covariates: {covariates}

MODEL SUMMARY:
- Formula: {formula}
- Parameters: {params}
- P-values: {pvalues}
"#,
        id = config.id_col,
        time = config.time_col,
        outcomes = format_list(&config.outcome_cols),
        group = config.group().unwrap_or("None"),
        covariates = format_list(&config.covariates),
        formula = model_summary.formula,
        params = format_estimates(&model_summary.params),
        pvalues = format_estimates(&model_summary.pvalues),
    );

    if let Some(examples) = text_examples.filter(|t| !t.trim().is_empty()) {
        prompt.push_str(&format!(
            r#"
The study also collected qualitative text notes over time. Here are some anonymized excerpts:

{}

Please integrate any consistent qualitative themes (e.g., mood, engagement, functioning) into the interpretation where appropriate.
"#,
            examples
        ));
    }

    prompt.push_str(
        r#"
TASK:
1) Write a concise Methods paragraph describing the statistical analysis.
2) Write a concise Results paragraph describing the main effects and interactions, using neutral academic tone.
3) Write a 3-4 sentence Executive Summary suitable for an internal report to non-technical stakeholders.

Return each section clearly labeled: METHODS:, RESULTS:, EXECUTIVE SUMMARY:
"#,
    );

    prompt
}

/// Role-tagged message list for one narrative request
pub fn build_messages(
    config: &StudyConfig,
    model_summary: &ModelSummary,
    text_examples: Option<&str>,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(config, model_summary, text_examples)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::client::Role;

    fn fixtures() -> (StudyConfig, ModelSummary) {
        let config = StudyConfig::from_json(
            r#"{"id_col": "participant_id", "time_col": "timepoint",
                "outcome_cols": ["symptom_score"], "group_col": "treatment_group",
                "covariates": ["age"]}"#,
        )
        .unwrap();
        let summary = ModelSummary {
            formula: "symptom_score ~ timepoint + treatment_group".to_string(),
            params: vec![("Intercept".to_string(), 21.5), ("timepoint".to_string(), -1.2)],
            pvalues: vec![("Intercept".to_string(), 0.0), ("timepoint".to_string(), 0.004)],
        };
        (config, summary)
    }

    #[test]
    fn test_prompt_embeds_design_and_model() {
        let (config, summary) = fixtures();
        let prompt = build_prompt(&config, &summary, None);
        assert!(prompt.contains("- ID column: participant_id"));
        assert!(prompt.contains("- Grouping variable: treatment_group"));
        assert!(prompt.contains("- Covariates: ['age']"));
        assert!(prompt.contains("symptom_score ~ timepoint + treatment_group"));
        assert!(prompt.contains("'timepoint': -1.2"));
        assert!(prompt.contains("'timepoint': 0.004"));
        assert!(!prompt.contains("anonymized excerpts"));
        assert!(prompt.contains("METHODS:, RESULTS:, EXECUTIVE SUMMARY:"));
    }

    #[test]
    fn test_prompt_appends_excerpts_before_task() {
        let (config, summary) = fixtures();
        let prompt = build_prompt(&config, &summary, Some("- feeling better"));
        let excerpt = prompt.find("- feeling better").unwrap();
        let task = prompt.find("TASK:").unwrap();
        assert!(excerpt < task);
        assert!(prompt.contains("qualitative themes"));
    }

    #[test]
    fn test_messages_are_role_tagged() {
        let (config, summary) = fixtures();
        let messages = build_messages(&config, &summary, None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].role, Role::User);
    }
}
