//! Markdown report assembly
//!
//! Pure formatting. Sections always appear in the order Configuration,
//! Descriptive Statistics, Model Summary, Methods, Results, Executive
//! Summary; only the per-group table is conditional.

use crate::analysis::{Describe, EdaSummary};
use crate::config::StudyConfig;
use crate::data::table::format_number;
use crate::narrative::NarrativeSections;

pub const TITLE: &str = "# Longitudinal Outcomes Report";
pub const CONFIGURATION_HEADING: &str = "## Study Configuration";
pub const DESCRIPTIVE_HEADING: &str = "## Descriptive Statistics";
pub const MODEL_HEADING: &str = "## Mixed-Effects Model Summary";
pub const METHODS_HEADING: &str = "## Methods (AI-Generated Draft)";
pub const RESULTS_HEADING: &str = "## Results (AI-Generated Draft)";
pub const SUMMARY_HEADING: &str = "## Executive Summary (AI-Generated Draft)";

/// Headings in report order
pub const SECTION_HEADINGS: [&str; 6] = [
    CONFIGURATION_HEADING,
    DESCRIPTIVE_HEADING,
    MODEL_HEADING,
    METHODS_HEADING,
    RESULTS_HEADING,
    SUMMARY_HEADING,
];

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format_number(v),
        Some(v) => format!("{:.3}", v),
        None => "NaN".to_string(),
    }
}

fn code_list(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items
            .iter()
            .map(|i| format!("`{}`", i))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Statistic-per-row table with one value column per label
fn describe_table(labels: &[&str], stats: &[&Describe]) -> String {
    let mut lines = vec![
        format!("| statistic | {} |", labels.join(" | ")),
        format!("|---|{}", "---:|".repeat(labels.len())),
    ];
    let rows: Vec<Vec<(&str, Option<f64>)>> = stats.iter().map(|d| d.rows()).collect();
    if let Some(first) = rows.first() {
        for (i, (name, _)) in first.iter().enumerate() {
            let values: Vec<String> = rows.iter().map(|r| cell(r[i].1)).collect();
            lines.push(format!("| {} | {} |", name, values.join(" | ")));
        }
    }
    lines.join("\n")
}

/// Draft text, or a marker when the reply had no such section
fn section_body(text: &str) -> &str {
    if text.trim().is_empty() {
        "_No draft text was returned for this section._"
    } else {
        text.trim_end()
    }
}

/// Combine configuration, statistics, model text and narrative into Markdown
pub fn build_markdown_report(
    config: &StudyConfig,
    eda_summary: &EdaSummary,
    model_text: &str,
    sections: &NarrativeSections,
) -> String {
    let mut md: Vec<String> = Vec::new();
    md.push(format!("{}\n", TITLE));

    md.push(format!("{}\n", CONFIGURATION_HEADING));
    md.push(format!("- ID column: `{}`", config.id_col));
    md.push(format!("- Time column: `{}`", config.time_col));
    md.push(format!("- Outcome(s): {}", code_list(&config.outcome_cols)));
    md.push(format!(
        "- Group: {}",
        config.group().map_or("None".to_string(), |g| format!("`{}`", g))
    ));
    md.push(format!("- Covariates: {}", code_list(&config.covariates)));
    if !config.modalities.is_empty() {
        let names: Vec<String> = config.modalities.keys().cloned().collect();
        md.push(format!("- Modalities: {}", code_list(&names)));
    }

    md.push(format!("\n{}\n", DESCRIPTIVE_HEADING));
    md.push(format!("**Overall ({}):**\n", eda_summary.outcome));
    md.push(format!(
        "{}\n",
        describe_table(&[eda_summary.outcome.as_str()], &[&eda_summary.overall])
    ));

    if let Some(groups) = &eda_summary.by_group {
        let group_col = eda_summary.group_col.as_deref().unwrap_or("group");
        md.push(format!("**By Group ({}):**\n", group_col));
        let labels: Vec<&str> = groups.iter().map(|g| g.group.as_str()).collect();
        let stats: Vec<&Describe> = groups.iter().map(|g| &g.stats).collect();
        md.push(format!("{}\n", describe_table(&labels, &stats)));
    }

    md.push("**Missing values:**\n".to_string());
    md.push("| column | missing |\n|---|---:|".to_string());
    for m in &eda_summary.missing_counts {
        md.push(format!("| {} | {} |", m.column, m.missing));
    }

    md.push(format!("\n{}\n", MODEL_HEADING));
    md.push("```text".to_string());
    md.push(model_text.trim_end().to_string());
    md.push("```".to_string());

    md.push(format!("\n{}\n", METHODS_HEADING));
    md.push(section_body(&sections.methods).to_string());

    md.push(format!("\n{}\n", RESULTS_HEADING));
    md.push(section_body(&sections.results).to_string());

    md.push(format!("\n{}\n", SUMMARY_HEADING));
    md.push(section_body(&sections.executive_summary).to_string());

    let mut report = md.join("\n");
    report.push('\n');
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{GroupDescribe, MissingCount};

    fn config(group: bool) -> StudyConfig {
        let group = if group { r#", "group_col": "arm""# } else { "" };
        StudyConfig::from_json(&format!(
            r#"{{"id_col": "id", "time_col": "t", "outcome_cols": ["y"]{}}}"#,
            group
        ))
        .unwrap()
    }

    fn eda(grouped: bool) -> EdaSummary {
        let overall = Describe::from_values(&[1.0, 2.0, 4.0]);
        EdaSummary {
            outcome: "y".to_string(),
            overall: overall.clone(),
            group_col: grouped.then(|| "arm".to_string()),
            by_group: grouped.then(|| {
                vec![
                    GroupDescribe {
                        group: "ctl".to_string(),
                        stats: Describe::from_values(&[1.0, 2.0]),
                    },
                    GroupDescribe {
                        group: "trt".to_string(),
                        stats: Describe::from_values(&[4.0]),
                    },
                ]
            }),
            missing_counts: vec![MissingCount {
                column: "y".to_string(),
                missing: 2,
            }],
        }
    }

    fn sections() -> NarrativeSections {
        NarrativeSections {
            methods: "We fit a model.\n".to_string(),
            results: "Scores fell.\n".to_string(),
            executive_summary: "Good news.\n".to_string(),
        }
    }

    #[test]
    fn test_headings_once_each_in_order() {
        let report = build_markdown_report(&config(true), &eda(true), "MODEL TEXT", &sections());
        let mut last = 0;
        for heading in SECTION_HEADINGS {
            assert_eq!(report.matches(heading).count(), 1, "{}", heading);
            let pos = report.find(heading).unwrap();
            assert!(pos >= last, "{} out of order", heading);
            last = pos;
        }
    }

    #[test]
    fn test_model_text_in_code_block() {
        let report = build_markdown_report(&config(false), &eda(false), "line1\nline2\n", &sections());
        assert!(report.contains("```text\nline1\nline2\n```"));
    }

    #[test]
    fn test_group_table_only_when_computed() {
        let grouped = build_markdown_report(&config(true), &eda(true), "m", &sections());
        assert!(grouped.contains("**By Group (arm):**"));
        assert!(grouped.contains("| statistic | ctl | trt |"));
        // single-value group has undefined std
        assert!(grouped.contains("| std | 0.707 | NaN |"));

        let plain = build_markdown_report(&config(false), &eda(false), "m", &sections());
        assert!(!plain.contains("By Group"));
        assert!(plain.contains("- Group: None"));
    }

    #[test]
    fn test_overall_statistics_rendered() {
        let report = build_markdown_report(&config(false), &eda(false), "m", &sections());
        assert!(report.contains("| count | 3 |"));
        assert!(report.contains("| mean | 2.333 |"));
        assert!(report.contains("| y | 2 |"));
    }

    #[test]
    fn test_empty_sections_still_have_headings() {
        let report = build_markdown_report(
            &config(false),
            &eda(false),
            "m",
            &NarrativeSections::default(),
        );
        for heading in SECTION_HEADINGS {
            assert!(report.contains(heading));
        }
        assert_eq!(report.matches("_No draft text was returned").count(), 3);
    }
}
