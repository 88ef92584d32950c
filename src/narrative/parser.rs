//! Section parser for narrative replies
//!
//! A single pass over the reply lines driven by a four-state cursor:
//!
//! - A line whose trimmed, upper-cased form starts with `METHODS`,
//!   `RESULTS` or `EXECUTIVE SUMMARY` moves the cursor and is discarded.
//! - Any other line is appended, with a trailing newline, to the section
//!   under the cursor.
//! - Lines seen while in `NoSection` are dropped.
//! - Repeated labels resume appending to the already collected text.

use serde::{Deserialize, Serialize};

/// Parser cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    NoSection,
    InMethods,
    InResults,
    InExecutiveSummary,
}

/// Draft text for the three report sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSections {
    pub methods: String,
    pub results: String,
    pub executive_summary: String,
}

impl SectionState {
    /// State selected by a label line, if the line is one
    fn label(line: &str) -> Option<SectionState> {
        let upper = line.trim().to_uppercase();
        if upper.starts_with("METHODS") {
            Some(SectionState::InMethods)
        } else if upper.starts_with("RESULTS") {
            Some(SectionState::InResults)
        } else if upper.starts_with("EXECUTIVE SUMMARY") {
            Some(SectionState::InExecutiveSummary)
        } else {
            None
        }
    }

    /// Consume one line, returning the next state
    pub fn on_line(self, line: &str, sections: &mut NarrativeSections) -> SectionState {
        if let Some(next) = Self::label(line) {
            return next;
        }

        let target = match self {
            SectionState::NoSection => return self,
            SectionState::InMethods => &mut sections.methods,
            SectionState::InResults => &mut sections.results,
            SectionState::InExecutiveSummary => &mut sections.executive_summary,
        };
        target.push_str(line);
        target.push('\n');
        self
    }
}

impl NarrativeSections {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.results.is_empty() && self.executive_summary.is_empty()
    }
}

/// Split a model reply into labeled sections
pub fn parse_sections(reply: &str) -> NarrativeSections {
    let mut sections = NarrativeSections::default();
    reply.lines().fold(SectionState::NoSection, |state, line| {
        state.on_line(line, &mut sections)
    });
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_labeled_sections() {
        let s = parse_sections("METHODS:\nA\nRESULTS:\nB\nEXECUTIVE SUMMARY:\nC\n");
        assert_eq!(s.methods, "A\n");
        assert_eq!(s.results, "B\n");
        assert_eq!(s.executive_summary, "C\n");
    }

    #[test]
    fn test_no_labels_gives_empty_sections() {
        let s = parse_sections("Here is some text\nwith no labels\n");
        assert!(s.is_empty());
    }

    #[test]
    fn test_results_only() {
        let s = parse_sections("RESULTS:\nX\n");
        assert_eq!(s.methods, "");
        assert_eq!(s.results, "X\n");
        assert_eq!(s.executive_summary, "");
    }

    #[test]
    fn test_preamble_dropped_and_case_insensitive_labels() {
        let s = parse_sections("Sure! Here you go.\n  **Methods**\nWe fit a model.\n");
        // "**METHODS**" does not start with METHODS after trimming
        assert!(s.methods.is_empty());

        let s = parse_sections("Sure!\n  methods:\nWe fit a model.\n");
        assert_eq!(s.methods, "We fit a model.\n");
    }

    #[test]
    fn test_out_of_order_and_duplicate_labels() {
        let s = parse_sections(
            "EXECUTIVE SUMMARY:\nE1\nMETHODS:\nM1\nExecutive Summary\nE2\nmethods\nM2\n",
        );
        assert_eq!(s.methods, "M1\nM2\n");
        assert_eq!(s.executive_summary, "E1\nE2\n");
        assert_eq!(s.results, "");
    }

    #[test]
    fn test_lines_keep_original_indentation() {
        let s = parse_sections("RESULTS:\n   indented line\n\nnext\n");
        assert_eq!(s.results, "   indented line\n\nnext\n");
    }

    #[test]
    fn test_label_line_content_discarded() {
        let s = parse_sections("METHODS: inline text is dropped\nkept\n");
        assert_eq!(s.methods, "kept\n");
    }

    #[test]
    fn test_state_transitions() {
        let mut sections = NarrativeSections::default();
        let state = SectionState::NoSection.on_line("ignored", &mut sections);
        assert_eq!(state, SectionState::NoSection);
        let state = state.on_line("Results:", &mut sections);
        assert_eq!(state, SectionState::InResults);
        let state = state.on_line("executive summary", &mut sections);
        assert_eq!(state, SectionState::InExecutiveSummary);
        assert!(sections.is_empty());
    }
}
