//! Regression formula assembly and design-matrix encoding
//!
//! Terms are built from the study configuration and checked against the
//! table's column type tags: categorical columns appear as `C(col)` and are
//! treatment-coded against their first sorted level.

use crate::config::StudyConfig;
use crate::data::{Column, Table};
use crate::errors::{Result, SynthError};
use std::fmt;
use tracing::debug;

/// Name of the intercept column
pub const INTERCEPT: &str = "Intercept";

/// One right-hand-side term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Main { column: String, categorical: bool },
    Interaction { left: Box<Term>, right: Box<Term> },
}

impl Term {
    fn main(table: &Table, column: &str) -> Option<Term> {
        table.column(column).map(|c| Term::Main {
            column: column.to_string(),
            categorical: !c.is_numeric(),
        })
    }

    /// Columns this term reads
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Term::Main { column, .. } => vec![column.as_str()],
            Term::Interaction { left, right } => {
                let mut cols = left.columns();
                cols.extend(right.columns());
                cols
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Main {
                column,
                categorical: true,
            } => write!(f, "C({})", column),
            Term::Main { column, .. } => write!(f, "{}", column),
            Term::Interaction { left, right } => write!(f, "{}:{}", left, right),
        }
    }
}

/// `outcome ~ terms`, with a random intercept per subject fitted separately
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub outcome: String,
    pub terms: Vec<Term>,
}

impl Formula {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rhs: Vec<String> = self.terms.iter().map(Term::to_string).collect();
        write!(f, "{} ~ {}", self.outcome, rhs.join(" + "))
    }
}

/// Assemble `time [+ group + time:group] + covariates`
///
/// Terms whose column is absent from the table are dropped without error.
pub fn build_formula(table: &Table, config: &StudyConfig) -> Formula {
    let mut terms: Vec<Term> = Vec::new();
    let mut push = |term: Term| {
        if !terms.contains(&term) {
            terms.push(term);
        }
    };

    let time = Term::main(table, &config.time_col);
    if let Some(t) = &time {
        push(t.clone());
    }

    if let Some(group_col) = config.group() {
        let group = Term::main(table, group_col);
        if let Some(g) = &group {
            push(g.clone());
        }
        if let (Some(t), Some(g)) = (time, group) {
            push(Term::Interaction {
                left: Box::new(t),
                right: Box::new(g),
            });
        }
    }

    for covariate in &config.covariates {
        match Term::main(table, covariate) {
            Some(term) => push(term),
            None => debug!(covariate = %covariate, "Covariate not in table; dropped from formula"),
        }
    }

    Formula {
        outcome: config.primary_outcome().to_string(),
        terms,
    }
}

/// Per-column encoding over the rows used in the fit
#[derive(Debug)]
enum Encoding<'a> {
    Numeric(Column<'a>),
    Dummies { column: Column<'a>, levels: Vec<String> },
}

impl<'a> Encoding<'a> {
    fn new(column: Column<'a>, rows: &[usize]) -> Self {
        if column.is_numeric() {
            return Encoding::Numeric(column);
        }
        let mut levels: Vec<String> = rows.iter().filter_map(|&r| column.label(r)).collect();
        levels.sort();
        levels.dedup();
        // Reference level is dropped
        let levels = levels.into_iter().skip(1).collect();
        Encoding::Dummies { column, levels }
    }

    fn names(&self) -> Vec<String> {
        match self {
            Encoding::Numeric(c) => vec![c.name().to_string()],
            Encoding::Dummies { column, levels } => levels
                .iter()
                .map(|l| format!("C({})[T.{}]", column.name(), l))
                .collect(),
        }
    }

    fn values(&self, row: usize) -> Vec<f64> {
        match self {
            Encoding::Numeric(c) => vec![c.number(row).unwrap_or(f64::NAN)],
            Encoding::Dummies { column, levels } => {
                let label = column.label(row);
                levels
                    .iter()
                    .map(|l| if label.as_deref() == Some(l.as_str()) { 1.0 } else { 0.0 })
                    .collect()
            }
        }
    }
}

fn encode_term(term: &Term, table: &Table, rows: &[usize]) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    match term {
        Term::Main { column, .. } => {
            let col = table
                .column(column)
                .ok_or_else(|| SynthError::ModelFit(format!("column '{}' vanished", column)))?;
            let enc = Encoding::new(col, rows);
            Ok((enc.names(), rows.iter().map(|&r| enc.values(r)).collect()))
        }
        Term::Interaction { left, right } => {
            let (lnames, lvals) = encode_term(left, table, rows)?;
            let (rnames, rvals) = encode_term(right, table, rows)?;
            let names = lnames
                .iter()
                .flat_map(|a| rnames.iter().map(move |b| format!("{}:{}", a, b)))
                .collect();
            let values = lvals
                .iter()
                .zip(&rvals)
                .map(|(l, r)| l.iter().flat_map(|a| r.iter().map(move |b| a * b)).collect())
                .collect();
            Ok((names, values))
        }
    }
}

/// Fixed-effects design with the response and subject labels, after
/// listwise deletion of incomplete rows
#[derive(Debug, Clone)]
pub struct Design {
    pub names: Vec<String>,
    /// Row-major, one entry per retained observation
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    pub subjects: Vec<String>,
}

impl Design {
    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn n_params(&self) -> usize {
        self.names.len()
    }
}

/// Encode the formula against the table
pub fn build_design(table: &Table, formula: &Formula, id_col: &str) -> Result<Design> {
    let outcome = table.column(&formula.outcome).ok_or_else(|| {
        SynthError::ModelFit(format!("outcome '{}' not in table", formula.outcome))
    })?;
    if !outcome.is_numeric() {
        return Err(SynthError::InvalidColumn {
            column: formula.outcome.clone(),
            reason: "must be numeric to fit a linear model".to_string(),
        });
    }
    let ids = table
        .column(id_col)
        .ok_or_else(|| SynthError::ModelFit(format!("id column '{}' not in table", id_col)))?;

    let mut used: Vec<Column<'_>> = vec![outcome, ids];
    for term in &formula.terms {
        for name in term.columns() {
            if let Some(c) = table.column(name) {
                used.push(c);
            }
        }
    }

    let rows: Vec<usize> = (0..table.n_rows())
        .filter(|&r| used.iter().all(|c| !c.is_missing(r)))
        .collect();
    let dropped = table.n_rows() - rows.len();
    if dropped > 0 {
        debug!(dropped, "Rows with missing model values excluded");
    }

    let mut names = vec![INTERCEPT.to_string()];
    let mut x: Vec<Vec<f64>> = vec![vec![1.0]; rows.len()];
    for term in &formula.terms {
        let (term_names, term_values) = encode_term(term, table, &rows)?;
        names.extend(term_names);
        for (row, values) in x.iter_mut().zip(term_values) {
            row.extend(values);
        }
    }

    Ok(Design {
        names,
        x,
        y: rows.iter().filter_map(|&r| outcome.number(r)).collect(),
        subjects: rows.iter().filter_map(|&r| ids.label(r)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: &str) -> StudyConfig {
        StudyConfig::from_json(&format!(
            r#"{{"id_col": "id", "time_col": "t", "outcome_cols": ["y"]{}}}"#,
            extra
        ))
        .unwrap()
    }

    const TABLE: &str = "id,t,arm,age,sex,y\n\
                         1,1,ctl,30,F,5\n\
                         1,2,ctl,30,F,4\n\
                         2,1,trt,40,M,6\n\
                         2,2,trt,40,M,NA\n";

    #[test]
    fn test_formula_with_group_and_covariates() {
        let table = Table::from_csv_str(TABLE).unwrap();
        let f = build_formula(&table, &config(r#", "group_col": "arm", "covariates": ["age", "sex"]"#));
        assert_eq!(f.to_string(), "y ~ t + C(arm) + t:C(arm) + age + C(sex)");
    }

    #[test]
    fn test_absent_terms_silently_dropped() {
        let table = Table::from_csv_str(TABLE).unwrap();
        let f = build_formula(&table, &config(r#", "group_col": "site", "covariates": ["bmi"]"#));
        assert_eq!(f.to_string(), "y ~ t");
    }

    #[test]
    fn test_no_usable_terms() {
        let table = Table::from_csv_str("id,y\n1,2\n").unwrap();
        let f = build_formula(&table, &config(r#", "covariates": ["bmi"]"#));
        assert!(f.is_empty());
    }

    #[test]
    fn test_design_treatment_coding_and_listwise_deletion() {
        let table = Table::from_csv_str(TABLE).unwrap();
        let f = build_formula(&table, &config(r#", "group_col": "arm""#));
        let design = build_design(&table, &f, "id").unwrap();

        assert_eq!(
            design.names,
            vec!["Intercept", "t", "C(arm)[T.trt]", "t:C(arm)[T.trt]"]
        );
        assert_eq!(design.n_obs(), 3);
        assert_eq!(design.x[0], vec![1.0, 1.0, 0.0, 0.0]);
        assert_eq!(design.x[2], vec![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(design.y, vec![5.0, 4.0, 6.0]);
        assert_eq!(design.subjects, vec!["1", "1", "2"]);
    }

    #[test]
    fn test_design_rejects_categorical_outcome() {
        let table = Table::from_csv_str("id,t,y\n1,1,low\n").unwrap();
        let f = build_formula(&table, &config(""));
        assert!(matches!(
            build_design(&table, &f, "id"),
            Err(SynthError::InvalidColumn { .. })
        ));
    }
}
