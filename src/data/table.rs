//! Study tables on a polars `DataFrame`
//!
//! Every column is normalized once at load time to `Float64` (numeric) or
//! `String` (categorical), so a column's type tag is read from the schema.
//! Missing values are nulls.

use crate::errors::{Result, SynthError};
use polars::prelude::Column as FrameColumn;
use polars::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::File;
use std::io::Cursor;

/// Cell tokens treated as missing values
pub const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Column type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, Copy)]
enum ColumnValues<'a> {
    Numeric(&'a Float64Chunked),
    Categorical(&'a StringChunked),
}

/// Borrowed, typed view of one table column
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    name: &'a str,
    values: ColumnValues<'a>,
}

/// Table of named, typed columns of equal length
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
}

/// Render a numeric value the way it is used for keys and level names
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn parse_error(e: PolarsError) -> SynthError {
    SynthError::DataParse(e.to_string())
}

fn csv_options() -> CsvReadOptions {
    let null_values: Vec<PlSmallStr> = MISSING_TOKENS
        .iter()
        .copied()
        .map(PlSmallStr::from_static)
        .collect();
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .map_parse_options(move |opts| {
            opts.with_null_values(Some(NullValues::AllColumns(Vec::clone(&null_values))))
        })
}

/// Cast to the two storage types; all-missing columns count as numeric
fn normalize(column: &FrameColumn) -> PolarsResult<FrameColumn> {
    let dtype = column.dtype();
    let all_missing = column.len() > 0 && column.null_count() == column.len();
    if dtype.is_float() || dtype.is_integer() || *dtype == DataType::Null || all_missing {
        column.cast(&DataType::Float64)
    } else {
        column.cast(&DataType::String)
    }
}

impl<'a> Column<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn kind(&self) -> ColumnKind {
        match self.values {
            ColumnValues::Numeric(_) => ColumnKind::Numeric,
            ColumnValues::Categorical(_) => ColumnKind::Categorical,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() == ColumnKind::Numeric
    }

    pub fn len(&self) -> usize {
        match self.values {
            ColumnValues::Numeric(ca) => ca.len(),
            ColumnValues::Categorical(ca) => ca.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self, row: usize) -> bool {
        if row >= self.len() {
            return true;
        }
        match self.values {
            ColumnValues::Numeric(ca) => ca.get(row).map_or(true, f64::is_nan),
            ColumnValues::Categorical(ca) => ca.get(row).is_none(),
        }
    }

    pub fn missing_count(&self) -> usize {
        match self.values {
            ColumnValues::Numeric(ca) => ca.null_count(),
            ColumnValues::Categorical(ca) => ca.null_count(),
        }
    }

    /// Numeric value at `row`, `None` when missing or categorical
    pub fn number(&self, row: usize) -> Option<f64> {
        match self.values {
            ColumnValues::Numeric(ca) if row < ca.len() => ca.get(row).filter(|v| !v.is_nan()),
            _ => None,
        }
    }

    /// Text label of the cell at `row`
    pub fn label(&self, row: usize) -> Option<String> {
        match self.values {
            ColumnValues::Numeric(_) => self.number(row).map(format_number),
            ColumnValues::Categorical(ca) if row < ca.len() => ca.get(row).map(str::to_string),
            ColumnValues::Categorical(_) => None,
        }
    }

    /// Non-missing numeric values, in row order
    pub fn present_numbers(&self) -> Vec<f64> {
        match self.values {
            ColumnValues::Numeric(ca) => ca.into_iter().flatten().filter(|v| !v.is_nan()).collect(),
            ColumnValues::Categorical(_) => Vec::new(),
        }
    }

    /// Distinct labels, numerically ordered for numeric columns and lexically otherwise
    pub fn levels(&self) -> Vec<String> {
        match self.values {
            ColumnValues::Numeric(_) => {
                let mut values = self.present_numbers();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                values.dedup();
                values.into_iter().map(format_number).collect()
            }
            ColumnValues::Categorical(ca) => {
                let mut values: Vec<String> = ca.into_iter().flatten().map(str::to_string).collect();
                values.sort();
                values.dedup();
                values
            }
        }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.frame.equals_missing(&other.frame)
    }
}

impl Table {
    /// Wrap a frame, fixing each column's type tag from its dtype
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        let columns = frame
            .get_columns()
            .iter()
            .map(normalize)
            .collect::<PolarsResult<Vec<_>>>()
            .map_err(parse_error)?;
        let frame = DataFrame::new(columns).map_err(parse_error)?;
        Ok(Self { frame })
    }

    /// Parse a CSV file with a header row
    pub fn from_csv_file(file: File) -> Result<Self> {
        let frame = csv_options()
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(parse_error)?;
        Self::from_frame(frame)
    }

    /// Parse a CSV document held in memory
    pub fn from_csv_str(source: &str) -> Result<Self> {
        let frame = csv_options()
            .into_reader_with_file_handle(Cursor::new(source.as_bytes().to_vec()))
            .finish()
            .map_err(parse_error)?;
        Self::from_frame(frame)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn n_cols(&self) -> usize {
        self.frame.width()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<Column<'_>> {
        let column = self.frame.column(name).ok()?;
        let values = match column.dtype() {
            DataType::Float64 => ColumnValues::Numeric(column.f64().ok()?),
            _ => ColumnValues::Categorical(column.str().ok()?),
        };
        Some(Column {
            name: column.name().as_str(),
            values,
        })
    }

    pub fn columns(&self) -> Vec<Column<'_>> {
        self.column_names()
            .into_iter()
            .filter_map(|name| self.column(name))
            .collect()
    }

    /// Sub-tables per level of `column`, in level order
    ///
    /// Rows whose level is missing belong to no partition.
    pub fn partition_by(&self, column: &str) -> Result<Vec<(String, Table)>> {
        let Some(key) = self.column(column) else {
            return Ok(Vec::new());
        };
        let levels = key.levels();

        let parts = self
            .frame
            .partition_by_stable([column], true)
            .map_err(parse_error)?;
        let mut labelled: Vec<(String, Table)> = parts
            .into_iter()
            .filter_map(|frame| {
                let part = Table { frame };
                let label = part.column(column)?.label(0)?;
                Some((label, part))
            })
            .collect();
        labelled.sort_by_key(|(label, _)| levels.iter().position(|l| l == label));
        Ok(labelled)
    }

    /// Plain-text preview, one line per row
    pub fn preview(&self, n: usize) -> String {
        let columns = self.columns();
        let mut lines = vec![self.column_names().join(" | ")];
        for row in 0..self.n_rows().min(n) {
            let cells: Vec<String> = columns
                .iter()
                .map(|c| c.label(row).unwrap_or_else(|| "NA".to_string()))
                .collect();
            lines.push(cells.join(" | "));
        }
        lines.join("\n")
    }
}
