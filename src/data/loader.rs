//! Loading, merging and validating the study tables

use crate::config::{StudyConfig, SENSOR_MODALITY};
use crate::data::table::{Column, Table};
use crate::errors::{Result, SynthError};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

/// Modality tables keyed by modality name
pub type Modalities = BTreeMap<String, Table>;

/// Suffix applied to sensor columns whose name is already taken
pub const SENSOR_SUFFIX: &str = "_sensor";

/// Temporary column holding the clinical row order through the join
const ROW_INDEX: &str = "__clinical_row";

/// Load the clinical CSV
pub fn load_data(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SynthError::DataParse(format!("cannot open {}: {}", path.display(), e)))?;
    let table = Table::from_csv_file(file)?;
    info!(
        path = %path.display(),
        rows = table.n_rows(),
        cols = table.n_cols(),
        "Loaded clinical table"
    );
    Ok(table)
}

/// Load every configured modality, resolving files against the working directory
pub fn load_multimodal(config: &StudyConfig) -> Result<Modalities> {
    load_multimodal_from(config, Path::new("."))
}

/// Load every configured modality, resolving relative files against `root`
///
/// Entries without a `file` are skipped.
pub fn load_multimodal_from(config: &StudyConfig, root: &Path) -> Result<Modalities> {
    let mut modalities = Modalities::new();

    for (name, modality) in &config.modalities {
        let Some(file) = modality.file.as_deref().filter(|f| !f.is_empty()) else {
            debug!(modality = %name, "No file configured, skipping");
            continue;
        };

        let path = root.join(file);
        let load_error = |reason: String| SynthError::ModalityLoad {
            name: name.clone(),
            path: path.display().to_string(),
            reason,
        };

        let handle = File::open(&path).map_err(|e| load_error(e.to_string()))?;
        let table = Table::from_csv_file(handle).map_err(|e| load_error(e.to_string()))?;

        info!(modality = %name, rows = table.n_rows(), "Loaded modality");
        modalities.insert(name.clone(), table);
    }

    Ok(modalities)
}

fn merge_error(e: PolarsError) -> SynthError {
    SynthError::Merge(e.to_string())
}

/// Composite key of a row; `None` if any part is missing
fn row_key(keys: &[Column<'_>], row: usize) -> Option<Vec<String>> {
    keys.iter().map(|c| c.label(row)).collect()
}

/// Keep the first row of every key, returning the kept rows and the number dropped
fn first_row_per_key(table: &Table, keys: &[&str]) -> Result<(DataFrame, usize)> {
    let key_columns: Vec<Column<'_>> = keys.iter().filter_map(|k| table.column(k)).collect();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let keep: Vec<bool> = (0..table.n_rows())
        .map(|row| row_key(&key_columns, row).map_or(true, |key| seen.insert(key)))
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let frame = table.frame().filter(&mask).map_err(merge_error)?;
    Ok((frame, dropped))
}

/// `name`, or the first of `name_sensor`, `name_sensor2`, ... that is free
fn unique_name(name: &str, taken: &[String], incoming: &[String]) -> String {
    let clashes = |candidate: &str| {
        taken.iter().any(|t| t == candidate)
            || (candidate != name && incoming.iter().any(|i| i == candidate))
    };
    if !clashes(name) {
        return name.to_string();
    }
    (1usize..)
        .map(|i| match i {
            1 => format!("{}{}", name, SENSOR_SUFFIX),
            _ => format!("{}{}{}", name, SENSOR_SUFFIX, i),
        })
        .find(|candidate| !clashes(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Left-join the sensor modality into the clinical table
///
/// Every clinical row appears exactly once and in its original order. When
/// several sensor rows share a key the first one is used. Sensor columns
/// whose name is taken get a `_sensor` suffix, numbered when that is taken
/// too. No-op unless a sensor modality is both configured and loaded.
pub fn merge_sensor_into_main(
    clinical: Table,
    config: &StudyConfig,
    modalities: &Modalities,
) -> Result<Table> {
    let (Some(sensor_cfg), Some(sensor)) = (
        config.modality(SENSOR_MODALITY),
        modalities.get(SENSOR_MODALITY),
    ) else {
        return Ok(clinical);
    };

    let merge_on: Vec<&str> = sensor_cfg.merge_on.iter().map(String::as_str).collect();
    if merge_on.is_empty() {
        return Err(SynthError::Merge(
            "sensor modality has no merge_on keys".to_string(),
        ));
    }
    for (table, side) in [(&clinical, "clinical"), (sensor, "sensor")] {
        if let Some(key) = merge_on.iter().find(|k| !table.has_column(k)) {
            return Err(SynthError::Merge(format!(
                "key '{}' not found in {} table",
                key, side
            )));
        }
    }

    let (mut right, duplicates) = first_row_per_key(sensor, &merge_on)?;
    if duplicates > 0 {
        warn!(duplicates, "Sensor table has repeated keys; first match used");
    }

    let incoming: Vec<String> = sensor.column_names().iter().map(|n| n.to_string()).collect();
    let mut taken: Vec<String> = clinical.column_names().iter().map(|n| n.to_string()).collect();
    let mut added = 0usize;
    for name in &incoming {
        if merge_on.contains(&name.as_str()) {
            continue;
        }
        let target = unique_name(name, &taken, &incoming);
        if target != *name {
            debug!(column = %name, renamed = %target, "Sensor column renamed");
            right
                .rename(name, target.as_str().into())
                .map_err(merge_error)?;
        }
        taken.push(target);
        added += 1;
    }

    let joined = clinical
        .frame()
        .with_row_index(ROW_INDEX.into(), None)
        .and_then(|left| {
            left.join(
                &right,
                merge_on.iter().copied(),
                merge_on.iter().copied(),
                JoinArgs::new(JoinType::Left),
                None,
            )
        })
        .and_then(|df| df.sort([ROW_INDEX], SortMultipleOptions::default()))
        .and_then(|df| df.drop(ROW_INDEX))
        .map_err(merge_error)?;

    if joined.height() != clinical.n_rows() {
        return Err(SynthError::Merge(format!(
            "join produced {} rows from {} clinical rows",
            joined.height(),
            clinical.n_rows()
        )));
    }
    let merged = Table::from_frame(joined)?;
    info!(
        sensor_columns = added,
        rows = merged.n_rows(),
        "Merged sensor features into clinical table"
    );

    Ok(merged)
}

/// Check that every column the configuration references is present
///
/// The error lists each missing column once, in configuration order.
pub fn validate_data(table: &Table, config: &StudyConfig) -> Result<()> {
    let mut missing: Vec<String> = Vec::new();
    for col in config.required_columns() {
        if !table.has_column(col) && !missing.iter().any(|m| m == col) {
            missing.push(col.to_string());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SynthError::Validation { missing })
    }
}

/// Sample up to `n` notes from a text table, rendered as a bullet list
///
/// Returns `None` when the table is empty or lacks the text column.
pub fn sample_text_excerpts(text: &Table, column: &str, n: usize, seed: u64) -> Option<String> {
    if text.is_empty() || n == 0 {
        return None;
    }
    let Some(notes) = text.column(column) else {
        warn!(column, "Text modality has no such column; skipping excerpts");
        return None;
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = index::sample(&mut rng, text.n_rows(), n.min(text.n_rows())).into_vec();
    rows.sort_unstable();

    let lines: Vec<String> = rows
        .into_iter()
        .filter_map(|row| notes.label(row))
        .map(|note| format!("- {}", note))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
