//! Synthetic longitudinal multimodal dataset
//!
//! Deterministic for a given seed. Writes clinical, sensor and text CSVs plus
//! a study config that wires them together.

use crate::config::{ModalityConfig, StudyConfig, SENSOR_MODALITY, TEXT_MODALITY};
use crate::errors::{Result, SynthError};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use statrs::distribution::Normal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CLINICAL_FILE: &str = "clinical_longitudinal_data.csv";
pub const SENSOR_FILE: &str = "sensor_longitudinal_data.csv";
pub const TEXT_FILE: &str = "text_notes_longitudinal_data.csv";
pub const CONFIG_FILE: &str = "config_example.json";

const GENDERS: [&str; 3] = ["Male", "Female", "Other"];
const GENDER_WEIGHTS: [f64; 3] = [0.45, 0.45, 0.10];

/// Generator parameters
#[derive(Debug, Clone)]
pub struct DemoSpec {
    pub participants: usize,
    pub timepoints: usize,
    pub seed: u64,
}

impl Default for DemoSpec {
    fn default() -> Self {
        Self {
            participants: 120,
            timepoints: 6,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinicalRow {
    pub participant_id: usize,
    pub timepoint: usize,
    pub treatment_group: u8,
    pub symptom_score: f64,
    pub age: f64,
    pub gender: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorRow {
    pub participant_id: usize,
    pub timepoint: usize,
    pub avg_steps: f64,
    pub sleep_hours: f64,
    pub phone_usage_minutes: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteRow {
    pub participant_id: usize,
    pub timepoint: usize,
    pub note_text: String,
}

/// Generated rows, one per participant visit in each table
#[derive(Debug, Clone, Default)]
pub struct DemoDataset {
    pub clinical: Vec<ClinicalRow>,
    pub sensor: Vec<SensorRow>,
    pub notes: Vec<NoteRow>,
}

/// Paths written by `write_demo_data`
#[derive(Debug, Clone)]
pub struct DemoFiles {
    pub clinical: PathBuf,
    pub sensor: PathBuf,
    pub text: PathBuf,
    pub config: PathBuf,
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal> {
    Normal::new(mean, std_dev).map_err(|e| SynthError::DataParse(e.to_string()))
}

fn mood_phrase(symptom: f64) -> &'static str {
    if symptom > 22.0 {
        "feeling very overwhelmed and anxious"
    } else if symptom > 18.0 {
        "struggling with mood but noticing some better days"
    } else if symptom > 14.0 {
        "feeling somewhat better and more hopeful"
    } else {
        "feeling much more stable and engaged in daily activities"
    }
}

fn treatment_phrase(treated: bool) -> &'static str {
    if treated {
        "engaging regularly with therapy and treatment exercises"
    } else {
        "attending check-ins but not in the intensive treatment group"
    }
}

/// Draw the dataset
pub fn generate(spec: &DemoSpec) -> Result<DemoDataset> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let age_dist = normal(35.0, 10.0)?;
    let baseline_dist = normal(22.0, 6.0)?;
    let symptom_noise = normal(0.0, 3.0)?;
    let steps_noise = normal(0.0, 800.0)?;
    let sleep_noise = normal(0.0, 0.6)?;
    let phone_noise = normal(0.0, 40.0)?;
    let gender_dist =
        WeightedIndex::new(GENDER_WEIGHTS).map_err(|e| SynthError::DataParse(e.to_string()))?;

    let mut data = DemoDataset::default();
    for pid in 1..=spec.participants {
        let age = age_dist.sample(&mut rng);
        let gender = GENDERS[gender_dist.sample(&mut rng)].to_string();
        let treatment_group: u8 = rng.gen_range(0..2);
        let treated = treatment_group == 1;
        // higher is worse
        let baseline = baseline_dist.sample(&mut rng);

        for t in 1..=spec.timepoints {
            let slope = if treated { -1.6 } else { -0.6 };
            let symptom = baseline + slope * t as f64 + symptom_noise.sample(&mut rng);

            let avg_steps = (12000.0 - symptom * 200.0 + steps_noise.sample(&mut rng)).max(500.0);
            let sleep_hours =
                (8.0 - (symptom - 15.0) * 0.1 + sleep_noise.sample(&mut rng)).clamp(3.5, 10.0);
            let phone_usage_minutes =
                (120.0 + symptom * 8.0 + phone_noise.sample(&mut rng)).clamp(30.0, 600.0);

            let note_text = format!(
                "At visit {}, the participant reports {}, while {}. Sleep and energy fluctuate.",
                t,
                mood_phrase(symptom),
                treatment_phrase(treated)
            );

            data.clinical.push(ClinicalRow {
                participant_id: pid,
                timepoint: t,
                treatment_group,
                symptom_score: symptom,
                age,
                gender: gender.clone(),
            });
            data.sensor.push(SensorRow {
                participant_id: pid,
                timepoint: t,
                avg_steps,
                sleep_hours,
                phone_usage_minutes,
            });
            data.notes.push(NoteRow {
                participant_id: pid,
                timepoint: t,
                note_text,
            });
        }
    }

    Ok(data)
}

/// Study config matching the generated files under `out_dir`
pub fn demo_config(out_dir: &Path) -> StudyConfig {
    let keys = vec!["participant_id".to_string(), "timepoint".to_string()];
    let mut modalities = BTreeMap::new();
    modalities.insert(
        SENSOR_MODALITY.to_string(),
        ModalityConfig {
            file: Some(out_dir.join(SENSOR_FILE).to_string_lossy().into_owned()),
            merge_on: keys.clone(),
        },
    );
    modalities.insert(
        TEXT_MODALITY.to_string(),
        ModalityConfig {
            file: Some(out_dir.join(TEXT_FILE).to_string_lossy().into_owned()),
            merge_on: keys,
        },
    );

    StudyConfig {
        id_col: "participant_id".to_string(),
        time_col: "timepoint".to_string(),
        outcome_cols: vec!["symptom_score".to_string()],
        group_col: Some("treatment_group".to_string()),
        covariates: vec!["age".to_string(), "gender".to_string()],
        modalities,
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| SynthError::DataParse(format!("cannot write {}: {}", path.display(), e)))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| SynthError::DataParse(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Generate and write the demo files into `out_dir`
pub fn write_demo_data(out_dir: &Path, spec: &DemoSpec) -> Result<DemoFiles> {
    std::fs::create_dir_all(out_dir)?;
    let data = generate(spec)?;

    let files = DemoFiles {
        clinical: out_dir.join(CLINICAL_FILE),
        sensor: out_dir.join(SENSOR_FILE),
        text: out_dir.join(TEXT_FILE),
        config: out_dir.join(CONFIG_FILE),
    };
    write_csv(&files.clinical, &data.clinical)?;
    write_csv(&files.sensor, &data.sensor)?;
    write_csv(&files.text, &data.notes)?;

    let config = serde_json::to_string_pretty(&demo_config(out_dir))?;
    std::fs::write(&files.config, config)?;

    info!(
        dir = %out_dir.display(),
        participants = spec.participants,
        timepoints = spec.timepoints,
        "Saved clinical, sensor, and text data"
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use crate::data::load_data;
    use tempfile::TempDir;

    fn small() -> DemoSpec {
        DemoSpec {
            participants: 8,
            timepoints: 3,
            seed: 7,
        }
    }

    #[test]
    fn test_row_counts_and_keys() {
        let data = generate(&small()).unwrap();
        assert_eq!(data.clinical.len(), 24);
        assert_eq!(data.sensor.len(), 24);
        assert_eq!(data.notes.len(), 24);
        assert_eq!(data.clinical[0].participant_id, 1);
        assert_eq!(data.clinical[2].timepoint, 3);
        assert_eq!(data.clinical[3].participant_id, 2);
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = generate(&small()).unwrap();
        let b = generate(&small()).unwrap();
        let scores = |d: &DemoDataset| d.clinical.iter().map(|r| r.symptom_score).collect::<Vec<_>>();
        assert_eq!(scores(&a), scores(&b));
    }

    #[test]
    fn test_sensor_bounds() {
        let data = generate(&DemoSpec {
            participants: 50,
            timepoints: 6,
            seed: 1,
        })
        .unwrap();
        for row in &data.sensor {
            assert!(row.avg_steps >= 500.0);
            assert!((3.5..=10.0).contains(&row.sleep_hours));
            assert!((30.0..=600.0).contains(&row.phone_usage_minutes));
        }
    }

    #[test]
    fn test_participant_attributes_constant_across_visits() {
        let data = generate(&small()).unwrap();
        for visits in data.clinical.chunks(3) {
            assert!(visits.iter().all(|r| r.age == visits[0].age));
            assert!(visits.iter().all(|r| r.gender == visits[0].gender));
            assert!(visits.iter().all(|r| r.treatment_group == visits[0].treatment_group));
        }
    }

    #[test]
    fn test_note_template() {
        assert_eq!(mood_phrase(25.0), "feeling very overwhelmed and anxious");
        assert_eq!(mood_phrase(22.0), "struggling with mood but noticing some better days");
        assert_eq!(mood_phrase(10.0), "feeling much more stable and engaged in daily activities");
        let data = generate(&small()).unwrap();
        assert!(data.notes[0].note_text.starts_with("At visit 1, the participant reports "));
        assert!(data.notes[0].note_text.ends_with("Sleep and energy fluctuate."));
    }

    #[test]
    fn test_written_files_load_back() {
        let dir = TempDir::new().unwrap();
        let files = write_demo_data(dir.path(), &small()).unwrap();

        let clinical = load_data(&files.clinical).unwrap();
        assert_eq!(clinical.n_rows(), 24);
        assert!(clinical.column("gender").is_some_and(|c| !c.is_numeric()));

        let config = load_config(&files.config).unwrap();
        assert_eq!(config.primary_outcome(), "symptom_score");
        assert_eq!(config.modalities.len(), 2);
    }
}
