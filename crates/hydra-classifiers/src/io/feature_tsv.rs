//! Subject-level TSV readers and writers.
//!
//! Feature tables carry `participant_id`, `session_id`, `diagnosis` and then
//! either inline feature columns or a `path` column naming one vector file per
//! subject. Component tables (one per scale) carry `participant_id` and
//! feature columns. Header names are matched case-insensitively.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use ndarray::Array2;

use crate::data_handling::{ClassNames, FeatureDataset};
use crate::error::{ClassificationError, Result};

pub const PARTICIPANT_ID: &str = "participant_id";
pub const SESSION_ID: &str = "session_id";
pub const DIAGNOSIS: &str = "diagnosis";
pub const PATH: &str = "path";

/// Where a feature table keeps its feature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureLayout {
    /// Every column after the metadata columns is a feature (ROI mode).
    Inline,
    /// A `path` column names a text file per subject (voxel mode).
    PathColumn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub participant_id: String,
    pub session_id: String,
    pub diagnosis: String,
}

/// Features of one scale keyed by participant.
#[derive(Debug, Clone)]
pub struct ComponentTable {
    pub participant_ids: Vec<String>,
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
}

fn tsv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .map_err(|e| {
            ClassificationError::InvalidData(format!("cannot open {}: {}", path.display(), e))
        })
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn require_column(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    find_column(headers, name).ok_or_else(|| {
        ClassificationError::InvalidData(format!(
            "{} has no '{}' column",
            path.display(),
            name
        ))
    })
}

fn field<'r>(record: &'r StringRecord, idx: usize, column: &str, row: usize) -> Result<&'r str> {
    record.get(idx).map(str::trim).ok_or_else(|| {
        ClassificationError::InvalidData(format!("row {}: missing value for '{}'", row, column))
    })
}

fn parse_value(value: &str, column: &str, row: usize) -> Result<f64> {
    value.parse::<f64>().map_err(|_| {
        ClassificationError::InvalidData(format!(
            "row {}, column '{}': cannot parse '{}' as a number",
            row, column, value
        ))
    })
}

/// Read `participant_id`, `session_id` (optional) and `diagnosis`.
pub fn read_participants(path: &Path) -> Result<Vec<ParticipantRecord>> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers()?.clone();
    let pid_idx = require_column(&headers, PARTICIPANT_ID, path)?;
    let dx_idx = require_column(&headers, DIAGNOSIS, path)?;
    let ses_idx = find_column(&headers, SESSION_ID);

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = result?;
        records.push(ParticipantRecord {
            participant_id: field(&record, pid_idx, PARTICIPANT_ID, row)?.to_string(),
            session_id: match ses_idx {
                Some(idx) => field(&record, idx, SESSION_ID, row)?.to_string(),
                None => String::new(),
            },
            diagnosis: field(&record, dx_idx, DIAGNOSIS, row)?.to_string(),
        });
    }
    if records.is_empty() {
        return Err(ClassificationError::InvalidData(format!(
            "{} has no subjects",
            path.display()
        )));
    }
    Ok(records)
}

/// Read a feature table into a dataset, inferring the two classes from the
/// `diagnosis` column.
pub fn read_feature_table(path: &Path, layout: FeatureLayout) -> Result<FeatureDataset> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers()?.clone();
    let pid_idx = require_column(&headers, PARTICIPANT_ID, path)?;
    let ses_idx = require_column(&headers, SESSION_ID, path)?;
    let dx_idx = require_column(&headers, DIAGNOSIS, path)?;
    let path_idx = match layout {
        FeatureLayout::PathColumn => Some(require_column(&headers, PATH, path)?),
        FeatureLayout::Inline => None,
    };

    let metadata: HashSet<usize> = [Some(pid_idx), Some(ses_idx), Some(dx_idx), find_column(&headers, PATH)]
        .into_iter()
        .flatten()
        .collect();
    let feature_indices: Vec<usize> = (0..headers.len()).filter(|i| !metadata.contains(i)).collect();
    if layout == FeatureLayout::Inline && feature_indices.is_empty() {
        return Err(ClassificationError::InvalidData(format!(
            "{} has no feature columns",
            path.display()
        )));
    }

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut participants = Vec::new();
    let mut sessions = Vec::new();
    let mut diagnoses = Vec::new();
    let mut values = Vec::new();
    let mut width: Option<usize> = None;

    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = result?;
        participants.push(field(&record, pid_idx, PARTICIPANT_ID, row)?.to_string());
        sessions.push(field(&record, ses_idx, SESSION_ID, row)?.to_string());
        diagnoses.push(field(&record, dx_idx, DIAGNOSIS, row)?.to_string());

        let vector = match path_idx {
            Some(idx) => {
                let file = resolve(&base_dir, field(&record, idx, PATH, row)?);
                read_vector_file(&file)?
            }
            None => {
                let mut vector = Vec::with_capacity(feature_indices.len());
                for &idx in &feature_indices {
                    let column = headers.get(idx).unwrap_or("");
                    vector.push(parse_value(field(&record, idx, column, row)?, column, row)?);
                }
                vector
            }
        };
        match width {
            None => width = Some(vector.len()),
            Some(w) if w != vector.len() => {
                return Err(ClassificationError::DimensionMismatch {
                    context: format!("feature vector of row {}", row),
                    expected: w,
                    found: vector.len(),
                })
            }
            Some(_) => {}
        }
        values.extend(vector);
    }

    let n = participants.len();
    let p = width.unwrap_or(0);
    let feature_names = match layout {
        FeatureLayout::Inline => feature_indices
            .iter()
            .map(|&idx| headers.get(idx).unwrap_or("").trim().to_string())
            .collect(),
        FeatureLayout::PathColumn => (0..p).map(|j| format!("voxel_{}", j)).collect(),
    };
    let x = Array2::from_shape_vec((n, p), values)
        .map_err(|e| ClassificationError::InvalidData(e.to_string()))?;

    let classes = ClassNames::infer(&diagnoses)?;
    let labels = diagnoses
        .iter()
        .map(|d| classes.encode(d))
        .collect::<Result<Vec<bool>>>()?;
    FeatureDataset::new(participants, sessions, labels, classes, feature_names, x)
}

fn resolve(base: &Path, value: &str) -> PathBuf {
    let p = Path::new(value);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Parse one subject's feature vector: numbers separated by whitespace,
/// commas or tabs.
pub fn read_vector_file(path: &Path) -> Result<Vec<f64>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ClassificationError::InvalidData(format!("cannot read {}: {}", path.display(), e))
    })?;
    let values = content
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(i, t)| {
            t.parse::<f64>().map_err(|_| {
                ClassificationError::InvalidData(format!(
                    "{}: value {} ('{}') is not a number",
                    path.display(),
                    i + 1,
                    t
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    if values.is_empty() {
        return Err(ClassificationError::InvalidData(format!(
            "{} holds no values",
            path.display()
        )));
    }
    Ok(values)
}

/// Read a scale's component table. Metadata columns other than
/// `participant_id` are ignored.
pub fn read_component_table(path: &Path) -> Result<ComponentTable> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers()?.clone();
    let pid_idx = require_column(&headers, PARTICIPANT_ID, path)?;
    let ignored: HashSet<usize> = [SESSION_ID, DIAGNOSIS, PATH]
        .iter()
        .filter_map(|name| find_column(&headers, name))
        .chain(std::iter::once(pid_idx))
        .collect();
    let feature_indices: Vec<usize> = (0..headers.len()).filter(|i| !ignored.contains(i)).collect();
    if feature_indices.is_empty() {
        return Err(ClassificationError::InvalidData(format!(
            "{} has no component columns",
            path.display()
        )));
    }

    let mut participant_ids = Vec::new();
    let mut values = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = result?;
        participant_ids.push(field(&record, pid_idx, PARTICIPANT_ID, row)?.to_string());
        for &idx in &feature_indices {
            let column = headers.get(idx).unwrap_or("");
            values.push(parse_value(field(&record, idx, column, row)?, column, row)?);
        }
    }
    let x = Array2::from_shape_vec((participant_ids.len(), feature_indices.len()), values)
        .map_err(|e| ClassificationError::InvalidData(e.to_string()))?;
    Ok(ComponentTable {
        participant_ids,
        feature_names: feature_indices
            .iter()
            .map(|&idx| headers.get(idx).unwrap_or("").trim().to_string())
            .collect(),
        x,
    })
}

/// Write a dataset as an inline feature table.
pub fn write_feature_table(path: &Path, dataset: &FeatureDataset) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    let mut header = vec![PARTICIPANT_ID.to_string(), SESSION_ID.to_string(), DIAGNOSIS.to_string()];
    header.extend(dataset.feature_names.iter().cloned());
    writer.write_record(&header)?;
    for (i, row) in dataset.x.rows().into_iter().enumerate() {
        let mut record = vec![
            dataset.participant_ids[i].clone(),
            dataset.session_ids[i].clone(),
            dataset.classes.decode(dataset.labels[i]).to_string(),
        ];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
