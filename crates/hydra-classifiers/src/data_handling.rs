//! Subject-level feature datasets.
//!
//! A `FeatureDataset` holds one row per subject: identifiers, a binary label
//! and a fixed-length feature vector. Labels are stored as `bool` with `true`
//! for the positive class; `ClassNames` keeps the raw diagnosis values so
//! outputs can be written back in the input's vocabulary.
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ClassificationError, Result};

/// Raw names of the two classes. The negative class sorts first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNames {
    pub negative: String,
    pub positive: String,
}

impl ClassNames {
    /// Infer the two classes from a raw label column.
    ///
    /// Values are ordered numerically when both parse as numbers, otherwise
    /// lexicographically. Anything other than exactly two distinct values is
    /// rejected.
    pub fn infer(raw: &[String]) -> Result<Self> {
        let mut distinct: Vec<&str> = raw
            .iter()
            .map(|v| v.trim())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if distinct.len() != 2 {
            distinct.sort_unstable();
            return Err(ClassificationError::InvalidData(format!(
                "diagnosis must contain exactly two distinct values, found {}: {:?}",
                distinct.len(),
                distinct
            )));
        }
        distinct.sort_by(|a, b| compare_labels(a, b));
        Ok(ClassNames {
            negative: distinct[0].to_string(),
            positive: distinct[1].to_string(),
        })
    }

    /// Map a raw value onto `true` (positive) / `false` (negative).
    pub fn encode(&self, raw: &str) -> Result<bool> {
        let raw = raw.trim();
        if raw == self.positive {
            Ok(true)
        } else if raw == self.negative {
            Ok(false)
        } else {
            Err(ClassificationError::InvalidData(format!(
                "label '{}' is neither '{}' nor '{}'",
                raw, self.negative, self.positive
            )))
        }
    }

    pub fn decode(&self, label: bool) -> &str {
        if label {
            &self.positive
        } else {
            &self.negative
        }
    }
}

fn compare_labels(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

#[derive(Debug, Clone)]
pub struct FeatureDataset {
    pub participant_ids: Vec<String>,
    pub session_ids: Vec<String>,
    pub labels: Vec<bool>,
    pub classes: ClassNames,
    pub feature_names: Vec<String>,
    /// Subjects x features.
    pub x: Array2<f64>,
}

impl FeatureDataset {
    pub fn new(
        participant_ids: Vec<String>,
        session_ids: Vec<String>,
        labels: Vec<bool>,
        classes: ClassNames,
        feature_names: Vec<String>,
        x: Array2<f64>,
    ) -> Result<Self> {
        let n = x.nrows();
        for (what, len) in [
            ("participant_ids", participant_ids.len()),
            ("session_ids", session_ids.len()),
            ("labels", labels.len()),
        ] {
            if len != n {
                return Err(ClassificationError::DimensionMismatch {
                    context: format!("{} vs feature matrix", what),
                    expected: n,
                    found: len,
                });
            }
        }
        if feature_names.len() != x.ncols() {
            return Err(ClassificationError::InvalidData(format!(
                "{} feature names for {} feature columns",
                feature_names.len(),
                x.ncols()
            )));
        }
        if x.ncols() == 0 {
            return Err(ClassificationError::InvalidData(
                "dataset has no feature columns".to_string(),
            ));
        }
        if let Some(v) = x.iter().find(|v| !v.is_finite()) {
            return Err(ClassificationError::InvalidData(format!(
                "feature matrix contains a non-finite value ({})",
                v
            )));
        }
        let n_pos = labels.iter().filter(|&&l| l).count();
        if n_pos == 0 || n_pos == n {
            return Err(ClassificationError::InvalidData(
                "both classes must be present in the dataset".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(n);
        for (p, s) in participant_ids.iter().zip(session_ids.iter()) {
            if !seen.insert((p.as_str(), s.as_str())) {
                return Err(ClassificationError::InvalidData(format!(
                    "duplicate subject '{}' (session '{}')",
                    p, s
                )));
            }
        }

        Ok(FeatureDataset {
            participant_ids,
            session_ids,
            labels,
            classes,
            feature_names,
            x,
        })
    }

    pub fn n_subjects(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// (negative, positive) subject counts.
    pub fn class_counts(&self) -> (usize, usize) {
        class_counts(&self.labels)
    }

    pub fn select_rows(&self, indices: &[usize]) -> (Array2<f64>, Vec<bool>) {
        let x = self.x.select(Axis(0), indices);
        let y = indices.iter().map(|&i| self.labels[i]).collect();
        (x, y)
    }

    /// Position of each participant id; fails if an id occurs more than once.
    pub fn participant_index(&self) -> Result<HashMap<&str, usize>> {
        let mut index = HashMap::with_capacity(self.n_subjects());
        for (i, p) in self.participant_ids.iter().enumerate() {
            if index.insert(p.as_str(), i).is_some() {
                return Err(ClassificationError::InvalidData(format!(
                    "participant '{}' occurs more than once",
                    p
                )));
            }
        }
        Ok(index)
    }

    pub fn log_input_data_summary(&self) {
        let (n_neg, n_pos) = self.class_counts();
        log::info!("----- Input Data Summary -----");
        log::info!(
            "{} subjects: {} '{}' (negative) and {} '{}' (positive)",
            self.n_subjects(),
            n_neg,
            self.classes.negative,
            n_pos,
            self.classes.positive
        );
        log::info!("{} features per subject", self.n_features());
        log::info!("-------------------------------");
    }
}

pub fn class_counts(labels: &[bool]) -> (usize, usize) {
    let n_pos = labels.iter().filter(|&&l| l).count();
    (labels.len() - n_pos, n_pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn numeric_labels_order_by_value() {
        let classes = ClassNames::infer(&strings(&["1", "-1", "1", "-1"])).unwrap();
        assert_eq!(classes.negative, "-1");
        assert_eq!(classes.positive, "1");
        assert!(classes.encode("1").unwrap());
        assert!(!classes.encode(" -1 ").unwrap());
        assert!(classes.encode("0").is_err());
    }

    #[test]
    fn text_labels_order_lexicographically() {
        let classes = ClassNames::infer(&strings(&["CN", "AD", "CN"])).unwrap();
        assert_eq!(classes.negative, "AD");
        assert_eq!(classes.decode(true), "CN");
    }

    #[test]
    fn three_classes_are_rejected() {
        assert!(ClassNames::infer(&strings(&["0", "1", "2"])).is_err());
        assert!(ClassNames::infer(&strings(&["0", "0"])).is_err());
    }

    #[test]
    fn dataset_rejects_single_class_and_duplicates() {
        let classes = ClassNames {
            negative: "0".into(),
            positive: "1".into(),
        };
        let x = Array2::zeros((2, 1));
        let single = FeatureDataset::new(
            strings(&["a", "b"]),
            strings(&["s1", "s1"]),
            vec![true, true],
            classes.clone(),
            strings(&["f"]),
            x.clone(),
        );
        assert!(single.is_err());

        let duplicate = FeatureDataset::new(
            strings(&["a", "a"]),
            strings(&["s1", "s1"]),
            vec![true, false],
            classes,
            strings(&["f"]),
            x,
        );
        assert!(duplicate.is_err());
    }
}
