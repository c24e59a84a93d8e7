//! Trial results and their on-disk store.
//!
//! Layout of one configuration under `<output>/classification`:
//!
//! ```text
//! status.json        RunStatus (in_progress | complete | failed)
//! trial-<i>.json     one TrialOutcome per repetition
//! summary.json       SummaryResult
//! mean_results.tsv   metric / mean / std
//! ```
//!
//! Every JSON file is written to a temporary sibling and renamed into place, so
//! an interrupted run never leaves a truncated artifact behind.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClassificationConfig;
use crate::error::{ClassificationError, Result};
use crate::partition::PartitionKey;
use crate::stats::{Metrics, SummaryResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub repetition: usize,
    pub best_c: f64,
    /// Mean inner balanced accuracy per `c_grid` candidate, in grid order.
    pub inner_scores: Vec<f64>,
    /// Original column indices kept by subset selectors.
    pub selected_features: Option<Vec<usize>>,
    pub retained_dimensions: usize,
    pub test_indices: Vec<usize>,
    pub predictions: Vec<bool>,
    /// Calibrated probability of the positive class per test subject.
    pub scores: Vec<f64>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialOutcome {
    Succeeded(TrialResult),
    Failed { repetition: usize, reason: String },
}

impl TrialOutcome {
    pub fn repetition(&self) -> usize {
        match self {
            TrialOutcome::Succeeded(r) => r.repetition,
            TrialOutcome::Failed { repetition, .. } => *repetition,
        }
    }

    pub fn result(&self) -> Option<&TrialResult> {
        match self {
            TrialOutcome::Succeeded(r) => Some(r),
            TrialOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TrialOutcome::Succeeded(_))
    }
}

/// Summary over an ordered list of outcomes; failures are listed, not averaged.
pub fn summarize_outcomes(outcomes: &[TrialOutcome]) -> SummaryResult {
    let failed = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(TrialOutcome::repetition)
        .collect();
    let metrics: Vec<&Metrics> = outcomes
        .iter()
        .filter_map(|o| o.result().map(|r| &r.metrics))
        .collect();
    SummaryResult::from_metrics(outcomes.len(), failed, &metrics)
}

/// In-memory result of running the nested engine over one dataset.
#[derive(Debug, Clone)]
pub struct ClassificationRun {
    pub participant_ids: Vec<String>,
    pub labels: Vec<bool>,
    pub outcomes: Vec<TrialOutcome>,
    pub summary: SummaryResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    InProgress,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    pub partition: PartitionKey,
    pub config: ClassificationConfig,
    pub updated_at: DateTime<Utc>,
}

/// Serialize to `path` through a temporary file and rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Persistent store of one classification configuration.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Open (and create) the store directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(ResultStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join("status.json")
    }

    pub fn trial_path(&self, repetition: usize) -> PathBuf {
        self.root.join(format!("trial-{}.json", repetition))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    pub fn mean_results_path(&self) -> PathBuf {
        self.root.join("mean_results.tsv")
    }

    pub fn read_status(&self) -> Result<Option<RunStatus>> {
        read_json(&self.status_path())
    }

    pub fn write_status(
        &self,
        state: RunState,
        partition: &PartitionKey,
        config: &ClassificationConfig,
    ) -> Result<()> {
        let status = RunStatus {
            state,
            partition: partition.clone(),
            config: config.clone(),
            updated_at: Utc::now(),
        };
        write_json_atomic(&self.status_path(), &status)
    }

    /// Fail with a stale-cache error if `status` was produced by a different
    /// partition set or configuration.
    pub fn check_compatible(
        &self,
        status: &RunStatus,
        partition: &PartitionKey,
        config: &ClassificationConfig,
    ) -> Result<()> {
        if &status.partition != partition {
            return Err(ClassificationError::StaleCache {
                path: self.status_path(),
                reason: format!(
                    "stored partition {:?} differs from requested {:?}",
                    status.partition, partition
                ),
            });
        }
        if &status.config != config {
            return Err(ClassificationError::StaleCache {
                path: self.status_path(),
                reason: "stored classification config differs from the requested one".to_string(),
            });
        }
        Ok(())
    }

    pub fn load_trial(&self, repetition: usize) -> Result<Option<TrialOutcome>> {
        let outcome: Option<TrialOutcome> = read_json(&self.trial_path(repetition))?;
        match outcome {
            Some(o) if o.repetition() != repetition => Err(ClassificationError::InvalidData(format!(
                "{} holds repetition {}",
                self.trial_path(repetition).display(),
                o.repetition()
            ))),
            other => Ok(other),
        }
    }

    pub fn save_trial(&self, outcome: &TrialOutcome) -> Result<()> {
        write_json_atomic(&self.trial_path(outcome.repetition()), outcome)
    }

    /// Load all `repetitions` trial files; any missing file is an error.
    pub fn load_all_trials(&self, repetitions: usize) -> Result<Vec<TrialOutcome>> {
        (0..repetitions)
            .map(|r| {
                self.load_trial(r)?.ok_or_else(|| {
                    ClassificationError::InvalidData(format!(
                        "run marked complete but {} is missing",
                        self.trial_path(r).display()
                    ))
                })
            })
            .collect()
    }

    pub fn save_summary(&self, summary: &SummaryResult) -> Result<()> {
        write_json_atomic(&self.summary_path(), summary)?;
        summary.write_tsv(&self.mean_results_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CvStrategy;

    fn key() -> PartitionKey {
        PartitionKey {
            strategy: CvStrategy::HoldOut,
            repetitions: 2,
            seed: 3,
        }
    }

    #[test]
    fn failed_outcome_serializes_with_status_tag() {
        let outcome = TrialOutcome::Failed {
            repetition: 4,
            reason: "degenerate".into(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        let back: TrialOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn status_round_trip_and_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("classification")).unwrap();
        assert!(store.read_status().unwrap().is_none());

        let config = ClassificationConfig::default();
        store.write_status(RunState::InProgress, &key(), &config).unwrap();
        let status = store.read_status().unwrap().unwrap();
        assert_eq!(status.state, RunState::InProgress);
        assert!(store.check_compatible(&status, &key(), &config).is_ok());

        let other = ClassificationConfig {
            inner_folds: 3,
            ..Default::default()
        };
        assert!(matches!(
            store.check_compatible(&status, &key(), &other),
            Err(ClassificationError::StaleCache { .. })
        ));
        assert!(!store.root().join("status.json.tmp").exists());
    }
}
