//! Ensemble voting across scales.
//!
//! Every scale is classified on the same partition set, so repetition `r` of
//! each scale predicts the same test subjects. The aggregator combines those
//! per-scale predictions subject by subject.
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::VotingMethod;
use crate::data_handling::ClassNames;
use crate::error::{ClassificationError, Result};
use crate::results::{write_json_atomic, ClassificationRun, TrialOutcome, TrialResult};
use crate::stats::{Metrics, SummaryResult};

/// Trial outcomes of one scale, with the subject order they refer to.
#[derive(Debug, Clone)]
pub struct ScaleTrials {
    pub name: String,
    pub participant_ids: Vec<String>,
    pub labels: Vec<bool>,
    pub outcomes: Vec<TrialOutcome>,
}

impl ScaleTrials {
    pub fn from_run(name: impl Into<String>, run: ClassificationRun) -> Self {
        ScaleTrials {
            name: name.into(),
            participant_ids: run.participant_ids,
            labels: run.labels,
            outcomes: run.outcomes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepetitionStatus {
    Voted,
    /// Consensus voting found no scale above chance.
    Abstained,
    /// At least one scale failed this repetition.
    Skipped,
}

impl fmt::Display for RepetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepetitionStatus::Voted => "voted",
            RepetitionStatus::Abstained => "abstained",
            RepetitionStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectDecision {
    pub subject_index: usize,
    pub participant_id: String,
    pub label: bool,
    pub decision: Option<bool>,
    /// Mean calibrated score of the participating scales.
    pub mean_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRepetition {
    pub repetition: usize,
    pub status: RepetitionStatus,
    pub participating_scales: Vec<String>,
    pub decisions: Vec<SubjectDecision>,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub method: VotingMethod,
    pub scales: Vec<String>,
    pub repetitions: Vec<EnsembleRepetition>,
    pub summary: Option<SummaryResult>,
}

/// Majority of per-scale labels; an even split goes to the negative class.
pub fn hard_vote(votes: &[bool]) -> bool {
    let positive = votes.iter().filter(|&&v| v).count();
    2 * positive > votes.len()
}

/// Positive iff the mean score is strictly above 0.5.
pub fn soft_vote(scores: &[f64]) -> bool {
    if scores.is_empty() {
        return false;
    }
    scores.iter().sum::<f64>() / scores.len() as f64 > 0.5
}

/// Hard vote among the scales whose trial balanced accuracy beats chance.
/// `None` when no scale qualifies.
pub fn consensus_vote(votes: &[bool], balanced_accuracies: &[f64]) -> Option<bool> {
    let qualified: Vec<bool> = votes
        .iter()
        .zip(balanced_accuracies.iter())
        .filter(|(_, &ba)| ba > 0.5)
        .map(|(&v, _)| v)
        .collect();
    if qualified.is_empty() {
        None
    } else {
        Some(hard_vote(&qualified))
    }
}

fn check_alignment(scales: &[ScaleTrials], repetitions: usize) -> Result<()> {
    let first = scales.first().ok_or_else(|| {
        ClassificationError::MisalignedScales("no scales to aggregate".to_string())
    })?;
    for scale in scales {
        if scale.participant_ids != first.participant_ids || scale.labels != first.labels {
            return Err(ClassificationError::MisalignedScales(format!(
                "subject order of scale '{}' differs from scale '{}'",
                scale.name, first.name
            )));
        }
        if scale.outcomes.len() != repetitions {
            return Err(ClassificationError::MisalignedScales(format!(
                "scale '{}' has {} trial(s), expected {}",
                scale.name,
                scale.outcomes.len(),
                repetitions
            )));
        }
        for (r, outcome) in scale.outcomes.iter().enumerate() {
            if outcome.repetition() != r {
                return Err(ClassificationError::MisalignedScales(format!(
                    "scale '{}' lists repetition {} at position {}",
                    scale.name,
                    outcome.repetition(),
                    r
                )));
            }
        }
    }
    Ok(())
}

/// Combine the per-scale trials of every repetition with `method`.
///
/// Consensus admits a scale when the balanced accuracy of its trial on the
/// held-out subjects is strictly above 0.5. Plain accuracy is not used, so a
/// scale that always predicts the majority class does not qualify.
pub fn aggregate(
    scales: &[ScaleTrials],
    repetitions: usize,
    method: VotingMethod,
) -> Result<EnsembleResult> {
    check_alignment(scales, repetitions)?;
    let participant_ids = &scales[0].participant_ids;
    let labels = &scales[0].labels;

    let mut out = Vec::with_capacity(repetitions);
    for r in 0..repetitions {
        let trials: Option<Vec<(&str, &TrialResult)>> = scales
            .iter()
            .map(|s| s.outcomes[r].result().map(|t| (s.name.as_str(), t)))
            .collect();
        let Some(trials) = trials else {
            let failed: Vec<&str> = scales
                .iter()
                .filter(|s| !s.outcomes[r].is_success())
                .map(|s| s.name.as_str())
                .collect();
            log::warn!(
                "Skipping repetition {}: trial failed for scale(s) {}",
                r,
                failed.join(", ")
            );
            out.push(EnsembleRepetition {
                repetition: r,
                status: RepetitionStatus::Skipped,
                participating_scales: Vec::new(),
                decisions: Vec::new(),
                metrics: None,
            });
            continue;
        };

        let test = &trials[0].1.test_indices;
        for (name, t) in &trials {
            if &t.test_indices != test || t.predictions.len() != test.len() || t.scores.len() != test.len() {
                return Err(ClassificationError::MisalignedScales(format!(
                    "repetition {}: test subjects of scale '{}' differ from scale '{}'",
                    r, name, trials[0].0
                )));
            }
        }

        let voters: Vec<&(&str, &TrialResult)> = match method {
            VotingMethod::Consensus => trials
                .iter()
                .filter(|(_, t)| t.metrics.balanced_accuracy > 0.5)
                .collect(),
            VotingMethod::Hard | VotingMethod::Soft => trials.iter().collect(),
        };
        let participating: Vec<String> = voters.iter().map(|(n, _)| n.to_string()).collect();

        if voters.is_empty() {
            log::info!("Repetition {}: no scale above chance, consensus abstains", r);
            out.push(EnsembleRepetition {
                repetition: r,
                status: RepetitionStatus::Abstained,
                participating_scales: participating,
                decisions: test
                    .iter()
                    .map(|&i| SubjectDecision {
                        subject_index: i,
                        participant_id: participant_ids[i].clone(),
                        label: labels[i],
                        decision: None,
                        mean_score: None,
                    })
                    .collect(),
                metrics: None,
            });
            continue;
        }

        let mut decisions = Vec::with_capacity(test.len());
        for (pos, &i) in test.iter().enumerate() {
            let votes: Vec<bool> = voters.iter().map(|(_, t)| t.predictions[pos]).collect();
            let scores: Vec<f64> = voters.iter().map(|(_, t)| t.scores[pos]).collect();
            let decision = match method {
                VotingMethod::Soft => soft_vote(&scores),
                VotingMethod::Hard | VotingMethod::Consensus => hard_vote(&votes),
            };
            decisions.push(SubjectDecision {
                subject_index: i,
                participant_id: participant_ids[i].clone(),
                label: labels[i],
                decision: Some(decision),
                mean_score: Some(scores.iter().sum::<f64>() / scores.len() as f64),
            });
        }

        let truth: Vec<bool> = decisions.iter().map(|d| d.label).collect();
        let predicted: Vec<bool> = decisions.iter().filter_map(|d| d.decision).collect();
        let mean_scores: Vec<f64> = decisions.iter().filter_map(|d| d.mean_score).collect();
        let metrics = Metrics::compute(&truth, &predicted, Some(mean_scores.as_slice()));
        log::debug!(
            "Repetition {}: {} vote over {} scale(s), balanced accuracy {:.4}",
            r,
            method,
            participating.len(),
            metrics.balanced_accuracy
        );

        out.push(EnsembleRepetition {
            repetition: r,
            status: RepetitionStatus::Voted,
            participating_scales: participating,
            decisions,
            metrics: Some(metrics),
        });
    }

    let voted: Vec<&Metrics> = out.iter().filter_map(|r| r.metrics.as_ref()).collect();
    let not_voted: Vec<usize> = out
        .iter()
        .filter(|r| r.status != RepetitionStatus::Voted)
        .map(|r| r.repetition)
        .collect();
    let summary = if voted.is_empty() {
        log::warn!("No repetition produced an ensemble vote");
        None
    } else {
        Some(SummaryResult::from_metrics(repetitions, not_voted, &voted))
    };

    Ok(EnsembleResult {
        method,
        scales: scales.iter().map(|s| s.name.clone()).collect(),
        repetitions: out,
        summary,
    })
}

/// Write `ensemble_result.json`, `predictions.tsv` and, when any repetition
/// voted, `mean_results.tsv` into `dir`.
pub fn write_ensemble(result: &EnsembleResult, classes: &ClassNames, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    write_json_atomic(&dir.join("ensemble_result.json"), result)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(dir.join("predictions.tsv"))?;
    writer.write_record(["participant_id", "repetition", "status", "label", "decision", "mean_score"])?;
    for rep in &result.repetitions {
        for d in &rep.decisions {
            writer.write_record([
                d.participant_id.clone(),
                rep.repetition.to_string(),
                rep.status.to_string(),
                classes.decode(d.label).to_string(),
                d.decision
                    .map(|v| classes.decode(v).to_string())
                    .unwrap_or_else(|| "NA".to_string()),
                d.mean_score
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "NA".to_string()),
            ])?;
        }
    }
    writer.flush()?;

    if let Some(summary) = &result.summary {
        summary.write_tsv(&dir.join("mean_results.tsv"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_vote_majority_and_tie() {
        assert!(hard_vote(&[true, true, false]));
        assert!(!hard_vote(&[true, false]));
        assert!(!hard_vote(&[]));
    }

    #[test]
    fn soft_vote_threshold_is_strict() {
        assert!(soft_vote(&[0.6, 0.7, 0.4]));
        assert!(!soft_vote(&[0.5, 0.5]));
    }

    #[test]
    fn consensus_drops_scales_at_chance() {
        assert_eq!(consensus_vote(&[true, false, false], &[0.8, 0.48, 0.5]), Some(true));
        assert_eq!(consensus_vote(&[true], &[0.4]), None);
    }
}
