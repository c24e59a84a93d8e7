//! Classification metrics and their aggregation across trials.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Binary confusion counts, positive class = `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn from_labels(truth: &[bool], predicted: &[bool]) -> Self {
        let mut c = Confusion::default();
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            match (t, p) {
                (true, true) => c.tp += 1,
                (false, false) => c.tn += 1,
                (false, true) => c.fp += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }
}

/// Ratio with an empty denominator mapped to 0.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub balanced_accuracy: f64,
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub precision: f64,
    pub npv: f64,
    pub auc: Option<f64>,
}

impl Metrics {
    /// Metric names in the order they are reported.
    pub const NAMES: [&'static str; 7] = [
        "balanced_accuracy",
        "accuracy",
        "sensitivity",
        "specificity",
        "precision",
        "npv",
        "auc",
    ];

    /// Compute metrics from true labels, hard predictions and optional
    /// positive-class scores.
    pub fn compute(truth: &[bool], predicted: &[bool], scores: Option<&[f64]>) -> Self {
        let c = Confusion::from_labels(truth, predicted);
        let sensitivity = ratio(c.tp, c.tp + c.fn_);
        let specificity = ratio(c.tn, c.tn + c.fp);
        Metrics {
            balanced_accuracy: (sensitivity + specificity) / 2.0,
            accuracy: ratio(c.tp + c.tn, truth.len()),
            sensitivity,
            specificity,
            precision: ratio(c.tp, c.tp + c.fp),
            npv: ratio(c.tn, c.tn + c.fn_),
            auc: scores.and_then(|s| roc_auc(s, truth)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "balanced_accuracy" => Some(self.balanced_accuracy),
            "accuracy" => Some(self.accuracy),
            "sensitivity" => Some(self.sensitivity),
            "specificity" => Some(self.specificity),
            "precision" => Some(self.precision),
            "npv" => Some(self.npv),
            "auc" => self.auc,
            _ => None,
        }
    }
}

/// Balanced accuracy of hard predictions.
pub fn balanced_accuracy(truth: &[bool], predicted: &[bool]) -> f64 {
    let c = Confusion::from_labels(truth, predicted);
    (ratio(c.tp, c.tp + c.fn_) + ratio(c.tn, c.tn + c.fp)) / 2.0
}

/// Area under the ROC curve via the trapezoidal rule; tied scores count half.
///
/// Returns `None` when only one class is present.
pub fn roc_auc(scores: &[f64], truth: &[bool]) -> Option<f64> {
    let total_pos = truth.iter().filter(|&&t| t).count() as f64;
    let total_neg = truth.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return None;
    }

    // Sort predictions and labels by score (ascending)
    let mut combined: Vec<(f64, bool)> = scores.iter().copied().zip(truth.iter().copied()).collect();
    combined.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut auc = 0.0;
    let mut cum_pos = 0.0;
    let mut cum_neg = 0.0;
    let mut prev_score = f64::NEG_INFINITY;
    let mut prev_pos = 0.0;
    let mut prev_neg = 0.0;

    for &(score, label) in combined.iter() {
        if score != prev_score {
            auc += (cum_pos - prev_pos) * (cum_neg + prev_neg) / 2.0;
            prev_score = score;
            prev_pos = cum_pos;
            prev_neg = cum_neg;
        }
        if label {
            cum_pos += 1.0;
        } else {
            cum_neg += 1.0;
        }
    }
    auc += (total_pos - prev_pos) * (total_neg + prev_neg) / 2.0;

    Some(auc / (total_pos * total_neg))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl MetricSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(MetricSummary {
            mean,
            std: var.sqrt(),
        })
    }
}

/// Mean/std of every metric across the succeeded trials of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub n_trials: usize,
    pub n_succeeded: usize,
    pub failed_repetitions: Vec<usize>,
    pub balanced_accuracy: Option<MetricSummary>,
    pub accuracy: Option<MetricSummary>,
    pub sensitivity: Option<MetricSummary>,
    pub specificity: Option<MetricSummary>,
    pub precision: Option<MetricSummary>,
    pub npv: Option<MetricSummary>,
    pub auc: Option<MetricSummary>,
}

impl SummaryResult {
    /// `metrics` must be ordered by repetition index.
    pub fn from_metrics(n_trials: usize, failed_repetitions: Vec<usize>, metrics: &[&Metrics]) -> Self {
        let summarize = |name: &str| {
            let values: Vec<f64> = metrics.iter().filter_map(|m| m.get(name)).collect();
            MetricSummary::from_values(&values)
        };
        SummaryResult {
            n_trials,
            n_succeeded: metrics.len(),
            failed_repetitions,
            balanced_accuracy: summarize("balanced_accuracy"),
            accuracy: summarize("accuracy"),
            sensitivity: summarize("sensitivity"),
            specificity: summarize("specificity"),
            precision: summarize("precision"),
            npv: summarize("npv"),
            auc: summarize("auc"),
        }
    }

    pub fn get(&self, name: &str) -> Option<MetricSummary> {
        match name {
            "balanced_accuracy" => self.balanced_accuracy,
            "accuracy" => self.accuracy,
            "sensitivity" => self.sensitivity,
            "specificity" => self.specificity,
            "precision" => self.precision,
            "npv" => self.npv,
            "auc" => self.auc,
            _ => None,
        }
    }

    pub fn log_summary(&self, label: &str) {
        log::info!(
            "{}: {}/{} trial(s) succeeded",
            label,
            self.n_succeeded,
            self.n_trials
        );
        for name in Metrics::NAMES {
            if let Some(s) = self.get(name) {
                log::info!("  {:<18} {:.4} +/- {:.4}", name, s.mean, s.std);
            }
        }
    }

    /// Write `metric<TAB>mean<TAB>std`; undefined metrics are written as NA.
    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(["metric", "mean", "std"])?;
        for name in Metrics::NAMES {
            match self.get(name) {
                Some(s) => {
                    writer.write_record([name.to_string(), s.mean.to_string(), s.std.to_string()])?
                }
                None => writer.write_record([name, "NA", "NA"])?,
            }
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_from_confusion() {
        let truth = [true, true, false, false];
        let pred = [true, false, false, false];
        let m = Metrics::compute(&truth, &pred, None);
        assert_eq!(m.sensitivity, 0.5);
        assert_eq!(m.specificity, 1.0);
        assert_eq!(m.balanced_accuracy, 0.75);
        assert_eq!(m.precision, 1.0);
        assert!((m.npv - 2.0 / 3.0).abs() < 1e-12);
        assert!(m.auc.is_none());
    }

    #[test]
    fn empty_denominator_is_zero() {
        let m = Metrics::compute(&[false, false], &[false, false], None);
        assert_eq!(m.sensitivity, 0.0);
        assert_eq!(m.precision, 0.0);
    }

    #[test]
    fn auc_perfect_and_tied() {
        let truth = [false, false, true, true];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &truth), Some(1.0));
        assert_eq!(roc_auc(&[0.5, 0.5, 0.5, 0.5], &truth), Some(0.5));
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &truth), Some(0.0));
        assert_eq!(roc_auc(&[0.1, 0.2], &[true, true]), None);
    }

    #[test]
    fn summary_uses_population_std() {
        let a = Metrics::compute(&[true, false], &[true, false], None);
        let b = Metrics::compute(&[true, false], &[false, false], None);
        let s = SummaryResult::from_metrics(3, vec![2], &[&a, &b]);
        let ba = s.balanced_accuracy.unwrap();
        assert!((ba.mean - 0.75).abs() < 1e-12);
        assert!((ba.std - 0.25).abs() < 1e-12);
        assert_eq!(s.n_succeeded, 2);
        assert!(s.auc.is_none());
    }
}
