//! Univariate feature selection methods following scikit-learn's API.
//!
//! See: https://scikit-learn.org/stable/modules/feature_selection.html#univariate-feature-selection

use ndarray::{Array1, Array2, Axis};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use super::{retained, top_k_indices, FeatureSelector, FeatureTransform};
use crate::error::{ClassificationError, Result};

/// One-way ANOVA F-test of each feature against a binary target.
///
/// # Parameters
///
/// * `x` - A 2D array of shape (n_samples, n_features).
/// * `y` - Class membership per sample.
///
/// # Returns
///
/// A tuple containing the F-statistic and the p-value of each feature.
/// Features without within-class variance get an F-statistic of 0 and a
/// p-value of 1 (non-finite statistics are forced finite).
pub fn f_classif(x: &Array2<f64>, y: &[bool]) -> Result<(Array1<f64>, Array1<f64>)> {
    let n = x.nrows();
    let n_pos = y.iter().filter(|&&l| l).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 || n < 3 {
        return Err(ClassificationError::FeatureSelection(format!(
            "ANOVA needs both classes and at least 3 samples, got {} positive / {} negative",
            n_pos, n_neg
        )));
    }
    let df_between = 1.0;
    let df_within = (n - 2) as f64;
    let dist = FisherSnedecor::new(df_between, df_within)
        .map_err(|e| ClassificationError::FeatureSelection(e.to_string()))?;

    let mut f_scores = Array1::zeros(x.ncols());
    let mut p_values = Array1::ones(x.ncols());
    for (j, col) in x.axis_iter(Axis(1)).enumerate() {
        let (mut sum_pos, mut sum_neg) = (0.0, 0.0);
        for (&v, &label) in col.iter().zip(y.iter()) {
            if label {
                sum_pos += v;
            } else {
                sum_neg += v;
            }
        }
        let mean_pos = sum_pos / n_pos as f64;
        let mean_neg = sum_neg / n_neg as f64;
        let grand = (sum_pos + sum_neg) / n as f64;

        let ss_between = n_pos as f64 * (mean_pos - grand).powi(2)
            + n_neg as f64 * (mean_neg - grand).powi(2);
        let ss_within: f64 = col
            .iter()
            .zip(y.iter())
            .map(|(&v, &label)| {
                let m = if label { mean_pos } else { mean_neg };
                (v - m).powi(2)
            })
            .sum();

        let f = (ss_between / df_between) / (ss_within / df_within);
        if f.is_finite() {
            f_scores[j] = f;
            p_values[j] = 1.0 - dist.cdf(f);
        }
    }
    Ok((f_scores, p_values))
}

/// Select the `k` features with the highest ANOVA F-scores.
pub struct SelectKBest {
    /// The number of top features to select.
    k: usize,
}

impl SelectKBest {
    pub fn new(k: usize) -> Self {
        SelectKBest { k }
    }

    /// Fits the selector and returns the kept column indices in ascending order.
    pub fn fit(&self, x: &Array2<f64>, y: &[bool]) -> Result<Vec<usize>> {
        let (f_scores, _) = f_classif(x, y)?;
        let scores = f_scores.to_vec();
        Ok(top_k_indices(&scores, self.k.min(scores.len())))
    }
}

/// `SelectKBest` with `k` given as a percentage of the input dimensionality.
pub struct SelectPercentile {
    percentile: f64,
}

impl SelectPercentile {
    pub fn new(percentile: f64) -> Self {
        SelectPercentile { percentile }
    }
}

impl FeatureSelector for SelectPercentile {
    fn fit(&self, x: &Array2<f64>, y: &[bool], _seed: u64) -> Result<FeatureTransform> {
        let k = retained(self.percentile, x.ncols());
        let kept = SelectKBest::new(k).fit(x, y)?;
        log::trace!("ANOVA kept {} of {} features", kept.len(), x.ncols());
        Ok(FeatureTransform::Subset(kept))
    }

    fn name(&self) -> &str {
        "ANOVA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn toy() -> (Array2<f64>, Vec<bool>) {
        // Features: [trend, aligned with target, constant, noise]
        let x = Array2::from_shape_vec(
            (10, 4),
            vec![
                0.1, 1.0, 5.0, -0.3, //
                0.4, -1.0, 5.0, 0.1, //
                0.6, 1.1, 5.0, 0.2, //
                0.9, -0.9, 5.0, -0.1, //
                1.2, 1.0, 5.0, 0.3, //
                1.5, -1.0, 5.0, 0.0, //
                1.8, 0.9, 5.0, -0.2, //
                2.1, -1.1, 5.0, 0.4, //
                2.4, 1.0, 5.0, -0.1, //
                2.7, -1.0, 5.0, 0.2, //
            ],
        )
        .unwrap();
        let y = (0..10).map(|i| i % 2 == 0).collect();
        (x, y)
    }

    #[test]
    fn aligned_feature_scores_highest() {
        let (x, y) = toy();
        let (f, p) = f_classif(&x, &y).unwrap();
        assert!(f[1] > f[0] && f[1] > f[3]);
        assert_eq!(f[2], 0.0);
        assert_eq!(p[2], 1.0);
        assert!(p[1] < 1e-6);
    }

    #[test]
    fn percentile_keeps_ceil_of_share() {
        let (x, y) = toy();
        let transform = SelectPercentile::new(30.0).fit(&x, &y, 0).unwrap();
        // ceil(4 * 0.3) = 2
        let kept = transform.selected_features().unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&1));
        assert!(!kept.contains(&2));
    }
}
