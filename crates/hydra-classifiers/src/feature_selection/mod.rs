//! Nested feature selection.
//!
//! Selectors are fitted on the training rows of a trial only and return a
//! `FeatureTransform` that is then applied, unchanged, to train and test rows.
//! Univariate ANOVA, random-forest importance and recursive elimination keep a
//! subset of the original columns; PCA projects onto principal components.
pub mod forest;
pub mod pca;
pub mod rfe;
pub mod univariate_selection;

use linfa::traits::Predict;
use linfa_reduction::Pca;
use ndarray::{Array2, Axis};

use crate::config::{FeatureSelectionConfig, FeatureSelectionMethod};
use crate::error::Result;

/// A fitted selection step.
pub enum FeatureTransform {
    /// Keep these original column indices, ascending.
    Subset(Vec<usize>),
    /// Project onto fitted principal components.
    Projection(Box<Pca<f64>>),
}

impl FeatureTransform {
    pub fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        match self {
            FeatureTransform::Subset(columns) => x.select(Axis(1), columns),
            FeatureTransform::Projection(pca) => pca.predict(x),
        }
    }

    /// Selected original columns; `None` for projections.
    pub fn selected_features(&self) -> Option<Vec<usize>> {
        match self {
            FeatureTransform::Subset(columns) => Some(columns.clone()),
            FeatureTransform::Projection(_) => None,
        }
    }
}

pub trait FeatureSelector: Send + Sync {
    /// Fit on training rows. `seed` drives any randomness of the method.
    fn fit(&self, x: &Array2<f64>, y: &[bool], seed: u64) -> Result<FeatureTransform>;

    fn name(&self) -> &str;
}

pub fn build_selector(config: &FeatureSelectionConfig) -> Box<dyn FeatureSelector> {
    match config.method {
        FeatureSelectionMethod::Anova => Box::new(univariate_selection::SelectPercentile::new(
            config.top_k_percent,
        )),
        FeatureSelectionMethod::RandomForest => {
            Box::new(forest::ForestImportance::new(config.top_k_percent))
        }
        FeatureSelectionMethod::Pca => Box::new(pca::PcaProjection::new(config.top_k_percent)),
        FeatureSelectionMethod::Rfe => Box::new(rfe::RecursiveElimination::new(config.top_k_percent)),
    }
}

/// Indices of the `k` highest scores, returned in ascending column order.
/// Equal scores keep the lower column index.
pub(crate) fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&i, &j| scores[j].total_cmp(&scores[i]).then(i.cmp(&j)));
    let mut kept: Vec<usize> = indices.into_iter().take(k).collect();
    kept.sort_unstable();
    kept
}

/// Retained dimensionality for a percentage of `n_features`, at least one.
pub(crate) fn retained(top_k_percent: f64, n_features: usize) -> usize {
    FeatureSelectionConfig::new(FeatureSelectionMethod::Anova, top_k_percent).n_retained(n_features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_prefers_high_scores_then_low_index() {
        assert_eq!(top_k_indices(&[0.1, 3.0, 3.0, 2.0], 2), vec![1, 2]);
        assert_eq!(top_k_indices(&[1.0, 1.0, 1.0], 1), vec![0]);
    }

    #[test]
    fn subset_transform_selects_columns() {
        let x = ndarray::array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let t = FeatureTransform::Subset(vec![0, 2]);
        assert_eq!(t.apply(&x), ndarray::array![[1.0, 3.0], [4.0, 6.0]]);
        assert_eq!(t.selected_features(), Some(vec![0, 2]));
    }
}
