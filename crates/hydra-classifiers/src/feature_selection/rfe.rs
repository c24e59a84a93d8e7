use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, Axis};

use super::{retained, FeatureSelector, FeatureTransform};
use crate::error::{ClassificationError, Result};

/// Recursive feature elimination with an L2-penalised logistic estimator.
///
/// Each round fits on the surviving columns and drops the ones with the
/// smallest absolute coefficient. A round removes a tenth of the survivors
/// (at least one) without overshooting the target count.
pub struct RecursiveElimination {
    top_k_percent: f64,
    pub alpha: f64,
    pub max_iterations: u64,
}

impl RecursiveElimination {
    pub fn new(top_k_percent: f64) -> Self {
        RecursiveElimination {
            top_k_percent,
            alpha: 1.0,
            max_iterations: 200,
        }
    }

    fn coefficients(&self, x: &Array2<f64>, y: &[bool]) -> Result<Array1<f64>> {
        let dataset = Dataset::new(x.to_owned(), Array1::from_vec(y.to_vec()));
        let model = LogisticRegression::default()
            .alpha(self.alpha)
            .max_iterations(self.max_iterations)
            .fit(&dataset)
            .map_err(|e| ClassificationError::FeatureSelection(e.to_string()))?;
        Ok(model.params().to_owned())
    }
}

impl FeatureSelector for RecursiveElimination {
    fn fit(&self, x: &Array2<f64>, y: &[bool], _seed: u64) -> Result<FeatureTransform> {
        let target = retained(self.top_k_percent, x.ncols());
        let mut remaining: Vec<usize> = (0..x.ncols()).collect();
        let mut round = 0;

        while remaining.len() > target {
            let coef = self.coefficients(&x.select(Axis(1), &remaining), y)?;
            let step = (remaining.len() / 10).max(1).min(remaining.len() - target);

            let mut order: Vec<usize> = (0..remaining.len()).collect();
            order.sort_by(|&a, &b| coef[a].abs().total_cmp(&coef[b].abs()).then(a.cmp(&b)));
            let mut dropped: Vec<usize> = order.into_iter().take(step).collect();
            dropped.sort_unstable();

            round += 1;
            log::trace!(
                "RFE round {}: dropping {} of {} features",
                round,
                dropped.len(),
                remaining.len()
            );
            remaining = remaining
                .iter()
                .enumerate()
                .filter(|(pos, _)| dropped.binary_search(pos).is_err())
                .map(|(_, &col)| col)
                .collect();
        }

        Ok(FeatureTransform::Subset(remaining))
    }

    fn name(&self) -> &str {
        "RFE"
    }
}
