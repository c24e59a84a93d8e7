use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_reduction::Pca;
use ndarray::Array2;

use super::{retained, FeatureSelector, FeatureTransform};
use crate::error::{ClassificationError, Result};

/// Projection onto the leading principal components of the training rows.
///
/// The component count is the retained share of the input dimensionality,
/// clamped to `min(n_train - 1, n_features)`.
pub struct PcaProjection {
    top_k_percent: f64,
}

impl PcaProjection {
    pub fn new(top_k_percent: f64) -> Self {
        PcaProjection { top_k_percent }
    }

    pub fn n_components(&self, n_train: usize, n_features: usize) -> usize {
        retained(self.top_k_percent, n_features)
            .min(n_train.saturating_sub(1))
            .min(n_features)
    }
}

impl FeatureSelector for PcaProjection {
    fn fit(&self, x: &Array2<f64>, _y: &[bool], _seed: u64) -> Result<FeatureTransform> {
        let k = self.n_components(x.nrows(), x.ncols());
        if k == 0 {
            return Err(ClassificationError::FeatureSelection(format!(
                "PCA needs at least 2 training rows, got {}",
                x.nrows()
            )));
        }
        let dataset = DatasetBase::from(x.to_owned());
        let pca = Pca::params(k)
            .fit(&dataset)
            .map_err(|e| ClassificationError::FeatureSelection(e.to_string()))?;
        log::trace!("PCA projects {} features onto {} components", x.ncols(), k);
        Ok(FeatureTransform::Projection(Box::new(pca)))
    }

    fn name(&self) -> &str {
        "PCA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_count_is_clamped_by_rows() {
        let pca = PcaProjection::new(50.0);
        assert_eq!(pca.n_components(100, 10), 5);
        assert_eq!(pca.n_components(4, 10), 3);
        assert_eq!(pca.n_components(1, 10), 0);
    }

    #[test]
    fn projection_has_retained_width() {
        let x = Array2::from_shape_fn((12, 6), |(i, j)| ((i * (j + 1)) % 7) as f64 + 0.1 * j as f64);
        let transform = PcaProjection::new(50.0).fit(&x, &[], 0).unwrap();
        assert!(transform.selected_features().is_none());
        let projected = transform.apply(&x);
        assert_eq!(projected.dim(), (12, 3));
    }
}
