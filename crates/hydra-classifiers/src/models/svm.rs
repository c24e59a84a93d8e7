use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_svm::{Svm, SvmParams};
use ndarray::{Array1, Array2};

use crate::config::SvmKernel;
use crate::error::{ClassificationError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Fully resolved parameters of one SVM fit.
#[derive(Debug, Clone, PartialEq)]
pub struct SvmSettings {
    /// Penalty applied to positive-class errors.
    pub c_pos: f64,
    /// Penalty applied to negative-class errors.
    pub c_neg: f64,
    pub eps: f64,
    pub kernel: SvmKernel,
    /// Also fit a Platt-calibrated model so `predict_proba` is available.
    pub calibrate: bool,
}

pub struct SVMClassifier {
    settings: SvmSettings,
    model: Option<Svm<f64, bool>>,
    calibrated: Option<Svm<f64, Pr>>,
}

impl SVMClassifier {
    pub fn new(settings: SvmSettings) -> Self {
        SVMClassifier {
            settings,
            model: None,
            calibrated: None,
        }
    }

    pub fn settings(&self) -> &SvmSettings {
        &self.settings
    }

    fn configure<T>(&self, params: SvmParams<f64, T>) -> SvmParams<f64, T> {
        let params = params
            .eps(self.settings.eps)
            .pos_neg_weights(self.settings.c_pos, self.settings.c_neg);
        match self.settings.kernel {
            SvmKernel::Linear => params.linear_kernel(),
            SvmKernel::Gaussian { eps } => params.gaussian_kernel(eps),
            SvmKernel::Polynomial { constant, degree } => params.polynomial_kernel(constant, degree),
        }
    }

    fn not_fitted() -> ClassificationError {
        ClassificationError::Classifier("SVM used before fit".to_string())
    }
}

impl ClassifierModel for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ClassificationError::DimensionMismatch {
                context: "SVM training labels vs rows".to_string(),
                expected: x.nrows(),
                found: y.len(),
            });
        }
        let dataset = Dataset::new(x.to_owned(), Array1::from_vec(y.to_vec()));

        let params = self.configure(Svm::<f64, bool>::params());
        let model = params
            .fit(&dataset)
            .map_err(|e| ClassificationError::Classifier(e.to_string()))?;
        self.model = Some(model);

        self.calibrated = if self.settings.calibrate {
            let params = self.configure(Svm::<f64, Pr>::params());
            let model = params
                .fit(&dataset)
                .map_err(|e| ClassificationError::Classifier(e.to_string()))?;
            Some(model)
        } else {
            None
        };
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<bool>> {
        let model = self.model.as_ref().ok_or_else(Self::not_fitted)?;
        let predictions: Array1<bool> = model.predict(x);
        Ok(predictions.to_vec())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let model = self.calibrated.as_ref().ok_or_else(|| {
            ClassificationError::Classifier(
                "probabilities requested from an uncalibrated SVM".to_string(),
            )
        })?;
        let predictions: Array1<Pr> = model.predict(x);
        Ok(predictions.iter().map(|p| **p as f64).collect())
    }

    fn name(&self) -> &str {
        "svm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Array2<f64>, Vec<bool>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let positive = i % 2 == 0;
            let shift = if positive { 2.0 } else { -2.0 };
            rows.extend_from_slice(&[shift + (i as f64) * 0.01, 0.1 * (i % 3) as f64]);
            y.push(positive);
        }
        (Array2::from_shape_vec((20, 2), rows).unwrap(), y)
    }

    #[test]
    fn linear_svm_separates_shifted_classes() {
        let (x, y) = separable();
        let mut svm = SVMClassifier::new(SvmSettings {
            c_pos: 1.0,
            c_neg: 1.0,
            eps: 1e-3,
            kernel: SvmKernel::Linear,
            calibrate: true,
        });
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&x).unwrap(), y);

        let proba = svm.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), y.len());
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn uncalibrated_model_refuses_probabilities() {
        let (x, y) = separable();
        let mut svm = SVMClassifier::new(SvmSettings {
            c_pos: 1.0,
            c_neg: 1.0,
            eps: 1e-3,
            kernel: SvmKernel::Linear,
            calibrate: false,
        });
        assert!(svm.predict(&x).is_err());
        svm.fit(&x, &y).unwrap();
        assert!(svm.predict_proba(&x).is_err());
    }
}
