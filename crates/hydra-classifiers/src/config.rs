use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ClassificationError, Result};

/// Outer cross-validation strategy.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CvStrategy {
    HoldOut,
    KFold,
}

impl CvStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CvStrategy::HoldOut => "hold_out",
            CvStrategy::KFold => "k_fold",
        }
    }
}

impl fmt::Display for CvStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CvStrategy {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "hold_out" | "holdout" => Ok(CvStrategy::HoldOut),
            "k_fold" | "kfold" => Ok(CvStrategy::KFold),
            _ => Err(ClassificationError::UnsupportedStrategy(s.to_string())),
        }
    }
}

/// Nested feature selection methods.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSelectionMethod {
    /// Univariate ANOVA F-test ranking.
    #[serde(rename = "ANOVA")]
    Anova,
    /// Random-forest impurity importance.
    #[serde(rename = "RF")]
    RandomForest,
    /// Principal-component projection.
    #[serde(rename = "PCA")]
    Pca,
    /// Recursive feature elimination.
    #[serde(rename = "RFE")]
    Rfe,
}

impl FeatureSelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSelectionMethod::Anova => "ANOVA",
            FeatureSelectionMethod::RandomForest => "RF",
            FeatureSelectionMethod::Pca => "PCA",
            FeatureSelectionMethod::Rfe => "RFE",
        }
    }
}

impl fmt::Display for FeatureSelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureSelectionMethod {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ANOVA" => Ok(FeatureSelectionMethod::Anova),
            "RF" => Ok(FeatureSelectionMethod::RandomForest),
            "PCA" => Ok(FeatureSelectionMethod::Pca),
            "RFE" => Ok(FeatureSelectionMethod::Rfe),
            _ => Err(ClassificationError::UnsupportedFeatureSelection(s.to_string())),
        }
    }
}

/// Ensemble voting policies across scales.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VotingMethod {
    Hard,
    /// Averages calibrated scores. Only meaningful when every scale's classifier
    /// is calibrated; this is not checked.
    Soft,
    /// Hard vote restricted to scales performing above chance.
    Consensus,
}

impl VotingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMethod::Hard => "hard",
            VotingMethod::Soft => "soft",
            VotingMethod::Consensus => "consensus",
        }
    }
}

impl fmt::Display for VotingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingMethod {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_lowercase();
        let name = lowered.strip_suffix("_voting").unwrap_or(&lowered);
        match name {
            "hard" => Ok(VotingMethod::Hard),
            "soft" => Ok(VotingMethod::Soft),
            "consensus" => Ok(VotingMethod::Consensus),
            _ => Err(ClassificationError::UnsupportedVotingMethod(s.to_string())),
        }
    }
}

/// Kernel of the margin classifier.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SvmKernel {
    #[default]
    Linear,
    Gaussian { eps: f64 },
    Polynomial { constant: f64, degree: f64 },
}

impl FromStr for SvmKernel {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(SvmKernel::Linear),
            "gauss" | "gaussian" => Ok(SvmKernel::Gaussian { eps: 0.1 }),
            "poly" | "polynomial" => Ok(SvmKernel::Polynomial {
                constant: 1.0,
                degree: 3.0,
            }),
            _ => Err(ClassificationError::UnsupportedKernel(s.to_string())),
        }
    }
}

/// Solver settings for the SVM that do not take part in the grid search.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SvmConfig {
    pub eps: f64,
    pub kernel: SvmKernel,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            eps: 1e-3,
            kernel: SvmKernel::Linear,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FeatureSelectionConfig {
    pub method: FeatureSelectionMethod,
    /// Percentage (0, 100] of the input dimensionality to retain.
    pub top_k_percent: f64,
}

impl FeatureSelectionConfig {
    pub fn new(method: FeatureSelectionMethod, top_k_percent: f64) -> Self {
        Self {
            method,
            top_k_percent,
        }
    }

    /// Number of dimensions kept out of `n_features`, at least one.
    pub fn n_retained(&self, n_features: usize) -> usize {
        let n = (n_features as f64 * self.top_k_percent / 100.0).ceil() as usize;
        n.clamp(1, n_features.max(1))
    }
}

/// Central configuration of the nested classification workflow.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Candidate values of the SVM penalty `C`, searched in this order.
    pub c_grid: Vec<f64>,
    pub inner_folds: usize,
    pub class_weight_balanced: bool,
    pub scale_features: bool,
    pub svm: SvmConfig,
    pub feature_selection: Option<FeatureSelectionConfig>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            c_grid: vec![0.01, 0.1, 1.0, 10.0, 100.0],
            inner_folds: 10,
            class_weight_balanced: true,
            scale_features: true,
            svm: SvmConfig::default(),
            feature_selection: None,
        }
    }
}

impl ClassificationConfig {
    /// Check value ranges and the strategy/selection combination. Called before
    /// anything is computed or written.
    pub fn validate(&self, strategy: CvStrategy) -> Result<()> {
        if self.c_grid.is_empty() {
            return Err(ClassificationError::InvalidConfig(
                "c_grid must contain at least one value".to_string(),
            ));
        }
        if let Some(c) = self.c_grid.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
            return Err(ClassificationError::InvalidConfig(format!(
                "c_grid values must be positive and finite, got {}",
                c
            )));
        }
        if self.inner_folds < 2 {
            return Err(ClassificationError::InvalidConfig(format!(
                "inner_folds must be at least 2, got {}",
                self.inner_folds
            )));
        }
        if !(self.svm.eps > 0.0) {
            return Err(ClassificationError::InvalidConfig(
                "svm.eps must be positive".to_string(),
            ));
        }
        if let Some(fs) = &self.feature_selection {
            if strategy == CvStrategy::KFold {
                return Err(ClassificationError::FeatureSelectionRequiresHoldOut);
            }
            if !(fs.top_k_percent > 0.0 && fs.top_k_percent <= 100.0) {
                return Err(ClassificationError::InvalidConfig(format!(
                    "top_k_percent must be in (0, 100], got {}",
                    fs.top_k_percent
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_known_names() {
        assert_eq!("hold_out".parse::<CvStrategy>().unwrap(), CvStrategy::HoldOut);
        assert_eq!("K_FOLD".parse::<CvStrategy>().unwrap(), CvStrategy::KFold);
        assert!("leave_one_out".parse::<CvStrategy>().is_err());
    }

    #[test]
    fn voting_accepts_suffix() {
        assert_eq!("soft_voting".parse::<VotingMethod>().unwrap(), VotingMethod::Soft);
        assert_eq!("consensus".parse::<VotingMethod>().unwrap(), VotingMethod::Consensus);
        assert!(matches!(
            "majority".parse::<VotingMethod>(),
            Err(ClassificationError::UnsupportedVotingMethod(_))
        ));
    }

    #[test]
    fn kfold_with_selection_is_rejected() {
        let config = ClassificationConfig {
            feature_selection: Some(FeatureSelectionConfig::new(FeatureSelectionMethod::Rfe, 50.0)),
            ..Default::default()
        };
        assert!(config.validate(CvStrategy::HoldOut).is_ok());
        assert!(matches!(
            config.validate(CvStrategy::KFold),
            Err(ClassificationError::FeatureSelectionRequiresHoldOut)
        ));
    }

    #[test]
    fn retained_count_rounds_up() {
        let fs = FeatureSelectionConfig::new(FeatureSelectionMethod::Anova, 50.0);
        assert_eq!(fs.n_retained(10), 5);
        assert_eq!(fs.n_retained(7), 4);
        let fs = FeatureSelectionConfig::new(FeatureSelectionMethod::Anova, 1.0);
        assert_eq!(fs.n_retained(10), 1);
    }
}
