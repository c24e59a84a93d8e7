use std::path::PathBuf;

use thiserror::Error;

/// Coarse grouping of failures, used to decide whether an error may be
/// recovered locally (trial failures only) or must stop the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    DataIntegrity,
    Trial,
    TotalFailure,
    Io,
}

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Unsupported cross-validation strategy '{0}'. Valid options are: hold_out, k_fold")]
    UnsupportedStrategy(String),
    #[error("Unsupported voting method '{0}'. Valid options are: hard, soft, consensus")]
    UnsupportedVotingMethod(String),
    #[error("Unsupported feature selection method '{0}'. Valid options are: ANOVA, RF, PCA, RFE")]
    UnsupportedFeatureSelection(String),
    #[error("Unsupported SVM kernel '{0}'. Valid options are: linear, gaussian, polynomial")]
    UnsupportedKernel(String),
    #[error("Nested feature selection is only supported with repeated hold-out cross-validation")]
    FeatureSelectionRequiresHoldOut,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Cached results in {path} do not match the requested run: {reason}")]
    StaleCache { path: PathBuf, reason: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Stratification is infeasible: {0}")]
    InfeasibleStratification(String),
    #[error("{context}: expected {expected} rows but found {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },
    #[error("Scales are not aligned: {0}")]
    MisalignedScales(String),

    #[error("Degenerate fold in repetition {repetition}: {reason}")]
    DegenerateFold { repetition: usize, reason: String },
    #[error("Classifier failed: {0}")]
    Classifier(String),
    #[error("Feature selection failed: {0}")]
    FeatureSelection(String),

    #[error("All {n_trials} trials failed")]
    AllTrialsFailed { n_trials: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ClassificationError {
    pub fn category(&self) -> ErrorCategory {
        use ClassificationError::*;
        match self {
            UnsupportedStrategy(_)
            | UnsupportedVotingMethod(_)
            | UnsupportedFeatureSelection(_)
            | UnsupportedKernel(_)
            | FeatureSelectionRequiresHoldOut
            | InvalidConfig(_)
            | StaleCache { .. } => ErrorCategory::Configuration,
            InvalidData(_)
            | InfeasibleStratification(_)
            | DimensionMismatch { .. }
            | MisalignedScales(_) => ErrorCategory::DataIntegrity,
            DegenerateFold { .. } | Classifier(_) | FeatureSelection(_) => ErrorCategory::Trial,
            AllTrialsFailed { .. } => ErrorCategory::TotalFailure,
            Io(_) | Json(_) | Csv(_) | ThreadPool(_) => ErrorCategory::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClassificationError>;
