use crate::config::ClassificationConfig;
use crate::data_handling::class_counts;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::svm::{SVMClassifier, SvmSettings};

/// Per-class penalties for a base `c` on training labels `y`.
///
/// With balancing each class is weighted inversely to its frequency,
/// `C·n / (2·n_class)`; otherwise both classes get `c`.
pub fn class_penalties(c: f64, y: &[bool], balanced: bool) -> (f64, f64) {
    let (n_neg, n_pos) = class_counts(y);
    if !balanced || n_neg == 0 || n_pos == 0 {
        return (c, c);
    }
    let n = y.len() as f64;
    (c * n / (2.0 * n_pos as f64), c * n / (2.0 * n_neg as f64))
}

/// Build a boxed classifier for penalty `c`, trained later on labels `y`.
pub fn build_model(
    config: &ClassificationConfig,
    c: f64,
    y: &[bool],
    calibrate: bool,
) -> Box<dyn ClassifierModel> {
    let (c_pos, c_neg) = class_penalties(c, y, config.class_weight_balanced);
    Box::new(SVMClassifier::new(SvmSettings {
        c_pos,
        c_neg,
        eps: config.svm.eps,
        kernel: config.svm.kernel.clone(),
        calibrate,
    }))
}
