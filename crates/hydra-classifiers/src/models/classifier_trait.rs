use ndarray::Array2;

use crate::error::Result;

/// Contract of the binary margin classifier used by the nested engine.
///
/// Labels use the crate convention (`true` = positive class). Implementations
/// must be `Send` so trials can run on the rayon pool.
pub trait ClassifierModel: Send {
    /// Fit on rows of `x` with labels `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()>;

    /// Hard predictions (sign of the decision function).
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<bool>>;

    /// Calibrated probability of the positive class, when the model was
    /// configured to produce one.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
