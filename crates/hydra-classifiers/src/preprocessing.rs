//! Feature standardization fitted on training rows only.
//!
//! The `Scaler` learns per-column mean/std from the training partition of a
//! trial and is then applied unchanged to the held-out rows.

use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug)]
pub struct Scaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-12;

    /// Fit from a matrix where rows are samples and columns are features.
    /// Constant columns get a unit std so they transform to zero.
    pub fn fit<S>(x: &ArrayBase<S, Ix2>) -> Self
    where
        S: Data<Elem = f64>,
    {
        let n = x.nrows().max(1) as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let mut var = Array1::<f64>::zeros(x.ncols());
        for row in x.axis_iter(Axis(0)) {
            for ((v, &value), &m) in var.iter_mut().zip(row.iter()).zip(mean.iter()) {
                let d = value - m;
                *v += d * d;
            }
        }
        let std = var.mapv(|v| {
            let s = (v / n).sqrt();
            if s < Self::MIN_STD {
                1.0
            } else {
                s
            }
        });
        Scaler { mean, std }
    }

    /// Transform all rows and return a new matrix.
    pub fn transform<S>(&self, x: &ArrayBase<S, Ix2>) -> Array2<f64>
    where
        S: Data<Elem = f64>,
    {
        let mut out = x.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row /= &self.std;
        }
        out
    }

    pub fn fit_transform<S>(x: &ArrayBase<S, Ix2>) -> (Self, Array2<f64>)
    where
        S: Data<Elem = f64>,
    {
        let scaler = Self::fit(x);
        let out = scaler.transform(x);
        (scaler, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn train_columns_are_standardized() {
        let x = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let (scaler, z) = Scaler::fit_transform(&x);
        assert!((scaler.mean[0] - 3.0).abs() < 1e-12);
        let col_mean: f64 = z.column(0).sum() / 3.0;
        assert!(col_mean.abs() < 1e-12);
        // Constant column maps to zero rather than NaN.
        assert!(z.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rows_use_training_statistics() {
        let train = array![[0.0], [2.0]];
        let scaler = Scaler::fit(&train);
        let test = scaler.transform(&array![[4.0]]);
        assert!((test[[0, 0]] - 3.0).abs() < 1e-12);
    }
}
