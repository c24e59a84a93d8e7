//! Random-forest impurity importance.
//!
//! A forest is grown as bagged Gini trees, each fitted on a bootstrap sample of
//! rows and a random subspace of `ceil(sqrt(p))` columns. A feature's
//! importance is its normalized impurity decrease averaged over the trees that
//! saw it.
//!
//! Impurity is computed from integer class counts and ties resolve to the
//! first column in subspace order, then the lowest threshold, so a seed fully
//! determines the result.
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

use super::{retained, top_k_indices, FeatureSelector, FeatureTransform};
use crate::error::{ClassificationError, Result};

pub struct ForestImportance {
    top_k_percent: f64,
    pub n_trees: usize,
    pub max_depth: Option<usize>,
}

/// Node impurity weighted by node size: `n * gini`.
fn weighted_gini(n_pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    2.0 * n_pos as f64 * (n - n_pos) as f64 / n as f64
}

struct Split {
    decrease: f64,
    column: usize,
    threshold: f64,
}

/// Grows one Gini tree on the training view and accumulates impurity
/// decrease per column.
struct TreeGrower<'a> {
    x: &'a Array2<f64>,
    y: &'a [bool],
    columns: &'a [usize],
    max_depth: Option<usize>,
}

impl TreeGrower<'_> {
    fn best_split(&self, rows: &[usize], n_pos: usize) -> Option<Split> {
        let n = rows.len();
        let parent = weighted_gini(n_pos, n);
        let mut best: Option<Split> = None;
        let mut order = rows.to_vec();
        for &col in self.columns {
            order.sort_by(|&a, &b| {
                self.x[[a, col]]
                    .partial_cmp(&self.x[[b, col]])
                    .unwrap_or(Ordering::Equal)
                    .then(a.cmp(&b))
            });
            let mut left_pos = 0;
            for i in 0..n - 1 {
                if self.y[order[i]] {
                    left_pos += 1;
                }
                let (value, next) = (self.x[[order[i], col]], self.x[[order[i + 1], col]]);
                if !(value < next) {
                    continue;
                }
                let n_left = i + 1;
                let children = weighted_gini(left_pos, n_left) + weighted_gini(n_pos - left_pos, n - n_left);
                let decrease = parent - children;
                if decrease > best.as_ref().map_or(0.0, |b| b.decrease) {
                    best = Some(Split {
                        decrease,
                        column: col,
                        threshold: value + (next - value) / 2.0,
                    });
                }
            }
        }
        best
    }

    fn grow(&self, rows: Vec<usize>, depth: usize, importance: &mut [f64]) {
        let n = rows.len();
        let n_pos = rows.iter().filter(|&&r| self.y[r]).count();
        if n < 2 || n_pos == 0 || n_pos == n || self.max_depth.is_some_and(|d| depth >= d) {
            return;
        }
        let Some(split) = self.best_split(&rows, n_pos) else {
            return;
        };
        importance[split.column] += split.decrease;
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x[[r, split.column]] <= split.threshold);
        self.grow(left, depth + 1, importance);
        self.grow(right, depth + 1, importance);
    }
}

impl ForestImportance {
    pub fn new(top_k_percent: f64) -> Self {
        ForestImportance {
            top_k_percent,
            n_trees: 100,
            max_depth: None,
        }
    }

    /// Mean importance per column of `x`.
    pub fn importances(&self, x: &Array2<f64>, y: &[bool], seed: u64) -> Result<Vec<f64>> {
        let (n, p) = x.dim();
        if n == 0 || p == 0 {
            return Err(ClassificationError::FeatureSelection(
                "random forest needs a non-empty training matrix".to_string(),
            ));
        }
        if y.len() != n {
            return Err(ClassificationError::DimensionMismatch {
                context: "random forest labels".to_string(),
                expected: n,
                found: y.len(),
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let subspace = ((p as f64).sqrt().ceil() as usize).clamp(1, p);

        let mut total = vec![0.0; p];
        let mut seen = vec![0usize; p];
        let mut tree_importance = vec![0.0; p];
        for _ in 0..self.n_trees {
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut columns = index::sample(&mut rng, p, subspace).into_vec();
            columns.sort_unstable();

            tree_importance.iter_mut().for_each(|v| *v = 0.0);
            let grower = TreeGrower {
                x,
                y,
                columns: &columns,
                max_depth: self.max_depth,
            };
            grower.grow(rows, 0, &mut tree_importance);

            // A single-class bootstrap sample grows no split and adds zeros.
            let sum: f64 = columns.iter().map(|&c| tree_importance[c]).sum();
            for &col in &columns {
                seen[col] += 1;
                if sum > 0.0 {
                    total[col] += tree_importance[col] / sum;
                }
            }
        }

        Ok(total
            .iter()
            .zip(seen.iter())
            .map(|(&t, &s)| if s == 0 { 0.0 } else { t / s as f64 })
            .collect())
    }
}

impl FeatureSelector for ForestImportance {
    fn fit(&self, x: &Array2<f64>, y: &[bool], seed: u64) -> Result<FeatureTransform> {
        let importances = self.importances(x, y, seed)?;
        let k = retained(self.top_k_percent, x.ncols());
        Ok(FeatureTransform::Subset(top_k_indices(&importances, k)))
    }

    fn name(&self) -> &str {
        "RF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informative_column_ranks_first() {
        let n = 30;
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let positive = i % 2 == 0;
            let signal = if positive { 1.0 } else { -1.0 };
            // Noise columns take the same value for each (positive, negative) pair.
            let pair = i / 2;
            rows.extend_from_slice(&[((pair * 7) % 5) as f64, signal, (pair % 4) as f64]);
            y.push(positive);
        }
        let x = Array2::from_shape_vec((n, 3), rows).unwrap();
        let forest = ForestImportance::new(33.0);
        let transform = forest.fit(&x, &y, 11).unwrap();
        assert_eq!(transform.selected_features(), Some(vec![1]));

        let again = forest.importances(&x, &y, 11).unwrap();
        assert_eq!(again, forest.importances(&x, &y, 11).unwrap());
        assert!(again[1] > 0.99, "{:?}", again);
    }

    #[test]
    fn tied_columns_give_repeatable_importances() {
        // Two identical noisy columns plus a weak signal: every split is
        // contested, yet repeated fits must agree exactly.
        let n = 40;
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let positive = i % 3 == 0;
            let noise = ((i * 13) % 7) as f64;
            rows.extend_from_slice(&[noise, noise, if positive { 0.6 } else { 0.4 } + (i % 5) as f64 * 0.1]);
            y.push(positive);
        }
        let x = Array2::from_shape_vec((n, 3), rows).unwrap();
        let forest = ForestImportance::new(34.0);
        let first = forest.importances(&x, &y, 3).unwrap();
        for _ in 0..5 {
            assert_eq!(forest.importances(&x, &y, 3).unwrap(), first);
        }
        let selected = forest.fit(&x, &y, 3).unwrap().selected_features();
        assert_eq!(selected, forest.fit(&x, &y, 3).unwrap().selected_features());
    }

    #[test]
    fn single_class_sample_scores_zero() {
        let x = Array2::from_shape_vec((4, 2), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();
        let forest = ForestImportance::new(50.0);
        assert_eq!(forest.importances(&x, &[true; 4], 0).unwrap(), vec![0.0, 0.0]);
    }
}
