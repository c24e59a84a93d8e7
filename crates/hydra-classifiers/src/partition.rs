//! Stratified, seeded train/test partitioning for the outer cross-validation loop.
//!
//! A `PartitionSet` is generated once per (label distribution, strategy,
//! repetition count, seed) and persisted as versioned JSON so that every scale
//! of a multi-scale run, and every re-run, evaluates on the same subjects.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::CvStrategy;
use crate::data_handling::class_counts;
use crate::error::{ClassificationError, Result};
use crate::results::write_json_atomic;

pub const PARTITION_SCHEMA_VERSION: u32 = 1;

/// Fraction of each class held out per repeated hold-out split.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Identity of a partition set, recorded next to results computed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKey {
    pub strategy: CvStrategy,
    pub repetitions: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSet {
    pub schema_version: u32,
    pub strategy: CvStrategy,
    pub repetitions: usize,
    pub seed: u64,
    pub test_fraction: f64,
    pub n_subjects: usize,
    /// (negative, positive) counts of the labels the set was drawn from.
    pub class_counts: (usize, usize),
    pub partitions: Vec<Partition>,
}

/// Build a stratified partition set with the default hold-out fraction.
pub fn make_partitions(
    labels: &[bool],
    strategy: CvStrategy,
    repetitions: usize,
    seed: Option<u64>,
) -> Result<PartitionSet> {
    make_partitions_with_fraction(labels, strategy, repetitions, seed, DEFAULT_TEST_FRACTION)
}

pub fn make_partitions_with_fraction(
    labels: &[bool],
    strategy: CvStrategy,
    repetitions: usize,
    seed: Option<u64>,
    test_fraction: f64,
) -> Result<PartitionSet> {
    if repetitions == 0 {
        return Err(ClassificationError::InvalidConfig(
            "repetition count must be at least 1".to_string(),
        ));
    }
    let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);
    let groups = class_members(labels);

    let partitions = match strategy {
        CvStrategy::HoldOut => {
            if !(test_fraction > 0.0 && test_fraction < 1.0) {
                return Err(ClassificationError::InvalidConfig(format!(
                    "test fraction must be in (0, 1), got {}",
                    test_fraction
                )));
            }
            for (class, members) in groups.iter().enumerate() {
                if members.len() < 2 {
                    return Err(ClassificationError::InfeasibleStratification(format!(
                        "class {} has {} subject(s); hold-out needs at least 2 per class",
                        class,
                        members.len()
                    )));
                }
            }
            (0..repetitions)
                .map(|_| stratified_shuffle_split(&groups, labels.len(), test_fraction, &mut rng))
                .collect()
        }
        CvStrategy::KFold => {
            if repetitions < 2 {
                return Err(ClassificationError::InvalidConfig(
                    "k-fold needs at least 2 folds".to_string(),
                ));
            }
            let minority = groups.iter().map(Vec::len).min().unwrap_or(0);
            if repetitions > minority {
                return Err(ClassificationError::InfeasibleStratification(format!(
                    "{} folds requested but the minority class has only {} subject(s)",
                    repetitions, minority
                )));
            }
            let folds = stratified_folds(&groups, repetitions, &mut rng);
            folds_to_partitions(&folds, labels.len())
        }
    };

    let set = PartitionSet {
        schema_version: PARTITION_SCHEMA_VERSION,
        strategy,
        repetitions,
        seed,
        test_fraction: if strategy == CvStrategy::HoldOut {
            test_fraction
        } else {
            1.0 / repetitions as f64
        },
        n_subjects: labels.len(),
        class_counts: class_counts(labels),
        partitions,
    };
    log::debug!(
        "Generated {} {} partition(s) over {} subjects with seed {}",
        set.partitions.len(),
        strategy,
        set.n_subjects,
        seed
    );
    Ok(set)
}

/// Indices of negative (0) and positive (1) subjects, in input order.
fn class_members(labels: &[bool]) -> [Vec<usize>; 2] {
    let mut groups = [Vec::new(), Vec::new()];
    for (i, &label) in labels.iter().enumerate() {
        groups[label as usize].push(i);
    }
    groups
}

fn stratified_shuffle_split(
    groups: &[Vec<usize>; 2],
    n: usize,
    test_fraction: f64,
    rng: &mut StdRng,
) -> Partition {
    let mut test = Vec::new();
    for members in groups.iter() {
        let mut shuffled = members.clone();
        shuffled.shuffle(rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .clamp(1, members.len() - 1);
        test.extend_from_slice(&shuffled[..n_test]);
    }
    test.sort_unstable();
    let train = complement(&test, n);
    Partition { train, test }
}

/// Deal each shuffled class round-robin into `k` folds.
pub(crate) fn stratified_folds(groups: &[Vec<usize>; 2], k: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let mut folds = vec![Vec::new(); k];
    let mut offset = 0;
    for members in groups.iter() {
        let mut shuffled = members.clone();
        shuffled.shuffle(rng);
        for (j, idx) in shuffled.into_iter().enumerate() {
            folds[(offset + j) % k].push(idx);
        }
        // Continue where the previous class stopped so fold sizes stay even.
        offset = (offset + members.len()) % k;
    }
    for fold in folds.iter_mut() {
        fold.sort_unstable();
    }
    folds
}

fn folds_to_partitions(folds: &[Vec<usize>], n: usize) -> Vec<Partition> {
    folds
        .iter()
        .map(|test| Partition {
            train: complement(test, n),
            test: test.clone(),
        })
        .collect()
}

/// Sorted indices in `0..n` not in the sorted slice `taken`.
fn complement(taken: &[usize], n: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(n - taken.len());
    let mut it = taken.iter().peekable();
    for i in 0..n {
        if it.peek() == Some(&&i) {
            it.next();
        } else {
            out.push(i);
        }
    }
    out
}

/// Stratified k-fold over a subset of labels, returning positions into that
/// subset. Used for the inner hyperparameter search.
pub fn inner_folds(labels: &[bool], k: usize, seed: u64) -> Vec<Partition> {
    let mut rng = StdRng::seed_from_u64(seed);
    let groups = class_members(labels);
    let folds = stratified_folds(&groups, k, &mut rng);
    folds_to_partitions(&folds, labels.len())
}

impl PartitionSet {
    pub fn key(&self) -> PartitionKey {
        PartitionKey {
            strategy: self.strategy,
            repetitions: self.repetitions,
            seed: self.seed,
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Check that this set is structurally sound and was drawn from `labels`.
    pub fn validate(&self, labels: &[bool]) -> Result<()> {
        if self.schema_version != PARTITION_SCHEMA_VERSION {
            return Err(ClassificationError::InvalidData(format!(
                "unsupported partition schema version {} (expected {})",
                self.schema_version, PARTITION_SCHEMA_VERSION
            )));
        }
        if self.n_subjects != labels.len() {
            return Err(ClassificationError::DimensionMismatch {
                context: "partition set vs dataset subjects".to_string(),
                expected: labels.len(),
                found: self.n_subjects,
            });
        }
        if self.class_counts != class_counts(labels) {
            return Err(ClassificationError::InvalidData(format!(
                "partition set was drawn from class counts {:?} but the dataset has {:?}",
                self.class_counts,
                class_counts(labels)
            )));
        }
        if self.partitions.len() != self.repetitions {
            return Err(ClassificationError::InvalidData(format!(
                "partition set declares {} repetitions but holds {}",
                self.repetitions,
                self.partitions.len()
            )));
        }
        let n = labels.len();
        let mut test_hits = vec![0usize; n];
        for (r, p) in self.partitions.iter().enumerate() {
            let mut in_train = vec![false; n];
            for &i in &p.train {
                if i >= n {
                    return Err(ClassificationError::InvalidData(format!(
                        "repetition {} references subject {} out of {}",
                        r, i, n
                    )));
                }
                in_train[i] = true;
            }
            for &i in &p.test {
                if i >= n {
                    return Err(ClassificationError::InvalidData(format!(
                        "repetition {} references subject {} out of {}",
                        r, i, n
                    )));
                }
                if in_train[i] {
                    return Err(ClassificationError::InvalidData(format!(
                        "repetition {} has subject {} in both train and test",
                        r, i
                    )));
                }
                test_hits[i] += 1;
            }
        }
        if self.strategy == CvStrategy::KFold && test_hits.iter().any(|&h| h != 1) {
            return Err(ClassificationError::InvalidData(
                "k-fold test sets must cover every subject exactly once".to_string(),
            ));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// File name of the persisted set for a (strategy, repetitions) configuration.
pub fn partition_path(dir: &Path, strategy: CvStrategy, repetitions: usize) -> PathBuf {
    dir.join(format!(
        "data_split_stratified_{}-{}.json",
        repetitions, strategy
    ))
}

/// Load the persisted partition set for this configuration, or generate and
/// persist it. A cached set that disagrees with the request is an error.
pub fn load_or_create(
    dir: &Path,
    labels: &[bool],
    strategy: CvStrategy,
    repetitions: usize,
    seed: Option<u64>,
) -> Result<Arc<PartitionSet>> {
    let path = partition_path(dir, strategy, repetitions);
    if path.is_file() {
        let cached = PartitionSet::load(&path)?;
        let stale = |reason: String| ClassificationError::StaleCache {
            path: path.clone(),
            reason,
        };
        if cached.strategy != strategy || cached.repetitions != repetitions {
            return Err(stale(format!(
                "cached split is {} x{}, requested {} x{}",
                cached.strategy, cached.repetitions, strategy, repetitions
            )));
        }
        if let Some(seed) = seed {
            if cached.seed != seed {
                return Err(stale(format!(
                    "cached split used seed {}, requested seed {}",
                    cached.seed, seed
                )));
            }
        }
        cached.validate(labels).map_err(|e| stale(e.to_string()))?;
        log::info!("Reusing cached data split {}", path.display());
        return Ok(Arc::new(cached));
    }

    let set = make_partitions(labels, strategy, repetitions, seed)?;
    set.validate(labels)?;
    std::fs::create_dir_all(dir)?;
    set.save(&path)?;
    log::info!("Data split written to {}", path.display());
    Ok(Arc::new(set))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complement_skips_taken() {
        assert_eq!(complement(&[1, 3], 5), vec![0, 2, 4]);
        assert_eq!(complement(&[], 2), vec![0, 1]);
    }

    #[test]
    fn folds_are_balanced_in_size() {
        let labels: Vec<bool> = (0..23).map(|i| i % 3 == 0).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let folds = stratified_folds(&class_members(&labels), 5, &mut rng);
        let sizes: Vec<usize> = folds.iter().map(Vec::len).collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 1, "fold sizes {:?}", sizes);
    }

    #[test]
    fn inner_folds_cover_subset() {
        let labels = vec![true, false, true, false, true, false, true, false];
        let folds = inner_folds(&labels, 4, 1);
        let mut seen: Vec<usize> = folds.iter().flat_map(|p| p.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}
