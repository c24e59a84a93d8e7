//! Nested cross-validation engine.
//!
//! For every outer partition (a trial) the engine fits preprocessing, optional
//! feature selection and a grid search over the SVM penalty on the training
//! rows only, refits the winning penalty with calibration and evaluates on the
//! held-out rows. Trials run in parallel on a caller-supplied rayon pool; a
//! failing trial is recorded as `TrialOutcome::Failed` and its siblings go on.
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::ClassificationConfig;
use crate::data_handling::{class_counts, FeatureDataset};
use crate::error::{ClassificationError, Result};
use crate::feature_selection::build_selector;
use crate::models::factory::build_model;
use crate::partition::{inner_folds, Partition, PartitionSet};
use crate::preprocessing::Scaler;
use crate::results::{
    summarize_outcomes, ClassificationRun, ResultStore, RunState, TrialOutcome, TrialResult,
};
use crate::stats::{balanced_accuracy, Metrics};

/// Build the worker pool trials run on. `None` uses rayon's default size.
pub fn build_pool(n_threads: Option<usize>) -> Result<ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = n_threads {
        if n == 0 {
            return Err(ClassificationError::InvalidConfig(
                "thread count must be at least 1".to_string(),
            ));
        }
        builder = builder.num_threads(n);
    }
    Ok(builder.build()?)
}

/// Seed of the randomness inside one trial (inner folds, forest bagging).
pub fn trial_seed(partition_seed: u64, repetition: usize) -> u64 {
    partition_seed ^ (repetition as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Run every trial of `partitions` on `dataset`.
///
/// With a `store`, finished trials are persisted as they complete and a
/// previous run of the same configuration is resumed: a complete run is
/// loaded as-is, an interrupted one only computes its missing trials.
pub fn run_trials(
    dataset: &FeatureDataset,
    partitions: &PartitionSet,
    config: &ClassificationConfig,
    pool: &ThreadPool,
    store: Option<&ResultStore>,
) -> Result<ClassificationRun> {
    config.validate(partitions.strategy)?;
    partitions.validate(&dataset.labels)?;
    let key = partitions.key();
    let n_trials = partitions.len();

    let mut outcomes: Vec<TrialOutcome> = Vec::new();
    if let Some(store) = store {
        if let Some(status) = store.read_status()? {
            store.check_compatible(&status, &key, config)?;
            match status.state {
                RunState::Complete => {
                    log::info!("Loading completed run from {}", store.root().display());
                    let outcomes = store.load_all_trials(n_trials)?;
                    return Ok(assemble(dataset, outcomes));
                }
                RunState::Failed => {
                    return Err(ClassificationError::AllTrialsFailed { n_trials });
                }
                RunState::InProgress => {
                    for r in 0..n_trials {
                        if let Some(outcome) = store.load_trial(r)? {
                            outcomes.push(outcome);
                        }
                    }
                    log::info!(
                        "Resuming run in {}: {} of {} trial(s) already done",
                        store.root().display(),
                        outcomes.len(),
                        n_trials
                    );
                }
            }
        }
        store.write_status(RunState::InProgress, &key, config)?;
    }

    let pending: Vec<usize> = (0..n_trials)
        .filter(|r| !outcomes.iter().any(|o| o.repetition() == *r))
        .collect();
    log::info!(
        "Running {} trial(s) with {} thread(s)",
        pending.len(),
        pool.current_num_threads()
    );

    let computed: Vec<TrialOutcome> = pool.install(|| {
        pending
            .par_iter()
            .map(|&r| {
                let partition = &partitions.partitions[r];
                let seed = trial_seed(partitions.seed, r);
                let outcome = match run_trial(dataset, partition, r, seed, config) {
                    Ok(result) => {
                        log::debug!(
                            "Trial {}: C={} balanced accuracy {:.4}",
                            r,
                            result.best_c,
                            result.metrics.balanced_accuracy
                        );
                        TrialOutcome::Succeeded(result)
                    }
                    Err(e) => {
                        log::warn!("Trial {} failed: {}", r, e);
                        TrialOutcome::Failed {
                            repetition: r,
                            reason: e.to_string(),
                        }
                    }
                };
                if let Some(store) = store {
                    store.save_trial(&outcome)?;
                }
                Ok(outcome)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    outcomes.extend(computed);
    outcomes.sort_by_key(TrialOutcome::repetition);

    if !outcomes.iter().any(TrialOutcome::is_success) {
        if let Some(store) = store {
            store.write_status(RunState::Failed, &key, config)?;
        }
        return Err(ClassificationError::AllTrialsFailed { n_trials });
    }

    let run = assemble(dataset, outcomes);
    if let Some(store) = store {
        store.save_summary(&run.summary)?;
        store.write_status(RunState::Complete, &key, config)?;
    }
    Ok(run)
}

fn assemble(dataset: &FeatureDataset, outcomes: Vec<TrialOutcome>) -> ClassificationRun {
    let summary = summarize_outcomes(&outcomes);
    ClassificationRun {
        participant_ids: dataset.participant_ids.clone(),
        labels: dataset.labels.clone(),
        outcomes,
        summary,
    }
}

/// Train and evaluate one outer partition.
pub fn run_trial(
    dataset: &FeatureDataset,
    partition: &Partition,
    repetition: usize,
    seed: u64,
    config: &ClassificationConfig,
) -> Result<TrialResult> {
    let (mut x_train, y_train) = dataset.select_rows(&partition.train);
    let (mut x_test, y_test) = dataset.select_rows(&partition.test);
    log::trace!(
        "Trial {}: {} train / {} test subjects",
        repetition,
        y_train.len(),
        y_test.len()
    );

    for (name, y) in [("training", &y_train), ("test", &y_test)] {
        let (n_neg, n_pos) = class_counts(y);
        if n_neg == 0 || n_pos == 0 {
            return Err(ClassificationError::DegenerateFold {
                repetition,
                reason: format!("{} set holds a single class", name),
            });
        }
    }

    if config.scale_features {
        let scaler = Scaler::fit(&x_train);
        x_train = scaler.transform(&x_train);
        x_test = scaler.transform(&x_test);
    }

    let mut selected_features = None;
    if let Some(fs) = &config.feature_selection {
        let selector = build_selector(fs);
        let transform = selector.fit(&x_train, &y_train, seed)?;
        x_train = transform.apply(&x_train);
        x_test = transform.apply(&x_test);
        selected_features = transform.selected_features();
        log::trace!(
            "Trial {}: {} kept {} dimension(s)",
            repetition,
            selector.name(),
            x_train.ncols()
        );
    }

    let (best_c, inner_scores) = grid_search(&x_train, &y_train, config, seed, repetition)?;

    let mut model = build_model(config, best_c, &y_train, true);
    model.fit(&x_train, &y_train)?;
    let predictions = model.predict(&x_test)?;
    let scores = model.predict_proba(&x_test)?;
    let metrics = Metrics::compute(&y_test, &predictions, Some(scores.as_slice()));

    Ok(TrialResult {
        repetition,
        best_c,
        inner_scores,
        selected_features,
        retained_dimensions: x_train.ncols(),
        test_indices: partition.test.clone(),
        predictions,
        scores,
        metrics,
    })
}

/// Pick the penalty with the highest mean inner balanced accuracy. The first
/// candidate in grid order wins ties.
pub fn grid_search(
    x: &Array2<f64>,
    y: &[bool],
    config: &ClassificationConfig,
    seed: u64,
    repetition: usize,
) -> Result<(f64, Vec<f64>)> {
    let (n_neg, n_pos) = class_counts(y);
    let minority = n_neg.min(n_pos);
    if minority < 2 {
        return Err(ClassificationError::DegenerateFold {
            repetition,
            reason: format!(
                "inner search needs at least 2 training subjects per class, minority has {}",
                minority
            ),
        });
    }
    let mut k = config.inner_folds;
    if minority < k {
        log::warn!(
            "Trial {}: reducing inner folds from {} to {} (minority class size)",
            repetition,
            k,
            minority
        );
        k = minority;
    }
    let folds = inner_folds(y, k, seed);

    let mut inner_scores = Vec::with_capacity(config.c_grid.len());
    for &c in &config.c_grid {
        let mut total = 0.0;
        for fold in &folds {
            let x_fit = x.select(Axis(0), &fold.train);
            let y_fit: Vec<bool> = fold.train.iter().map(|&i| y[i]).collect();
            let x_val = x.select(Axis(0), &fold.test);
            let y_val: Vec<bool> = fold.test.iter().map(|&i| y[i]).collect();

            let mut model = build_model(config, c, &y_fit, false);
            model.fit(&x_fit, &y_fit)?;
            let predicted = model.predict(&x_val)?;
            total += balanced_accuracy(&y_val, &predicted);
        }
        inner_scores.push(total / folds.len() as f64);
    }

    let mut best = 0;
    for (i, &score) in inner_scores.iter().enumerate() {
        if score > inner_scores[best] {
            best = i;
        }
    }
    log::debug!(
        "Trial {}: inner scores {:?}, picked C={}",
        repetition,
        inner_scores,
        config.c_grid[best]
    );
    Ok((config.c_grid[best], inner_scores))
}
