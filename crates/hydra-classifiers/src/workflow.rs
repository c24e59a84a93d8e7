//! Single-dataset classification: read a feature table, partition it and run
//! the nested engine with a persistent result store.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ClassificationConfig, CvStrategy};
use crate::error::Result;
use crate::io::{read_feature_table, FeatureLayout};
use crate::nested_cv::{build_pool, run_trials};
use crate::partition::load_or_create;
use crate::results::{ClassificationRun, ResultStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyOptions {
    pub strategy: CvStrategy,
    pub repetitions: usize,
    /// Partition seed; drawn and recorded when absent.
    pub seed: Option<u64>,
    /// Read feature vectors from per-subject files named in a `path` column.
    pub voxel: bool,
    pub classification: ClassificationConfig,
    pub n_threads: Option<usize>,
}

impl ClassifyOptions {
    pub fn new(repetitions: usize) -> Self {
        ClassifyOptions {
            strategy: CvStrategy::HoldOut,
            repetitions,
            seed: None,
            voxel: false,
            classification: ClassificationConfig::default(),
            n_threads: None,
        }
    }
}

pub fn classify(feature_tsv: &Path, output_dir: &Path, options: &ClassifyOptions) -> Result<ClassificationRun> {
    options.classification.validate(options.strategy)?;
    let layout = if options.voxel {
        FeatureLayout::PathColumn
    } else {
        FeatureLayout::Inline
    };
    let dataset = read_feature_table(feature_tsv, layout)?;
    dataset.log_input_data_summary();

    let pool = build_pool(options.n_threads)?;
    let partitions = load_or_create(
        output_dir,
        &dataset.labels,
        options.strategy,
        options.repetitions,
        options.seed,
    )?;
    let store = ResultStore::open(output_dir.join("classification"))?;

    let run = run_trials(&dataset, &partitions, &options.classification, &pool, Some(&store))?;
    run.summary.log_summary("Classification");
    log::info!("Results written to {}", store.root().display());
    Ok(run)
}
