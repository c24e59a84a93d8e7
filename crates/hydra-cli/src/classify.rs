//! `hydra classify`: one feature table through the nested workflow.
use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

use hydra_classifiers::config::{ClassificationConfig, CvStrategy, FeatureSelectionConfig, FeatureSelectionMethod};
use hydra_classifiers::workflow::{classify, ClassifyOptions};

use crate::util::{load_classification_config, validate_tsv_file};

/// Base configuration: the `--config` file if given, defaults otherwise, with
/// `--no-class-balance` applied on top.
pub fn base_config(matches: &ArgMatches) -> Result<ClassificationConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("Using config: {}", path.display());
            load_classification_config(path)?
        }
        None => ClassificationConfig::default(),
    };
    if matches.get_flag("no_class_balance") {
        config.class_weight_balanced = false;
    }
    Ok(config)
}

pub fn strategy(matches: &ArgMatches) -> Result<CvStrategy> {
    let name = matches
        .get_one::<String>("cv_strategy")
        .map(String::as_str)
        .unwrap_or("hold_out");
    Ok(name.parse::<CvStrategy>()?)
}

pub fn options_from_matches(matches: &ArgMatches) -> Result<ClassifyOptions> {
    let repetitions = *matches
        .get_one::<usize>("cv_repetition")
        .context("--cv-repetition is required")?;
    let mut options = ClassifyOptions::new(repetitions);
    options.strategy = strategy(matches)?;
    options.seed = matches.get_one::<u64>("seed").copied();
    options.voxel = matches.get_flag("voxel");
    options.n_threads = matches.get_one::<usize>("threads").copied();
    options.classification = base_config(matches)?;

    if let Some(method) = matches.get_one::<String>("feature_selection") {
        let method: FeatureSelectionMethod = method.parse()?;
        let top_k = matches.get_one::<f64>("top_k").copied().unwrap_or(50.0);
        options.classification.feature_selection = Some(FeatureSelectionConfig::new(method, top_k));
    }
    options.classification.validate(options.strategy)?;
    Ok(options)
}

pub fn run(matches: &ArgMatches) -> Result<()> {
    let feature_tsv = matches
        .get_one::<PathBuf>("feature_tsv")
        .context("feature_tsv is required")?;
    let output_dir = matches
        .get_one::<PathBuf>("output_dir")
        .context("output_dir is required")?;
    validate_tsv_file(feature_tsv)?;

    let options = options_from_matches(matches)?;
    if matches.get_one::<PathBuf>("config").is_none() {
        let json = serde_json::to_string_pretty(&options.classification).unwrap_or_default();
        log::info!("Effective classification config:\n{}", json);
    }

    log::info!(
        "[Hydra::Classify] {} with {} x {}",
        feature_tsv.display(),
        options.repetitions,
        options.strategy
    );
    let run = classify(feature_tsv, output_dir, &options)
        .with_context(|| format!("Classification of {} failed", feature_tsv.display()))?;
    if let Some(ba) = run.summary.balanced_accuracy {
        log::info!(
            "[Hydra::Classify] Balanced accuracy {:.4} +/- {:.4} over {} trial(s)",
            ba.mean,
            ba.std,
            run.summary.n_succeeded
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build_cli;

    fn sub_matches(args: &[&str]) -> ArgMatches {
        let matches = build_cli().try_get_matches_from(args).unwrap();
        matches.subcommand().unwrap().1.clone()
    }

    #[test]
    fn flags_override_defaults() {
        let m = sub_matches(&[
            "hydra", "classify", "f.tsv", "out", "-r", "7", "--no-class-balance",
            "--feature-selection", "anova", "--top-k", "20", "--seed", "3", "--threads", "2",
        ]);
        let options = options_from_matches(&m).unwrap();
        assert_eq!(options.repetitions, 7);
        assert_eq!(options.strategy, CvStrategy::HoldOut);
        assert_eq!(options.seed, Some(3));
        assert_eq!(options.n_threads, Some(2));
        assert!(!options.classification.class_weight_balanced);
        let fs = options.classification.feature_selection.unwrap();
        assert_eq!(fs.method, FeatureSelectionMethod::Anova);
        assert_eq!(fs.top_k_percent, 20.0);
    }

    #[test]
    fn k_fold_with_selection_fails() {
        let m = sub_matches(&[
            "hydra", "classify", "f.tsv", "out", "-r", "5", "--cv-strategy", "k_fold",
            "--feature-selection", "RFE",
        ]);
        assert!(options_from_matches(&m).is_err());
    }
}
