//! `hydra multiscale`: classify every scale on a shared split and vote.
use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

use hydra_classifiers::config::VotingMethod;
use hydra_classifiers::multiscale::{run_multiscale, MultiScaleConfig};

use crate::classify::{base_config, strategy};
use crate::util::validate_tsv_file;

pub fn config_from_matches(matches: &ArgMatches) -> Result<MultiScaleConfig> {
    let components_dir = matches
        .get_one::<PathBuf>("components_dir")
        .context("components_dir is required")?;
    let components: Vec<usize> = matches
        .get_many::<usize>("components")
        .context("--components is required")?
        .copied()
        .collect();
    let repetitions = *matches
        .get_one::<usize>("cv_repetition")
        .context("--cv-repetition is required")?;

    let mut config = MultiScaleConfig::new(components_dir, components, repetitions);
    config.strategy = strategy(matches)?;
    config.classification = base_config(matches)?;
    config.n_threads = matches.get_one::<usize>("threads").copied();
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.seed = *seed;
    }
    if let Some(voting) = matches.get_one::<String>("voting") {
        config.voting = voting.parse::<VotingMethod>()?;
    }
    if let Some(name) = matches.get_one::<String>("table_name") {
        config.table_name = name.clone();
    }
    config.validate()?;
    Ok(config)
}

pub fn run(matches: &ArgMatches) -> Result<()> {
    let participant_tsv = matches
        .get_one::<PathBuf>("participant_tsv")
        .context("participant_tsv is required")?;
    let output_dir = matches
        .get_one::<PathBuf>("output_dir")
        .context("output_dir is required")?;
    validate_tsv_file(participant_tsv)?;

    let config = config_from_matches(matches)?;
    if matches.get_one::<PathBuf>("config").is_none() {
        let json = serde_json::to_string_pretty(&config.classification).unwrap_or_default();
        log::info!("Effective classification config:\n{}", json);
    }

    log::info!(
        "[Hydra::MultiScale] {} scale(s) {:?}, {} voting",
        config.components.len(),
        config.components,
        config.voting
    );
    let result = run_multiscale(participant_tsv, output_dir, &config)
        .context("Multi-scale classification failed")?;
    match &result.summary {
        Some(summary) => {
            if let Some(ba) = summary.balanced_accuracy {
                log::info!(
                    "[Hydra::MultiScale] Ensemble balanced accuracy {:.4} +/- {:.4}",
                    ba.mean,
                    ba.std
                );
            }
        }
        None => log::warn!("[Hydra::MultiScale] No repetition produced an ensemble decision"),
    }
    Ok(())
}
