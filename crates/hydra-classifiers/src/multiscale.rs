//! Multi-scale classification with ensemble voting.
//!
//! Each scale is a component table of an external factorization at one
//! granularity, found at `<components_dir>/NMF/component_<c>/<table_name>`.
//! All scales are classified on one shared partition set and their
//! predictions are combined per repetition.
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ClassificationConfig, CvStrategy, VotingMethod};
use crate::data_handling::{ClassNames, FeatureDataset};
use crate::ensemble::{aggregate, write_ensemble, EnsembleResult, ScaleTrials};
use crate::error::{ClassificationError, Result};
use crate::io::{read_component_table, read_participants, write_feature_table, ComponentTable, ParticipantRecord};
use crate::nested_cv::{build_pool, run_trials};
use crate::partition::{load_or_create, PartitionSet};
use crate::results::ResultStore;

pub const DEFAULT_TABLE_NAME: &str = "atlas_components_signal.tsv";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiScaleConfig {
    pub components_dir: PathBuf,
    /// Component counts, one per scale.
    pub components: Vec<usize>,
    pub table_name: String,
    pub strategy: CvStrategy,
    pub repetitions: usize,
    pub seed: u64,
    pub voting: VotingMethod,
    pub classification: ClassificationConfig,
    pub n_threads: Option<usize>,
}

impl MultiScaleConfig {
    pub fn new(components_dir: impl Into<PathBuf>, components: Vec<usize>, repetitions: usize) -> Self {
        MultiScaleConfig {
            components_dir: components_dir.into(),
            components,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            strategy: CvStrategy::HoldOut,
            repetitions,
            seed: 0,
            voting: VotingMethod::Hard,
            classification: ClassificationConfig::default(),
            n_threads: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(ClassificationError::InvalidConfig(
                "at least one component count is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for &c in &self.components {
            if c == 0 {
                return Err(ClassificationError::InvalidConfig(
                    "component counts must be positive".to_string(),
                ));
            }
            if !seen.insert(c) {
                return Err(ClassificationError::InvalidConfig(format!(
                    "component count {} is listed twice",
                    c
                )));
            }
        }
        if self.repetitions == 0 {
            return Err(ClassificationError::InvalidConfig(
                "repetition count must be at least 1".to_string(),
            ));
        }
        self.classification.validate(self.strategy)
    }

    pub fn component_table_path(&self, component: usize) -> PathBuf {
        self.components_dir
            .join("NMF")
            .join(format!("component_{}", component))
            .join(&self.table_name)
    }
}

pub fn scale_name(component: usize) -> String {
    format!("component_{}", component)
}

/// Restrict `table` to the participants, in participant order, labelled with
/// the participant diagnosis.
pub fn align_to_participants(
    table: ComponentTable,
    participants: &[ParticipantRecord],
    classes: &ClassNames,
    labels: &[bool],
    scale: &str,
) -> Result<FeatureDataset> {
    let mut rows: HashMap<&str, usize> = HashMap::with_capacity(table.participant_ids.len());
    for (i, pid) in table.participant_ids.iter().enumerate() {
        if rows.insert(pid.as_str(), i).is_some() {
            return Err(ClassificationError::InvalidData(format!(
                "{}: participant '{}' occurs more than once",
                scale, pid
            )));
        }
    }
    let mut order = Vec::with_capacity(participants.len());
    let mut missing = Vec::new();
    for p in participants {
        match rows.get(p.participant_id.as_str()) {
            Some(&i) => order.push(i),
            None => missing.push(p.participant_id.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(ClassificationError::DimensionMismatch {
            context: format!(
                "{}: participants present in the component table (missing {})",
                scale,
                missing.join(", ")
            ),
            expected: participants.len(),
            found: order.len(),
        });
    }
    let extra = table.participant_ids.len() - order.len();
    if extra > 0 {
        log::debug!("{}: ignoring {} row(s) not in the participant table", scale, extra);
    }

    FeatureDataset::new(
        participants.iter().map(|p| p.participant_id.clone()).collect(),
        participants.iter().map(|p| p.session_id.clone()).collect(),
        labels.to_vec(),
        classes.clone(),
        table.feature_names,
        table.x.select(ndarray::Axis(0), &order),
    )
}

/// Load every scale aligned to the participant table. Fails before anything
/// is written if a table is missing or inconsistent.
pub fn load_scales(
    participant_tsv: &Path,
    config: &MultiScaleConfig,
) -> Result<(ClassNames, Vec<(usize, FeatureDataset)>)> {
    let participants = read_participants(participant_tsv)?;
    let mut seen = HashSet::new();
    for p in &participants {
        if !seen.insert(p.participant_id.as_str()) {
            return Err(ClassificationError::InvalidData(format!(
                "participant '{}' occurs more than once in {}",
                p.participant_id,
                participant_tsv.display()
            )));
        }
    }
    let diagnoses: Vec<String> = participants.iter().map(|p| p.diagnosis.clone()).collect();
    let classes = ClassNames::infer(&diagnoses)?;
    let labels = diagnoses
        .iter()
        .map(|d| classes.encode(d))
        .collect::<Result<Vec<bool>>>()?;

    let mut scales = Vec::with_capacity(config.components.len());
    for &c in &config.components {
        let path = config.component_table_path(c);
        if !path.is_file() {
            return Err(ClassificationError::InvalidData(format!(
                "component table {} does not exist",
                path.display()
            )));
        }
        let table = read_component_table(&path)?;
        let dataset = align_to_participants(table, &participants, &classes, &labels, &scale_name(c))?;
        scales.push((c, dataset));
    }
    Ok((classes, scales))
}

/// Classify every scale on a shared partition set and vote.
pub fn run_multiscale(
    participant_tsv: &Path,
    output_dir: &Path,
    config: &MultiScaleConfig,
) -> Result<EnsembleResult> {
    config.validate()?;
    let (classes, scales) = load_scales(participant_tsv, config)?;
    let labels = scales[0].1.labels.clone();
    scales[0].1.log_input_data_summary();

    let pool = build_pool(config.n_threads)?;
    let partitions: Arc<PartitionSet> = load_or_create(
        output_dir,
        &labels,
        config.strategy,
        config.repetitions,
        Some(config.seed),
    )?;

    let intermediate = output_dir.join("intermediate");
    fs::create_dir_all(&intermediate)?;
    fs::create_dir_all(output_dir.join("ensemble"))?;
    for (c, dataset) in &scales {
        fs::create_dir_all(output_dir.join(scale_name(*c)))?;
        write_feature_table(&intermediate.join(format!("{}.tsv", scale_name(*c))), dataset)?;
    }

    log::info!(
        "Classifying {} scale(s) with {} x {}",
        scales.len(),
        config.repetitions,
        config.strategy
    );
    let trials: Vec<ScaleTrials> = pool.install(|| {
        scales
            .par_iter()
            .map(|(c, dataset)| {
                let partitions = Arc::clone(&partitions);
                let store = ResultStore::open(output_dir.join(scale_name(*c)).join("classification"))?;
                let run = run_trials(dataset, &partitions, &config.classification, &pool, Some(&store))?;
                run.summary.log_summary(&scale_name(*c));
                Ok(ScaleTrials::from_run(scale_name(*c), run))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let result = aggregate(&trials, config.repetitions, config.voting)?;
    let dir = output_dir
        .join("ensemble")
        .join(format!("{}_voting", config.voting));
    write_ensemble(&result, &classes, &dir)?;
    if let Some(summary) = &result.summary {
        summary.log_summary(&format!("{} voting ensemble", config.voting));
    }
    log::info!("Ensemble results written to {}", dir.display());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn participants() -> Vec<ParticipantRecord> {
        ["sub-01", "sub-02"]
            .iter()
            .zip(["0", "1"])
            .map(|(p, d)| ParticipantRecord {
                participant_id: p.to_string(),
                session_id: "ses-M00".to_string(),
                diagnosis: d.to_string(),
            })
            .collect()
    }

    #[test]
    fn alignment_reorders_and_drops_extra_rows() {
        let table = ComponentTable {
            participant_ids: vec!["sub-03".into(), "sub-02".into(), "sub-01".into()],
            feature_names: vec!["c1".into()],
            x: array![[3.0], [2.0], [1.0]],
        };
        let classes = ClassNames::infer(&["0".to_string(), "1".to_string()]).unwrap();
        let ds = align_to_participants(table, &participants(), &classes, &[false, true], "s").unwrap();
        assert_eq!(ds.participant_ids, vec!["sub-01", "sub-02"]);
        assert_eq!(ds.x, array![[1.0], [2.0]]);
    }

    #[test]
    fn alignment_rejects_missing_participant() {
        let table = ComponentTable {
            participant_ids: vec!["sub-01".into()],
            feature_names: vec!["c1".into()],
            x: array![[1.0]],
        };
        let classes = ClassNames::infer(&["0".to_string(), "1".to_string()]).unwrap();
        let err = align_to_participants(table, &participants(), &classes, &[false, true], "s");
        assert!(matches!(err, Err(ClassificationError::DimensionMismatch { .. })));
    }

    #[test]
    fn duplicate_components_are_rejected() {
        let config = MultiScaleConfig::new("/tmp", vec![2, 4, 2], 3);
        assert!(config.validate().is_err());
        let config = MultiScaleConfig::new("/tmp", vec![2, 4], 3);
        assert_eq!(
            config.component_table_path(4),
            PathBuf::from("/tmp/NMF/component_4/atlas_components_signal.tsv")
        );
    }
}
