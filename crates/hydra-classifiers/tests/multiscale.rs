mod common;

use std::path::Path;

use hydra_classifiers::config::{ClassificationConfig, CvStrategy, VotingMethod};
use hydra_classifiers::ensemble::RepetitionStatus;
use hydra_classifiers::error::ClassificationError;
use hydra_classifiers::multiscale::{run_multiscale, MultiScaleConfig};

use common::{init_logger, synthetic, write_file};

const N: usize = 30;

/// Participant table plus one component table per scale; tables list the
/// subjects in reverse order and carry one subject unknown to the study.
fn write_inputs(root: &Path, components: &[usize]) {
    let mut participants = String::from("participant_id\tsession_id\tdiagnosis\n");
    for i in 0..N {
        participants.push_str(&format!("sub-{:03}\tses-M00\t{}\n", i, if i % 2 == 1 { "AD" } else { "CN" }));
    }
    write_file(&root.join("participants.tsv"), &participants);

    for &c in components {
        let data = synthetic(N, c, 1, 2.5, c as u64);
        let mut table = String::from("participant_id\tsession_id");
        for k in 1..=c {
            table.push_str(&format!("\tcomponent_{}", k));
        }
        table.push('\n');
        for i in (0..N).rev() {
            table.push_str(&format!("sub-{:03}\tses-M00", i));
            for v in data.x.row(i) {
                table.push_str(&format!("\t{}", v));
            }
            table.push('\n');
        }
        table.push_str("sub-999\tses-M00");
        for _ in 0..c {
            table.push_str("\t0.0");
        }
        table.push('\n');
        let path = root
            .join("components")
            .join("NMF")
            .join(format!("component_{}", c))
            .join("atlas_components_signal.tsv");
        write_file(&path, &table);
    }
}

fn config(root: &Path, voting: VotingMethod) -> MultiScaleConfig {
    let mut config = MultiScaleConfig::new(root.join("components"), vec![2, 4], 3);
    config.voting = voting;
    config.n_threads = Some(2);
    config.classification = ClassificationConfig {
        c_grid: vec![0.1, 1.0],
        inner_folds: 4,
        ..Default::default()
    };
    config
}

#[test]
fn scales_share_partitions_and_vote() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path(), &[2, 4]);
    let out = dir.path().join("out");

    let result = run_multiscale(&dir.path().join("participants.tsv"), &out, &config(dir.path(), VotingMethod::Hard)).unwrap();
    assert_eq!(result.scales, vec!["component_2", "component_4"]);
    assert_eq!(result.repetitions.len(), 3);
    assert!(result
        .repetitions
        .iter()
        .all(|r| r.status == RepetitionStatus::Voted && r.participating_scales.len() == 2));
    assert!(result.summary.is_some());

    assert!(out.join("data_split_stratified_3-hold_out.json").is_file());
    assert!(out.join("intermediate/component_2.tsv").is_file());
    assert!(out.join("component_4/classification/status.json").is_file());
    let ensemble = out.join("ensemble/hard_voting");
    for file in ["ensemble_result.json", "mean_results.tsv", "predictions.tsv"] {
        assert!(ensemble.join(file).is_file(), "{} missing", file);
    }

    // The intermediate table follows the participant order with its labels.
    let intermediate = std::fs::read_to_string(out.join("intermediate/component_2.tsv")).unwrap();
    let first_row = intermediate.lines().nth(1).unwrap();
    assert!(first_row.starts_with("sub-000\tses-M00\tCN\t"), "{}", first_row);

    // Re-running with another voting method reuses the classified scales.
    let soft = run_multiscale(&dir.path().join("participants.tsv"), &out, &config(dir.path(), VotingMethod::Soft)).unwrap();
    assert_eq!(soft.repetitions.len(), 3);
    assert!(out.join("ensemble/soft_voting/predictions.tsv").is_file());
    for r in 0..3 {
        let hard_subjects: Vec<usize> = result.repetitions[r].decisions.iter().map(|d| d.subject_index).collect();
        let soft_subjects: Vec<usize> = soft.repetitions[r].decisions.iter().map(|d| d.subject_index).collect();
        assert_eq!(hard_subjects, soft_subjects);
    }
}

#[test]
fn missing_scale_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path(), &[2]);
    let out = dir.path().join("out");

    let err = run_multiscale(&dir.path().join("participants.tsv"), &out, &config(dir.path(), VotingMethod::Hard)).unwrap_err();
    assert!(matches!(err, ClassificationError::InvalidData(_)), "{}", err);
    assert!(!out.exists());
}

#[test]
fn invalid_configuration_fails_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), VotingMethod::Hard);
    cfg.components = vec![];
    let err = run_multiscale(&dir.path().join("participants.tsv"), &dir.path().join("out"), &cfg).unwrap_err();
    assert!(matches!(err, ClassificationError::InvalidConfig(_)));
}

#[test]
fn infeasible_split_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path(), &[2, 4]);
    let out = dir.path().join("out");
    let mut cfg = config(dir.path(), VotingMethod::Hard);
    // 15 subjects per class cannot fill 20 stratified folds.
    cfg.strategy = CvStrategy::KFold;
    cfg.repetitions = 20;

    let err = run_multiscale(&dir.path().join("participants.tsv"), &out, &cfg).unwrap_err();
    assert!(matches!(err, ClassificationError::InfeasibleStratification(_)), "{}", err);
    assert!(!out.exists());
}
