#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use hydra_classifiers::data_handling::{ClassNames, FeatureDataset};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `n` subjects, alternating classes, `p` features of which the first
/// `informative` are shifted by `shift` for the positive class.
pub fn synthetic(n: usize, p: usize, informative: usize, shift: f64, seed: u64) -> FeatureDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let labels: Vec<bool> = (0..n).map(|i| i % 2 == 1).collect();
    let x = Array2::from_shape_fn((n, p), |(i, j)| {
        let noise: f64 = rng.gen_range(-1.0..1.0);
        if j < informative && labels[i] {
            noise + shift
        } else {
            noise
        }
    });
    FeatureDataset::new(
        (0..n).map(|i| format!("sub-{:03}", i)).collect(),
        vec!["ses-M00".to_string(); n],
        labels,
        ClassNames {
            negative: "0".to_string(),
            positive: "1".to_string(),
        },
        (0..p).map(|j| format!("roi_{}", j)).collect(),
        x,
    )
    .unwrap()
}

pub fn write_tsv(path: &Path, dataset: &FeatureDataset) {
    hydra_classifiers::io::write_feature_table(path, dataset).unwrap();
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}
