use hydra_classifiers::config::CvStrategy;
use hydra_classifiers::error::ClassificationError;
use hydra_classifiers::partition::{load_or_create, make_partitions, partition_path, PartitionSet};

fn labels(n_neg: usize, n_pos: usize) -> Vec<bool> {
    let mut y = vec![false; n_neg];
    y.extend(vec![true; n_pos]);
    y
}

#[test]
fn k_fold_covers_every_subject_once() {
    let y = labels(13, 9);
    let set = make_partitions(&y, CvStrategy::KFold, 4, Some(3)).unwrap();
    assert_eq!(set.len(), 4);
    let mut hits = vec![0; y.len()];
    for p in &set.partitions {
        for &i in &p.test {
            hits[i] += 1;
        }
        assert_eq!(p.train.len() + p.test.len(), y.len());
        let pos = p.test.iter().filter(|&&i| y[i]).count();
        assert!((2..=3).contains(&pos), "positives per fold {}", pos);
    }
    assert!(hits.iter().all(|&h| h == 1));
    set.validate(&y).unwrap();
}

#[test]
fn hold_out_is_disjoint_and_stratified() {
    let y = labels(30, 12);
    let set = make_partitions(&y, CvStrategy::HoldOut, 10, Some(42)).unwrap();
    for p in &set.partitions {
        assert!(p.test.iter().all(|i| p.train.binary_search(i).is_err()));
        assert_eq!(p.train.len() + p.test.len(), y.len());
        let pos = p.test.iter().filter(|&&i| y[i]).count();
        let neg = p.test.len() - pos;
        // round(0.2 * 12) = 2, round(0.2 * 30) = 6
        assert_eq!(pos, 2);
        assert_eq!(neg, 6);
    }
}

#[test]
fn same_seed_same_partitions() {
    let y = labels(20, 20);
    let a = make_partitions(&y, CvStrategy::HoldOut, 5, Some(7)).unwrap();
    let b = make_partitions(&y, CvStrategy::HoldOut, 5, Some(7)).unwrap();
    let c = make_partitions(&y, CvStrategy::HoldOut, 5, Some(8)).unwrap();
    assert_eq!(a, b);
    assert_ne!(a.partitions, c.partitions);

    let drawn = make_partitions(&y, CvStrategy::KFold, 5, None).unwrap();
    let replayed = make_partitions(&y, CvStrategy::KFold, 5, Some(drawn.seed)).unwrap();
    assert_eq!(drawn, replayed);
}

#[test]
fn infeasible_requests_are_rejected() {
    let y = labels(10, 3);
    assert!(matches!(
        make_partitions(&y, CvStrategy::KFold, 4, Some(0)),
        Err(ClassificationError::InfeasibleStratification(_))
    ));
    assert!(matches!(
        make_partitions(&labels(10, 1), CvStrategy::HoldOut, 2, Some(0)),
        Err(ClassificationError::InfeasibleStratification(_))
    ));
    assert!(make_partitions(&y, CvStrategy::KFold, 1, Some(0)).is_err());
}

#[test]
fn persisted_set_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let y = labels(15, 15);
    let created = load_or_create(dir.path(), &y, CvStrategy::HoldOut, 6, Some(11)).unwrap();
    let path = partition_path(dir.path(), CvStrategy::HoldOut, 6);
    assert!(path.ends_with("data_split_stratified_6-hold_out.json"));
    assert!(path.is_file());

    let reloaded = load_or_create(dir.path(), &y, CvStrategy::HoldOut, 6, Some(11)).unwrap();
    assert_eq!(*created, *reloaded);
    assert_eq!(PartitionSet::load(&path).unwrap(), *created);

    // Unseeded request reuses whatever seed was recorded.
    let unseeded = load_or_create(dir.path(), &y, CvStrategy::HoldOut, 6, None).unwrap();
    assert_eq!(unseeded.seed, 11);
}

#[test]
fn stale_cache_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let y = labels(15, 15);
    load_or_create(dir.path(), &y, CvStrategy::KFold, 5, Some(1)).unwrap();

    let err = load_or_create(dir.path(), &y, CvStrategy::KFold, 5, Some(2)).unwrap_err();
    assert!(matches!(err, ClassificationError::StaleCache { .. }));

    let other_labels = labels(14, 16);
    let err = load_or_create(dir.path(), &other_labels, CvStrategy::KFold, 5, Some(1)).unwrap_err();
    assert!(matches!(err, ClassificationError::StaleCache { .. }));
}
