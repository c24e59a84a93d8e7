//! hydra-classifiers: nested cross-validated binary classification of
//! subject-level features, with multi-scale ensemble voting.
//!
//! The crate provides seeded stratified partitioning, a nested CV engine around
//! a linear SVM (with optional nested feature selection), an ensemble
//! aggregator across scales and a resumable on-disk result store.
pub mod config;
pub mod data_handling;
pub mod ensemble;
pub mod error;
pub mod feature_selection;
pub mod io;
pub mod models;
pub mod multiscale;
pub mod nested_cv;
pub mod partition;
pub mod preprocessing;
pub mod results;
pub mod stats;
pub mod workflow;

pub use error::{ClassificationError, ErrorCategory, Result};
