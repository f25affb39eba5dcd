#![doc = include_str!("../README.md")]

pub mod call;
pub mod classify;
pub mod cli;
pub mod concordance;
pub mod consensus;
pub mod distance;
pub mod input;
pub mod matrix;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod smart_reader;
pub mod stats;
pub mod thresholds;
pub mod typing;

pub use call::{Ambiguity, Base, Call};
pub use classify::{Condition, PurityCall, Severity, classify};
pub use distance::{DistanceMatrix, ibs_distance};
pub use matrix::{GenotypeMatrix, Sample};
pub use metrics::SampleMetrics;
pub use pipeline::{PurityAnalysis, run_purity_analysis};
pub use reconcile::{ManualVerdict, ReconcilerConfig, ReconciliationReport, reconcile};
pub use thresholds::{LotUniformity, ThresholdSet};
pub use typing::GroupType;
