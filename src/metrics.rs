//! Per-sample call tallies and the metric row that later stages fill in.

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    call::Call,
    classify::{PurityCall, Severity},
    matrix::{GenotypeMatrix, SampleKey},
    typing::GroupType,
};

/// Counts of each call category over a run of calls.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CallCounts {
    pub total: usize,
    pub het: usize,
    pub hom: usize,
    pub failed: usize,
}

impl CallCounts {
    pub fn tally<I>(calls: I) -> Self
    where
        I: IntoIterator<Item = Call>,
    {
        let mut counts = Self::default();
        for call in calls {
            counts.total += 1;
            match call {
                Call::Het(_) => counts.het += 1,
                Call::Hom(_) => counts.hom += 1,
                Call::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn valid(&self) -> usize {
        self.het + self.hom
    }

    /// het / valid, undefined when nothing was called.
    pub fn het_rate(&self) -> Option<f64> {
        match self.valid() {
            0 => None,
            valid => Some(self.het as f64 / valid as f64),
        }
    }

    pub fn call_rate(&self) -> f64 {
        ratio(self.valid(), self.total)
    }

    pub fn fail_rate(&self) -> f64 {
        ratio(self.failed, self.total)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Where a sample sits in the classification lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Unclassified,
    Typed,
    ConsensusScored,
    PurityClassified,
}

/// One row of the per-sample metric table.
#[derive(Clone, Debug, Serialize)]
pub struct SampleMetrics {
    pub sample: SampleKey,
    pub group: String,
    pub genotype: Option<String>,
    pub accession: Option<u64>,
    pub plate_code: String,
    pub well: Option<String>,
    pub lot: Option<String>,
    pub group_type: GroupType,
    pub total_markers: usize,
    pub valid_calls: usize,
    pub het_calls: usize,
    pub homo_calls: usize,
    pub failed_calls: usize,
    pub het_rate: Option<f64>,
    pub call_rate: f64,
    pub fail_rate: f64,
    pub concordance: Option<f64>,
    #[serde(flatten)]
    pub purity: Option<PurityCall>,
}

impl SampleMetrics {
    pub fn is_hybrid(&self) -> bool {
        self.group_type == GroupType::Hybrid
    }

    pub fn status(&self) -> Option<Severity> {
        self.purity.as_ref().map(|p| p.status)
    }

    pub fn stage(&self) -> Stage {
        if self.purity.is_some() {
            Stage::PurityClassified
        } else if self.concordance.is_some() {
            Stage::ConsensusScored
        } else if self.het_rate.is_some() && self.group_type != GroupType::Untyped {
            Stage::Typed
        } else {
            Stage::Unclassified
        }
    }
}

/// Tally every sample column once. Rows come back in matrix sample order.
pub fn compute_sample_metrics(matrix: &GenotypeMatrix) -> Vec<SampleMetrics> {
    (0..matrix.n_samples())
        .into_par_iter()
        .map(|j| {
            let sample = matrix.sample(j);
            let counts = CallCounts::tally(matrix.sample_calls(j).iter().copied());
            SampleMetrics {
                sample: sample.key.clone(),
                group: sample.group().to_string(),
                genotype: sample.genotype.clone(),
                accession: sample.accession,
                plate_code: sample.plate_code().to_string(),
                well: sample.well().map(str::to_string),
                lot: sample.lot.clone(),
                group_type: GroupType::Untyped,
                total_markers: counts.total,
                valid_calls: counts.valid(),
                het_calls: counts.het,
                homo_calls: counts.hom,
                failed_calls: counts.failed,
                het_rate: counts.het_rate(),
                call_rate: counts.call_rate(),
                fail_rate: counts.fail_rate(),
                concordance: None,
                purity: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Sample;
    use approx::assert_relative_eq;

    fn matrix() -> GenotypeMatrix {
        GenotypeMatrix::from_token_columns(
            vec!["m1".into(), "m2".into(), "m3".into(), "m4".into()],
            vec![
                (Sample::new("s1"), vec!["A", "R", "failed", "G"]),
                (Sample::new("s2"), vec!["failed", "failed", "failed", "failed"]),
                (Sample::new("s3"), vec!["A", "C", "N", "T"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn computes_rates() {
        let rows = compute_sample_metrics(&matrix());
        assert_eq!(rows.len(), 3);
        let s1 = &rows[0];
        assert_eq!(s1.valid_calls, 3);
        assert_eq!(s1.het_calls, 1);
        assert_eq!(s1.failed_calls, 1);
        assert_relative_eq!(s1.het_rate.unwrap(), 1.0 / 3.0);
        assert_relative_eq!(s1.call_rate, 0.75);
        assert_relative_eq!(s1.fail_rate, 0.25);
        assert_eq!(s1.stage(), Stage::Unclassified);
    }

    #[test]
    fn zero_valid_calls_leave_het_rate_undefined() {
        let rows = compute_sample_metrics(&matrix());
        let s2 = &rows[1];
        assert_eq!(s2.het_rate, None);
        assert_eq!(s2.call_rate, 0.0);
        assert_eq!(s2.fail_rate, 1.0);
    }

    #[test]
    fn malformed_calls_count_as_failed() {
        let rows = compute_sample_metrics(&matrix());
        assert_eq!(rows[2].failed_calls, 1);
        assert_eq!(rows[2].het_rate, Some(0.0));
    }
}
