//! Ordered driver: metrics, typing, consensus, concordance, classification.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    classify::{Severity, classify_all},
    concordance::score_all,
    consensus::{ConsensusGenotype, build_consensus},
    matrix::GenotypeMatrix,
    metrics::{SampleMetrics, Stage, compute_sample_metrics},
    stats,
    thresholds::ThresholdSet,
    typing::{GroupType, GroupTyping, type_groups},
};

/// Counts of samples per purity status.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct StatusCounts {
    pub pass: usize,
    pub warning: usize,
    pub fail: usize,
}

impl StatusCounts {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a SampleMetrics>,
    {
        let mut counts = Self::default();
        for row in rows {
            match row.status() {
                Some(Severity::Pass) => counts.pass += 1,
                Some(Severity::Warning) => counts.warning += 1,
                Some(Severity::Fail) => counts.fail += 1,
                None => {}
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pass + self.warning + self.fail
    }
}

/// One line of the per-group breakdown.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub group_type: GroupType,
    pub n_samples: usize,
    #[serde(flatten)]
    pub status: StatusCounts,
    pub median_het: Option<f64>,
    pub median_concordance: Option<f64>,
}

/// Groups ordered by descending size, then name.
pub fn group_breakdown(rows: &[SampleMetrics]) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<&str, Vec<&SampleMetrics>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.group.as_str()).or_default().push(row);
    }

    let mut out: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(group, members)| GroupSummary {
            group: group.to_string(),
            group_type: members[0].group_type,
            n_samples: members.len(),
            status: StatusCounts::from_rows(members.iter().copied()),
            median_het: stats::median(members.iter().map(|r| r.het_rate)),
            median_concordance: stats::median(members.iter().map(|r| r.concordance)),
        })
        .collect();
    out.sort_by(|a, b| b.n_samples.cmp(&a.n_samples).then_with(|| a.group.cmp(&b.group)));
    out
}

/// Everything one classification run produces.
#[derive(Clone, Debug)]
pub struct PurityAnalysis {
    pub thresholds: ThresholdSet,
    pub rows: Vec<SampleMetrics>,
    pub typings: Vec<GroupTyping>,
    pub consensus: BTreeMap<String, ConsensusGenotype>,
    pub groups: Vec<GroupSummary>,
    pub status_counts: StatusCounts,
}

/// Rows whose lifecycle stage is at least `stage`.
pub fn rows_reaching(rows: &[SampleMetrics], stage: Stage) -> usize {
    rows.iter().filter(|r| r.stage() >= stage).count()
}

/// Run every stage in order under one policy. The matrix is only read.
pub fn run_purity_analysis(matrix: &GenotypeMatrix, thresholds: &ThresholdSet) -> PurityAnalysis {
    tracing::info!(
        markers = matrix.n_markers(),
        samples = matrix.n_samples(),
        malformed_calls = matrix.malformed_calls(),
        "starting purity analysis",
    );

    let mut rows = compute_sample_metrics(matrix);
    tracing::info!(rows = rows.len(), "computed sample metrics");

    let typings = type_groups(&mut rows, thresholds.hybrid_classification_median_threshold);
    tracing::info!(
        groups = typings.len(),
        typed = rows_reaching(&rows, Stage::Typed),
        "typed groups",
    );

    let consensus = build_consensus(matrix);
    tracing::info!(consensus_groups = consensus.len(), "built group consensus");

    let scores = score_all(matrix, &consensus);
    for (row, score) in rows.iter_mut().zip(scores) {
        row.concordance = score;
    }
    tracing::info!(
        scored = rows_reaching(&rows, Stage::ConsensusScored),
        "scored concordance",
    );

    classify_all(&mut rows, thresholds);
    let status_counts = StatusCounts::from_rows(&rows);
    tracing::info!(
        classified = rows_reaching(&rows, Stage::PurityClassified),
        pass = status_counts.pass,
        warning = status_counts.warning,
        fail = status_counts.fail,
        "classified samples",
    );

    let groups = group_breakdown(&rows);
    PurityAnalysis {
        thresholds: *thresholds,
        rows,
        typings,
        consensus,
        groups,
        status_counts,
    }
}
