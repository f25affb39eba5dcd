//! Structured run report for downstream tool consumption.
//!
//! Holds everything a purity run produced: the policy used, the matrix
//! dimensions, summaries and the per-sample rows.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    distance::DistanceMatrix,
    metrics::SampleMetrics,
    pipeline::{GroupSummary, PurityAnalysis, StatusCounts},
    reconcile::{AccessionSummary, ReconciliationReport, aggregate_accessions},
    thresholds::ThresholdSet,
    typing::GroupTyping,
};

/// Complete report of a purity run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tool version
    pub version: String,
    /// Timestamp of run (RFC 3339)
    pub timestamp: String,

    pub thresholds: ThresholdSet,
    pub dimensions: Dimensions,

    pub status_counts: StatusCounts,
    pub typings: Vec<GroupTyping>,
    pub groups: Vec<GroupSummary>,
    pub accessions: Vec<AccessionSummary>,
    pub samples: Vec<SampleMetrics>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconciliationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distances: Option<DistanceMatrix>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Dimensions {
    pub markers: usize,
    pub samples: usize,
    pub groups: usize,
    pub malformed_calls: usize,
}

impl RunReport {
    pub fn new(analysis: &PurityAnalysis, dimensions: Dimensions) -> Self {
        let now = time::OffsetDateTime::now_utc();
        let timestamp = now
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        RunReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            thresholds: analysis.thresholds,
            dimensions,
            status_counts: analysis.status_counts,
            typings: analysis.typings.clone(),
            groups: analysis.groups.clone(),
            accessions: aggregate_accessions(&analysis.rows),
            samples: analysis.rows.clone(),
            reconciliation: None,
            distances: None,
        }
    }

    pub fn with_reconciliation(mut self, reconciliation: ReconciliationReport) -> Self {
        self.reconciliation = Some(reconciliation);
        self
    }

    pub fn with_distances(mut self, distances: DistanceMatrix) -> Self {
        self.distances = Some(distances);
        self
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        tracing::info!("Wrote run report to {}", path.display());
        Ok(())
    }
}
