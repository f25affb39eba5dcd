//! Marker x sample call matrix and the per-sample metadata supplied by the
//! loader.

use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::{Array2, ArrayView1, Axis};
use serde::Serialize;
use thiserror::Error;

use crate::call::{Call, parse_call};

pub type MarkerId = String;
pub type SampleKey = String;

/// Group assigned to samples with neither a genotype nor an accession name.
pub const UNGROUPED: &str = "(ungrouped)";

/// Metadata for one physical seed sample.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Sample {
    /// Unique key, conventionally "PLATE - WELL".
    pub key: SampleKey,
    /// Accession identifier (GID).
    pub accession: Option<u64>,
    /// Fine-grained genotype name.
    pub genotype: Option<String>,
    /// Coarser accession name used when the genotype is absent.
    pub name: Option<String>,
    pub lot: Option<String>,
    pub pedigree: Option<String>,
}

impl Sample {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_genotype(mut self, genotype: impl Into<String>) -> Self {
        self.genotype = Some(genotype.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_lot(mut self, lot: impl Into<String>) -> Self {
        self.lot = Some(lot.into());
        self
    }

    pub fn with_accession(mut self, accession: u64) -> Self {
        self.accession = Some(accession);
        self
    }

    pub fn with_pedigree(mut self, pedigree: impl Into<String>) -> Self {
        self.pedigree = Some(pedigree.into());
        self
    }

    /// Grouping key: genotype, else accession name, else [`UNGROUPED`].
    pub fn group(&self) -> &str {
        non_empty(self.genotype.as_deref())
            .or_else(|| non_empty(self.name.as_deref()))
            .unwrap_or(UNGROUPED)
    }

    pub fn plate_code(&self) -> &str {
        self.key.split(" - ").next().unwrap_or(&self.key)
    }

    pub fn well(&self) -> Option<&str> {
        self.key.split(" - ").nth(1)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Error, PartialEq)]
pub enum MatrixError {
    #[error("call matrix is {rows}x{cols} but {markers} markers and {samples} samples were given")]
    Shape {
        rows: usize,
        cols: usize,
        markers: usize,
        samples: usize,
    },
    #[error("duplicate sample key '{0}'")]
    DuplicateSample(String),
    #[error("duplicate marker id '{0}'")]
    DuplicateMarker(String),
    #[error("sample '{sample}' has {found} calls, expected {expected}")]
    ColumnLength {
        sample: String,
        found: usize,
        expected: usize,
    },
}

/// Immutable genotype call matrix: one row per marker, one column per sample.
#[derive(Clone, Debug)]
pub struct GenotypeMatrix {
    marker_ids: Vec<MarkerId>,
    samples: Vec<Sample>,
    calls: Array2<Call>,
    index: HashMap<SampleKey, usize>,
    malformed_calls: usize,
}

impl GenotypeMatrix {
    pub fn new(
        marker_ids: Vec<MarkerId>,
        samples: Vec<Sample>,
        calls: Array2<Call>,
    ) -> Result<Self, MatrixError> {
        let (rows, cols) = calls.dim();
        if rows != marker_ids.len() || cols != samples.len() {
            return Err(MatrixError::Shape {
                rows,
                cols,
                markers: marker_ids.len(),
                samples: samples.len(),
            });
        }

        let mut seen = HashSet::with_capacity(marker_ids.len());
        for id in &marker_ids {
            if !seen.insert(id.as_str()) {
                return Err(MatrixError::DuplicateMarker(id.clone()));
            }
        }

        let mut index = HashMap::with_capacity(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            if index.insert(sample.key.clone(), i).is_some() {
                return Err(MatrixError::DuplicateSample(sample.key.clone()));
            }
        }

        Ok(Self {
            marker_ids,
            samples,
            calls,
            index,
            malformed_calls: 0,
        })
    }

    /// Build from raw call tokens, one column of tokens per sample.
    ///
    /// Tokens outside the call alphabet are stored as failed calls and
    /// counted in [`GenotypeMatrix::malformed_calls`].
    pub fn from_token_columns<S: AsRef<str>>(
        marker_ids: Vec<MarkerId>,
        columns: Vec<(Sample, Vec<S>)>,
    ) -> Result<Self, MatrixError> {
        let n_markers = marker_ids.len();
        let mut calls = Array2::from_elem((n_markers, columns.len()), Call::Failed);
        let mut samples = Vec::with_capacity(columns.len());
        let mut malformed = 0usize;

        for (j, (sample, tokens)) in columns.into_iter().enumerate() {
            if tokens.len() != n_markers {
                return Err(MatrixError::ColumnLength {
                    sample: sample.key,
                    found: tokens.len(),
                    expected: n_markers,
                });
            }
            for (i, token) in tokens.iter().enumerate() {
                let parsed = parse_call(token.as_ref());
                if parsed.malformed {
                    malformed += 1;
                }
                calls[(i, j)] = parsed.call;
            }
            samples.push(sample);
        }

        if malformed > 0 {
            tracing::warn!(malformed, "unrecognized call symbols treated as failed");
        }

        let mut matrix = Self::new(marker_ids, samples, calls)?;
        matrix.malformed_calls = malformed;
        Ok(matrix)
    }

    pub fn n_markers(&self) -> usize {
        self.marker_ids.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn marker_ids(&self) -> &[MarkerId] {
        &self.marker_ids
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> &Sample {
        &self.samples[index]
    }

    pub fn sample_index(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn calls(&self) -> &Array2<Call> {
        &self.calls
    }

    /// All calls for one sample, in marker order.
    pub fn sample_calls(&self, index: usize) -> ArrayView1<'_, Call> {
        self.calls.index_axis(Axis(1), index)
    }

    /// Number of tokens that were outside the call alphabet at load time.
    pub fn malformed_calls(&self) -> usize {
        self.malformed_calls
    }

    /// Sample column indices per group, groups in sorted order and members
    /// in matrix order.
    pub fn group_members(&self) -> BTreeMap<&str, Vec<usize>> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, sample) in self.samples.iter().enumerate() {
            groups.entry(sample.group()).or_default().push(i);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::Base;

    #[test]
    fn group_falls_back_to_name() {
        let sample = Sample::new("F1 - A1").with_name("HYB-1");
        assert_eq!(sample.group(), "HYB-1");
        let sample = sample.with_genotype("Hembra F5");
        assert_eq!(sample.group(), "Hembra F5");
        let blank = Sample::new("F1 - A2").with_genotype("  ");
        assert_eq!(blank.group(), UNGROUPED);
    }

    #[test]
    fn splits_plate_and_well() {
        let sample = Sample::new("F6601 - P1A1");
        assert_eq!(sample.plate_code(), "F6601");
        assert_eq!(sample.well(), Some("P1A1"));
    }

    #[test]
    fn counts_malformed_tokens() {
        let matrix = GenotypeMatrix::from_token_columns(
            vec!["m1".into(), "m2".into(), "m3".into()],
            vec![
                (Sample::new("s1"), vec!["A", "N", "failed"]),
                (Sample::new("s2"), vec!["R", "G", "xx"]),
            ],
        )
        .unwrap();
        assert_eq!(matrix.malformed_calls(), 2);
        assert_eq!(matrix.sample_calls(0)[0], Call::Hom(Base::A));
        assert_eq!(matrix.sample_calls(0)[1], Call::Failed);
        assert_eq!(matrix.sample_index("s2"), Some(1));
    }

    #[test]
    fn rejects_duplicate_samples_and_bad_shapes() {
        let err = GenotypeMatrix::from_token_columns(
            vec!["m1".into()],
            vec![(Sample::new("s1"), vec!["A"]), (Sample::new("s1"), vec!["C"])],
        )
        .unwrap_err();
        assert_eq!(err, MatrixError::DuplicateSample("s1".into()));

        let err = GenotypeMatrix::from_token_columns(
            vec!["m1".into(), "m2".into()],
            vec![(Sample::new("s1"), vec!["A"])],
        )
        .unwrap_err();
        assert!(matches!(err, MatrixError::ColumnLength { found: 1, .. }));
    }
}
