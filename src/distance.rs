//! Pairwise identity-by-state distances for clustering.

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::matrix::{GenotypeMatrix, SampleKey};

#[derive(Debug, Error, PartialEq)]
pub enum DistanceError {
    #[error("sample '{0}' is not in the genotype matrix")]
    UnknownSample(String),
    #[error("sample '{0}' was requested more than once")]
    DuplicateSample(String),
}

/// Symmetric sample x sample distance matrix with a zero diagonal.
#[derive(Clone, Debug, Serialize)]
pub struct DistanceMatrix {
    pub samples: Vec<SampleKey>,
    #[serde(serialize_with = "serialize_rows")]
    pub distances: Array2<f64>,
}

fn serialize_rows<S: serde::Serializer>(m: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeSeq;
    let mut seq = serializer.serialize_seq(Some(m.nrows()))?;
    for row in m.rows() {
        seq.serialize_element(&row.to_vec())?;
    }
    seq.end()
}

impl DistanceMatrix {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.distances[(i, j)]
    }

    /// Upper triangle in row order, the condensed form hierarchical
    /// clustering routines take.
    pub fn condensed(&self) -> Vec<f64> {
        let n = self.len();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.distances[(i, j)]);
            }
        }
        out
    }
}

/// Numeric dosage proxy for the selected sample columns
/// (markers x samples, NaN where the call failed).
pub fn dosage_matrix(matrix: &GenotypeMatrix, columns: &[usize]) -> Array2<f64> {
    let calls = matrix.calls();
    Array2::from_shape_fn((matrix.n_markers(), columns.len()), |(i, j)| {
        calls[(i, columns[j])].dosage().unwrap_or(f64::NAN)
    })
}

/// Mismatch proportion over markers valid in both columns; 1.0 when no
/// marker is valid in both.
pub fn pair_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let mut valid = 0usize;
    let mut differ = 0usize;
    for (&x, &y) in a.iter().zip(b.iter()) {
        if x.is_nan() || y.is_nan() {
            continue;
        }
        valid += 1;
        if x != y {
            differ += 1;
        }
    }
    if valid == 0 {
        1.0
    } else {
        differ as f64 / valid as f64
    }
}

/// IBS distance matrix over the named samples, in the order given.
pub fn ibs_distance<S: AsRef<str>>(
    matrix: &GenotypeMatrix,
    samples: &[S],
) -> Result<DistanceMatrix, DistanceError> {
    let mut seen = HashSet::with_capacity(samples.len());
    let mut columns = Vec::with_capacity(samples.len());
    for key in samples {
        let key = key.as_ref();
        let idx = matrix
            .sample_index(key)
            .ok_or_else(|| DistanceError::UnknownSample(key.to_string()))?;
        if !seen.insert(idx) {
            return Err(DistanceError::DuplicateSample(key.to_string()));
        }
        columns.push(idx);
    }

    let n = columns.len();
    tracing::info!(samples = n, markers = matrix.n_markers(), "computing IBS distances");

    let dosages = dosage_matrix(matrix, &columns);
    let upper: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let a = dosages.index_axis(Axis(1), i);
            ((i + 1)..n)
                .map(|j| pair_distance(a, dosages.index_axis(Axis(1), j)))
                .collect()
        })
        .collect();

    let mut distances = Array2::<f64>::zeros((n, n));
    for (i, row) in upper.into_iter().enumerate() {
        for (offset, d) in row.into_iter().enumerate() {
            let j = i + 1 + offset;
            distances[(i, j)] = d;
            distances[(j, i)] = d;
        }
    }

    Ok(DistanceMatrix {
        samples: columns
            .iter()
            .map(|&j| matrix.sample(j).key.clone())
            .collect(),
        distances,
    })
}

/// Samples chosen for a clustering run, with each sample's group label.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClusteringSelection {
    pub samples: Vec<SampleKey>,
    pub labels: Vec<String>,
}

/// Take the `top_n` largest groups (ties by name) and up to `per_group`
/// samples from each, in matrix order.
pub fn select_clustering_samples(
    matrix: &GenotypeMatrix,
    top_n: usize,
    per_group: usize,
) -> ClusteringSelection {
    let mut groups: Vec<(&str, Vec<usize>)> = matrix.group_members().into_iter().collect();
    groups.sort_by(|(a_name, a), (b_name, b)| b.len().cmp(&a.len()).then_with(|| a_name.cmp(b_name)));

    let mut selection = ClusteringSelection::default();
    for (group, members) in groups.into_iter().take(top_n) {
        for &j in members.iter().take(per_group) {
            selection.samples.push(matrix.sample(j).key.clone());
            selection.labels.push(group.to_string());
        }
    }
    selection
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
                (Sample::new("s1").with_genotype("G1"), vec!["A", "C", "R", "failed"]),
                (Sample::new("s2").with_genotype("G1"), vec!["A", "G", "R", "T"]),
                (Sample::new("s3").with_genotype("G2"), vec!["failed", "failed", "failed", "T"]),
                (Sample::new("s4").with_genotype("G1"), vec!["A", "G", "W", "failed"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn mismatch_over_jointly_valid_markers() {
        let m = matrix();
        let d = ibs_distance(&m, &["s1", "s2", "s3", "s4"]).unwrap();
        assert_relative_eq!(d.get(0, 1), 1.0 / 3.0);
        assert_eq!(d.get(0, 2), 1.0);
        assert_eq!(d.get(1, 2), 0.0);
        assert_relative_eq!(d.get(1, 3), 1.0 / 3.0);
        for i in 0..d.len() {
            assert_eq!(d.get(i, i), 0.0);
            for j in 0..d.len() {
                assert_eq!(d.get(i, j), d.get(j, i));
            }
        }
        assert_eq!(d.condensed().len(), 6);
    }

    #[test]
    fn rejects_unknown_and_repeated_samples() {
        let m = matrix();
        assert_eq!(
            ibs_distance(&m, &["s1", "nope"]).unwrap_err(),
            DistanceError::UnknownSample("nope".into())
        );
        assert_eq!(
            ibs_distance(&m, &["s1", "s1"]).unwrap_err(),
            DistanceError::DuplicateSample("s1".into())
        );
    }

    #[test]
    fn empty_selection_gives_empty_matrix() {
        let d = ibs_distance::<&str>(&matrix(), &[]).unwrap();
        assert!(d.is_empty());
        assert!(d.condensed().is_empty());
    }

    #[test]
    fn selects_largest_groups_first() {
        let sel = select_clustering_samples(&matrix(), 1, 2);
        assert_eq!(sel.samples, ["s1", "s2"]);
        assert_eq!(sel.labels, ["G1", "G1"]);
        let sel = select_clustering_samples(&matrix(), 6, 15);
        assert_eq!(sel.samples, ["s1", "s2", "s4", "s3"]);
    }
}
