//! Tab-delimited loaders for the genotype table, the sample sheet and the
//! manual verdict sheet.

use std::{
    collections::{BTreeMap, HashMap},
    io::BufRead,
    path::Path,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    matrix::{GenotypeMatrix, MatrixError, Sample},
    reconcile::ManualVerdict,
    smart_reader::open_input,
};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to open {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed table {path}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path}: genotype table has no marker column")]
    MissingMarkerColumn { path: String },
    #[error("{path}: invalid accession id '{value}'")]
    InvalidAccession { path: String, value: String },
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

fn tsv_reader(path: &Path) -> Result<csv::Reader<Box<dyn BufRead + Send>>, InputError> {
    let input = open_input(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(input))
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> InputError + '_ {
    move |source| InputError::Csv {
        path: path.display().to_string(),
        source,
    }
}

/// One row of the sample sheet. Every column except `sample` is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SampleRecord {
    sample: String,
    accession: Option<String>,
    genotype: Option<String>,
    name: Option<String>,
    lot: Option<String>,
    pedigree: Option<String>,
}

/// Accession ids arrive as integers, sometimes written as floats ("123.0").
fn parse_accession(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| {
        let f: f64 = raw.parse().ok()?;
        (f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Load the sample sheet keyed by sample key.
pub fn load_samples(path: &Path) -> Result<HashMap<String, Sample>, InputError> {
    let mut reader = tsv_reader(path)?;
    let mut samples = HashMap::new();
    for record in reader.deserialize::<SampleRecord>() {
        let record = record.map_err(csv_error(path))?;
        if record.sample.is_empty() {
            continue;
        }
        let mut sample = Sample::new(record.sample.clone());
        sample.genotype = non_empty(record.genotype);
        sample.name = non_empty(record.name);
        sample.lot = non_empty(record.lot);
        sample.pedigree = non_empty(record.pedigree);
        if let Some(raw) = non_empty(record.accession) {
            sample.accession = parse_accession(&raw);
            if sample.accession.is_none() {
                tracing::warn!(sample = %record.sample, value = %raw, "ignoring unparseable accession id");
            }
        }
        if samples.insert(record.sample.clone(), sample).is_some() {
            tracing::warn!(sample = %record.sample, "sample listed twice; keeping the last row");
        }
    }
    tracing::info!(samples = samples.len(), path = %path.display(), "loaded sample sheet");
    Ok(samples)
}

/// Load a marker x sample genotype table. The first column holds marker
/// ids, the remaining header cells are sample keys. Samples missing from
/// `metadata` are loaded without grouping metadata.
pub fn load_genotype_matrix(
    path: &Path,
    metadata: &HashMap<String, Sample>,
) -> Result<GenotypeMatrix, InputError> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers().map_err(csv_error(path))?.clone();
    if headers.is_empty() {
        return Err(InputError::MissingMarkerColumn {
            path: path.display().to_string(),
        });
    }

    let keys: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let mut marker_ids = Vec::new();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); keys.len()];
    for record in reader.records() {
        let record = record.map_err(csv_error(path))?;
        let mut fields = record.iter();
        let Some(marker) = fields.next() else { continue };
        marker_ids.push(marker.to_string());
        for (column, token) in columns.iter_mut().zip(fields) {
            column.push(token.to_string());
        }
    }

    let mut unmatched = 0usize;
    let columns: Vec<(Sample, Vec<String>)> = keys
        .into_iter()
        .zip(columns)
        .map(|(key, tokens)| {
            let sample = metadata.get(&key).cloned().unwrap_or_else(|| {
                unmatched += 1;
                Sample::new(key)
            });
            (sample, tokens)
        })
        .collect();
    if unmatched > 0 {
        tracing::warn!(unmatched, "samples without a sample sheet row are ungrouped");
    }

    let matrix = GenotypeMatrix::from_token_columns(marker_ids, columns)?;
    tracing::info!(
        markers = matrix.n_markers(),
        samples = matrix.n_samples(),
        path = %path.display(),
        "loaded genotype table",
    );
    Ok(matrix)
}

#[derive(Debug, Deserialize)]
struct VerdictRecord {
    accession: String,
    #[serde(default)]
    verdict: String,
}

/// Load manual accession verdicts (columns `accession`, `verdict`).
pub fn load_manual_verdicts(path: &Path) -> Result<BTreeMap<u64, ManualVerdict>, InputError> {
    let mut reader = tsv_reader(path)?;
    let mut verdicts = BTreeMap::new();
    for record in reader.deserialize::<VerdictRecord>() {
        let record = record.map_err(csv_error(path))?;
        let accession =
            parse_accession(&record.accession).ok_or_else(|| InputError::InvalidAccession {
                path: path.display().to_string(),
                value: record.accession.clone(),
            })?;
        verdicts.insert(accession, ManualVerdict::parse(&record.verdict));
    }
    tracing::info!(verdicts = verdicts.len(), "loaded manual verdicts");
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{Base, Call};

    #[test]
    fn accession_ids_accept_integral_floats() {
        assert_eq!(parse_accession("1042"), Some(1042));
        assert_eq!(parse_accession("1042.0"), Some(1042));
        assert_eq!(parse_accession("10.5"), None);
        assert_eq!(parse_accession("n/a"), None);
    }

    #[test]
    fn joins_sheet_metadata_onto_columns() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = dir.path().join("samples.tsv");
        std::fs::write(
            &sheet,
            "sample\taccession\tgenotype\tname\tlot\tpedigree\n\
             P1 - A01\t7\tCML1\t\tL-01\t\n\
             P1 - A02\t7.0\tCML1\tline one\t\tA/B\n",
        )
        .unwrap();
        let calls = dir.path().join("calls.tsv");
        std::fs::write(
            &calls,
            "marker\tP1 - A01\tP1 - A02\tstray\n\
             m1\tA\tr\tfailed\n\
             m2\t?\tT\tG\n",
        )
        .unwrap();

        let metadata = load_samples(&sheet).unwrap();
        assert_eq!(metadata["P1 - A01"].lot.as_deref(), Some("L-01"));
        assert_eq!(metadata["P1 - A01"].name, None);
        assert_eq!(metadata["P1 - A02"].accession, Some(7));

        let m = load_genotype_matrix(&calls, &metadata).unwrap();
        assert_eq!(m.n_markers(), 2);
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.malformed_calls(), 1);
        assert_eq!(m.sample(0).group(), "CML1");
        assert_eq!(m.sample(2).group(), crate::matrix::UNGROUPED);
        assert_eq!(m.calls()[(1, 1)], Call::Hom(Base::T));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let calls = dir.path().join("calls.tsv");
        std::fs::write(&calls, "marker\ts1\ts2\nm1\tA\n").unwrap();
        let err = load_genotype_matrix(&calls, &HashMap::new()).unwrap_err();
        assert!(matches!(err, InputError::Csv { .. }));
    }
}
