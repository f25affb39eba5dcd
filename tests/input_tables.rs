use std::io::Write;

use assert_fs::prelude::*;
use flate2::{Compression, write::GzEncoder};
use seed_purity::{
    Severity, ThresholdSet,
    input::{InputError, load_genotype_matrix, load_manual_verdicts, load_samples},
    reconcile::ManualStatus,
    run_purity_analysis,
};

const SHEET: &str = "sample\taccession\tgenotype\tname\tlot\tpedigree
# comment rows are skipped
P1 - A01\t501\tCML-1\t\tLOT-A\tCML/CML
P1 - A02\t501\tCML-1\t\tLOT-A\tCML/CML
P1 - A03\t502\t\tLINE-2\tLOT-B\t
";

const CALLS: &str = "marker\tP1 - A01\tP1 - A02\tP1 - A03
snp1\tA\tA\tG
snp2\tC\tc\tS
snp3\tfailed\tT\tT
snp4\tG\tN\tG
";

fn gzip(text: &str) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    enc.finish().unwrap()
}

#[test]
fn loads_gzip_genotypes_and_runs_pipeline() {
    let temp = assert_fs::TempDir::new().unwrap();
    let sheet = temp.child("samples.tsv");
    sheet.write_str(SHEET).unwrap();
    let calls = temp.child("calls.tsv.gz");
    calls.write_binary(&gzip(CALLS)).unwrap();

    let metadata = load_samples(sheet.path()).unwrap();
    assert_eq!(metadata.len(), 3);
    assert_eq!(metadata["P1 - A03"].group(), "LINE-2");

    let m = load_genotype_matrix(calls.path(), &metadata).unwrap();
    assert_eq!(m.n_markers(), 4);
    assert_eq!(m.n_samples(), 3);
    assert_eq!(m.malformed_calls(), 1);

    let analysis = run_purity_analysis(&m, &ThresholdSet::default());
    let first = &analysis.rows[0];
    assert_eq!(first.group, "CML-1");
    assert_eq!(first.accession, Some(501));
    assert_eq!(first.plate_code, "P1");
    assert_eq!(first.well.as_deref(), Some("A01"));
    assert_eq!(first.lot.as_deref(), Some("LOT-A"));
    assert_eq!(first.failed_calls, 1);

    let last = &analysis.rows[2];
    assert_eq!(last.het_rate, Some(0.25));
    assert_eq!(last.concordance, None);
    assert!(last.status().is_some());
    // The unrecognized `N` is counted as a failed call.
    assert_eq!(analysis.rows[1].failed_calls, 1);
    assert_eq!(analysis.rows[1].concordance, Some(1.0));
    assert_eq!(analysis.rows[1].status(), Some(Severity::Warning));
}

#[test]
fn loads_manual_verdicts() {
    let temp = assert_fs::TempDir::new().unwrap();
    let sheet = temp.child("verdicts.tsv");
    sheet
        .write_str("accession\tverdict\n501\tAceptable\n502.0\tNo aceptable, 35%\n503\t\n")
        .unwrap();

    let verdicts = load_manual_verdicts(sheet.path()).unwrap();
    assert_eq!(verdicts.len(), 3);
    assert_eq!(verdicts[&501].status, ManualStatus::Acceptable);
    assert_eq!(verdicts[&502].status, ManualStatus::NotAcceptable);
    assert_eq!(verdicts[&502].impurity_pct, Some(35.0));
    assert_eq!(verdicts[&503].status, ManualStatus::Unknown);
}

#[test]
fn rejects_bad_accession_in_verdicts() {
    let temp = assert_fs::TempDir::new().unwrap();
    let sheet = temp.child("verdicts.tsv");
    sheet.write_str("accession\tverdict\nGID-7\tAceptable\n").unwrap();

    let err = load_manual_verdicts(sheet.path()).unwrap_err();
    assert!(matches!(err, InputError::InvalidAccession { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    let err = load_samples(&temp.path().join("absent.tsv")).unwrap_err();
    assert!(matches!(err, InputError::Io { .. }));
}
