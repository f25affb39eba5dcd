#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use seed_purity::{ThresholdSet, input::load_genotype_matrix, run_purity_analysis};

fuzz_target!(|data: &[u8]| {
    let Ok(dir) = tempfile::tempdir() else { return };
    let path = dir.path().join("calls.tsv");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    // Loader errors are expected for random input; panics are not.
    let Ok(matrix) = load_genotype_matrix(&path, &HashMap::new()) else {
        return;
    };
    if matrix.n_markers() > 256 || matrix.n_samples() > 64 {
        return;
    }
    let analysis = run_purity_analysis(&matrix, &ThresholdSet::default());
    assert_eq!(analysis.rows.len(), matrix.n_samples());
});
