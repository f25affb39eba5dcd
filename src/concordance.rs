//! Ambiguity-aware comparison of a sample against its group consensus.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::{
    call::Call,
    consensus::ConsensusGenotype,
    matrix::GenotypeMatrix,
};

/// Whether a sample call agrees with the consensus call.
///
/// A heterozygote that carries the consensus base, or a homozygote whose
/// base is one half of a heterozygous consensus, counts as agreeing.
pub fn calls_concordant(sample: Call, consensus: Call) -> bool {
    match (sample, consensus) {
        (Call::Failed, _) | (_, Call::Failed) => false,
        (a, b) if a == b => true,
        (Call::Het(code), Call::Hom(base)) | (Call::Hom(base), Call::Het(code)) => {
            code.contains(base)
        }
        _ => false,
    }
}

/// Concordant / comparable marker counts for one sample.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConcordanceTally {
    pub concordant: usize,
    pub compared: usize,
}

impl ConcordanceTally {
    /// Undefined when no marker could be compared.
    pub fn rate(&self) -> Option<f64> {
        match self.compared {
            0 => None,
            n => Some(self.concordant as f64 / n as f64),
        }
    }
}

pub fn tally<I>(pairs: I) -> ConcordanceTally
where
    I: IntoIterator<Item = (Call, Option<Call>)>,
{
    let mut tally = ConcordanceTally::default();
    for (call, expected) in pairs {
        let Some(expected) = expected else { continue };
        if !call.is_valid() || !expected.is_valid() {
            continue;
        }
        tally.compared += 1;
        if calls_concordant(call, expected) {
            tally.concordant += 1;
        }
    }
    tally
}

/// Score one sample column against a consensus.
pub fn score_sample(
    matrix: &GenotypeMatrix,
    sample: usize,
    consensus: &ConsensusGenotype,
) -> ConcordanceTally {
    tally(
        matrix
            .sample_calls(sample)
            .iter()
            .copied()
            .zip(consensus.calls.iter().copied()),
    )
}

/// Concordance of every sample against its own group's consensus, in
/// matrix sample order. Samples in groups without a consensus get `None`.
pub fn score_all(
    matrix: &GenotypeMatrix,
    consensus: &BTreeMap<String, ConsensusGenotype>,
) -> Vec<Option<f64>> {
    (0..matrix.n_samples())
        .into_par_iter()
        .map(|j| {
            consensus
                .get(matrix.sample(j).group())
                .and_then(|cons| score_sample(matrix, j, cons).rate())
        })
        .collect()
}
