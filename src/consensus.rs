//! Per-group majority-vote consensus genotypes.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    call::{Ambiguity, Base, Call},
    matrix::GenotypeMatrix,
};

/// Groups smaller than this have no consensus.
pub const MIN_CONSENSUS_GROUP_SIZE: usize = 2;

/// A group's reference genotype: one entry per marker, `None` where no
/// sample in the group had a valid call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsensusGenotype {
    pub group: String,
    pub n_samples: usize,
    pub calls: Vec<Option<Call>>,
}

impl ConsensusGenotype {
    pub fn known_markers(&self) -> usize {
        self.calls.iter().filter(|c| c.is_some()).count()
    }
}

/// Consensus at one marker.
///
/// The most frequent homozygous call wins; with no homozygous calls the most
/// frequent heterozygous call is used instead. Ties go to the earliest
/// symbol in A < C < G < T, then K < M < R < S < W < Y.
pub fn consensus_call<I>(calls: I) -> Option<Call>
where
    I: IntoIterator<Item = Call>,
{
    let mut hom = [0usize; 4];
    let mut het = [0usize; 6];
    for call in calls {
        match call {
            Call::Hom(base) => hom[base.index()] += 1,
            Call::Het(code) => het[code.index()] += 1,
            Call::Failed => {}
        }
    }

    if let Some(i) = argmax(&hom) {
        return Some(Call::Hom(Base::ALL[i]));
    }
    argmax(&het).map(|i| Call::Het(Ambiguity::ALL[i]))
}

/// Index of the largest non-zero count, first index on ties.
fn argmax(counts: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, &n) in counts.iter().enumerate() {
        if n == 0 {
            continue;
        }
        match best {
            Some((_, best_n)) if best_n >= n => {}
            _ => best = Some((i, n)),
        }
    }
    best.map(|(i, _)| i)
}

/// Build the consensus of one set of sample columns.
pub fn build_group_consensus(
    matrix: &GenotypeMatrix,
    group: &str,
    members: &[usize],
) -> ConsensusGenotype {
    let calls_mat = matrix.calls();
    let calls = (0..matrix.n_markers())
        .map(|i| consensus_call(members.iter().map(|&j| calls_mat[(i, j)])))
        .collect();
    ConsensusGenotype {
        group: group.to_string(),
        n_samples: members.len(),
        calls,
    }
}

/// Consensus for every group with at least two samples, keyed by group.
pub fn build_consensus(matrix: &GenotypeMatrix) -> BTreeMap<String, ConsensusGenotype> {
    let groups: Vec<(&str, Vec<usize>)> = matrix
        .group_members()
        .into_iter()
        .filter(|(_, members)| members.len() >= MIN_CONSENSUS_GROUP_SIZE)
        .collect();

    let built: Vec<ConsensusGenotype> = groups
        .par_iter()
        .map(|(group, members)| build_group_consensus(matrix, group, members))
        .collect();

    for cons in &built {
        tracing::debug!(
            group = %cons.group,
            n_samples = cons.n_samples,
            known_markers = cons.known_markers(),
            "built consensus"
        );
    }

    built.into_iter().map(|c| (c.group.clone(), c)).collect()
}
