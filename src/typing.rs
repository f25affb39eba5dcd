//! Data-driven hybrid/inbred typing of sample groups.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::{metrics::SampleMetrics, stats};

/// Genetic context a group is evaluated in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Hybrid,
    Inbred,
    /// No sample in the group has a defined heterozygosity rate.
    #[default]
    Untyped,
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupType::Hybrid => "hybrid",
            GroupType::Inbred => "inbred",
            GroupType::Untyped => "untyped",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupTyping {
    pub group: String,
    pub n_samples: usize,
    pub median_het: Option<f64>,
    pub group_type: GroupType,
}

/// Decide hybrid vs inbred from a group's median heterozygosity.
pub fn group_type_for(median_het: Option<f64>, hybrid_median_threshold: f64) -> GroupType {
    match median_het {
        Some(m) if m > hybrid_median_threshold => GroupType::Hybrid,
        Some(_) => GroupType::Inbred,
        None => GroupType::Untyped,
    }
}

/// Type every group and stamp the result onto each of its rows.
///
/// Returned typings are sorted by group name.
pub fn type_groups(rows: &mut [SampleMetrics], hybrid_median_threshold: f64) -> Vec<GroupTyping> {
    let mut members: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        members.entry(row.group.clone()).or_default().push(i);
    }

    let mut typings = Vec::with_capacity(members.len());
    for (group, idx) in members {
        let median_het = stats::median(idx.iter().map(|&i| rows[i].het_rate));
        let group_type = group_type_for(median_het, hybrid_median_threshold);
        match median_het {
            Some(m) => tracing::info!(
                group = %group,
                median_het = %format!("{:.2}%", m * 100.0),
                group_type = %group_type,
                "typed group"
            ),
            None => tracing::warn!(
                group = %group,
                n_samples = idx.len(),
                "group has no valid calls; heterozygosity gate cannot run"
            ),
        }
        for &i in &idx {
            rows[i].group_type = group_type;
        }
        typings.push(GroupTyping {
            group,
            n_samples: idx.len(),
            median_het,
            group_type,
        });
    }
    typings
}
