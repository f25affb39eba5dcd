//! Alternate-policy reclassification and comparison against independent
//! manual accession verdicts.
//!
//! The alternate policy differs from the primary one in two ways: its own
//! [`ThresholdSet`], and a lot-level concordance baseline. A production lot
//! that is internally uniform and nearly homozygous is treated as a distinct
//! sub-line, so its low concordance to the pooled group consensus is not
//! counted against it.

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    classify::{ClassificationInput, PurityCall, Severity, classify},
    matrix::SampleKey,
    metrics::SampleMetrics,
    stats,
    thresholds::{LotUniformity, ThresholdSet},
    typing::GroupType,
};

/// Both policies plus the knobs used to explain disagreements.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub primary: ThresholdSet,
    pub alternate: ThresholdSet,
    pub lot_uniformity: LotUniformity,
    /// Accessions with a median concordance below this and near-zero
    /// heterozygosity look like a sub-line rather than an impure lot.
    pub subline_concordance_max: f64,
    /// An accession is accepted when fewer than this fraction of its
    /// samples FAIL.
    pub acceptance_fraction: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            primary: ThresholdSet::default(),
            alternate: ThresholdSet::relaxed_inbred(),
            lot_uniformity: LotUniformity::default(),
            subline_concordance_max: 0.85,
            acceptance_fraction: 0.5,
        }
    }
}

impl ReconcilerConfig {
    /// Heterozygosity band between the two policies' inbred fail ceilings.
    pub fn reconciliation_zone(&self) -> (f64, f64) {
        let a = self.primary.inbred_het_fail;
        let b = self.alternate.inbred_het_fail;
        (a.min(b), a.max(b))
    }
}

// ---------------------------------------------------------------------------
// Lot heterogeneity
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LotStats {
    pub lot: String,
    pub n_samples: usize,
    pub het_median: Option<f64>,
    pub het_std: Option<f64>,
    pub het_range: Option<f64>,
    /// Low spread of heterozygosity within the lot.
    pub uniform: bool,
    /// Uniform and nearly homozygous: a distinct but pure sub-line.
    pub subline: bool,
}

pub fn compute_lot_stats(
    rows: &[SampleMetrics],
    params: &LotUniformity,
) -> BTreeMap<String, LotStats> {
    let mut lots: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        if let Some(lot) = row.lot.as_deref() {
            lots.entry(lot).or_default().push(row.het_rate);
        }
    }

    lots.into_iter()
        .map(|(lot, hets)| {
            let het_median = stats::median(hets.iter().copied());
            let het_std = stats::sample_std(hets.iter().copied());
            let het_range = stats::range(hets.iter().copied());
            let uniform = matches!(
                (het_std, het_range),
                (Some(sd), Some(r)) if sd < params.het_std_max && r < params.het_range_max
            );
            let subline = uniform && het_median.is_some_and(|m| m < params.het_median_max);
            let stats = LotStats {
                lot: lot.to_string(),
                n_samples: hets.len(),
                het_median,
                het_std,
                het_range,
                uniform,
                subline,
            };
            (lot.to_string(), stats)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Per-sample reclassification
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct Reclassification {
    pub sample: SampleKey,
    pub accession: Option<u64>,
    pub lot: Option<String>,
    pub primary: PurityCall,
    pub alternate: PurityCall,
}

impl Reclassification {
    pub fn changed(&self) -> bool {
        self.primary.status != self.alternate.status
    }
}

pub fn reclassify(
    rows: &[SampleMetrics],
    lots: &BTreeMap<String, LotStats>,
    config: &ReconcilerConfig,
) -> Vec<Reclassification> {
    rows.iter()
        .map(|row| {
            let base = ClassificationInput::from_metrics(row);
            let subline = row
                .lot
                .as_deref()
                .and_then(|lot| lots.get(lot))
                .is_some_and(|s| s.subline);
            let alternate_input = ClassificationInput {
                uniform_subline: subline,
                ..base
            };
            Reclassification {
                sample: row.sample.clone(),
                accession: row.accession,
                lot: row.lot.clone(),
                primary: classify(&base, &config.primary),
                alternate: classify(&alternate_input, &config.alternate),
            }
        })
        .collect()
}

/// Counts of samples moving from each primary status (rows) to each
/// alternate status (columns), indexed PASS, WARNING, FAIL.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TransitionMatrix(pub [[usize; 3]; 3]);

impl TransitionMatrix {
    pub fn from_reclassifications(items: &[Reclassification]) -> Self {
        let mut m = [[0usize; 3]; 3];
        for item in items {
            m[item.primary.status.index()][item.alternate.status.index()] += 1;
        }
        Self(m)
    }

    pub fn count(&self, from: Severity, to: Severity) -> usize {
        self.0[from.index()][to.index()]
    }

    pub fn changed(&self) -> usize {
        let mut n = 0;
        for (i, row) in self.0.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                if i != j {
                    n += count;
                }
            }
        }
        n
    }
}

// ---------------------------------------------------------------------------
// Accession aggregation
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccessionSummary {
    pub accession: u64,
    pub group: String,
    pub group_type: GroupType,
    pub n_samples: usize,
    pub n_pass: usize,
    pub n_warn: usize,
    pub n_fail: usize,
    pub med_het: Option<f64>,
    pub mean_het: Option<f64>,
    pub std_het: Option<f64>,
    pub med_concordance: Option<f64>,
    pub mean_concordance: Option<f64>,
    pub min_concordance: Option<f64>,
    pub mean_fail_rate: Option<f64>,
    pub pass_rate: f64,
    pub impurity_pct: f64,
}

/// Aggregate classified rows per accession id, sorted by accession.
/// Rows without an accession id are skipped.
pub fn aggregate_accessions(rows: &[SampleMetrics]) -> Vec<AccessionSummary> {
    let mut by_accession: BTreeMap<u64, Vec<&SampleMetrics>> = BTreeMap::new();
    for row in rows {
        if let Some(acc) = row.accession {
            by_accession.entry(acc).or_default().push(row);
        }
    }

    by_accession
        .into_iter()
        .map(|(accession, members)| {
            let statuses: Vec<Option<Severity>> = members.iter().map(|r| r.status()).collect();
            let count = |s: Severity| statuses.iter().filter(|&&x| x == Some(s)).count();
            let n = members.len();
            let n_pass = count(Severity::Pass);
            let pass_rate = n_pass as f64 / n as f64;
            let hets = || members.iter().map(|r| r.het_rate);
            let concs = || members.iter().map(|r| r.concordance);
            AccessionSummary {
                accession,
                group: members[0].group.clone(),
                group_type: members[0].group_type,
                n_samples: n,
                n_pass,
                n_warn: count(Severity::Warning),
                n_fail: count(Severity::Fail),
                med_het: stats::median(hets()),
                mean_het: stats::mean(hets()),
                std_het: stats::sample_std(hets()),
                med_concordance: stats::median(concs()),
                mean_concordance: stats::mean(concs()),
                min_concordance: stats::min(concs()),
                mean_fail_rate: stats::mean(members.iter().map(|r| Some(r.fail_rate))),
                pass_rate,
                impurity_pct: (1.0 - pass_rate) * 100.0,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Manual verdicts
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualStatus {
    Acceptable,
    AcceptableWithNotes,
    NotAcceptable,
    ImpureHybridLot,
    Unknown,
}

impl ManualStatus {
    pub fn accepts(self) -> bool {
        matches!(self, ManualStatus::Acceptable | ManualStatus::AcceptableWithNotes)
    }
}

/// An independent reviewer's accession-level verdict.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ManualVerdict {
    pub status: ManualStatus,
    pub impurity_pct: Option<f64>,
    /// The reviewer states the material is not the expected genotype.
    pub wrong_genotype: bool,
    pub notes: String,
}

const NOT_ACCEPTABLE: &str = "No aceptable";
const WRONG_GENOTYPE: &str = "No es el genotipo";

impl ManualVerdict {
    pub fn unknown() -> Self {
        Self {
            status: ManualStatus::Unknown,
            impurity_pct: None,
            wrong_genotype: false,
            notes: String::new(),
        }
    }

    /// Interpret free-text verdicts such as "Aceptable", "Aceptable, 10%
    /// residual heterozygosity", "No aceptable 40%" or a bare "12%".
    pub fn parse(raw: &str) -> Self {
        let v = raw.trim();
        if v.is_empty() {
            return Self::unknown();
        }
        let pct = first_percent(v);
        let wrong_genotype = v.contains(WRONG_GENOTYPE);
        let (status, impurity_pct) = if v.contains(NOT_ACCEPTABLE) || wrong_genotype {
            (ManualStatus::NotAcceptable, pct)
        } else if v.contains("Aceptable") || v.contains("aceptable") {
            match pct {
                Some(p) if p > 0.0 => (ManualStatus::AcceptableWithNotes, Some(p)),
                _ => (ManualStatus::Acceptable, Some(0.0)),
            }
        } else if pct.is_some() {
            (ManualStatus::ImpureHybridLot, pct)
        } else {
            (ManualStatus::Unknown, None)
        };
        Self {
            status,
            impurity_pct,
            wrong_genotype,
            notes: v.to_string(),
        }
    }
}

/// Unicode-aware, so a non-breaking space before '%' still matches.
static PERCENT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d+)\s*%").ok());

/// First run of digits followed (after optional whitespace) by '%'.
fn first_percent(text: &str) -> Option<f64> {
    let caps = PERCENT.as_ref()?.captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

// ---------------------------------------------------------------------------
// Disagreement analysis
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisagreementCategory {
    Agreed,
    /// Explained by the policies' different heterozygosity cut-offs.
    ThresholdDriven,
    /// Needs a lot-level concordance baseline to reconcile.
    MethodologyDriven,
    /// The manual verdict contradicts the expected genotype itself.
    Fundamental,
    /// No classified samples carry this accession id.
    NoSamples,
}

#[derive(Clone, Debug, Serialize)]
pub struct AccessionComparison {
    pub accession: u64,
    pub manual: ManualVerdict,
    pub summary: Option<AccessionSummary>,
    pub primary_fail_count: usize,
    pub alternate_fail_count: usize,
    pub alternate_impurity_pct: Option<f64>,
    pub manual_accept: bool,
    pub primary_accept: bool,
    pub alternate_accept: bool,
    pub category: DisagreementCategory,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AgreementSummary {
    pub accessions: usize,
    pub primary_agree: usize,
    pub alternate_agree: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReconciliationReport {
    pub config: ReconcilerConfig,
    pub lots: Vec<LotStats>,
    pub samples: Vec<Reclassification>,
    pub transitions: TransitionMatrix,
    pub accessions: Vec<AccessionComparison>,
    pub agreement: AgreementSummary,
}

/// Categorize why an automated accession decision differs from the manual
/// one.
pub fn categorize(
    summary: &AccessionSummary,
    manual: &ManualVerdict,
    primary_accept: bool,
    config: &ReconcilerConfig,
) -> DisagreementCategory {
    if manual.status.accepts() == primary_accept {
        return DisagreementCategory::Agreed;
    }
    let (zone_low, zone_high) = config.reconciliation_zone();
    let med_het = summary.med_het;
    let med_conc = summary.med_concordance;

    let subline_like = med_het.is_some_and(|h| h < config.lot_uniformity.het_median_max)
        && med_conc.is_some_and(|c| c < config.subline_concordance_max);
    if subline_like {
        return DisagreementCategory::MethodologyDriven;
    }
    if med_het.is_some_and(|h| h > zone_low && h < zone_high) {
        return DisagreementCategory::ThresholdDriven;
    }
    if manual.wrong_genotype {
        return DisagreementCategory::Fundamental;
    }
    if manual.impurity_pct == Some(0.0) && summary.impurity_pct > 50.0 {
        return DisagreementCategory::MethodologyDriven;
    }
    DisagreementCategory::ThresholdDriven
}

fn accepted(fail_count: usize, n: usize, fraction: f64) -> bool {
    (fail_count as f64) < fraction * n as f64
}

/// Reclassify under the alternate policy and compare both policies against
/// manual verdicts. The verdicts are only read.
///
/// `rows` must already be typed and scored; their primary status is taken
/// from classifying them again under `config.primary`.
pub fn reconcile(
    rows: &[SampleMetrics],
    verdicts: &BTreeMap<u64, ManualVerdict>,
    config: &ReconcilerConfig,
) -> ReconciliationReport {
    let lots = compute_lot_stats(rows, &config.lot_uniformity);
    for s in lots.values().filter(|s| s.subline) {
        tracing::info!(lot = %s.lot, n_samples = s.n_samples, "lot is a uniform sub-line");
    }

    let samples = reclassify(rows, &lots, config);
    let transitions = TransitionMatrix::from_reclassifications(&samples);
    tracing::info!(changed = transitions.changed(), "reclassified under alternate policy");

    let primary_rows: Vec<SampleMetrics> = rows
        .iter()
        .zip(&samples)
        .map(|(row, item)| SampleMetrics {
            purity: Some(item.primary.clone()),
            ..row.clone()
        })
        .collect();
    let summaries: BTreeMap<u64, AccessionSummary> = aggregate_accessions(&primary_rows)
        .into_iter()
        .map(|s| (s.accession, s))
        .collect();

    let mut primary_fail: BTreeMap<u64, usize> = BTreeMap::new();
    let mut alternate_fail: BTreeMap<u64, usize> = BTreeMap::new();
    let mut alternate_pass: BTreeMap<u64, usize> = BTreeMap::new();
    for item in &samples {
        let Some(acc) = item.accession else { continue };
        if item.primary.status == Severity::Fail {
            *primary_fail.entry(acc).or_default() += 1;
        }
        match item.alternate.status {
            Severity::Fail => *alternate_fail.entry(acc).or_default() += 1,
            Severity::Pass => *alternate_pass.entry(acc).or_default() += 1,
            Severity::Warning => {}
        }
    }

    let mut agreement = AgreementSummary::default();
    let mut accessions = Vec::with_capacity(verdicts.len());
    for (&accession, manual) in verdicts {
        let manual_accept = manual.status.accepts();
        let primary_fail_count = primary_fail.get(&accession).copied().unwrap_or(0);
        let alternate_fail_count = alternate_fail.get(&accession).copied().unwrap_or(0);

        let comparison = match summaries.get(&accession) {
            Some(s) => {
                let n = s.n_samples;
                let primary_accept = accepted(primary_fail_count, n, config.acceptance_fraction);
                let alternate_accept =
                    accepted(alternate_fail_count, n, config.acceptance_fraction);
                let n_alt_pass = alternate_pass.get(&accession).copied().unwrap_or(0);
                agreement.accessions += 1;
                agreement.primary_agree += usize::from(primary_accept == manual_accept);
                agreement.alternate_agree += usize::from(alternate_accept == manual_accept);
                AccessionComparison {
                    accession,
                    manual: manual.clone(),
                    category: categorize(s, manual, primary_accept, config),
                    summary: Some(s.clone()),
                    primary_fail_count,
                    alternate_fail_count,
                    alternate_impurity_pct: Some((1.0 - n_alt_pass as f64 / n as f64) * 100.0),
                    manual_accept,
                    primary_accept,
                    alternate_accept,
                }
            }
            None => {
                tracing::warn!(accession, "manual verdict has no matching samples");
                AccessionComparison {
                    accession,
                    manual: manual.clone(),
                    summary: None,
                    primary_fail_count,
                    alternate_fail_count,
                    alternate_impurity_pct: None,
                    manual_accept,
                    primary_accept: false,
                    alternate_accept: false,
                    category: DisagreementCategory::NoSamples,
                }
            }
        };
        accessions.push(comparison);
    }

    tracing::info!(
        accessions = agreement.accessions,
        primary_agree = agreement.primary_agree,
        alternate_agree = agreement.alternate_agree,
        "agreement with manual verdicts"
    );

    ReconciliationReport {
        config: *config,
        lots: lots.into_values().collect(),
        samples,
        transitions,
        accessions,
        agreement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_manual_verdicts() {
        let v = ManualVerdict::parse("Aceptable");
        assert_eq!(v.status, ManualStatus::Acceptable);
        assert_eq!(v.impurity_pct, Some(0.0));

        let v = ManualVerdict::parse("Aceptable, 10 % heterocigosis residual");
        assert_eq!(v.status, ManualStatus::AcceptableWithNotes);
        assert_eq!(v.impurity_pct, Some(10.0));

        let v = ManualVerdict::parse("No aceptable, 40% outcross");
        assert_eq!(v.status, ManualStatus::NotAcceptable);
        assert_eq!(v.impurity_pct, Some(40.0));
        assert!(!v.wrong_genotype);

        let v = ManualVerdict::parse("No es el genotipo esperado");
        assert_eq!(v.status, ManualStatus::NotAcceptable);
        assert_eq!(v.impurity_pct, None);
        assert!(v.wrong_genotype);

        assert_eq!(ManualVerdict::parse("7% self").status, ManualStatus::ImpureHybridLot);
        assert_eq!(ManualVerdict::parse("lote 2024").status, ManualStatus::Unknown);
        assert_eq!(ManualVerdict::parse("  ").status, ManualStatus::Unknown);
    }

    #[test]
    fn percent_scan_skips_plain_numbers() {
        assert_eq!(first_percent("lot 12 has 30 %"), Some(30.0));
        assert_eq!(first_percent("no pct 12"), None);
    }

    #[test]
    fn percent_after_non_breaking_space() {
        assert_eq!(first_percent("12\u{a0}%"), Some(12.0));
        let v = ManualVerdict::parse("Aceptable, 10\u{a0}% heterocigosis residual");
        assert_eq!(v.status, ManualStatus::AcceptableWithNotes);
        assert_eq!(v.impurity_pct, Some(10.0));

        let v = ManualVerdict::parse("No aceptable,\u{202f}35\u{a0}%");
        assert_eq!(v.status, ManualStatus::NotAcceptable);
        assert_eq!(v.impurity_pct, Some(35.0));
    }

    #[test]
    fn zone_spans_both_inbred_ceilings() {
        assert_eq!(ReconcilerConfig::default().reconciliation_zone(), (0.10, 0.20));
    }

    #[test]
    fn transition_counts() {
        let pass = PurityCall::default();
        let fail = PurityCall {
            status: Severity::Fail,
            conditions: Vec::new(),
        };
        let items = vec![
            Reclassification {
                sample: "a".into(),
                accession: None,
                lot: None,
                primary: fail.clone(),
                alternate: pass.clone(),
            },
            Reclassification {
                sample: "b".into(),
                accession: None,
                lot: None,
                primary: pass.clone(),
                alternate: pass,
            },
        ];
        let m = TransitionMatrix::from_reclassifications(&items);
        assert_eq!(m.count(Severity::Fail, Severity::Pass), 1);
        assert_eq!(m.count(Severity::Pass, Severity::Pass), 1);
        assert_eq!(m.changed(), 1);
        assert!(items[0].changed());
    }
}
