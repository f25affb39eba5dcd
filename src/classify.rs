//! Three-state purity classification.
//!
//! Each gate inspects one aspect of a sample and yields zero or more
//! [`Condition`]s. The sample's status is the most severe condition raised.

use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeStruct};

use crate::{metrics::SampleMetrics, thresholds::ThresholdSet, typing::GroupType};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Pass,
    Warning,
    Fail,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Pass, Severity::Warning, Severity::Fail];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Pass => "PASS",
            Severity::Warning => "WARNING",
            Severity::Fail => "FAIL",
        })
    }
}

/// A triggered purity condition. Rates are carried for the reason text.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Condition {
    HighFailRate { fail_rate: f64 },
    ExcessiveFailRate { fail_rate: f64 },
    /// The sample has no valid calls, so heterozygosity is undefined.
    NoValidCalls,
    /// The sample's group could not be typed hybrid or inbred.
    UntypedGroup,
    LowHetForHybrid { het_rate: f64, expected_min: f64 },
    ReducedHetForHybrid { het_rate: f64 },
    HighHetForInbred { het_rate: f64 },
    ElevatedHetForInbred { het_rate: f64 },
    LowConcordance { concordance: f64 },
    ReducedConcordance { concordance: f64 },
    /// No group consensus or no comparable markers.
    ConcordanceUnavailable,
    /// Low concordance ignored because the sample's lot is a uniform sub-line.
    UniformSubLine { concordance: f64 },
}

impl Condition {
    pub fn severity(&self) -> Severity {
        match self {
            Condition::ExcessiveFailRate { .. }
            | Condition::NoValidCalls
            | Condition::LowHetForHybrid { .. }
            | Condition::HighHetForInbred { .. }
            | Condition::LowConcordance { .. } => Severity::Fail,
            Condition::HighFailRate { .. }
            | Condition::UntypedGroup
            | Condition::ReducedHetForHybrid { .. }
            | Condition::ElevatedHetForInbred { .. }
            | Condition::ReducedConcordance { .. } => Severity::Warning,
            Condition::ConcordanceUnavailable | Condition::UniformSubLine { .. } => Severity::Pass,
        }
    }
}

struct Pct(f64);

impl fmt::Display for Pct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0 * 100.0)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Condition::HighFailRate { fail_rate } => write!(f, "high fail rate ({})", Pct(fail_rate)),
            Condition::ExcessiveFailRate { fail_rate } => {
                write!(f, "excessive fail rate ({})", Pct(fail_rate))
            }
            Condition::NoValidCalls => f.write_str("genotyping failure (no valid calls)"),
            Condition::UntypedGroup => {
                f.write_str("untyped group (heterozygosity context unknown)")
            }
            Condition::LowHetForHybrid {
                het_rate,
                expected_min,
            } => write!(
                f,
                "low heterozygosity for hybrid ({}; expected >{})",
                Pct(het_rate),
                Pct(expected_min)
            ),
            Condition::ReducedHetForHybrid { het_rate } => {
                write!(f, "reduced heterozygosity for hybrid ({})", Pct(het_rate))
            }
            Condition::HighHetForInbred { het_rate } => {
                write!(f, "high heterozygosity for inbred ({})", Pct(het_rate))
            }
            Condition::ElevatedHetForInbred { het_rate } => {
                write!(f, "elevated heterozygosity for inbred ({})", Pct(het_rate))
            }
            Condition::LowConcordance { concordance } => {
                write!(f, "low concordance ({})", Pct(concordance))
            }
            Condition::ReducedConcordance { concordance } => {
                write!(f, "reduced concordance ({})", Pct(concordance))
            }
            Condition::ConcordanceUnavailable => f.write_str("insufficient data for concordance"),
            Condition::UniformSubLine { concordance } => write!(
                f,
                "uniform sub-line lot (group concordance {} not penalized)",
                Pct(concordance)
            ),
        }
    }
}

/// Final classification of one sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PurityCall {
    pub status: Severity,
    pub conditions: Vec<Condition>,
}

impl PurityCall {
    pub fn from_conditions(conditions: Vec<Condition>) -> Self {
        let status = conditions
            .iter()
            .map(Condition::severity)
            .max()
            .unwrap_or(Severity::Pass);
        Self { status, conditions }
    }

    /// Every triggered condition joined by "; ", or "OK".
    pub fn reason(&self) -> String {
        if self.conditions.is_empty() {
            return String::from("OK");
        }
        self.conditions
            .iter()
            .map(Condition::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Serialize for PurityCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PurityCall", 2)?;
        s.serialize_field("purity_status", &self.status)?;
        s.serialize_field("purity_reason", &self.reason())?;
        s.end()
    }
}

/// Everything the classifier looks at for one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassificationInput {
    pub het_rate: Option<f64>,
    pub fail_rate: f64,
    pub concordance: Option<f64>,
    pub group_type: GroupType,
    /// The sample's lot is a uniform sub-line; low concordance is not held
    /// against it.
    pub uniform_subline: bool,
}

impl ClassificationInput {
    pub fn from_metrics(row: &SampleMetrics) -> Self {
        Self {
            het_rate: row.het_rate,
            fail_rate: row.fail_rate,
            concordance: row.concordance,
            group_type: row.group_type,
            uniform_subline: false,
        }
    }
}

pub fn quality_gate(input: &ClassificationInput, t: &ThresholdSet) -> Option<Condition> {
    let fail_rate = input.fail_rate;
    match t.fail_rate_fail {
        Some(ceiling) if fail_rate > ceiling => Some(Condition::ExcessiveFailRate { fail_rate }),
        _ if fail_rate > t.fail_rate_warn => Some(Condition::HighFailRate { fail_rate }),
        _ => None,
    }
}

pub fn heterozygosity_gate(input: &ClassificationInput, t: &ThresholdSet) -> Vec<Condition> {
    let mut out = Vec::new();
    if input.group_type == GroupType::Untyped {
        out.push(Condition::UntypedGroup);
    }
    let Some(het_rate) = input.het_rate else {
        out.push(Condition::NoValidCalls);
        return out;
    };

    match input.group_type {
        GroupType::Hybrid => {
            if het_rate < t.hybrid_het_fail {
                out.push(Condition::LowHetForHybrid {
                    het_rate,
                    expected_min: t.hybrid_het_warn,
                });
            } else if het_rate < t.hybrid_het_warn {
                out.push(Condition::ReducedHetForHybrid { het_rate });
            }
        }
        GroupType::Inbred => {
            if het_rate > t.inbred_het_fail {
                out.push(Condition::HighHetForInbred { het_rate });
            } else if het_rate > t.inbred_het_warn {
                out.push(Condition::ElevatedHetForInbred { het_rate });
            }
        }
        GroupType::Untyped => {}
    }
    out
}

pub fn concordance_gate(input: &ClassificationInput, t: &ThresholdSet) -> Option<Condition> {
    let Some(concordance) = input.concordance else {
        return Some(Condition::ConcordanceUnavailable);
    };
    if concordance >= t.concordance_warn {
        return None;
    }
    if input.uniform_subline {
        return Some(Condition::UniformSubLine { concordance });
    }
    if concordance < t.concordance_fail {
        Some(Condition::LowConcordance { concordance })
    } else {
        Some(Condition::ReducedConcordance { concordance })
    }
}

/// Run all gates in precedence order.
pub fn classify(input: &ClassificationInput, t: &ThresholdSet) -> PurityCall {
    let mut conditions = Vec::new();
    conditions.extend(quality_gate(input, t));
    conditions.extend(heterozygosity_gate(input, t));
    conditions.extend(concordance_gate(input, t));
    PurityCall::from_conditions(conditions)
}

/// Classify every row in place under one policy.
pub fn classify_all(rows: &mut [SampleMetrics], t: &ThresholdSet) {
    for row in rows.iter_mut() {
        let input = ClassificationInput::from_metrics(row);
        row.purity = Some(classify(&input, t));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(group_type: GroupType, het: f64, fail: f64, conc: Option<f64>) -> ClassificationInput {
        ClassificationInput {
            het_rate: Some(het),
            fail_rate: fail,
            concordance: conc,
            group_type,
            uniform_subline: false,
        }
    }

    #[test]
    fn clean_hybrid_passes() {
        let call = classify(
            &input(GroupType::Hybrid, 0.32, 0.02, Some(0.95)),
            &ThresholdSet::default(),
        );
        assert_eq!(call.status, Severity::Pass);
        assert_eq!(call.reason(), "OK");
    }

    #[test]
    fn fail_dominates_warning() {
        let call = classify(
            &input(GroupType::Inbred, 0.07, 0.15, Some(0.70)),
            &ThresholdSet::default(),
        );
        assert_eq!(call.status, Severity::Fail);
        assert_eq!(
            call.reason(),
            "high fail rate (15.0%); elevated heterozygosity for inbred (7.0%); low concordance (70.0%)"
        );
    }

    #[test]
    fn warnings_only() {
        let call = classify(
            &input(GroupType::Hybrid, 0.18, 0.0, Some(0.85)),
            &ThresholdSet::default(),
        );
        assert_eq!(call.status, Severity::Warning);
        assert_eq!(call.conditions.len(), 2);
    }

    #[test]
    fn untyped_and_missing_data_are_explicit() {
        let call = classify(
            &ClassificationInput {
                het_rate: None,
                fail_rate: 1.0,
                concordance: None,
                group_type: GroupType::Untyped,
                uniform_subline: false,
            },
            &ThresholdSet::default(),
        );
        assert_eq!(call.status, Severity::Fail);
        assert_eq!(
            call.conditions,
            vec![
                Condition::HighFailRate { fail_rate: 1.0 },
                Condition::UntypedGroup,
                Condition::NoValidCalls,
                Condition::ConcordanceUnavailable,
            ]
        );
    }

    #[test]
    fn missing_concordance_is_informational() {
        let call = classify(
            &input(GroupType::Inbred, 0.01, 0.0, None),
            &ThresholdSet::default(),
        );
        assert_eq!(call.status, Severity::Pass);
        assert_eq!(call.reason(), "insufficient data for concordance");
    }

    #[test]
    fn uniform_subline_suppresses_concordance() {
        let mut i = input(GroupType::Inbred, 0.003, 0.0, Some(0.78));
        i.uniform_subline = true;
        let call = classify(&i, &ThresholdSet::default());
        assert_eq!(call.status, Severity::Pass);
        assert!(matches!(call.conditions[0], Condition::UniformSubLine { .. }));
    }

    #[test]
    fn excessive_fail_rate_needs_ceiling() {
        let i = input(GroupType::Inbred, 0.0, 0.25, Some(1.0));
        assert_eq!(classify(&i, &ThresholdSet::default()).status, Severity::Warning);
        assert_eq!(classify(&i, &ThresholdSet::relaxed_inbred()).status, Severity::Fail);
    }

    #[test]
    fn serializes_status_and_reason() {
        let call = PurityCall::from_conditions(vec![Condition::ReducedConcordance { concordance: 0.85 }]);
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["purity_status"], "WARNING");
        assert_eq!(json["purity_reason"], "reduced concordance (85.0%)");
    }
}
