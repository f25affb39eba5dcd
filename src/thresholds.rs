//! Threshold policies for purity classification.
//!
//! Every classification call takes a [`ThresholdSet`] explicitly so the same
//! classifier can be run under several policies in one process.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric cut-offs for one classification policy. All values are fractions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdSet {
    /// Inbred samples above this heterozygosity are at least WARNING.
    pub inbred_het_warn: f64,
    /// Inbred samples above this heterozygosity FAIL.
    pub inbred_het_fail: f64,
    /// Hybrid samples below this heterozygosity are at least WARNING.
    pub hybrid_het_warn: f64,
    /// Hybrid samples below this heterozygosity FAIL.
    pub hybrid_het_fail: f64,
    /// Failed-call fraction above this is at least WARNING.
    pub fail_rate_warn: f64,
    /// Failed-call fraction above this FAILs. Off when `None`.
    pub fail_rate_fail: Option<f64>,
    pub concordance_warn: f64,
    pub concordance_fail: f64,
    /// Groups whose median heterozygosity exceeds this are typed hybrid.
    pub hybrid_classification_median_threshold: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            inbred_het_warn: 0.05,
            inbred_het_fail: 0.10,
            hybrid_het_warn: 0.20,
            hybrid_het_fail: 0.15,
            fail_rate_warn: 0.10,
            fail_rate_fail: None,
            concordance_warn: 0.90,
            concordance_fail: 0.80,
            hybrid_classification_median_threshold: 0.15,
        }
    }
}

impl ThresholdSet {
    /// Alternate policy tolerating residual heterozygosity in partially
    /// fixed inbred lines, with a hard ceiling on failed calls.
    pub fn relaxed_inbred() -> Self {
        Self {
            inbred_het_warn: 0.15,
            inbred_het_fail: 0.20,
            fail_rate_fail: Some(0.20),
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ThresholdError> {
        let set: Self = serde_json::from_str(raw)?;
        set.validate()?;
        Ok(set)
    }

    pub fn from_path(path: &Path) -> Result<Self, ThresholdError> {
        let raw = fs::read_to_string(path).map_err(|source| ThresholdError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ThresholdError> {
        let mut fields = vec![
            ("inbred_het_warn", self.inbred_het_warn),
            ("inbred_het_fail", self.inbred_het_fail),
            ("hybrid_het_warn", self.hybrid_het_warn),
            ("hybrid_het_fail", self.hybrid_het_fail),
            ("fail_rate_warn", self.fail_rate_warn),
            ("concordance_warn", self.concordance_warn),
            ("concordance_fail", self.concordance_fail),
            (
                "hybrid_classification_median_threshold",
                self.hybrid_classification_median_threshold,
            ),
        ];
        if let Some(v) = self.fail_rate_fail {
            fields.push(("fail_rate_fail", v));
        }
        for (name, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ThresholdError::OutOfRange { name, value });
            }
        }

        ordered("inbred_het_warn", self.inbred_het_warn, "inbred_het_fail", self.inbred_het_fail)?;
        ordered("hybrid_het_fail", self.hybrid_het_fail, "hybrid_het_warn", self.hybrid_het_warn)?;
        ordered(
            "concordance_fail",
            self.concordance_fail,
            "concordance_warn",
            self.concordance_warn,
        )?;
        if let Some(fail) = self.fail_rate_fail {
            ordered("fail_rate_warn", self.fail_rate_warn, "fail_rate_fail", fail)?;
        }
        Ok(())
    }
}

fn ordered(
    low_name: &'static str,
    low: f64,
    high_name: &'static str,
    high: f64,
) -> Result<(), ThresholdError> {
    if low > high {
        return Err(ThresholdError::Order {
            low: low_name,
            high: high_name,
        });
    }
    Ok(())
}

/// Parameters deciding when a production lot is a uniform sub-line whose
/// low group concordance should not count against it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LotUniformity {
    pub het_std_max: f64,
    pub het_range_max: f64,
    pub het_median_max: f64,
}

impl Default for LotUniformity {
    fn default() -> Self {
        Self {
            het_std_max: 0.03,
            het_range_max: 0.10,
            het_median_max: 0.05,
        }
    }
}

#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error("threshold {name} = {value} is outside [0, 1]")]
    OutOfRange { name: &'static str, value: f64 },
    #[error("threshold {low} must not exceed {high}")]
    Order {
        low: &'static str,
        high: &'static str,
    },
    #[error("invalid threshold file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read threshold file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
