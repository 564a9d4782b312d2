//! Purpose: Core sample record shared by extraction, planning, and reporting.
//! Exports: `MolarityUnit`, `Sample`, `target_ratio`, `round2`.
//! Invariants: Molarity fields are always nmol/l; conversion happens at extraction only.
use crate::core::error::{Error, ErrorKind};

/// Unit of a molarity column as declared in its header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MolarityUnit {
    NmolPerL,
    PmolPerL,
}

impl MolarityUnit {
    /// Convert a raw column value into nmol/l.
    pub fn to_nmol(self, value: f64) -> f64 {
        match self {
            MolarityUnit::NmolPerL => value,
            MolarityUnit::PmolPerL => value / 1000.0,
        }
    }
}

/// One sequencing library sample: the measurements of a single well.
///
/// Built once by extraction and never mutated afterwards. Pooling results
/// live in a separate assignment list keyed by sample index.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub file: String,
    pub plate: u32,
    pub well: String,
    pub dimer_conc: Option<f64>,
    pub dimer_molarity: Option<f64>,
    pub lib_conc: Option<f64>,
    pub lib_molarity: Option<f64>,
}

impl Sample {
    /// Library molarity usable for pooling: present, finite, and positive.
    pub fn poolable_molarity(&self) -> Option<f64> {
        self.lib_molarity
            .filter(|value| value.is_finite() && *value > 0.0)
    }
}

/// Library-to-dimer molarity ratio, rounded to two decimals.
///
/// Fails when either molarity is missing or the dimer molarity is not
/// positive; callers surface the failure without aborting the run.
pub fn target_ratio(sample: &Sample) -> Result<f64, Error> {
    let lib = sample.lib_molarity.ok_or_else(|| {
        Error::new(ErrorKind::Data)
            .with_message("library molarity missing; cannot compute target ratio")
            .with_well(sample.well.clone())
    })?;
    let dimer = sample.dimer_molarity.ok_or_else(|| {
        Error::new(ErrorKind::Data)
            .with_message("dimer molarity missing; cannot compute target ratio")
            .with_well(sample.well.clone())
    })?;
    if !dimer.is_finite() || dimer <= 0.0 {
        return Err(Error::new(ErrorKind::Data)
            .with_message("dimer molarity is zero; cannot compute target ratio")
            .with_well(sample.well.clone()));
    }
    Ok(round2(lib / dimer))
}

/// Round to two decimal places. All stored volumes, targets, and ratios go
/// through this so reported sums stay exact at two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
