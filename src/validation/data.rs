use crate::core::constants::MAX_DEVICE_RANGE_M;
use crate::core::types::RangeVector;
use crate::validation::error::{NavError, NavResult};
use log::debug;
use serde::{Deserialize, Serialize};

/// Configuration for range validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Largest distance accepted as a real measurement (meters)
    pub max_range_m: f64,
    /// Minimum valid ranges for a 3D fix
    pub min_ranges_3d: usize,
    /// Minimum valid ranges for a planar fix
    pub min_ranges_2d: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_range_m: MAX_DEVICE_RANGE_M,
            min_ranges_3d: 4,
            min_ranges_2d: 3,
        }
    }
}

/// Why a reading was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRejection {
    NotFinite,
    Negative,
    BeyondMaxRange,
}

/// Marks implausible readings invalid.
///
/// A rejected reading becomes `None`; it is never clamped, zeroed or replaced.
#[derive(Debug, Clone, Default)]
pub struct RangeValidator {
    config: ValidationConfig,
}

impl RangeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Classify one reading; `None` means it is acceptable
    pub fn check(&self, range_m: f64) -> Option<RangeRejection> {
        if !range_m.is_finite() {
            Some(RangeRejection::NotFinite)
        } else if range_m < 0.0 {
            Some(RangeRejection::Negative)
        } else if range_m > self.config.max_range_m {
            Some(RangeRejection::BeyondMaxRange)
        } else {
            None
        }
    }

    /// Build a range vector from raw readings, invalidating implausible ones
    pub fn validate_raw(&self, raw: &[f64]) -> RangeVector {
        RangeVector::new(
            raw.iter()
                .enumerate()
                .map(|(i, &r)| self.filter_reading(i, r))
                .collect(),
        )
    }

    /// Re-check every valid entry of an existing vector
    pub fn validate(&self, ranges: &RangeVector) -> RangeVector {
        RangeVector::new(
            ranges
                .as_slice()
                .iter()
                .enumerate()
                .map(|(i, r)| r.and_then(|r| self.filter_reading(i, r)))
                .collect(),
        )
    }

    /// Fail unless at least the configured number of valid ranges is present
    pub fn require_minimum(&self, ranges: &RangeVector, planar: bool) -> NavResult<()> {
        let required = if planar {
            self.config.min_ranges_2d
        } else {
            self.config.min_ranges_3d
        };
        let available = ranges.valid_count();
        if available < required {
            return Err(NavError::insufficient(format!(
                "{} valid ranges available, {} required",
                available, required
            )));
        }
        Ok(())
    }

    fn filter_reading(&self, index: usize, range_m: f64) -> Option<f64> {
        match self.check(range_m) {
            None => Some(range_m),
            Some(reason) => {
                debug!("range {} for anchor index {} rejected: {:?}", range_m, index, reason);
                None
            }
        }
    }
}
