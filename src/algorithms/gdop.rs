use crate::core::constants::{COINCIDENCE_TOLERANCE_M, SINGULARITY_TOLERANCE};
use crate::core::types::AnchorSet;
use crate::validation::error::{NavError, NavResult};
use log::trace;
use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};

/// Geometry quality classification based on GDOP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GdopQuality {
    /// GDOP < 2
    Excellent,
    /// GDOP < 5
    Good,
    /// GDOP < 10
    Moderate,
    /// GDOP < 20
    Fair,
    /// GDOP >= 20
    Poor,
}

impl GdopQuality {
    /// Quality band for a GDOP value
    pub fn from_gdop(gdop: f64) -> Self {
        if gdop < 2.0 {
            GdopQuality::Excellent
        } else if gdop < 5.0 {
            GdopQuality::Good
        } else if gdop < 10.0 {
            GdopQuality::Moderate
        } else if gdop < 20.0 {
            GdopQuality::Fair
        } else {
            GdopQuality::Poor
        }
    }

    /// Human-readable summary of the band
    pub fn description(&self) -> &'static str {
        match self {
            GdopQuality::Excellent => "Excellent geometry",
            GdopQuality::Good => "Good geometry",
            GdopQuality::Moderate => "Moderate geometry",
            GdopQuality::Fair => "Fair geometry, expect reduced accuracy",
            GdopQuality::Poor => "Poor geometry, position error strongly amplified",
        }
    }
}

/// GDOP value with its quality band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionMetric {
    pub gdop: f64,
    pub quality: GdopQuality,
}

impl PrecisionMetric {
    /// Expected position error (m) for a given range standard deviation
    pub fn position_uncertainty(&self, range_sigma_m: f64) -> f64 {
        self.gdop * range_sigma_m
    }
}

/// Geometric dilution of precision for an anchor set and a position.
///
/// `G` holds one unit direction vector `(Pᵢ − p)/‖Pᵢ − p‖` per anchor and
/// `GDOP = sqrt(trace((GᵀG)⁻¹))`. Ranging has no receiver clock term, so
/// there is no fourth column.
#[derive(Debug, Clone)]
pub struct PrecisionEstimator {
    /// Relative smallest/largest singular value below which GᵀG is singular
    pub singularity_tolerance: f64,
}

impl Default for PrecisionEstimator {
    fn default() -> Self {
        Self {
            singularity_tolerance: SINGULARITY_TOLERANCE,
        }
    }
}

impl PrecisionEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 3D GDOP; needs at least four anchors
    pub fn gdop(&self, anchors: &AnchorSet, position: &Vector3<f64>) -> NavResult<PrecisionMetric> {
        if anchors.len() < 4 {
            return Err(NavError::insufficient(format!(
                "3D GDOP needs 4 anchors, got {}",
                anchors.len()
            )));
        }
        let rows = self.direction_cosines(anchors, position, 3)?;
        self.evaluate(rows, 3)
    }

    /// Horizontal GDOP from the anchors' x/y; needs at least three anchors
    pub fn gdop_planar(&self, anchors: &AnchorSet, position: &Vector3<f64>) -> NavResult<PrecisionMetric> {
        if anchors.len() < 3 {
            return Err(NavError::insufficient(format!(
                "2D GDOP needs 3 anchors, got {}",
                anchors.len()
            )));
        }
        let rows = self.direction_cosines(anchors, position, 2)?;
        self.evaluate(rows, 2)
    }

    fn direction_cosines(
        &self,
        anchors: &AnchorSet,
        position: &Vector3<f64>,
        dims: usize,
    ) -> NavResult<Vec<Vec<f64>>> {
        if !position.iter().all(|c| c.is_finite()) {
            return Err(NavError::invalid("GDOP position has a non-finite coordinate"));
        }

        let mut rows = Vec::with_capacity(anchors.len());
        for anchor in anchors.iter() {
            let diff = anchor.position - position;
            let components = &diff.as_slice()[..dims];
            let distance = components.iter().map(|c| c * c).sum::<f64>().sqrt();
            if distance <= COINCIDENCE_TOLERANCE_M {
                return Err(NavError::singular(format!(
                    "position coincides with anchor '{}'",
                    anchor.id
                )));
            }
            rows.push(components.iter().map(|c| c / distance).collect());
        }
        Ok(rows)
    }

    fn evaluate(&self, rows: Vec<Vec<f64>>, dims: usize) -> NavResult<PrecisionMetric> {
        let g = DMatrix::from_fn(rows.len(), dims, |i, j| rows[i][j]);
        let gtg = g.transpose() * &g;

        let svd = gtg.clone().svd(false, false);
        let largest = svd.singular_values.max();
        let smallest = svd.singular_values.min();
        if largest <= 0.0 || smallest <= self.singularity_tolerance * largest {
            return Err(NavError::singular(format!(
                "GᵀG is near-singular (singular values {:.3e}..{:.3e})",
                smallest, largest
            )));
        }

        let q = gtg
            .try_inverse()
            .ok_or_else(|| NavError::singular("GᵀG could not be inverted"))?;
        let trace = q.trace();
        if !trace.is_finite() || trace < 0.0 {
            return Err(NavError::singular(format!("covariance trace is {}", trace)));
        }

        let gdop = trace.sqrt();
        trace!("GDOP {:.4} from {} anchors", gdop, rows.len());
        Ok(PrecisionMetric {
            gdop,
            quality: GdopQuality::from_gdop(gdop),
        })
    }
}
