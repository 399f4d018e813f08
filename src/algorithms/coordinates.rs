//! Local metric frame to map coordinates, and the one-shot scale calibration
//! that produces the per-axis multipliers

use crate::core::types::Point2;
use crate::validation::error::{NavError, NavResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Affine mapping between the anchors' local metric frame and map coordinates.
///
/// `map = origin + local / multiplier` per axis, where `origin` is the map
/// coordinate of the reference anchor and `multiplier` is metres per map unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalFrame {
    pub origin: Point2,
    pub multipliers: Point2,
}

impl LocalFrame {
    /// Frame with strictly positive, finite multipliers
    pub fn new(origin: Point2, multipliers: Point2) -> NavResult<Self> {
        if !origin.is_finite() {
            return Err(NavError::invalid("frame origin has a non-finite coordinate"));
        }
        if !(multipliers.x.is_finite() && multipliers.x > 0.0 && multipliers.y.is_finite() && multipliers.y > 0.0) {
            return Err(NavError::invalid(format!(
                "frame multipliers must be positive, got {}",
                multipliers
            )));
        }
        Ok(Self { origin, multipliers })
    }

    /// Local metres to map coordinates
    pub fn to_map(&self, local: Point2) -> Point2 {
        Point2::new(
            self.origin.x + local.x / self.multipliers.x,
            self.origin.y + local.y / self.multipliers.y,
        )
    }

    /// Map coordinates to local metres
    pub fn to_local(&self, map: Point2) -> Point2 {
        Point2::new(
            (map.x - self.origin.x) * self.multipliers.x,
            (map.y - self.origin.y) * self.multipliers.y,
        )
    }

    /// Same origin, new multipliers
    pub fn with_multipliers(&self, multipliers: Point2) -> NavResult<Self> {
        Self::new(self.origin, multipliers)
    }
}

/// Accumulates ranges taken with the tag held at the reference anchor and
/// solves for the map multipliers.
///
/// With the tag at anchor 0, the averaged distances `d₁`, `d₂` to two other
/// anchors whose map offsets are `(xᵢ, yᵢ)` satisfy
/// `dᵢ² = xᵢ²·mx² + yᵢ²·my²`; Cramer's rule gives `mx²` and `my²`.
#[derive(Debug, Clone)]
pub struct ScaleCalibrator {
    required_samples: usize,
    proximity_m: f64,
    sum_first: f64,
    sum_second: f64,
    samples: usize,
}

impl Default for ScaleCalibrator {
    fn default() -> Self {
        Self::new(10, 0.1)
    }
}

impl ScaleCalibrator {
    pub fn new(required_samples: usize, proximity_m: f64) -> Self {
        Self {
            required_samples: required_samples.max(1),
            proximity_m,
            sum_first: 0.0,
            sum_second: 0.0,
            samples: 0,
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Enough samples to solve
    pub fn is_ready(&self) -> bool {
        self.samples >= self.required_samples
    }

    /// Record one epoch: distance to the reference anchor and to the two
    /// calibration anchors. Fails if the tag is not at the reference anchor.
    pub fn add_sample(&mut self, reference_m: f64, first_m: f64, second_m: f64) -> NavResult<()> {
        if !(reference_m >= 0.0 && reference_m < self.proximity_m) {
            return Err(NavError::invalid(format!(
                "tag is {:.3} m from the reference anchor, must be closer than {} m",
                reference_m, self.proximity_m
            )));
        }
        if !(first_m.is_finite() && first_m >= 0.0 && second_m.is_finite() && second_m >= 0.0) {
            return Err(NavError::invalid("calibration ranges must be finite and non-negative"));
        }
        self.sum_first += first_m;
        self.sum_second += second_m;
        self.samples += 1;
        debug!("calibration sample {}/{}", self.samples, self.required_samples);
        Ok(())
    }

    /// Solve for `(mx, my)` from the averaged samples and the map offsets of
    /// the two calibration anchors relative to the reference anchor
    pub fn solve(&self, first_offset: Point2, second_offset: Point2) -> NavResult<Point2> {
        if !self.is_ready() {
            return Err(NavError::invalid(format!(
                "{} of {} calibration samples collected",
                self.samples, self.required_samples
            )));
        }
        let d1 = self.sum_first / self.samples as f64;
        let d2 = self.sum_second / self.samples as f64;

        let (x1, y1) = (first_offset.x.powi(2), first_offset.y.powi(2));
        let (x2, y2) = (second_offset.x.powi(2), second_offset.y.powi(2));
        let (r1, r2) = (d1 * d1, d2 * d2);

        let delta = x1 * y2 - y1 * x2;
        if delta == 0.0 {
            return Err(NavError::singular(
                "calibration anchors give a singular system (offsets are proportional)",
            ));
        }
        let mx_sq = (r1 * y2 - y1 * r2) / delta;
        let my_sq = (x1 * r2 - r1 * x2) / delta;
        if mx_sq < 0.0 || my_sq < 0.0 {
            return Err(NavError::invalid(format!(
                "calibration produced negative squared multipliers ({:.4}, {:.4})",
                mx_sq, my_sq
            )));
        }

        let multipliers = Point2::new(mx_sq.sqrt(), my_sq.sqrt());
        info!("calibrated multipliers {}", multipliers);
        Ok(multipliers)
    }
}
