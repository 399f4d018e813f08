//! Core data types for the positioning and routing system

use crate::validation::error::{NavError, NavResult};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Planar coordinate used by the router and by 2D estimates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// True when both coordinates are finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point2 {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Ranging anchor with a surveyed position in the local frame (metres)
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub id: String,
    pub position: Vector3<f64>,
}

impl Anchor {
    /// Anchor at `(x, y, z)` in metres
    pub fn new(id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id: id.into(),
            position: Vector3::new(x, y, z),
        }
    }
}

/// Ordered, immutable set of anchors.
///
/// The index order is the contract shared with every [`RangeVector`]: entry
/// `i` of a range vector is the distance to anchor `i`. Anchor sets are never
/// mutated after construction; a configuration change builds a new set.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSet {
    anchors: Vec<Anchor>,
}

impl AnchorSet {
    /// Build an anchor set, rejecting duplicate ids and non-finite coordinates
    pub fn new(anchors: Vec<Anchor>) -> NavResult<Self> {
        let mut seen = HashSet::with_capacity(anchors.len());
        for anchor in &anchors {
            if !seen.insert(anchor.id.as_str()) {
                return Err(NavError::InvalidRequest {
                    reason: format!("duplicate anchor id '{}'", anchor.id),
                });
            }
            if !anchor.position.iter().all(|c| c.is_finite()) {
                return Err(NavError::InvalidRequest {
                    reason: format!("anchor '{}' has a non-finite coordinate", anchor.id),
                });
            }
        }
        Ok(Self { anchors })
    }

    /// Number of anchors
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Anchor at `index`, in range-vector order
    pub fn get(&self, index: usize) -> Option<&Anchor> {
        self.anchors.get(index)
    }

    /// Anchors in index order
    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }

    /// Anchor positions in index order
    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.anchors.iter().map(|a| a.position).collect()
    }

    /// Index of the anchor with `id`
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.anchors.iter().position(|a| a.id == id)
    }

    /// Mean anchor position, `None` for an empty set
    pub fn centroid(&self) -> Option<Vector3<f64>> {
        if self.anchors.is_empty() {
            return None;
        }
        let sum = self
            .anchors
            .iter()
            .fold(Vector3::zeros(), |acc, a| acc + a.position);
        Some(sum / self.anchors.len() as f64)
    }

    /// New set holding only the anchors at `indices`, in that order.
    /// Out-of-range indices are skipped.
    pub fn subset(&self, indices: &[usize]) -> AnchorSet {
        AnchorSet {
            anchors: indices
                .iter()
                .filter_map(|&i| self.anchors.get(i).cloned())
                .collect(),
        }
    }
}

/// One epoch of range measurements, index-aligned with an [`AnchorSet`].
///
/// `None` marks a failed or rejected measurement. A zero distance is a real
/// reading, not a failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeVector {
    ranges: Vec<Option<f64>>,
}

impl RangeVector {
    /// Ranges in metres, `None` marking a failed reading
    pub fn new(ranges: Vec<Option<f64>>) -> Self {
        Self { ranges }
    }

    /// Every entry valid
    pub fn from_meters(values: &[f64]) -> Self {
        Self {
            ranges: values.iter().copied().map(Some).collect(),
        }
    }

    /// Number of entries, valid or not
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Range for anchor `index`, `None` if invalid or out of bounds
    pub fn get(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).copied().flatten()
    }

    /// Raw entries
    pub fn as_slice(&self) -> &[Option<f64>] {
        &self.ranges
    }

    /// Number of valid entries
    pub fn valid_count(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_some()).count()
    }

    /// Indices of the valid entries, ascending
    pub fn valid_indices(&self) -> Vec<usize> {
        self.ranges
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|_| i))
            .collect()
    }

    /// Pair every valid range with its anchor position.
    ///
    /// Fails if the vector is not aligned with `anchors` or if a valid entry
    /// holds something that is not a finite, non-negative distance.
    pub fn paired(&self, anchors: &AnchorSet) -> NavResult<Vec<(Vector3<f64>, f64)>> {
        if self.ranges.len() != anchors.len() {
            return Err(NavError::InvalidRequest {
                reason: format!(
                    "range vector has {} entries but {} anchors are configured",
                    self.ranges.len(),
                    anchors.len()
                ),
            });
        }

        let mut pairs = Vec::with_capacity(self.ranges.len());
        for (anchor, range) in anchors.iter().zip(&self.ranges) {
            if let Some(r) = *range {
                if !r.is_finite() || r < 0.0 {
                    return Err(NavError::InvalidRequest {
                        reason: format!("range {} for anchor '{}' is not a distance", r, anchor.id),
                    });
                }
                pairs.push((anchor.position, r));
            }
        }
        Ok(pairs)
    }
}

/// Position estimate in the anchor frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// False only for the last iterate of a solver that ran out of budget
    pub converged: bool,
    /// Solver iterations used (0 for closed-form estimates)
    pub iterations: usize,
    /// Sum of squared range residuals at the estimate (m²)
    pub residual: f64,
}

impl PositionEstimate {
    /// Build from a solver position
    pub fn from_vector(p: &Vector3<f64>, converged: bool, iterations: usize, residual: f64) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
            converged,
            iterations,
            residual,
        }
    }

    /// Position as a vector
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Horizontal part of the fix
    pub fn planar(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> AnchorSet {
        AnchorSet::new(vec![
            Anchor::new("a", 0.0, 0.0, 0.0),
            Anchor::new("b", 4.0, 0.0, 0.0),
            Anchor::new("c", 4.0, 4.0, 0.0),
            Anchor::new("d", 0.0, 4.0, 2.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_anchor_ids_rejected() {
        let result = AnchorSet::new(vec![
            Anchor::new("a", 0.0, 0.0, 0.0),
            Anchor::new("a", 1.0, 0.0, 0.0),
        ]);
        assert!(matches!(result, Err(NavError::InvalidRequest { .. })));
    }

    #[test]
    fn test_non_finite_anchor_rejected() {
        let result = AnchorSet::new(vec![Anchor::new("a", f64::NAN, 0.0, 0.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_centroid_and_subset() {
        let anchors = square();
        let centroid = anchors.centroid().unwrap();
        assert!((centroid.x - 2.0).abs() < 1e-12);
        assert!((centroid.z - 0.5).abs() < 1e-12);

        let sub = anchors.subset(&[3, 1]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get(0).unwrap().id, "d");
        assert_eq!(anchors.index_of("c"), Some(2));
    }

    #[test]
    fn test_paired_skips_invalid_entries() {
        let anchors = square();
        let ranges = RangeVector::new(vec![Some(1.0), None, Some(0.0), Some(3.0)]);

        let pairs = ranges.paired(&anchors).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1].1, 0.0);
        assert_eq!(ranges.valid_indices(), vec![0, 2, 3]);
        assert_eq!(ranges.get(1), None);
    }

    #[test]
    fn test_paired_rejects_misaligned_and_negative() {
        let anchors = square();
        let short = RangeVector::from_meters(&[1.0, 2.0]);
        assert!(matches!(short.paired(&anchors), Err(NavError::InvalidRequest { .. })));

        let negative = RangeVector::new(vec![Some(1.0), Some(-2.0), None, None]);
        assert!(matches!(negative.paired(&anchors), Err(NavError::InvalidRequest { .. })));
    }

    #[test]
    fn test_point_distance() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::from([3.0, 4.0]);
        assert_eq!(a.distance(&b), 5.0);
    }
}
