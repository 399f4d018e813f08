use crate::core::constants::RANK_TOLERANCE;
use crate::core::types::{AnchorSet, PositionEstimate, RangeVector};
use crate::validation::error::{NavError, NavResult};
use log::trace;
use nalgebra::{DMatrix, DVector, Vector3};

/// Closed-form position estimate using the first valid anchor as reference.
///
/// Subtracting the reference sphere from every other sphere linearises the
/// range equations to `2(Pᵢ − P₀)·(p − P₀) = r₀² − rᵢ² + ‖Pᵢ − P₀‖²`, which is
/// solved in the least-squares sense through an SVD pseudo-inverse.
#[derive(Debug, Clone)]
pub struct LinearTrilaterator {
    /// Relative singular-value cutoff for the rank test
    pub rank_tolerance: f64,
}

impl Default for LinearTrilaterator {
    fn default() -> Self {
        Self {
            rank_tolerance: RANK_TOLERANCE,
        }
    }
}

impl LinearTrilaterator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 3D estimate from at least four valid ranges
    pub fn solve(&self, anchors: &AnchorSet, ranges: &RangeVector) -> NavResult<PositionEstimate> {
        let observations = ranges.paired(anchors)?;
        if observations.len() < 4 {
            return Err(NavError::insufficient(format!(
                "3D trilateration needs 4 valid ranges, got {}",
                observations.len()
            )));
        }

        let (p0, r0) = observations[0];
        let rows = observations.len() - 1;
        let mut a_matrix = DMatrix::zeros(rows, 3);
        let mut b_vector = DVector::zeros(rows);

        for (row, (pi, ri)) in observations.iter().skip(1).enumerate() {
            let qi = pi - p0;
            a_matrix[(row, 0)] = 2.0 * qi.x;
            a_matrix[(row, 1)] = 2.0 * qi.y;
            a_matrix[(row, 2)] = 2.0 * qi.z;
            b_vector[row] = r0.powi(2) - ri.powi(2) + qi.norm_squared();
        }

        let p_rel = self.least_squares(a_matrix, &b_vector, 3)?;
        let position = Vector3::new(p_rel[0], p_rel[1], p_rel[2]) + p0;
        let residual = sum_squared_residuals(&observations, &position);
        trace!("linear 3D fix {:?}, residual {:.3e}", position, residual);

        Ok(PositionEstimate::from_vector(&position, true, 0, residual))
    }

    /// Planar estimate from at least three valid ranges.
    ///
    /// Only the anchors' x/y are used; the reported z is the mean height of
    /// the anchors that contributed.
    pub fn solve_planar(&self, anchors: &AnchorSet, ranges: &RangeVector) -> NavResult<PositionEstimate> {
        let observations = ranges.paired(anchors)?;
        if observations.len() < 3 {
            return Err(NavError::insufficient(format!(
                "planar trilateration needs 3 valid ranges, got {}",
                observations.len()
            )));
        }

        let (p0, r0) = observations[0];
        let rows = observations.len() - 1;
        let mut a_matrix = DMatrix::zeros(rows, 2);
        let mut b_vector = DVector::zeros(rows);

        for (row, (pi, ri)) in observations.iter().skip(1).enumerate() {
            let dx = pi.x - p0.x;
            let dy = pi.y - p0.y;
            a_matrix[(row, 0)] = 2.0 * dx;
            a_matrix[(row, 1)] = 2.0 * dy;
            b_vector[row] = r0.powi(2) - ri.powi(2) + dx * dx + dy * dy;
        }

        let p_rel = self.least_squares(a_matrix, &b_vector, 2)?;
        let mean_z = observations.iter().map(|(p, _)| p.z).sum::<f64>() / observations.len() as f64;
        let position = Vector3::new(p_rel[0] + p0.x, p_rel[1] + p0.y, mean_z);

        let planar_residual = observations
            .iter()
            .map(|(p, r)| ((p.x - position.x).hypot(p.y - position.y) - r).powi(2))
            .sum();

        Ok(PositionEstimate::from_vector(&position, true, 0, planar_residual))
    }

    /// Minimum-norm least-squares solution, failing when the coefficient
    /// matrix does not have the rank needed to pin down every coordinate
    fn least_squares(
        &self,
        a_matrix: DMatrix<f64>,
        b_vector: &DVector<f64>,
        required_rank: usize,
    ) -> NavResult<DVector<f64>> {
        let svd = a_matrix.svd(true, true);
        let largest = svd.singular_values.max();
        let cutoff = self.rank_tolerance * largest;
        let rank = svd.singular_values.iter().filter(|&&s| s > cutoff).count();

        if largest <= 0.0 || rank < required_rank {
            return Err(NavError::insufficient(format!(
                "coefficient matrix has rank {}, {} required (collinear or coplanar anchors)",
                rank, required_rank
            )));
        }

        svd.solve(b_vector, cutoff)
            .map_err(|e| NavError::insufficient(format!("least-squares solve failed: {}", e)))
    }
}

/// `Σ(‖Pᵢ − p‖ − rᵢ)²` over the given observations
pub fn sum_squared_residuals(observations: &[(Vector3<f64>, f64)], position: &Vector3<f64>) -> f64 {
    observations
        .iter()
        .map(|(anchor, range)| ((anchor - position).norm() - range).powi(2))
        .sum()
}
