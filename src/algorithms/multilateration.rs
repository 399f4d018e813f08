use crate::algorithms::trilateration::sum_squared_residuals;
use crate::core::constants::{COINCIDENCE_TOLERANCE_M, RANK_TOLERANCE};
use crate::core::types::{AnchorSet, PositionEstimate, RangeVector};
use crate::validation::error::{NavError, NavResult};
use log::{debug, trace};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Configuration for the bounded nonlinear solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iteration budget; the loop never runs longer than this
    pub max_iterations: usize,
    /// Stop once the sum of squared residuals drops to this value
    pub cost_tolerance: f64,
    /// Stop once the projected gradient's largest component drops to this value
    pub gradient_tolerance: f64,
    /// Relative step-size stopping threshold
    pub step_tolerance: f64,
    /// Initial damping, relative to the largest diagonal entry of JᵀJ
    pub initial_damping: f64,
    /// Component-wise lower bound on the solution
    pub lower_bound: [f64; 3],
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            cost_tolerance: 1e-18,
            gradient_tolerance: 1e-12,
            step_tolerance: 1e-12,
            initial_damping: 1e-3,
            lower_bound: [0.0, 0.0, 0.0],
        }
    }
}

/// Range residuals and their Jacobian at one point
struct Linearization {
    residuals: DVector<f64>,
    jacobian: DMatrix<f64>,
}

impl Linearization {
    fn cost(&self) -> f64 {
        self.residuals.norm_squared()
    }
}

/// Bounded nonlinear least-squares multilateration.
///
/// Minimises `Σ(‖p − Pᵢ‖ − rᵢ)²` subject to `p ≥ lower_bound` with a projected
/// Levenberg-Marquardt loop. Each step solves the damped normal equations by
/// SVD, projects the candidate onto the feasible box and is accepted only if
/// the actual cost reduction agrees in sign with the model's prediction.
#[derive(Debug, Clone, Default)]
pub struct NonlinearMultilaterator {
    config: SolverConfig,
}

impl NonlinearMultilaterator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Estimate the tag position.
    ///
    /// Without an `initial_guess` the loop starts from the centroid of the
    /// anchors that have a valid range. The start point is projected onto the
    /// bounds before the first iteration.
    pub fn solve(
        &self,
        anchors: &AnchorSet,
        ranges: &RangeVector,
        initial_guess: Option<Vector3<f64>>,
    ) -> NavResult<PositionEstimate> {
        let observations = ranges.paired(anchors)?;
        if observations.len() < 4 {
            return Err(NavError::insufficient(format!(
                "nonlinear multilateration needs 4 valid ranges, got {}",
                observations.len()
            )));
        }
        if let Some(guess) = initial_guess {
            if !guess.iter().all(|c| c.is_finite()) {
                return Err(NavError::invalid("initial guess has a non-finite coordinate"));
            }
        }

        let start = initial_guess.unwrap_or_else(|| {
            observations
                .iter()
                .fold(Vector3::zeros(), |acc, (p, _)| acc + p)
                / observations.len() as f64
        });

        let mut position = self.project(start);
        let mut state = linearize(&observations, &position);
        let mut cost = state.cost();

        let jtj = state.jacobian.transpose() * &state.jacobian;
        let mut lambda = self.config.initial_damping * jtj.diagonal().max().max(1.0);
        let mut nu = 2.0;
        let xtol = self.config.step_tolerance;

        for iteration in 0..self.config.max_iterations {
            if cost <= self.config.cost_tolerance {
                return Ok(self.finish(&observations, &position, iteration));
            }

            let gradient = state.jacobian.transpose() * &state.residuals;
            if self.projected_gradient_norm(&position, &gradient) <= self.config.gradient_tolerance {
                return Ok(self.finish(&observations, &position, iteration));
            }

            let jtj: Matrix3<f64> = {
                let dense = state.jacobian.transpose() * &state.jacobian;
                Matrix3::from_iterator(dense.iter().copied())
            };
            let mut damped = jtj;
            for i in 0..3 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(RANK_TOLERANCE);
            }

            // coordinates held on their bound take no part in the step
            let mut rhs = -Vector3::new(gradient[0], gradient[1], gradient[2]);
            for k in self.blocked_coordinates(&position, &gradient) {
                damped.row_mut(k).fill(0.0);
                damped.column_mut(k).fill(0.0);
                damped[(k, k)] = 1.0;
                rhs[k] = 0.0;
            }
            let raw_step = damped
                .svd(true, true)
                .solve(&rhs, RANK_TOLERANCE)
                .map_err(|e| NavError::insufficient(format!("damped step solve failed: {}", e)))?;

            let candidate = self.project(position + raw_step);
            let step = candidate - position;
            let next = linearize(&observations, &candidate);
            let next_cost = next.cost();

            let step_dv = DVector::from_column_slice(step.as_slice());
            let model = &state.residuals + &state.jacobian * step_dv;
            let predicted = cost - model.norm_squared();
            let actual = cost - next_cost;
            let gain = if predicted > 0.0 { actual / predicted } else { -1.0 };

            trace!(
                "LM iter {}: cost {:.3e} -> {:.3e}, gain {:.3}, lambda {:.3e}",
                iteration,
                cost,
                next_cost,
                gain,
                lambda
            );

            if gain > 0.0 {
                position = candidate;
                state = next;
                cost = next_cost;
                lambda *= (1.0 - (2.0 * gain - 1.0).powi(3)).max(1.0 / 3.0);
                nu = 2.0;
            } else {
                lambda *= nu;
                nu *= 2.0;
            }

            if step.norm() <= xtol * (xtol + position.norm()) {
                return Ok(self.finish(&observations, &position, iteration + 1));
            }
        }

        let residual = sum_squared_residuals(&observations, &position);
        debug!(
            "nonlinear solver exhausted {} iterations, residual {:.3e}",
            self.config.max_iterations, residual
        );
        Err(NavError::ConvergenceFailure {
            iterations: self.config.max_iterations,
            residual,
            last_estimate: PositionEstimate::from_vector(
                &position,
                false,
                self.config.max_iterations,
                residual,
            ),
        })
    }

    fn finish(
        &self,
        observations: &[(Vector3<f64>, f64)],
        position: &Vector3<f64>,
        iterations: usize,
    ) -> PositionEstimate {
        let residual = sum_squared_residuals(observations, position);
        trace!("nonlinear fix {:?} after {} iterations", position, iterations);
        PositionEstimate::from_vector(position, true, iterations, residual)
    }

    /// Clamp onto the feasible box
    fn project(&self, p: Vector3<f64>) -> Vector3<f64> {
        let lower = &self.config.lower_bound;
        Vector3::new(p.x.max(lower[0]), p.y.max(lower[1]), p.z.max(lower[2]))
    }

    /// Indices sitting on their lower bound with a descent direction that
    /// points out of the feasible box
    fn blocked_coordinates<'a>(
        &'a self,
        p: &'a Vector3<f64>,
        gradient: &'a DVector<f64>,
    ) -> impl Iterator<Item = usize> + 'a {
        (0..3).filter(move |&k| p[k] <= self.config.lower_bound[k] && gradient[k] > 0.0)
    }

    /// Infinity norm of the gradient over the coordinates free to move
    fn projected_gradient_norm(&self, p: &Vector3<f64>, gradient: &DVector<f64>) -> f64 {
        let blocked: Vec<usize> = self.blocked_coordinates(p, gradient).collect();
        (0..3)
            .filter(|k| !blocked.contains(k))
            .map(|k| gradient[k].abs())
            .fold(0.0, f64::max)
    }
}

/// Residuals `‖p − Pᵢ‖ − rᵢ` with unit-vector Jacobian rows.
/// A point on top of an anchor contributes a zero row.
fn linearize(observations: &[(Vector3<f64>, f64)], p: &Vector3<f64>) -> Linearization {
    let n = observations.len();
    let mut residuals = DVector::zeros(n);
    let mut jacobian = DMatrix::zeros(n, 3);

    for (i, (anchor, range)) in observations.iter().enumerate() {
        let diff = p - anchor;
        let predicted = diff.norm();
        residuals[i] = predicted - range;
        if predicted > COINCIDENCE_TOLERANCE_M {
            let unit = diff / predicted;
            jacobian[(i, 0)] = unit.x;
            jacobian[(i, 1)] = unit.y;
            jacobian[(i, 2)] = unit.z;
        }
    }

    Linearization { residuals, jacobian }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Anchor;
    use approx::assert_relative_eq;

    fn tetrahedron() -> AnchorSet {
        AnchorSet::new(vec![
            Anchor::new("A0", 0.0, 0.0, 0.0),
            Anchor::new("A1", 10.0, 0.0, 0.0),
            Anchor::new("A2", 0.0, 10.0, 0.0),
            Anchor::new("A3", 0.0, 0.0, 10.0),
        ])
        .unwrap()
    }

    fn exact_ranges(anchors: &AnchorSet, truth: &Vector3<f64>) -> RangeVector {
        let ranges: Vec<f64> = anchors.iter().map(|a| (a.position - truth).norm()).collect();
        RangeVector::from_meters(&ranges)
    }

    #[test]
    fn test_noise_free_ranges_recover_position() {
        let anchors = tetrahedron();
        let truth = Vector3::new(3.0, 4.0, 5.0);
        let estimate = NonlinearMultilaterator::new()
            .solve(&anchors, &exact_ranges(&anchors, &truth), None)
            .unwrap();

        assert_relative_eq!(estimate.position(), truth, epsilon = 1e-6);
        assert!(estimate.converged);
        assert!(estimate.iterations > 0);
    }

    #[test]
    fn test_noisy_ranges_stay_close() {
        let anchors = tetrahedron();
        let truth = Vector3::new(3.0, 4.0, 5.0);
        let noise = [0.02, -0.015, 0.01, -0.02];
        let ranges: Vec<f64> = anchors
            .iter()
            .zip(noise.iter())
            .map(|(a, n)| (a.position - truth).norm() + n)
            .collect();

        let estimate = NonlinearMultilaterator::new()
            .solve(&anchors, &RangeVector::from_meters(&ranges), None)
            .unwrap();
        assert!((estimate.position() - truth).norm() < 0.1);
    }

    #[test]
    fn test_solution_respects_lower_bound() {
        // the zero-residual point lies below the floor
        let anchors = tetrahedron();
        let truth = Vector3::new(3.0, 4.0, -2.0);
        let estimate = NonlinearMultilaterator::new()
            .solve(&anchors, &exact_ranges(&anchors, &truth), None)
            .unwrap();

        assert!(estimate.converged);
        assert!(estimate.x >= 0.0 && estimate.y >= 0.0 && estimate.z >= 0.0);
        assert!(estimate.residual > 0.0);
    }

    #[test]
    fn test_noisy_tag_near_floor_converges_on_bound() {
        let anchors = AnchorSet::new(vec![
            Anchor::new("0241000000000000", 4.0, 0.0, 2.0),
            Anchor::new("0341000000000000", 4.0, 2.0, 0.0),
            Anchor::new("0441000000000000", 5.0, 8.0, 2.0),
            Anchor::new("0541000000000000", 0.0, 6.0, 1.5),
        ])
        .unwrap();
        let solver = NonlinearMultilaterator::new();

        let cases = [
            (Vector3::new(2.21, 3.70, 0.028), [0.04, -0.03, 0.035, -0.04]),
            (Vector3::new(2.25, 2.19, 0.011), [-0.04, 0.04, -0.02, 0.03]),
            (Vector3::new(1.80, 5.10, 0.030), [0.03, 0.04, -0.04, -0.035]),
        ];
        for (truth, noise) in cases {
            let ranges: Vec<f64> = anchors
                .iter()
                .zip(noise.iter())
                .map(|(a, n)| (a.position - truth).norm() + n)
                .collect();

            let estimate = solver
                .solve(&anchors, &RangeVector::from_meters(&ranges), None)
                .unwrap();
            assert!(estimate.converged);
            assert!(estimate.z >= 0.0);
            assert!(estimate.iterations < solver.config().max_iterations);
        }
    }

    #[test]
    fn test_budget_exhaustion_returns_last_iterate() {
        let anchors = tetrahedron();
        let truth = Vector3::new(3.0, 4.0, 5.0);
        let solver = NonlinearMultilaterator::with_config(SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        });

        let result = solver.solve(
            &anchors,
            &exact_ranges(&anchors, &truth),
            Some(Vector3::new(50.0, 50.0, 50.0)),
        );
        match result {
            Err(NavError::ConvergenceFailure {
                iterations,
                last_estimate,
                ..
            }) => {
                assert_eq!(iterations, 1);
                assert!(!last_estimate.converged);
                assert!(last_estimate.x.is_finite());
            }
            other => panic!("expected ConvergenceFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_requires_four_valid_ranges() {
        let anchors = tetrahedron();
        let ranges = RangeVector::new(vec![Some(5.0), None, Some(6.0), Some(7.0)]);
        let result = NonlinearMultilaterator::new().solve(&anchors, &ranges, None);
        assert!(matches!(result, Err(NavError::InsufficientGeometry { .. })));
    }

    #[test]
    fn test_deterministic_for_fixed_guess() {
        let anchors = tetrahedron();
        let ranges = RangeVector::from_meters(&[7.0, 8.1, 6.5, 7.4]);
        let solver = NonlinearMultilaterator::new();
        let guess = Some(Vector3::new(2.0, 2.0, 2.0));

        let first = solver.solve(&anchors, &ranges, guess);
        let second = solver.solve(&anchors, &ranges, guess);
        assert_eq!(first, second);
    }

    #[test]
    fn test_start_on_anchor_does_not_produce_nan() {
        let anchors = tetrahedron();
        let truth = Vector3::new(3.0, 4.0, 5.0);
        let estimate = NonlinearMultilaterator::new()
            .solve(&anchors, &exact_ranges(&anchors, &truth), Some(Vector3::new(10.0, 0.0, 0.0)))
            .unwrap();
        assert_relative_eq!(estimate.position(), truth, epsilon = 1e-6);
    }
}
