//! Synchronous navigation API
//!
//! Bundles the estimators, the route planner and the shared configuration.
//! Every call is a pure computation over the current configuration, except
//! the provider-driven calls, which block on range acquisition.

use crate::algorithms::coordinates::{LocalFrame, ScaleCalibrator};
use crate::algorithms::gdop::{PrecisionEstimator, PrecisionMetric};
use crate::algorithms::multilateration::{NonlinearMultilaterator, SolverConfig};
use crate::algorithms::trilateration::LinearTrilaterator;
use crate::api::types::{
    ApiResult, CalibrationPlan, ErrorResponse, EstimationMethod, PositionQuery, PositionResponse, RouteResponse,
};
use crate::core::types::{AnchorSet, PositionEstimate, RangeVector};
use crate::hardware::error::ProviderError;
use crate::hardware::RangeProvider;
use crate::routing::graph::CrossingLayout;
use crate::routing::obstacles::ObstacleField;
use crate::routing::planner::{RoutePlanner, RouteRequest};
use crate::utils::config::{ConfigurationManager, GdopConfig};
use crate::validation::data::{RangeValidator, ValidationConfig};
use crate::validation::error::{NavError, NavResult};
use log::{debug, info, warn};
use nalgebra::Vector3;
use std::sync::Arc;

pub struct NavigationApi {
    anchors: Arc<AnchorSet>,
    planner: RoutePlanner,
    validator: RangeValidator,
    linear: LinearTrilaterator,
    nonlinear: NonlinearMultilaterator,
    precision: PrecisionEstimator,
    gdop_config: GdopConfig,
    frame: Option<LocalFrame>,
}

impl NavigationApi {
    /// API with default solver, validation and precision settings
    pub fn new(anchors: Arc<AnchorSet>, field: Arc<ObstacleField>, layout: Arc<CrossingLayout>) -> Self {
        Self {
            anchors,
            planner: RoutePlanner::new(field, layout),
            validator: RangeValidator::new(),
            linear: LinearTrilaterator::new(),
            nonlinear: NonlinearMultilaterator::new(),
            precision: PrecisionEstimator::new(),
            gdop_config: GdopConfig::default(),
            frame: None,
        }
    }

    /// API built from a loaded configuration
    pub fn from_config(manager: &ConfigurationManager) -> ApiResult<Self> {
        let api = Self::new(
            Arc::new(manager.anchor_set()?),
            Arc::new(manager.obstacle_field()?),
            Arc::new(manager.crossing_layout()?),
        )
        .with_solver_config(manager.solver_config().clone())
        .with_validation_config(manager.validation_config().clone())
        .with_gdop_config(manager.gdop_config().clone());

        Ok(match manager.frame() {
            Some(frame) => api.with_frame(frame),
            None => api,
        })
    }

    pub fn with_frame(mut self, frame: LocalFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.nonlinear = NonlinearMultilaterator::with_config(config);
        self
    }

    pub fn with_validation_config(mut self, config: ValidationConfig) -> Self {
        self.validator = RangeValidator::with_config(config);
        self
    }

    pub fn with_gdop_config(mut self, config: GdopConfig) -> Self {
        self.precision = PrecisionEstimator {
            singularity_tolerance: config.singularity_tolerance,
        };
        self.gdop_config = config;
        self
    }

    /// Current anchor set
    pub fn anchors(&self) -> &Arc<AnchorSet> {
        &self.anchors
    }

    /// Current obstacle field
    pub fn obstacles(&self) -> &Arc<ObstacleField> {
        self.planner.field()
    }

    /// Map frame, if configured or calibrated
    pub fn frame(&self) -> Option<LocalFrame> {
        self.frame
    }

    /// Swap in a new anchor set. In-flight callers holding the old `Arc`
    /// keep a consistent view.
    pub fn replace_anchors(&mut self, anchors: Arc<AnchorSet>) {
        info!("anchor set replaced ({} anchors)", anchors.len());
        self.anchors = anchors;
    }

    /// Swap in a new obstacle field, keeping the crossing layout
    pub fn replace_obstacles(&mut self, field: Arc<ObstacleField>) {
        info!("obstacle field replaced ({} obstacles)", field.len());
        self.planner = RoutePlanner::new(field, Arc::clone(self.planner.layout()));
    }

    /// Estimate the tag position from one epoch of ranges
    pub fn locate(&self, ranges: &RangeVector, query: &PositionQuery) -> ApiResult<PositionResponse> {
        if query.planar && query.method != EstimationMethod::Linear {
            return Err(NavError::invalid(format!(
                "planar estimation supports the linear method only, not {}",
                query.method
            ))
            .into());
        }

        let ranges = self.validator.validate(ranges);
        self.validator.require_minimum(&ranges, query.planar)?;
        let initial_guess = query.initial_guess.map(|g| Vector3::new(g[0], g[1], g[2]));

        let estimate = match query.method {
            EstimationMethod::Linear if query.planar => self.linear.solve_planar(&self.anchors, &ranges)?,
            EstimationMethod::Linear => self.linear.solve(&self.anchors, &ranges)?,
            EstimationMethod::Nonlinear => self.nonlinear.solve(&self.anchors, &ranges, initial_guess)?,
            EstimationMethod::Refined => self.refine(&ranges, initial_guess)?,
        };

        let (precision, precision_error) = if query.include_gdop {
            match self.precision_of(&estimate, &ranges, query.planar) {
                Ok(metric) => {
                    debug!("GDOP {:.3}: {}", metric.gdop, metric.quality.description());
                    (Some(metric), None)
                }
                Err(e) => {
                    warn!("no GDOP for this fix: {}", e);
                    (None, Some(ErrorResponse::from(&e)))
                }
            }
        } else {
            (None, None)
        };

        debug!(
            "{} fix ({:.3}, {:.3}, {:.3}) from {} ranges",
            query.method,
            estimate.x,
            estimate.y,
            estimate.z,
            ranges.valid_count()
        );

        Ok(PositionResponse {
            estimate,
            method: query.method,
            valid_ranges: ranges.valid_count(),
            precision,
            precision_error,
            position_uncertainty_m: precision.map(|m| m.position_uncertainty(self.gdop_config.range_sigma_m)),
            map_position: self.frame.map(|f| f.to_map(estimate.planar())),
        })
    }

    /// GDOP over the anchors that contributed a valid range
    fn precision_of(&self, estimate: &PositionEstimate, ranges: &RangeVector, planar: bool) -> NavResult<PrecisionMetric> {
        let used = self.anchors.subset(&ranges.valid_indices());
        let position = estimate.position();
        if planar {
            self.precision.gdop_planar(&used, &position)
        } else {
            self.precision.gdop(&used, &position)
        }
    }

    /// Read one epoch from `provider` and estimate from it
    pub fn locate_from<P: RangeProvider>(&self, provider: &mut P, query: &PositionQuery) -> ApiResult<PositionResponse> {
        let ranges = provider.read_ranges(&self.anchors)?;
        self.locate(&ranges, query)
    }

    /// Linear fix as the starting point for the nonlinear solver; the
    /// centroid is used when the linear fix is unavailable or the seeded run
    /// fails to converge
    fn refine(&self, ranges: &RangeVector, initial_guess: Option<Vector3<f64>>) -> NavResult<PositionEstimate> {
        let seed = match initial_guess {
            Some(guess) => Some(guess),
            None => match self.linear.solve(&self.anchors, ranges) {
                Ok(linear) => Some(linear.position()),
                Err(e) => {
                    debug!("no linear seed: {}", e);
                    None
                }
            },
        };

        match self.nonlinear.solve(&self.anchors, ranges, seed) {
            Err(NavError::ConvergenceFailure { iterations, .. }) if seed.is_some() => {
                warn!(
                    "refinement did not converge in {} iterations, retrying from the centroid",
                    iterations
                );
                self.nonlinear.solve(&self.anchors, ranges, None)
            }
            result => result,
        }
    }

    /// Plan a route, with map coordinates when a frame is configured
    pub fn route(&self, request: &RouteRequest) -> ApiResult<RouteResponse> {
        let route = self.planner.plan_request(request)?;
        let map_points = self
            .frame
            .map(|f| route.waypoints.iter().map(|w| f.to_map(w.position)).collect());

        Ok(RouteResponse {
            length: route.length,
            waypoints: route.waypoints,
            map_points,
        })
    }

    /// Collect calibration epochs with the tag held at anchor 0 and update
    /// the frame multipliers. Epochs where the tag is not at anchor 0 or a
    /// needed range is missing are skipped.
    pub fn calibrate_scale<P: RangeProvider>(
        &mut self,
        provider: &mut P,
        plan: &CalibrationPlan,
        mut calibrator: ScaleCalibrator,
    ) -> ApiResult<LocalFrame> {
        let frame = self
            .frame
            .ok_or_else(|| NavError::invalid("scale calibration needs a configured map frame"))?;
        for index in [plan.first_anchor, plan.second_anchor] {
            if index == 0 || index >= self.anchors.len() {
                return Err(NavError::invalid(format!("calibration anchor index {} is not usable", index)).into());
            }
        }

        for _ in 0..plan.max_epochs {
            if calibrator.is_ready() {
                break;
            }
            let ranges = match provider.read_ranges(&self.anchors) {
                Ok(ranges) => ranges,
                Err(e) if e.is_transient() => continue,
                Err(ProviderError::Exhausted) => break,
                Err(e) => return Err(e.into()),
            };
            let ranges = self.validator.validate(&ranges);
            let (Some(d0), Some(d1), Some(d2)) = (
                ranges.get(0),
                ranges.get(plan.first_anchor),
                ranges.get(plan.second_anchor),
            ) else {
                continue;
            };
            if let Err(e) = calibrator.add_sample(d0, d1, d2) {
                debug!("calibration epoch skipped: {}", e);
            }
        }

        let multipliers = calibrator.solve(plan.first_offset, plan.second_offset)?;
        let calibrated = frame.with_multipliers(multipliers)?;
        self.frame = Some(calibrated);
        Ok(calibrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ApiError;
    use crate::core::types::{Anchor, Point2};
    use crate::hardware::mock::ReplayRangeProvider;
    use crate::routing::obstacles::Obstacle;
    use approx::assert_relative_eq;

    fn api() -> NavigationApi {
        let anchors = AnchorSet::new(vec![
            Anchor::new("A0", 0.0, 0.0, 0.0),
            Anchor::new("A1", 10.0, 0.0, 0.0),
            Anchor::new("A2", 0.0, 10.0, 0.0),
            Anchor::new("A3", 0.0, 0.0, 10.0),
            Anchor::new("A4", 10.0, 10.0, 10.0),
        ])
        .unwrap();
        let layout = CrossingLayout::new(
            vec![
                (1, Point2::new(2.0, 2.0)),
                (2, Point2::new(8.0, 2.0)),
                (3, Point2::new(2.0, 8.0)),
                (4, Point2::new(8.0, 8.0)),
            ],
            2,
        )
        .unwrap();
        NavigationApi::new(
            Arc::new(anchors),
            Arc::new(ObstacleField::default()),
            Arc::new(layout),
        )
    }

    fn ranges_to(api: &NavigationApi, truth: Vector3<f64>) -> RangeVector {
        RangeVector::from_meters(
            &api.anchors()
                .iter()
                .map(|a| (a.position - truth).norm())
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_each_method_locates() {
        let api = api();
        let truth = Vector3::new(3.0, 4.0, 5.0);
        let ranges = ranges_to(&api, truth);

        for method in [EstimationMethod::Linear, EstimationMethod::Nonlinear, EstimationMethod::Refined] {
            let query = PositionQuery {
                method,
                ..PositionQuery::default()
            };
            let response = api.locate(&ranges, &query).unwrap();
            assert_relative_eq!(response.estimate.position(), truth, epsilon = 1e-6);
            assert_eq!(response.method, method);
            assert_eq!(response.valid_ranges, 5);
            assert!(response.precision.is_some());
            assert!(response.precision_error.is_none());
            assert!(response.map_position.is_none());
        }
    }

    #[test]
    fn test_rejected_readings_reduce_valid_count() {
        let api = api();
        let truth = Vector3::new(3.0, 4.0, 5.0);
        let mut values: Vec<Option<f64>> = ranges_to(&api, truth).as_slice().to_vec();
        values[4] = Some(-1.0);

        let response = api
            .locate(&RangeVector::new(values.clone()), &PositionQuery::default())
            .unwrap();
        assert_eq!(response.valid_ranges, 4);

        values[3] = None;
        let result = api.locate(&RangeVector::new(values), &PositionQuery::default());
        assert!(matches!(
            result,
            Err(ApiError::Navigation(NavError::InsufficientGeometry { .. }))
        ));
    }

    #[test]
    fn test_tag_on_anchor_keeps_fix_without_gdop() {
        let api = api();
        let ranges = ranges_to(&api, Vector3::zeros());
        assert_eq!(ranges.get(0), Some(0.0));

        for method in [EstimationMethod::Linear, EstimationMethod::Refined] {
            let query = PositionQuery {
                method,
                ..PositionQuery::default()
            };
            let response = api.locate(&ranges, &query).unwrap();
            assert_relative_eq!(response.estimate.position(), Vector3::zeros(), epsilon = 1e-9);
            assert!(response.precision.is_none());
            assert!(response.position_uncertainty_m.is_none());
            let error = response.precision_error.unwrap();
            assert_eq!(error.kind, "SingularGeometry");
        }
    }

    #[test]
    fn test_planar_requires_linear_method() {
        let api = api();
        let query = PositionQuery {
            planar: true,
            ..PositionQuery::default()
        };
        let ranges = ranges_to(&api, Vector3::new(3.0, 4.0, 0.0));
        assert!(matches!(
            api.locate(&ranges, &query),
            Err(ApiError::Navigation(NavError::InvalidRequest { .. }))
        ));
    }

    #[test]
    fn test_map_position_uses_frame() {
        let frame = LocalFrame::new(Point2::new(100.0, 20.0), Point2::new(10.0, 10.0)).unwrap();
        let api = api().with_frame(frame);
        let ranges = ranges_to(&api, Vector3::new(3.0, 4.0, 5.0));
        let query = PositionQuery {
            method: EstimationMethod::Linear,
            include_gdop: false,
            ..PositionQuery::default()
        };

        let response = api.locate(&ranges, &query).unwrap();
        let map = response.map_position.unwrap();
        assert_relative_eq!(map.x, 100.3, epsilon = 1e-9);
        assert_relative_eq!(map.y, 20.4, epsilon = 1e-9);
        assert!(response.precision.is_none());
    }

    #[test]
    fn test_locate_from_provider() {
        let api = api();
        let truth = Vector3::new(6.0, 2.0, 3.0);
        let mut provider = ReplayRangeProvider::new(vec![ranges_to(&api, truth)]);

        let response = api.locate_from(&mut provider, &PositionQuery::default()).unwrap();
        assert_relative_eq!(response.estimate.position(), truth, epsilon = 1e-6);
        assert!(matches!(
            api.locate_from(&mut provider, &PositionQuery::default()),
            Err(ApiError::Provider(ProviderError::Exhausted))
        ));
    }

    #[test]
    fn test_route_and_obstacle_replacement() {
        let mut api = api();
        let request = RouteRequest {
            start: Point2::new(0.0, 0.0),
            destination: Some(Point2::new(10.0, 10.0)),
        };
        assert_eq!(api.route(&request).unwrap().waypoints.len(), 2);

        let obstacle = Obstacle::rectangle(Point2::new(4.0, 4.0), Point2::new(6.0, 6.0)).unwrap();
        api.replace_obstacles(Arc::new(ObstacleField::new(vec![obstacle])));
        let detour = api.route(&request).unwrap();
        assert_eq!(detour.waypoints.len(), 3);
        assert!(detour.map_points.is_none());
    }

    #[test]
    fn test_calibration_updates_frame() {
        let frame = LocalFrame::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)).unwrap();
        let mut api = api().with_frame(frame);
        let plan = CalibrationPlan {
            first_anchor: 1,
            second_anchor: 2,
            first_offset: Point2::new(5.0, 0.0),
            second_offset: Point2::new(0.0, 4.0),
            max_epochs: 20,
        };

        // one epoch with the tag away from anchor 0 is skipped
        let mut epochs = vec![vec![3.0, 8.0, 8.0, 10.0, 17.0]];
        epochs.extend(std::iter::repeat(vec![0.05, 10.0, 10.0, 10.0, 17.3]).take(10));
        let mut provider = ReplayRangeProvider::from_meters(&epochs);

        let calibrated = api.calibrate_scale(&mut provider, &plan, ScaleCalibrator::default()).unwrap();
        assert_relative_eq!(calibrated.multipliers.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(calibrated.multipliers.y, 2.5, epsilon = 1e-9);
        assert_eq!(api.frame(), Some(calibrated));
    }

    #[test]
    fn test_calibration_without_frame_fails() {
        let mut api = api();
        let plan = CalibrationPlan {
            first_anchor: 1,
            second_anchor: 2,
            first_offset: Point2::new(5.0, 0.0),
            second_offset: Point2::new(0.0, 4.0),
            max_epochs: 1,
        };
        let mut provider = ReplayRangeProvider::default();
        assert!(api
            .calibrate_scale(&mut provider, &plan, ScaleCalibrator::default())
            .is_err());
    }
}
