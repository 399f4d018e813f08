//! UWB Navigation
//!
//! Tag position estimation from anchor ranges (linear trilateration, bounded
//! nonlinear multilateration and GDOP) and obstacle-aware routing through a
//! fixed grid of crossings.

pub mod algorithms;
pub mod api;
pub mod core;
pub mod hardware;
pub mod processing;
pub mod routing;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use crate::algorithms::{
    GdopQuality, LinearTrilaterator, LocalFrame, NonlinearMultilaterator, PrecisionEstimator, PrecisionMetric,
    ScaleCalibrator, SolverConfig,
};
pub use crate::api::{ApiError, ApiResult, EstimationMethod, NavigationApi, PositionQuery, PositionResponse, RouteResponse};
pub use crate::core::{Anchor, AnchorSet, Point2, PositionEstimate, RangeVector};
pub use crate::hardware::{ProviderError, RangeProvider, ReplayRangeProvider, StreamRangeProvider};
pub use crate::routing::{Obstacle, ObstacleField, Route, RoutePlanner, RouteRequest, WaypointId};
pub use crate::utils::{ConfigError, ConfigurationManager, NavConfig};
pub use crate::validation::{NavError, NavResult, RangeValidator};
