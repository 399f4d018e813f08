//! Application-facing API for position estimation and routing

pub mod blocking;
pub mod types;

pub use blocking::NavigationApi;
pub use types::{
    ApiError, ApiResult, CalibrationPlan, ErrorResponse, EstimationMethod, PositionQuery, PositionResponse,
    RouteResponse,
};
