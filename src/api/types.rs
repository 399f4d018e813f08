//! Request and response types for the navigation API

use crate::algorithms::gdop::PrecisionMetric;
use crate::core::types::{Point2, PositionEstimate};
use crate::hardware::error::ProviderError;
use crate::routing::graph::Waypoint;
use crate::utils::config::ConfigError;
use crate::validation::error::NavError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Navigation(#[from] NavError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl ApiError {
    /// Error category name
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Navigation(e) => e.kind(),
            ApiError::Provider(_) => "ProviderError",
            ApiError::Configuration(_) => "ConfigurationError",
        }
    }

    /// The navigation failure, if this is one
    pub fn as_nav(&self) -> Option<&NavError> {
        match self {
            ApiError::Navigation(e) => Some(e),
            _ => None,
        }
    }
}

/// Serializable failure report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
}

impl From<&NavError> for ErrorResponse {
    fn from(error: &NavError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<&ApiError> for ErrorResponse {
    fn from(error: &ApiError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Which estimator produces the fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMethod {
    /// Closed-form linear least squares
    Linear,
    /// Bounded nonlinear least squares from the given or centroid guess
    Nonlinear,
    /// Nonlinear refinement seeded with the linear fix
    #[default]
    Refined,
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EstimationMethod::Linear => "linear",
            EstimationMethod::Nonlinear => "nonlinear",
            EstimationMethod::Refined => "refined",
        };
        f.write_str(name)
    }
}

impl FromStr for EstimationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(EstimationMethod::Linear),
            "nonlinear" => Ok(EstimationMethod::Nonlinear),
            "refined" => Ok(EstimationMethod::Refined),
            other => Err(format!("unknown estimation method '{}'", other)),
        }
    }
}

/// Parameters of one position estimation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionQuery {
    pub method: EstimationMethod,
    /// Horizontal fix from three or more anchors (linear method only)
    pub planar: bool,
    pub include_gdop: bool,
    /// Starting point for the nonlinear method
    pub initial_guess: Option<[f64; 3]>,
}

impl Default for PositionQuery {
    fn default() -> Self {
        Self {
            method: EstimationMethod::default(),
            planar: false,
            include_gdop: true,
            initial_guess: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionResponse {
    pub estimate: PositionEstimate,
    pub method: EstimationMethod,
    pub valid_ranges: usize,
    pub precision: Option<PrecisionMetric>,
    /// Why GDOP is missing when it was asked for; the estimate still stands
    pub precision_error: Option<ErrorResponse>,
    /// `gdop × range_sigma`, in metres
    pub position_uncertainty_m: Option<f64>,
    /// Horizontal position in map coordinates when a frame is configured
    pub map_position: Option<Point2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub waypoints: Vec<Waypoint>,
    pub length: f64,
    /// Waypoints in map coordinates when a frame is configured
    pub map_points: Option<Vec<Point2>>,
}

/// Inputs for a scale calibration run with the tag held at anchor 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPlan {
    /// Anchor indices whose map offsets are known
    pub first_anchor: usize,
    pub second_anchor: usize,
    /// Map-unit offsets of those anchors from anchor 0
    pub first_offset: Point2,
    pub second_offset: Point2,
    /// Give up after reading this many epochs
    pub max_epochs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("Linear".parse::<EstimationMethod>(), Ok(EstimationMethod::Linear));
        assert_eq!("nonlinear".parse::<EstimationMethod>(), Ok(EstimationMethod::Nonlinear));
        assert!("kalman".parse::<EstimationMethod>().is_err());
        assert_eq!(EstimationMethod::Refined.to_string(), "refined");
    }

    #[test]
    fn test_query_json_defaults() {
        let query: PositionQuery = serde_json::from_str(r#"{"method": "linear"}"#).unwrap();
        assert_eq!(query.method, EstimationMethod::Linear);
        assert!(query.include_gdop);
        assert!(!query.planar);
    }

    #[test]
    fn test_error_response_carries_kind() {
        let error = ApiError::from(NavError::NoRouteFound {
            from: "start".into(),
            to: "destination".into(),
        });
        let response = ErrorResponse::from(&error);
        assert_eq!(response.kind, "NoRouteFound");
        assert!(error.as_nav().is_some());
        assert_eq!(ApiError::from(ProviderError::Exhausted).kind(), "ProviderError");
    }
}
