//! Error taxonomy for estimation and routing

use crate::core::types::PositionEstimate;
use thiserror::Error;

/// Typed failures surfaced by the estimators and the router.
///
/// No component substitutes a default value for a failed computation; the
/// caller always receives one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    /// Too few anchors, or anchors that do not span the solution space
    #[error("insufficient geometry: {reason}")]
    InsufficientGeometry { reason: String },

    /// Iteration budget exhausted before the stopping tolerance was met.
    /// `last_estimate` is the final iterate, tagged `converged = false`.
    #[error("solver did not converge within {iterations} iterations (residual {residual:.3e})")]
    ConvergenceFailure {
        iterations: usize,
        residual: f64,
        last_estimate: PositionEstimate,
    },

    /// `GᵀG` cannot be inverted at the requested position
    #[error("singular geometry: {reason}")]
    SingularGeometry { reason: String },

    /// Malformed request or configuration
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The destination is not reachable from the start
    #[error("no route found from {from} to {to}")]
    NoRouteFound { from: String, to: String },
}

impl NavError {
    /// Stable name of the failure class, used in serialized responses
    pub fn kind(&self) -> &'static str {
        match self {
            NavError::InsufficientGeometry { .. } => "InsufficientGeometry",
            NavError::ConvergenceFailure { .. } => "ConvergenceFailure",
            NavError::SingularGeometry { .. } => "SingularGeometry",
            NavError::InvalidRequest { .. } => "InvalidRequest",
            NavError::NoRouteFound { .. } => "NoRouteFound",
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        NavError::InvalidRequest { reason: reason.into() }
    }

    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        NavError::InsufficientGeometry { reason: reason.into() }
    }

    pub(crate) fn singular(reason: impl Into<String>) -> Self {
        NavError::SingularGeometry { reason: reason.into() }
    }
}

/// Result type for estimation and routing operations
pub type NavResult<T> = Result<T, NavError>;
