//! Position estimation algorithms

pub mod coordinates;
pub mod gdop;
pub mod multilateration;
pub mod trilateration;

pub use coordinates::{LocalFrame, ScaleCalibrator};
pub use gdop::{GdopQuality, PrecisionEstimator, PrecisionMetric};
pub use multilateration::{NonlinearMultilaterator, SolverConfig};
pub use trilateration::LinearTrilaterator;
