//! Numerical tolerances and wire constants

/// Relative singular-value cutoff used to decide the numerical rank of a
/// trilateration coefficient matrix.
pub const RANK_TOLERANCE: f64 = 1e-9;

/// Relative cutoff below which `GᵀG` is treated as singular.
pub const SINGULARITY_TOLERANCE: f64 = 1e-12;

/// Distance under which a position is considered to sit on an anchor (m).
pub const COINCIDENCE_TOLERANCE_M: f64 = 1e-9;

/// Ranging devices report failed measurements with a value at or above this (cm).
pub const RANGE_FAILURE_MARKER_CM: u32 = 32_768;

/// Width of an anchor identifier on the wire (bytes).
pub const ANCHOR_ID_BYTES: usize = 8;

/// Width of the little-endian distance payload that follows an anchor id (bytes).
pub const RANGE_PAYLOAD_BYTES: usize = 4;

/// Bytes read from the ranging device per anchor in one epoch.
pub const FRAME_BYTES_PER_ANCHOR: usize = 66;

/// Largest distance the ranging device can report (m).
pub const MAX_DEVICE_RANGE_M: f64 = (RANGE_FAILURE_MARKER_CM - 1) as f64 / 100.0;
