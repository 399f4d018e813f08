//! Range acquisition from the ranging module
//!
//! Acquisition is the only blocking part of a position cycle; everything
//! downstream of a [`RangeProvider`] is pure computation.

pub mod error;
pub mod mock;
pub mod stream;

pub use error::{ProviderError, ProviderResult};
pub use mock::ReplayRangeProvider;
pub use stream::StreamRangeProvider;

use crate::core::types::{AnchorSet, RangeVector};

/// Source of range epochs aligned with an anchor set
pub trait RangeProvider {
    /// Block until the next epoch is available. Entry `i` of the result is
    /// the distance to anchor `i`, or `None` when that reading failed.
    fn read_ranges(&mut self, anchors: &AnchorSet) -> ProviderResult<RangeVector>;
}
