//! Replay of pre-recorded range epochs for testing and development

use crate::core::types::{AnchorSet, RangeVector};
use crate::hardware::error::{ProviderError, ProviderResult};
use crate::hardware::RangeProvider;
use std::collections::VecDeque;

/// Hands back recorded epochs in order. It never synthesises a reading;
/// once the recording is used up every read fails with `Exhausted`.
#[derive(Debug, Clone, Default)]
pub struct ReplayRangeProvider {
    epochs: VecDeque<RangeVector>,
    delivered: usize,
}

impl ReplayRangeProvider {
    /// Replay `epochs` in order
    pub fn new(epochs: Vec<RangeVector>) -> Self {
        Self {
            epochs: epochs.into(),
            delivered: 0,
        }
    }

    /// Record of fully valid epochs
    pub fn from_meters(epochs: &[Vec<f64>]) -> Self {
        Self::new(epochs.iter().map(|e| RangeVector::from_meters(e)).collect())
    }

    /// Append one epoch
    pub fn push(&mut self, epoch: RangeVector) {
        self.epochs.push_back(epoch);
    }

    /// Epochs not yet read
    pub fn remaining(&self) -> usize {
        self.epochs.len()
    }

    /// Epochs handed out so far
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl RangeProvider for ReplayRangeProvider {
    fn read_ranges(&mut self, anchors: &AnchorSet) -> ProviderResult<RangeVector> {
        let epoch = self.epochs.pop_front().ok_or(ProviderError::Exhausted)?;
        if epoch.len() != anchors.len() {
            return Err(ProviderError::LengthMismatch {
                expected: anchors.len(),
                actual: epoch.len(),
            });
        }
        self.delivered += 1;
        Ok(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Anchor;

    #[test]
    fn test_replays_in_order_then_exhausts() {
        let anchors = AnchorSet::new(vec![
            Anchor::new("a", 0.0, 0.0, 0.0),
            Anchor::new("b", 1.0, 0.0, 0.0),
        ])
        .unwrap();
        let mut provider = ReplayRangeProvider::from_meters(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        provider.push(RangeVector::new(vec![None, Some(5.0)]));
        assert_eq!(provider.remaining(), 3);

        assert_eq!(provider.read_ranges(&anchors).unwrap().get(0), Some(1.0));
        assert_eq!(provider.read_ranges(&anchors).unwrap().get(1), Some(4.0));
        assert_eq!(provider.read_ranges(&anchors).unwrap().get(0), None);
        assert_eq!(provider.delivered(), 3);
        assert_eq!(provider.remaining(), 0);
        assert!(matches!(provider.read_ranges(&anchors), Err(ProviderError::Exhausted)));
    }

    #[test]
    fn test_misaligned_epoch_is_rejected() {
        let anchors = AnchorSet::new(vec![Anchor::new("a", 0.0, 0.0, 0.0)]).unwrap();
        let mut provider = ReplayRangeProvider::from_meters(&[vec![1.0, 2.0]]);
        assert!(matches!(
            provider.read_ranges(&anchors),
            Err(ProviderError::LengthMismatch { expected: 1, actual: 2 })
        ));
    }
}
