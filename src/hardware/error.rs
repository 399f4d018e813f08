//! Range acquisition errors

use crate::processing::parser::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("I/O error while reading ranges: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame decode error: {0}")]
    Frame(#[from] FrameError),

    /// The source has no more epochs to deliver
    #[error("range source exhausted")]
    Exhausted,

    #[error("range epoch has {actual} entries but {expected} anchors are configured")]
    LengthMismatch { expected: usize, actual: usize },
}

impl ProviderError {
    /// Whether a later read may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            ProviderError::Frame(_) | ProviderError::Exhausted | ProviderError::LengthMismatch { .. } => false,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = ProviderError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(timeout.is_transient());
        assert!(!ProviderError::Exhausted.is_transient());
        assert_eq!(
            ProviderError::LengthMismatch { expected: 4, actual: 3 }.to_string(),
            "range epoch has 3 entries but 4 anchors are configured"
        );
    }
}
