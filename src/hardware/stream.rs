use crate::core::constants::FRAME_BYTES_PER_ANCHOR;
use crate::core::types::{AnchorSet, RangeVector};
use crate::hardware::error::{ProviderError, ProviderResult};
use crate::hardware::RangeProvider;
use crate::processing::parser::RangeFrameParser;
use log::{debug, warn};
use std::io::{ErrorKind, Read};

/// Reads ranging frames from a byte stream such as an opened serial port.
///
/// Each epoch reads up to `FRAME_BYTES_PER_ANCHOR` bytes per configured
/// anchor and decodes whatever arrived. A short read still yields an epoch;
/// anchors whose records were not received are invalid.
pub struct StreamRangeProvider<R: Read> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: Read> StreamRangeProvider<R> {
    /// Wrap an opened byte stream
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }

    fn fill(&mut self, wanted: usize) -> ProviderResult<usize> {
        self.buffer.clear();
        self.buffer.resize(wanted, 0);
        let mut filled = 0;
        while filled < wanted {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut && filled > 0 => {
                    warn!("read timed out after {} of {} bytes", filled, wanted);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.buffer.truncate(filled);
        Ok(filled)
    }
}

impl<R: Read> RangeProvider for StreamRangeProvider<R> {
    fn read_ranges(&mut self, anchors: &AnchorSet) -> ProviderResult<RangeVector> {
        let parser = RangeFrameParser::new(anchors)?;
        let received = self.fill(FRAME_BYTES_PER_ANCHOR * anchors.len())?;
        if received == 0 {
            return Err(ProviderError::Exhausted);
        }
        debug!("read {} frame bytes for {} anchors", received, anchors.len());
        Ok(parser.parse(&self.buffer))
    }
}
