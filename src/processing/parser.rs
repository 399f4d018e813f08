use crate::core::constants::{ANCHOR_ID_BYTES, RANGE_FAILURE_MARKER_CM, RANGE_PAYLOAD_BYTES};
use crate::core::types::{AnchorSet, RangeVector};
use log::{debug, trace};
use thiserror::Error;

/// Errors raised while preparing to decode range frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("anchor id '{id}' is not {expected} hex-encoded bytes: {reason}")]
    InvalidAnchorId {
        id: String,
        expected: usize,
        reason: String,
    },
}

/// Decodes the ranging module's serial output into a [`RangeVector`].
///
/// A frame carries, for each anchor it heard, the anchor's 8-byte id
/// followed by the distance in centimetres as a little-endian 32-bit value.
/// The records may appear at any offset and in any order.
#[derive(Debug, Clone)]
pub struct RangeFrameParser {
    wire_ids: Vec<[u8; ANCHOR_ID_BYTES]>,
}

impl RangeFrameParser {
    /// Prepare a parser for `anchors`, whose ids must be 16 hex digits
    pub fn new(anchors: &AnchorSet) -> Result<Self, FrameError> {
        let wire_ids = anchors
            .iter()
            .map(|a| decode_anchor_id(&a.id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { wire_ids })
    }

    /// Number of anchors this parser decodes
    pub fn anchor_count(&self) -> usize {
        self.wire_ids.len()
    }

    /// One-shot decode without keeping a parser around
    pub fn decode(frame: &[u8], anchors: &AnchorSet) -> Result<RangeVector, FrameError> {
        Ok(Self::new(anchors)?.parse(frame))
    }

    /// Decode a frame. Anchors whose id is missing, whose payload is cut
    /// short, or whose value is the device failure marker are invalid.
    pub fn parse(&self, frame: &[u8]) -> RangeVector {
        let ranges = self
            .wire_ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let range = read_distance(frame, id);
                if range.is_none() {
                    debug!("no usable range for anchor index {}", index);
                }
                range
            })
            .collect();
        RangeVector::new(ranges)
    }
}

fn read_distance(frame: &[u8], id: &[u8; ANCHOR_ID_BYTES]) -> Option<f64> {
    let start = frame.windows(ANCHOR_ID_BYTES).position(|w| w == id)?;
    let payload_start = start + ANCHOR_ID_BYTES;
    let payload = frame.get(payload_start..payload_start + RANGE_PAYLOAD_BYTES)?;

    let mut raw = [0u8; RANGE_PAYLOAD_BYTES];
    raw.copy_from_slice(payload);
    let centimetres = u32::from_le_bytes(raw);
    trace!("raw distance {} cm at offset {}", centimetres, payload_start);

    if centimetres >= RANGE_FAILURE_MARKER_CM {
        return None;
    }
    Some(f64::from(centimetres) / 100.0)
}

fn decode_anchor_id(id: &str) -> Result<[u8; ANCHOR_ID_BYTES], FrameError> {
    let mut bytes = [0u8; ANCHOR_ID_BYTES];
    hex::decode_to_slice(id, &mut bytes).map_err(|e| FrameError::InvalidAnchorId {
        id: id.to_string(),
        expected: ANCHOR_ID_BYTES,
        reason: e.to_string(),
    })?;
    Ok(bytes)
}
