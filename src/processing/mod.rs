//! Decoding of raw ranging-module output

pub mod parser;

pub use parser::{FrameError, RangeFrameParser};
