//! Core types and constants for the positioning and routing system

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
