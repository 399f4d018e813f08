//! Error taxonomy and measurement validation

pub mod data;
pub mod error;

pub use data::{RangeValidator, ValidationConfig};
pub use error::{NavError, NavResult};
