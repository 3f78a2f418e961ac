//! Domain layer: the compose model and pure logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod interpolation;

pub use entities::*;
pub use error::DomainError;
pub use interpolation::{interpolate_document, interpolate_str, Interpolated};
