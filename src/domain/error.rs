//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the descriptor model itself.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("empty descriptor")]
    EmptyDescriptor,

    #[error("descriptor is not a mapping at the top level")]
    NotAMapping,

    #[error("descriptor syntax: {message}")]
    Syntax { message: String },

    #[error("invalid port specification: {spec}")]
    InvalidPort { spec: String },

    #[error("invalid volume specification: {spec}")]
    InvalidMount { spec: String },

    #[error("invalid build specification: {spec}")]
    InvalidBuild { spec: String },

    #[error("required variable {name} is unset: {message}")]
    RequiredVariable { name: String, message: String },

    #[error("unterminated variable reference: {0}")]
    UnterminatedReference(String),

    #[error("unknown service: {0}")]
    UnknownService(String),
}
