//! Compose descriptor toolkit: typed model, env interpolation, and
//! configuration validation.
//!
//! The crate is layered: `domain` holds the pure compose model,
//! `application` the services over it, `infrastructure` the I/O
//! boundaries, and `cli` the command surface.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
