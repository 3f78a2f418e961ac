//! Infrastructure layer: I/O boundary implementations

pub mod traits;

pub use traits::{EnvSource, FileSystem, MapEnv, RealEnv, RealFileSystem};
