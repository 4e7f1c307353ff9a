//! Filesystem primitives used by the sync engine.

pub mod backend;
pub mod copy;
pub mod local;
pub mod types;

pub use backend::Filesystem;
pub use local::LocalFs;
pub use types::*;
