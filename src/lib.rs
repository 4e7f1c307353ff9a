// Library module for foldersync
// Re-exports modules for use in integration tests and the binary

pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod shutdown;
pub mod sync;

pub use error::{ConfigError, EntryOperation, EntryOperationError, SyncError};
