//! Command-line surface and validated run configuration.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::fs::LocalFs;

/// Keep a replica folder identical to a source folder.
#[derive(Debug, Clone, Parser)]
#[command(name = "foldersync", version, about)]
pub struct Cli {
    /// Folder to mirror from
    pub source: PathBuf,

    /// Folder kept identical to the source (created if missing)
    pub replica: PathBuf,

    /// File that receives the log (appended, directory created if missing)
    pub log_file: PathBuf,

    /// Seconds between synchronization runs
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
}

/// Settings for a mirroring run, with absolute, normalized paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub log_file: PathBuf,
    pub interval: Duration,
}

impl MirrorConfig {
    /// Resolve relative paths against the current directory and validate.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
        Self::resolve(cli, &cwd)
    }

    /// Like `from_cli`, with an explicit base for relative paths.
    pub fn resolve(cli: Cli, base: &Path) -> Result<Self, ConfigError> {
        let absolute = |path: &Path| LocalFs::normalize_path(&base.join(path));

        let config = Self {
            source: absolute(&cli.source),
            replica: absolute(&cli.replica),
            log_file: absolute(&cli.log_file),
            interval: Duration::from_secs(cli.interval),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.source == self.replica {
            return Err(ConfigError::SameDirectory {
                path: self.source.clone(),
            });
        }

        // A replica inside the source would be mirrored into itself, and a
        // source inside the replica would be deleted as a replica-only entry
        if self.replica.starts_with(&self.source) {
            return Err(ConfigError::NestedTrees {
                outer: self.source.clone(),
                inner: self.replica.clone(),
            });
        }
        if self.source.starts_with(&self.replica) {
            return Err(ConfigError::NestedTrees {
                outer: self.replica.clone(),
                inner: self.source.clone(),
            });
        }

        if self.log_file.starts_with(&self.replica) {
            return Err(ConfigError::LogInsideReplica {
                log_file: self.log_file.clone(),
                replica: self.replica.clone(),
            });
        }

        Ok(())
    }
}
