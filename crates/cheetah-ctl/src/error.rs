//! Error types for cheetah-ctl

use cheetah_bfrt::BfrtError;
use cheetah_reconcile::ReconcileError;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Serialization for `save` failed
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The values are well-formed but inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Static state load errors. Every variant is fatal to the load step.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// The table did not come out of this run's clear as cleared or empty
    #[error("refusing to load {table}: table was not cleared in this run")]
    NotCleared { table: String },

    /// The device rejected a forwarding rule
    #[error("failed to add {rule} to {table}: {source}")]
    Rule {
        table: String,
        rule: String,
        #[source]
        source: BfrtError,
    },

    /// The device rejected a register write
    #[error("failed to reset register {name}[{index}]: {source}")]
    Register {
        name: String,
        index: u32,
        #[source]
        source: BfrtError,
    },

    /// The session was lost during the load
    #[error("transport failure during load: {source}")]
    Transport {
        #[source]
        source: BfrtError,
    },
}

impl LoadError {
    /// Returns the underlying device error, if any.
    pub fn cause(&self) -> Option<&BfrtError> {
        match self {
            LoadError::NotCleared { .. } => None,
            LoadError::Rule { source, .. }
            | LoadError::Register { source, .. }
            | LoadError::Transport { source } => Some(source),
        }
    }
}

/// Errors that stop a reconcile run
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("dump failed: {0}")]
    Dump(#[from] BfrtError),
}
