//! Error types emitted by the Wayfarer CLI.

use std::sync::Arc;

use thiserror::Error;
use wayfarer_core::StoreError;

/// Errors emitted by the Wayfarer CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The map store rejected or failed the request.
    #[error("store request failed with status {}: {source}", .source.status_code())]
    Store {
        #[from]
        source: StoreError,
    },
    /// Serialising the command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing the command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl From<wayfarer_core::StorageError> for CliError {
    fn from(source: wayfarer_core::StorageError) -> Self {
        Self::Store {
            source: StoreError::from(source),
        }
    }
}
