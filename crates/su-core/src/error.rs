use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by agent discovery and loading.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent '{0}' not found")]
    UnknownAgent(String),

    #[error("agent '{0}' is not a valid agent package")]
    InvalidAgent(String),

    #[error("invalid descriptor '{path}': {reason}")]
    Descriptor { path: PathBuf, reason: String },

    #[error("invalid graph definition in '{path}': {reason}")]
    GraphSpec { path: PathBuf, reason: String },

    #[error("graph symbol '{symbol}' not found in '{path}'")]
    MissingGraph { path: PathBuf, symbol: String },

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
