//! Errors surfaced by the command line.

use std::path::PathBuf;

use thiserror::Error;

use proofline_contracts::error::ProoflineError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no proof JSON files found in '{path}'")]
    EmptyDirectory { path: PathBuf },

    #[error("--media applies to a single proof file, not the directory '{path}'")]
    MediaWithDirectory { path: PathBuf },

    #[error("'{path}' is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error(transparent)]
    Proofline(#[from] ProoflineError),
}

pub type CliResult<T> = Result<T, CliError>;
