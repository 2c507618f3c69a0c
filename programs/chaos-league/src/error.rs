//! Bot loading errors

use std::path::PathBuf;

use match_logic::vm::BytecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read bot directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read bot file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid bot definition {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} must set exactly one of `strategy` or `bytecode`")]
    AmbiguousDefinition(PathBuf),

    #[error("{0} uses the Constant strategy without a `move`")]
    MissingMove(PathBuf),

    #[error("invalid bytecode in {path}: {source}")]
    InvalidBytecode {
        path: PathBuf,
        #[source]
        source: BytecodeError,
    },

    #[error("bot file name {0} is not valid UTF-8")]
    BadName(PathBuf),

    #[error("no bot definitions (*.toml) found in {0}")]
    NoBots(PathBuf),
}
