//! Error types for the league engine

use std::path::PathBuf;

use thiserror::Error;

use crate::strategy::Move;

/// Why a bot's decision for a round was rejected.
///
/// Both variants are recovered as forfeits by the match engine and never
/// unwind the tournament.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    /// The bot produced something that is not a move of the active rule set
    #[error("invalid move: {detail}")]
    InvalidMove { detail: String },

    /// The bot failed while deciding (error, panic or exhausted budget)
    #[error("bot execution failed: {detail}")]
    BotExecution { detail: String },
}

impl DecisionError {
    pub fn invalid_move(detail: impl Into<String>) -> Self {
        DecisionError::InvalidMove { detail: detail.into() }
    }

    pub fn execution(detail: impl Into<String>) -> Self {
        DecisionError::BotExecution { detail: detail.into() }
    }

    /// Move outside the active rule set
    pub fn unsupported_move(mv: Move) -> Self {
        DecisionError::InvalidMove {
            detail: format!("{mv} is not part of the active rule set"),
        }
    }
}

/// Configuration rejected before a tournament is constructed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("rounds_per_match must be at least 1")]
    NoRounds,

    #[error("matches_per_pair must be at least 1")]
    NoMatchesPerPair,

    #[error("scoring table must satisfy win > tie > loss (got {win}/{tie}/{loss})")]
    NonMonotonicScoring { win: i32, tie: i32, loss: i32 },

    #[error("rule table needs at least two moves")]
    TooFewMoves,

    #[error("move {0} appears more than once in the rule table")]
    DuplicateMove(Move),

    #[error("rule table references {0}, which is not an active move")]
    UnknownMove(Move),

    #[error("{0} is listed as beating itself")]
    SelfDominance(Move),

    #[error("{a} and {b} both beat each other")]
    MutualDominance { a: Move, b: Move },

    #[error("neither {a} nor {b} beats the other")]
    MissingDominance { a: Move, b: Move },

    #[error("at least two bots are required, got {0}")]
    NotEnoughBots(usize),

    #[error("bot name must not be empty")]
    EmptyBotName,

    #[error("duplicate bot name: {0}")]
    DuplicateBot(String),

    #[error("{bots} bots with {legs} matches per pair exceed the u32 match index range")]
    TooManyMatches { bots: usize, legs: u32 },

    #[error("shadow reject percent must be at most 100, got {0}")]
    ShadowRejectPercent(u8),
}

/// Top-level engine error.
///
/// `ScheduleIntegrity` and `RngDerivation` are fatal: the run stops because
/// any result produced afterwards could not be reproduced.
#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("schedule integrity violated: {0}")]
    ScheduleIntegrity(String),

    #[error("rng derivation failed: {0}")]
    RngDerivation(String),

    #[error("persistence failed at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LeagueError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LeagueError::Persistence { path: path.into(), source }
    }

    /// Whether the run must abort on this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LeagueError::Persistence { .. } | LeagueError::Encode(_))
    }
}

/// Replay validation failures
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot read journal {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("journal line {line} is not a valid round record: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("journal line {line} is blank")]
    BlankLine { line: usize },

    #[error("journal line {line} differs: expected {expected}, found {found}")]
    Mismatch {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("journal ends after {found} records, expected {expected}")]
    Truncated { expected: usize, found: usize },

    #[error("journal has {extra} records beyond the regenerated tournament")]
    ExtraRecords { extra: usize },

    #[error(transparent)]
    League(#[from] LeagueError),
}
