//! Match Logic for Chaos League
//!
//! Deterministic tournament engine: seeded per-match randomness, the
//! round-robin schedule, rule-enforced match play, the replayable results
//! journal and the leaderboard. Bot discovery and the command line live
//! in the `chaos-league` program.

pub mod config;
pub mod error;
pub mod game;
pub mod journal;
pub mod leaderboard;
pub mod pairing;
pub mod random;
pub mod replay;
pub mod rules;
pub mod strategy;
pub mod tournament;
pub mod vm;

pub use config::{ForfeitPolicy, LeagueConfig, ENGINE_VERSION};
pub use error::{ConfigError, DecisionError, LeagueError, ReplayError};
pub use game::{play_match, Contender, DeceptionRecord, FaultKind, MatchContext, MatchResult, RoundRecord};
pub use journal::{NullSink, PersistenceStatus, ResultsRecorder, RoundSink, RunMetadata};
pub use leaderboard::{Leaderboard, Standing};
pub use pairing::{
    calculate_match_count, checked_match_count, pairing_for_match, round_robin_schedule, verify_schedule, ScheduledMatch,
};
pub use random::{MatchKey, RngController, SeedSalt, SeededRng};
pub use replay::{validate_journal, validate_match, ReplayCoverage, ReplayReport};
pub use rules::{RoundOutcome, RuleSet, RuleSetConfig, ScoringTable};
pub use strategy::{DeceptionBucket, Decider, Entrant, MatchState, Move, Side, Strategy, StrategyBase, StrategyParams};
pub use tournament::{Tournament, TournamentReport};
pub use vm::{BytecodeBot, BytecodeError};

/// Points for one round between two valid moves
/// Returns (score_a, score_b)
pub fn payoff(rules: &RuleSet, scoring: &ScoringTable, a: Move, b: Move) -> (i32, i32) {
    scoring.points(rules.resolve(a, b))
}
