//! Dominance and scoring tables
//!
//! A rule set fixes the active moves and, for every ordered pair of distinct
//! moves, which one wins. Tables are checked on construction so resolution
//! is total and anti-symmetric.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::strategy::Move;

const N: usize = Move::ALL.len();

/// How a round (or a match) came out
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    AWins,
    BWins,
    Tie,
    /// Both bots faulted in the same round
    DoubleForfeit,
}

/// Rule set selection as written in configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "preset", rename_all = "lowercase")]
pub enum RuleSetConfig {
    /// Rock, paper, scissors
    Classic,
    /// Rock, paper, scissors, lizard, Spock
    Rpsls,
    /// Explicit table: each active move maps to the moves it beats
    Custom { beats: BTreeMap<Move, Vec<Move>> },
}

impl Default for RuleSetConfig {
    fn default() -> Self {
        RuleSetConfig::Rpsls
    }
}

/// Validated dominance table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSet {
    moves: Vec<Move>,
    beats: [[bool; N]; N],
}

impl RuleSet {
    pub fn classic() -> Self {
        Self::from_edges(
            &[Move::Rock, Move::Paper, Move::Scissors],
            &[
                (Move::Rock, Move::Scissors),
                (Move::Paper, Move::Rock),
                (Move::Scissors, Move::Paper),
            ],
        )
    }

    pub fn rpsls() -> Self {
        Self::from_edges(
            &Move::ALL,
            &[
                (Move::Rock, Move::Scissors),
                (Move::Rock, Move::Lizard),
                (Move::Paper, Move::Rock),
                (Move::Paper, Move::Spock),
                (Move::Scissors, Move::Paper),
                (Move::Scissors, Move::Lizard),
                (Move::Lizard, Move::Paper),
                (Move::Lizard, Move::Spock),
                (Move::Spock, Move::Rock),
                (Move::Spock, Move::Scissors),
            ],
        )
    }

    /// Build from an explicit table, rejecting anything that is not a
    /// complete, anti-symmetric dominance relation over its moves
    pub fn custom(table: &BTreeMap<Move, Vec<Move>>) -> Result<Self, ConfigError> {
        let moves: Vec<Move> = table.keys().copied().collect();
        if moves.len() < 2 {
            return Err(ConfigError::TooFewMoves);
        }

        let mut beats = [[false; N]; N];
        for (winner, losers) in table {
            for loser in losers {
                if !table.contains_key(loser) {
                    return Err(ConfigError::UnknownMove(*loser));
                }
                if loser == winner {
                    return Err(ConfigError::SelfDominance(*winner));
                }
                if beats[winner.ordinal()][loser.ordinal()] {
                    return Err(ConfigError::DuplicateMove(*loser));
                }
                beats[winner.ordinal()][loser.ordinal()] = true;
            }
        }

        let rules = Self { moves, beats };
        rules.check_total()?;
        Ok(rules)
    }

    pub fn from_config(config: &RuleSetConfig) -> Result<Self, ConfigError> {
        match config {
            RuleSetConfig::Classic => Ok(Self::classic()),
            RuleSetConfig::Rpsls => Ok(Self::rpsls()),
            RuleSetConfig::Custom { beats } => Self::custom(beats),
        }
    }

    fn from_edges(moves: &[Move], edges: &[(Move, Move)]) -> Self {
        let mut beats = [[false; N]; N];
        for (w, l) in edges {
            beats[w.ordinal()][l.ordinal()] = true;
        }
        Self {
            moves: moves.to_vec(),
            beats,
        }
    }

    fn check_total(&self) -> Result<(), ConfigError> {
        for (i, a) in self.moves.iter().enumerate() {
            for b in &self.moves[i + 1..] {
                match (self.beats(*a, *b), self.beats(*b, *a)) {
                    (true, true) => return Err(ConfigError::MutualDominance { a: *a, b: *b }),
                    (false, false) => return Err(ConfigError::MissingDominance { a: *a, b: *b }),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Active moves in canonical order
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn contains(&self, mv: Move) -> bool {
        self.moves.contains(&mv)
    }

    /// Index of a move within the active set
    pub fn index_of(&self, mv: Move) -> Option<usize> {
        self.moves.iter().position(|m| *m == mv)
    }

    pub fn move_at(&self, index: usize) -> Option<Move> {
        self.moves.get(index).copied()
    }

    pub fn beats(&self, a: Move, b: Move) -> bool {
        self.beats[a.ordinal()][b.ordinal()]
    }

    /// Active moves that beat `mv`, in canonical order
    pub fn beaters_of(&self, mv: Move) -> Vec<Move> {
        self.moves.iter().copied().filter(|m| self.beats(*m, mv)).collect()
    }

    /// Resolve a round between two valid moves
    pub fn resolve(&self, a: Move, b: Move) -> RoundOutcome {
        if a == b {
            RoundOutcome::Tie
        } else if self.beats(a, b) {
            RoundOutcome::AWins
        } else {
            RoundOutcome::BWins
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::rpsls()
    }
}

/// Points awarded per round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTable {
    pub win: i32,
    pub tie: i32,
    pub loss: i32,
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self { win: 1, tie: 0, loss: -1 }
    }
}

impl ScoringTable {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.win > self.tie && self.tie > self.loss {
            Ok(())
        } else {
            Err(ConfigError::NonMonotonicScoring {
                win: self.win,
                tie: self.tie,
                loss: self.loss,
            })
        }
    }

    /// Returns (points_a, points_b)
    pub fn points(&self, outcome: RoundOutcome) -> (i32, i32) {
        match outcome {
            RoundOutcome::AWins => (self.win, self.loss),
            RoundOutcome::BWins => (self.loss, self.win),
            RoundOutcome::Tie => (self.tie, self.tie),
            RoundOutcome::DoubleForfeit => (self.loss, self.loss),
        }
    }
}
