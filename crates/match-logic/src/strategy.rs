//! Moves, the bot decision contract, and the built-in strategies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DecisionError;
use crate::random::SeededRng;
use crate::rules::RuleSet;

/// A move a bot commits to for one round
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
    Lizard,
    Spock,
}

impl Move {
    /// Every move the engine knows about, in canonical order
    pub const ALL: [Move; 5] = [Move::Rock, Move::Paper, Move::Scissors, Move::Lizard, Move::Spock];

    pub fn name(self) -> &'static str {
        match self {
            Move::Rock => "ROCK",
            Move::Paper => "PAPER",
            Move::Scissors => "SCISSORS",
            Move::Lizard => "LIZARD",
            Move::Spock => "SPOCK",
        }
    }

    /// Position in `Move::ALL`
    pub fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown move: {0}")]
pub struct ParseMoveError(pub String);

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Move::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseMoveError(s.to_string()))
    }
}

/// Seat of a bot within a match
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

/// Coarse view of a bot's remaining deception tokens, shown to its opponent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeceptionBucket {
    High,
    Medium,
    Low,
    #[default]
    Empty,
}

impl DeceptionBucket {
    /// HIGH from 40 tokens, MEDIUM from 20, LOW from 1
    pub fn from_tokens(tokens: u32) -> Self {
        if tokens >= 40 {
            DeceptionBucket::High
        } else if tokens >= 20 {
            DeceptionBucket::Medium
        } else if tokens >= 1 {
            DeceptionBucket::Low
        } else {
            DeceptionBucket::Empty
        }
    }
}

/// What a bot may observe when deciding a round.
///
/// Histories hold `None` for rounds the player forfeited. The opponent's
/// history is what the opponent showed: a successful shadow move replaces
/// the real one there. The opponent's move for the current round is never
/// visible.
#[derive(Clone, Copy, Debug)]
pub struct MatchState<'a> {
    /// Current round (0-indexed)
    pub round: u32,
    /// Rounds scheduled for this match
    pub rounds_total: u32,
    pub my_moves: &'a [Option<Move>],
    pub opponent_moves: &'a [Option<Move>],
    pub my_score: i64,
    pub opponent_score: i64,
    /// Active rule set (move set and dominance)
    pub rules: &'a RuleSet,
    /// Deception tokens this bot has left
    pub my_tokens: u32,
    pub opponent_bucket: DeceptionBucket,
}

impl<'a> MatchState<'a> {
    pub fn opponent_last(&self) -> Option<Move> {
        self.opponent_moves.last().copied().flatten()
    }

    pub fn my_last(&self) -> Option<Move> {
        self.my_moves.last().copied().flatten()
    }

    /// Opponent's most frequent move so far; ties go to the earlier move
    pub fn opponent_most_frequent(&self) -> Option<Move> {
        let mut counts = [0u32; Move::ALL.len()];
        for m in self.opponent_moves.iter().flatten() {
            counts[m.ordinal()] += 1;
        }
        let mut best: Option<(Move, u32)> = None;
        for m in self.rules.moves() {
            let c = counts[m.ordinal()];
            if c > 0 && best.map_or(true, |(_, b)| c > b) {
                best = Some((*m, c));
            }
        }
        best.map(|(m, _)| m)
    }

    /// Number of opponent moves actually observed (forfeits excluded)
    pub fn opponent_observed(&self) -> usize {
        self.opponent_moves.iter().flatten().count()
    }
}

/// The decision capability every bot provides
pub trait Decider {
    fn decide(&mut self, state: &MatchState<'_>, rng: &mut SeededRng) -> Result<Move, DecisionError>;

    /// Move to show the opponent instead of `real`.
    ///
    /// Only asked while the bot still holds deception tokens. The request
    /// may still be rejected by the engine, in which case the real move is
    /// shown and no token is spent.
    fn shadow(&mut self, _state: &MatchState<'_>, _real: Move, _rng: &mut SeededRng) -> Option<Move> {
        None
    }
}

impl<F> Decider for F
where
    F: FnMut(&MatchState<'_>, &mut SeededRng) -> Result<Move, DecisionError>,
{
    fn decide(&mut self, state: &MatchState<'_>, rng: &mut SeededRng) -> Result<Move, DecisionError> {
        self(state, rng)
    }
}

/// Base strategy type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyBase {
    /// Uniform random while learning, then counters the opponent's favourite.
    Reference,
    /// Plays the first move that beats the opponent's most frequent move.
    FrequencyCounter,
    /// Uniform random choice each round.
    Chaos,
    /// Always the same move.
    Constant,
    /// Walks the move set in order.
    Cycle,
    /// Copies the opponent's last move.
    Mirror,
}

impl StrategyBase {
    pub const ALL: [StrategyBase; 6] = [
        StrategyBase::Reference,
        StrategyBase::FrequencyCounter,
        StrategyBase::Chaos,
        StrategyBase::Constant,
        StrategyBase::Cycle,
        StrategyBase::Mirror,
    ];
}

/// Strategy parameters for fine-tuning behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Move played by `Constant` (defaults to the first active move)
    pub fixed_move: Option<Move>,
    /// Opponent moves `Reference` observes before exploiting
    pub warmup_rounds: u32,
    /// Occasionally request a random shadow move once the opponent is low
    /// on deception tokens
    pub bluff: bool,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            fixed_move: None,
            warmup_rounds: 10,
            bluff: false,
        }
    }
}

/// Complete strategy with base type and parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub base: StrategyBase,
    #[serde(default)]
    pub params: StrategyParams,
}

impl Strategy {
    /// Create a new strategy with default parameters
    pub fn new(base: StrategyBase) -> Self {
        Self {
            base,
            params: StrategyParams::default(),
        }
    }

    /// Create with custom parameters
    pub fn with_params(base: StrategyBase, params: StrategyParams) -> Self {
        Self { base, params }
    }

    pub fn constant(mv: Move) -> Self {
        Self::with_params(
            StrategyBase::Constant,
            StrategyParams { fixed_move: Some(mv), ..Default::default() },
        )
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::new(StrategyBase::Reference)
    }
}

impl Decider for Strategy {
    fn decide(&mut self, state: &MatchState<'_>, rng: &mut SeededRng) -> Result<Move, DecisionError> {
        execute_strategy(self, state, rng)
    }

    fn shadow(&mut self, state: &MatchState<'_>, _real: Move, rng: &mut SeededRng) -> Option<Move> {
        if !self.params.bluff {
            return None;
        }
        if !matches!(state.opponent_bucket, DeceptionBucket::Low | DeceptionBucket::Empty) {
            return None;
        }
        if rng.next_range(10) >= BLUFF_CHANCE_IN_TEN {
            return None;
        }
        rng.choose(state.rules.moves()).copied()
    }
}

const BLUFF_CHANCE_IN_TEN: u32 = 3;

/// Execute a built-in strategy for one round
pub fn execute_strategy(
    strategy: &Strategy,
    state: &MatchState<'_>,
    rng: &mut SeededRng,
) -> Result<Move, DecisionError> {
    let moves = state.rules.moves();
    let first = *moves
        .first()
        .ok_or_else(|| DecisionError::execution("rule set has no moves"))?;

    let mv = match strategy.base {
        StrategyBase::Reference => execute_reference(state, &strategy.params, rng, first),
        StrategyBase::FrequencyCounter => execute_frequency_counter(state, first),
        StrategyBase::Chaos => *rng.choose(moves).unwrap_or(&first),
        StrategyBase::Constant => strategy.params.fixed_move.unwrap_or(first),
        StrategyBase::Cycle => moves[state.round as usize % moves.len()],
        StrategyBase::Mirror => state.opponent_last().unwrap_or(first),
    };
    Ok(mv)
}

/// Reference: random until the warmup is over, then a random counter
/// to the opponent's most frequent move
fn execute_reference(
    state: &MatchState<'_>,
    params: &StrategyParams,
    rng: &mut SeededRng,
    fallback: Move,
) -> Move {
    let moves = state.rules.moves();
    if state.opponent_observed() < params.warmup_rounds as usize {
        return *rng.choose(moves).unwrap_or(&fallback);
    }

    match state.opponent_most_frequent() {
        Some(favourite) => {
            let counters = state.rules.beaters_of(favourite);
            *rng.choose(&counters).unwrap_or(&fallback)
        }
        None => *rng.choose(moves).unwrap_or(&fallback),
    }
}

/// Frequency counter: deterministic counter to the opponent's favourite
fn execute_frequency_counter(state: &MatchState<'_>, fallback: Move) -> Move {
    state
        .opponent_most_frequent()
        .and_then(|favourite| state.rules.beaters_of(favourite).first().copied())
        .unwrap_or(fallback)
}

/// Get a human-readable description of a strategy
pub fn describe_strategy(strategy: &Strategy) -> String {
    let base_desc = match strategy.base {
        StrategyBase::Reference => "Plays randomly while learning, then counters the opponent's favourite move.",
        StrategyBase::FrequencyCounter => "Always plays the first counter to the opponent's most frequent move.",
        StrategyBase::Chaos => "Picks a uniformly random move every round.",
        StrategyBase::Constant => "Plays the same move every round.",
        StrategyBase::Cycle => "Cycles through the move set in order.",
        StrategyBase::Mirror => "Copies the opponent's previous move.",
    };

    let mut desc = base_desc.to_string();

    if let (StrategyBase::Constant, Some(mv)) = (strategy.base, strategy.params.fixed_move) {
        desc.push_str(&format!(" Always {mv}."));
    }

    if strategy.base == StrategyBase::Reference {
        desc.push_str(&format!(" Warmup: {} observed moves.", strategy.params.warmup_rounds));
    }

    if strategy.params.bluff {
        desc.push_str(" Bluffs against a low-token opponent.");
    }

    desc
}

/// A registered bot: its identity plus a factory for fresh deciders.
///
/// A new decider is spawned per match, so private bot state never carries
/// from one match into another.
pub struct Entrant {
    name: String,
    digest: Option<String>,
    factory: Box<dyn Fn() -> Box<dyn Decider>>,
}

impl Entrant {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Decider> + 'static,
    {
        Self {
            name: name.into(),
            digest: None,
            factory: Box::new(factory),
        }
    }

    pub fn builtin(name: impl Into<String>, strategy: Strategy) -> Self {
        Self::new(name, move || Box::new(strategy) as Box<dyn Decider>)
    }

    /// Attach a digest of the bot's source for the run metadata
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn spawn(&self) -> Box<dyn Decider> {
        (self.factory)()
    }
}

impl fmt::Debug for Entrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entrant")
            .field("name", &self.name)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rng() -> SeededRng {
        SeededRng::new(&[42u8; 32], 0)
    }

    fn state<'a>(
        rules: &'a RuleSet,
        mine: &'a [Option<Move>],
        theirs: &'a [Option<Move>],
    ) -> MatchState<'a> {
        MatchState {
            round: mine.len() as u32,
            rounds_total: 100,
            my_moves: mine,
            opponent_moves: theirs,
            my_score: 0,
            opponent_score: 0,
            rules,
            my_tokens: 0,
            opponent_bucket: DeceptionBucket::Empty,
        }
    }

    fn run(strategy: Strategy, st: &MatchState<'_>) -> Move {
        execute_strategy(&strategy, st, &mut make_rng()).unwrap()
    }

    #[test]
    fn test_move_parse_and_display() {
        assert_eq!("rock".parse::<Move>(), Ok(Move::Rock));
        assert_eq!(" SPOCK ".parse::<Move>(), Ok(Move::Spock));
        assert!("banana".parse::<Move>().is_err());
        assert_eq!(Move::Lizard.to_string(), "LIZARD");
        assert_eq!(serde_json::to_string(&Move::Paper).unwrap(), "\"PAPER\"");
    }

    #[test]
    fn test_frequency_counter_first_move_is_rock() {
        let rules = RuleSet::rpsls();
        let st = state(&rules, &[], &[]);
        assert_eq!(run(Strategy::new(StrategyBase::FrequencyCounter), &st), Move::Rock);
    }

    #[test]
    fn test_frequency_counter_counters_favourite() {
        let rules = RuleSet::rpsls();
        let theirs = [Some(Move::Rock), Some(Move::Rock), Some(Move::Paper)];
        let mine = [Some(Move::Rock); 3];
        let st = state(&rules, &mine, &theirs);
        // Paper is the first move in canonical order that beats Rock
        assert_eq!(run(Strategy::new(StrategyBase::FrequencyCounter), &st), Move::Paper);
    }

    #[test]
    fn test_most_frequent_ignores_forfeits_and_breaks_ties_by_order() {
        let rules = RuleSet::rpsls();
        let theirs = [None, Some(Move::Spock), Some(Move::Paper), None, None];
        let st = state(&rules, &[], &theirs);
        assert_eq!(st.opponent_most_frequent(), Some(Move::Paper));
        assert_eq!(st.opponent_observed(), 2);
    }

    #[test]
    fn test_reference_exploits_after_warmup() {
        let rules = RuleSet::classic();
        let theirs = vec![Some(Move::Scissors); 10];
        let mine = vec![Some(Move::Rock); 10];
        let st = state(&rules, &mine, &theirs);
        // Under classic rules only Rock beats Scissors
        for _ in 0..20 {
            assert_eq!(run(Strategy::new(StrategyBase::Reference), &st), Move::Rock);
        }
    }

    #[test]
    fn test_reference_stays_in_rule_set() {
        let rules = RuleSet::classic();
        let st = state(&rules, &[], &[]);
        let mut rng = make_rng();
        for _ in 0..200 {
            let mv = execute_strategy(&Strategy::default(), &st, &mut rng).unwrap();
            assert!(rules.contains(mv));
        }
    }

    #[test]
    fn test_cycle_and_mirror() {
        let rules = RuleSet::classic();
        let mine = [Some(Move::Rock), Some(Move::Paper)];
        let theirs = [Some(Move::Paper), Some(Move::Scissors)];
        let st = state(&rules, &mine, &theirs);
        assert_eq!(run(Strategy::new(StrategyBase::Cycle), &st), Move::Scissors);
        assert_eq!(run(Strategy::new(StrategyBase::Mirror), &st), Move::Scissors);

        let fresh = state(&rules, &[], &[]);
        assert_eq!(run(Strategy::new(StrategyBase::Mirror), &fresh), Move::Rock);
    }

    #[test]
    fn test_constant() {
        let rules = RuleSet::rpsls();
        let st = state(&rules, &[], &[]);
        assert_eq!(run(Strategy::constant(Move::Lizard), &st), Move::Lizard);
        assert_eq!(run(Strategy::new(StrategyBase::Constant), &st), Move::Rock);
    }

    #[test]
    fn test_closure_decider() {
        let rules = RuleSet::classic();
        let st = state(&rules, &[], &[]);
        let mut calls = 0;
        let mut bot = |_: &MatchState<'_>, _: &mut SeededRng| -> Result<Move, DecisionError> {
            calls += 1;
            Ok(Move::Paper)
        };
        assert_eq!(bot.decide(&st, &mut make_rng()), Ok(Move::Paper));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_entrant_spawns_fresh_deciders() {
        let entrant = Entrant::builtin("cycler", Strategy::new(StrategyBase::Cycle)).with_digest("abc");
        assert_eq!(entrant.name(), "cycler");
        assert_eq!(entrant.digest(), Some("abc"));

        let rules = RuleSet::classic();
        let st = state(&rules, &[], &[]);
        let mut d1 = entrant.spawn();
        let mut d2 = entrant.spawn();
        assert_eq!(d1.decide(&st, &mut make_rng()), d2.decide(&st, &mut make_rng()));
    }

    #[test]
    fn test_deception_buckets() {
        assert_eq!(DeceptionBucket::from_tokens(50), DeceptionBucket::High);
        assert_eq!(DeceptionBucket::from_tokens(40), DeceptionBucket::High);
        assert_eq!(DeceptionBucket::from_tokens(39), DeceptionBucket::Medium);
        assert_eq!(DeceptionBucket::from_tokens(20), DeceptionBucket::Medium);
        assert_eq!(DeceptionBucket::from_tokens(1), DeceptionBucket::Low);
        assert_eq!(DeceptionBucket::from_tokens(0), DeceptionBucket::Empty);
        assert_eq!(serde_json::to_string(&DeceptionBucket::Medium).unwrap(), "\"MEDIUM\"");
    }

    #[test]
    fn test_bluff_only_against_low_opponent() {
        let rules = RuleSet::rpsls();
        let mut bluffer = Strategy::with_params(
            StrategyBase::Chaos,
            StrategyParams { bluff: true, ..Default::default() },
        );
        let mut rng = make_rng();

        let mut st = state(&rules, &[], &[]);
        st.my_tokens = 50;
        st.opponent_bucket = DeceptionBucket::High;
        assert!((0..100).all(|_| bluffer.shadow(&st, Move::Rock, &mut rng).is_none()));

        st.opponent_bucket = DeceptionBucket::Low;
        let shown: Vec<Move> = (0..100).filter_map(|_| bluffer.shadow(&st, Move::Rock, &mut rng)).collect();
        assert!(!shown.is_empty() && shown.len() < 100);
        assert!(shown.iter().all(|m| rules.contains(*m)));

        let mut honest = Strategy::new(StrategyBase::Chaos);
        assert!((0..100).all(|_| honest.shadow(&st, Move::Rock, &mut rng).is_none()));
    }

    #[test]
    fn test_describe_strategy() {
        let desc = describe_strategy(&Strategy::constant(Move::Spock));
        assert!(desc.ends_with("Always SPOCK."));
        assert!(describe_strategy(&Strategy::default()).contains("Warmup: 10"));
    }
}
