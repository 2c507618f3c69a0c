//! Match execution engine

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::ForfeitPolicy;
use crate::error::DecisionError;
use crate::journal::RoundSink;
use crate::random::{MatchRng, SeededRng};
use crate::rules::{RoundOutcome, RuleSet, ScoringTable};
use crate::strategy::{DeceptionBucket, Decider, MatchState, Move, Side};

/// Why a bot forfeited a round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    InvalidMove,
    BotExecution,
}

impl From<&DecisionError> for FaultKind {
    fn from(err: &DecisionError) -> Self {
        match err {
            DecisionError::InvalidMove { .. } => FaultKind::InvalidMove,
            DecisionError::BotExecution { .. } => FaultKind::BotExecution,
        }
    }
}

/// One journal line. Field order is part of the on-disk format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub match_index: u32,
    pub round: u32,
    pub bot_a: String,
    pub bot_b: String,
    pub move_a: Option<Move>,
    pub move_b: Option<Move>,
    pub fault_a: Option<FaultKind>,
    pub fault_b: Option<FaultKind>,
    pub outcome: RoundOutcome,
    /// Cumulative within the match
    pub score_a: i64,
    /// Cumulative within the match
    pub score_b: i64,
    /// Present only in leagues with deception tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deception: Option<DeceptionRecord>,
}

/// What each bot showed its opponent in a round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeceptionRecord {
    pub visible_a: Option<Move>,
    pub visible_b: Option<Move>,
    pub shadow_a: bool,
    pub shadow_b: bool,
    /// Buckets after this round's tokens were spent
    pub bucket_a: DeceptionBucket,
    pub bucket_b: DeceptionBucket,
}

/// Result of a complete match
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_index: u32,
    pub bot_a: String,
    pub bot_b: String,
    pub rounds_played: u32,
    pub score_a: i64,
    pub score_b: i64,
    /// `AWins`, `BWins` or `Tie`
    pub outcome: RoundOutcome,
    pub winner: Option<String>,
    /// Set when the match ended on a single bot's fault under `ForfeitPolicy::Match`
    pub forfeited_by: Option<Side>,
    pub moves_a: BTreeMap<Move, u32>,
    pub moves_b: BTreeMap<Move, u32>,
    pub faults_a: u32,
    pub faults_b: u32,
    /// Deception tokens spent on accepted shadow moves
    #[serde(default)]
    pub tokens_used_a: u32,
    #[serde(default)]
    pub tokens_used_b: u32,
}

impl MatchResult {
    pub fn bot(&self, side: Side) -> &str {
        match side {
            Side::A => &self.bot_a,
            Side::B => &self.bot_b,
        }
    }

    pub fn tokens_used(&self, side: Side) -> u32 {
        match side {
            Side::A => self.tokens_used_a,
            Side::B => self.tokens_used_b,
        }
    }
}

/// Fixed parameters for one match
#[derive(Clone, Copy, Debug)]
pub struct MatchContext<'a> {
    pub match_index: u32,
    pub round_count: u32,
    pub rules: &'a RuleSet,
    pub scoring: ScoringTable,
    pub forfeit_policy: ForfeitPolicy,
    /// Tokens each bot starts with; 0 turns shadow moves off
    pub deception_tokens: u32,
    pub shadow_reject_percent: u8,
}

/// A seated bot
pub struct Contender<'a> {
    pub name: &'a str,
    pub decider: &'a mut dyn Decider,
}

/// Per-side running state
#[derive(Default)]
struct Seat {
    /// Real moves
    history: Vec<Option<Move>>,
    /// Moves as the opponent saw them
    visible: Vec<Option<Move>>,
    score: i64,
    counts: BTreeMap<Move, u32>,
    faults: u32,
    tokens: u32,
    tokens_used: u32,
}

impl Seat {
    fn new(ctx: &MatchContext<'_>) -> Self {
        let capacity = ctx.round_count as usize;
        Seat {
            history: Vec::with_capacity(capacity),
            visible: Vec::with_capacity(capacity),
            tokens: ctx.deception_tokens,
            ..Default::default()
        }
    }
}

/// Run a complete match between two bots
///
/// Each round is streamed to `sink` as soon as both moves are resolved.
/// Bot failures never escape this function: errors, panics and moves outside
/// the rule set all become forfeits.
///
/// With deception tokens, a bot with a valid move may also be asked for a
/// shadow move. An accepted shadow costs one token and is what the opponent
/// sees in its history; scoring always uses the real move.
pub fn play_match(
    bot_a: Contender<'_>,
    bot_b: Contender<'_>,
    rng: &mut MatchRng,
    ctx: &MatchContext<'_>,
    sink: &mut dyn RoundSink,
) -> MatchResult {
    let mut seat_a = Seat::new(ctx);
    let mut seat_b = Seat::new(ctx);
    let mut forfeited_by = None;
    let mut double_forfeit = false;
    let mut rounds_played = 0;

    for round in 0..ctx.round_count {
        // Both decisions see the same snapshot of prior rounds
        let decision_a = {
            let state = observe(ctx, round, &seat_a, &seat_b);
            invoke(bot_a.decider, &state, rng.side(Side::A))
        };
        let decision_b = {
            let state = observe(ctx, round, &seat_b, &seat_a);
            invoke(bot_b.decider, &state, rng.side(Side::B))
        };
        let shadow_a = {
            let state = observe(ctx, round, &seat_a, &seat_b);
            request_shadow(bot_a.name, bot_a.decider, &state, &decision_a, ctx, rng.side(Side::A))
        };
        let shadow_b = {
            let state = observe(ctx, round, &seat_b, &seat_a);
            request_shadow(bot_b.name, bot_b.decider, &state, &decision_b, ctx, rng.side(Side::B))
        };

        let outcome = match (&decision_a, &decision_b) {
            (Ok(a), Ok(b)) => ctx.rules.resolve(*a, *b),
            (Err(_), Ok(_)) => RoundOutcome::BWins,
            (Ok(_), Err(_)) => RoundOutcome::AWins,
            (Err(_), Err(_)) => RoundOutcome::DoubleForfeit,
        };
        let (points_a, points_b) = ctx.scoring.points(outcome);
        seat_a.score += points_a as i64;
        seat_b.score += points_b as i64;

        let fault_a = settle(&mut seat_a, &decision_a, shadow_a, &bot_a, ctx.match_index, round);
        let fault_b = settle(&mut seat_b, &decision_b, shadow_b, &bot_b, ctx.match_index, round);
        let deception = (ctx.deception_tokens > 0).then(|| DeceptionRecord {
            visible_a: seat_a.visible.last().copied().flatten(),
            visible_b: seat_b.visible.last().copied().flatten(),
            shadow_a: shadow_a.is_some(),
            shadow_b: shadow_b.is_some(),
            bucket_a: DeceptionBucket::from_tokens(seat_a.tokens),
            bucket_b: DeceptionBucket::from_tokens(seat_b.tokens),
        });

        sink.record_round(&RoundRecord {
            match_index: ctx.match_index,
            round,
            bot_a: bot_a.name.to_string(),
            bot_b: bot_b.name.to_string(),
            move_a: decision_a.as_ref().ok().copied(),
            move_b: decision_b.as_ref().ok().copied(),
            fault_a,
            fault_b,
            outcome,
            score_a: seat_a.score,
            score_b: seat_b.score,
            deception,
        });
        rounds_played += 1;

        if ctx.forfeit_policy == ForfeitPolicy::Match {
            match (fault_a.is_some(), fault_b.is_some()) {
                (true, true) => double_forfeit = true,
                (true, false) => forfeited_by = Some(Side::A),
                (false, true) => forfeited_by = Some(Side::B),
                (false, false) => continue,
            }
            break;
        }
    }

    let outcome = match forfeited_by {
        Some(Side::A) => RoundOutcome::BWins,
        Some(Side::B) => RoundOutcome::AWins,
        None if double_forfeit => RoundOutcome::Tie,
        None => match seat_a.score.cmp(&seat_b.score) {
            std::cmp::Ordering::Greater => RoundOutcome::AWins,
            std::cmp::Ordering::Less => RoundOutcome::BWins,
            std::cmp::Ordering::Equal => RoundOutcome::Tie,
        },
    };
    let winner = match outcome {
        RoundOutcome::AWins => Some(bot_a.name.to_string()),
        RoundOutcome::BWins => Some(bot_b.name.to_string()),
        _ => None,
    };

    debug!(
        "match {} {} vs {}: {}-{} over {} rounds ({:?})",
        ctx.match_index, bot_a.name, bot_b.name, seat_a.score, seat_b.score, rounds_played, outcome
    );

    MatchResult {
        match_index: ctx.match_index,
        bot_a: bot_a.name.to_string(),
        bot_b: bot_b.name.to_string(),
        rounds_played,
        score_a: seat_a.score,
        score_b: seat_b.score,
        outcome,
        winner,
        forfeited_by,
        moves_a: seat_a.counts,
        moves_b: seat_b.counts,
        faults_a: seat_a.faults,
        faults_b: seat_b.faults,
        tokens_used_a: seat_a.tokens_used,
        tokens_used_b: seat_b.tokens_used,
    }
}

fn observe<'a>(ctx: &MatchContext<'a>, round: u32, me: &'a Seat, them: &'a Seat) -> MatchState<'a> {
    MatchState {
        round,
        rounds_total: ctx.round_count,
        my_moves: &me.history,
        opponent_moves: &them.visible,
        my_score: me.score,
        opponent_score: them.score,
        rules: ctx.rules,
        my_tokens: me.tokens,
        opponent_bucket: DeceptionBucket::from_tokens(them.tokens),
    }
}

/// Ask a bot for its move, containing any failure
fn invoke(
    decider: &mut dyn Decider,
    state: &MatchState<'_>,
    rng: &mut SeededRng,
) -> Result<Move, DecisionError> {
    match panic::catch_unwind(AssertUnwindSafe(|| decider.decide(state, rng))) {
        Ok(Ok(mv)) if state.rules.contains(mv) => Ok(mv),
        Ok(Ok(mv)) => Err(DecisionError::unsupported_move(mv)),
        Ok(Err(err)) => Err(err),
        Err(payload) => Err(DecisionError::execution(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Ask a bot with tokens left for a shadow move and decide whether it is
/// accepted. The rejection draw comes from the bot's own stream.
fn request_shadow(
    name: &str,
    decider: &mut dyn Decider,
    state: &MatchState<'_>,
    decision: &Result<Move, DecisionError>,
    ctx: &MatchContext<'_>,
    rng: &mut SeededRng,
) -> Option<Move> {
    let real = *decision.as_ref().ok()?;
    if state.my_tokens == 0 {
        return None;
    }

    let requested = match panic::catch_unwind(AssertUnwindSafe(|| decider.shadow(state, real, rng))) {
        Ok(requested) => requested?,
        Err(payload) => {
            warn!(
                "match {} round {}: {name} panicked choosing a shadow move: {}",
                ctx.match_index,
                state.round,
                panic_message(payload.as_ref())
            );
            return None;
        }
    };

    if rng.next_range(100) < u32::from(ctx.shadow_reject_percent) {
        return None;
    }
    if !state.rules.contains(requested) {
        warn!(
            "match {} round {}: {name} shadow move {requested} ignored, not in the rule set",
            ctx.match_index, state.round
        );
        return None;
    }
    Some(requested)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Push the round into a seat's history, returning the fault if any
fn settle(
    seat: &mut Seat,
    decision: &Result<Move, DecisionError>,
    shadow: Option<Move>,
    bot: &Contender<'_>,
    match_index: u32,
    round: u32,
) -> Option<FaultKind> {
    match decision {
        Ok(mv) => {
            seat.history.push(Some(*mv));
            *seat.counts.entry(*mv).or_insert(0) += 1;
            if shadow.is_some() {
                seat.tokens = seat.tokens.saturating_sub(1);
                seat.tokens_used += 1;
            }
            seat.visible.push(shadow.or(Some(*mv)));
            None
        }
        Err(err) => {
            warn!("match {match_index} round {round}: {} forfeits: {err}", bot.name);
            seat.history.push(None);
            seat.visible.push(None);
            seat.faults += 1;
            Some(FaultKind::from(err))
        }
    }
}
