//! Deterministic round-robin pairing
//!
//! Bots are referred to by their index in the name-sorted entrant list.
//! Pairs come in lexicographic order `(i, j)` with `i < j`; each pair is
//! repeated `legs` times back to back. Any match can be looked up in O(1)
//! from its index without materializing the schedule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LeagueError;

/// One scheduled match
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMatch {
    pub match_index: u32,
    /// Lower bot index (seat A)
    pub a: u32,
    /// Higher bot index (seat B)
    pub b: u32,
    /// Repetition of this pair, `0..legs`
    pub leg: u32,
}

fn wide_pair_count(n: u32) -> u64 {
    let n = u64::from(n);
    if n < 2 {
        0
    } else {
        n * (n - 1) / 2
    }
}

/// Number of unordered pairs among `n` bots, saturating at `u32::MAX`
pub fn pair_count(n: u32) -> u32 {
    u32::try_from(wide_pair_count(n)).unwrap_or(u32::MAX)
}

/// Total number of matches, `None` when match indices would not fit a `u32`
pub fn checked_match_count(participant_count: u32, legs: u32) -> Option<u32> {
    u32::try_from(wide_pair_count(participant_count))
        .ok()?
        .checked_mul(legs)
}

/// Total number of matches, O(1) without allocation.
///
/// Saturates at `u32::MAX`; leagues are checked with
/// [`checked_match_count`] before they are scheduled.
pub fn calculate_match_count(participant_count: u32, legs: u32) -> u32 {
    checked_match_count(participant_count, legs).unwrap_or(u32::MAX)
}

/// Generate every match of the tournament in play order
pub fn round_robin_schedule(participant_count: u32, legs: u32) -> Vec<ScheduledMatch> {
    let n = participant_count;
    let mut schedule = Vec::with_capacity(calculate_match_count(n, legs) as usize);
    let mut match_index = 0u32;

    for a in 0..n {
        for b in (a + 1)..n {
            for leg in 0..legs {
                schedule.push(ScheduledMatch { match_index, a, b, leg });
                match_index += 1;
            }
        }
    }

    schedule
}

/// Get the pairing for a specific match index in O(1) memory
pub fn pairing_for_match(participant_count: u32, legs: u32, match_index: u32) -> Option<ScheduledMatch> {
    let n = participant_count;
    let total = calculate_match_count(n, legs);
    if match_index >= total {
        return None;
    }

    let pair_rank = match_index / legs;
    let leg = match_index % legs;
    let (a, b) = unrank_lex(pair_rank, n);
    Some(ScheduledMatch { match_index, a, b, leg })
}

/// Check that a schedule is the complete, ordered round robin.
///
/// Any violation means the run could not be reproduced, so it is reported
/// as a fatal `ScheduleIntegrity` error.
pub fn verify_schedule(
    participant_count: u32,
    legs: u32,
    schedule: &[ScheduledMatch],
) -> Result<(), LeagueError> {
    let n = participant_count;
    let expected = calculate_match_count(n, legs);
    if schedule.len() != expected as usize {
        return Err(LeagueError::ScheduleIntegrity(format!(
            "expected {expected} matches, found {}",
            schedule.len()
        )));
    }

    let mut seen: BTreeMap<(u32, u32), u32> = BTreeMap::new();
    for (position, m) in schedule.iter().enumerate() {
        if m.match_index != position as u32 {
            return Err(LeagueError::ScheduleIntegrity(format!(
                "match at position {position} has index {}",
                m.match_index
            )));
        }
        if m.a == m.b {
            return Err(LeagueError::ScheduleIntegrity(format!(
                "match {} pairs bot {} with itself",
                m.match_index, m.a
            )));
        }
        if m.a > m.b || m.b >= n {
            return Err(LeagueError::ScheduleIntegrity(format!(
                "match {} has invalid pair ({}, {})",
                m.match_index, m.a, m.b
            )));
        }
        let count = seen.entry((m.a, m.b)).or_insert(0);
        *count += 1;
        if *count > legs {
            return Err(LeagueError::ScheduleIntegrity(format!(
                "pair ({}, {}) scheduled more than {legs} times",
                m.a, m.b
            )));
        }
        if pairing_for_match(n, legs, m.match_index) != Some(*m) {
            return Err(LeagueError::ScheduleIntegrity(format!(
                "match {} is out of order",
                m.match_index
            )));
        }
    }

    if seen.len() != pair_count(n) as usize {
        return Err(LeagueError::ScheduleIntegrity(format!(
            "{} of {} pairs scheduled",
            seen.len(),
            pair_count(n)
        )));
    }

    Ok(())
}

// ──────────────────────────── Internal helpers ────────────────────────────

/// Colexicographic combination unranking: rank → (a, b) with a < b.
///
/// rank = C(b,2) + a = b*(b−1)/2 + a
fn unrank_pair(rank: u32) -> (u32, u32) {
    // Estimate b via integer floor(sqrt(1 + 8·rank))
    let val = 1u64 + 8 * rank as u64;
    let mut s = val;
    let mut t = (s + 1) / 2;
    while t < s {
        s = t;
        t = (s + val / s) / 2;
    }
    // s = floor(sqrt(val))
    let mut b = ((1 + s) / 2) as u32;

    // Correct estimate
    while b > 0 && b * (b - 1) / 2 > rank {
        b -= 1;
    }
    while (b + 1) * b / 2 <= rank {
        b += 1;
    }

    let a = rank - b * (b - 1) / 2;
    (a, b)
}

/// Lexicographic unranking over `n` bots.
///
/// Mirroring indices (`x → n−1−x`) turns lexicographic order into reversed
/// colex order, so rank `r` maps to colex rank `C(n,2)−1−r`.
fn unrank_lex(rank: u32, n: u32) -> (u32, u32) {
    let (lo, hi) = unrank_pair(pair_count(n) - 1 - rank);
    (n - 1 - hi, n - 1 - lo)
}
