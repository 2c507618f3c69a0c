//! Leaderboard aggregation
//!
//! Ranking is by aggregate score descending, then bot name ascending, so the
//! order never depends on map iteration or on match order.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::game::MatchResult;
use crate::rules::RoundOutcome;
use crate::strategy::Side;

pub const CSV_HEADER: &str = "rank,bot,matches,wins,ties,losses,score,shadow_used";

/// One leaderboard row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: u32,
    pub bot: String,
    pub matches: u32,
    pub wins: u32,
    pub ties: u32,
    pub losses: u32,
    /// Sum of round points over all matches
    pub score: i64,
    /// Deception tokens spent over all matches
    #[serde(default)]
    pub shadow_used: u64,
}

impl Standing {
    /// Share of the available deception tokens this bot spent, `None` when
    /// the league had no tokens or the bot played no matches
    pub fn shadow_efficiency(&self, tokens_per_match: u32) -> Option<f64> {
        let available = u64::from(tokens_per_match) * u64::from(self.matches);
        (available > 0).then(|| self.shadow_used as f64 / available as f64)
    }
}

/// Leaderboard as of some number of completed matches
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub matches_completed: usize,
    pub standings: Vec<Standing>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    standings: Vec<Standing>,
}

#[derive(Default)]
struct Tally {
    matches: u32,
    wins: u32,
    ties: u32,
    losses: u32,
    score: i64,
    shadow_used: u64,
}

impl Leaderboard {
    /// Reduce match results into a ranked table.
    ///
    /// Every name in `bots` gets a row, even with no matches played.
    pub fn from_results<'a, I>(bots: I, results: &[MatchResult]) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
        for bot in bots {
            tallies.entry(bot).or_default();
        }

        for result in results {
            for side in [Side::A, Side::B] {
                let (score, won, lost) = match side {
                    Side::A => (result.score_a, RoundOutcome::AWins, RoundOutcome::BWins),
                    Side::B => (result.score_b, RoundOutcome::BWins, RoundOutcome::AWins),
                };
                let tally = tallies.entry(result.bot(side)).or_default();
                tally.matches += 1;
                tally.score += score;
                tally.shadow_used += u64::from(result.tokens_used(side));
                if result.outcome == won {
                    tally.wins += 1;
                } else if result.outcome == lost {
                    tally.losses += 1;
                } else {
                    tally.ties += 1;
                }
            }
        }

        let mut rows: Vec<(&str, Tally)> = tallies.into_iter().collect();
        rows.sort_by(|(name_a, a), (name_b, b)| b.score.cmp(&a.score).then_with(|| name_a.cmp(name_b)));

        let standings = rows
            .into_iter()
            .enumerate()
            .map(|(i, (bot, t))| Standing {
                rank: i as u32 + 1,
                bot: bot.to_string(),
                matches: t.matches,
                wins: t.wins,
                ties: t.ties,
                losses: t.losses,
                score: t.score,
                shadow_used: t.shadow_used,
            })
            .collect();

        Self { standings }
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    pub fn leader(&self) -> Option<&Standing> {
        self.standings.first()
    }

    pub fn get(&self, bot: &str) -> Option<&Standing> {
        self.standings.iter().find(|s| s.bot == bot)
    }

    /// Sum of wins, ties and losses over all rows (two per match)
    pub fn total_decisions(&self) -> u32 {
        self.standings.iter().map(|s| s.wins + s.ties + s.losses).sum()
    }

    pub fn snapshot(&self, matches_completed: usize) -> LeaderboardSnapshot {
        LeaderboardSnapshot {
            matches_completed,
            standings: self.standings.clone(),
        }
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for s in &self.standings {
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{},{}",
                s.rank,
                csv_field(&s.bot),
                s.matches,
                s.wins,
                s.ties,
                s.losses,
                s.score,
                s.shadow_used
            );
        }
        out
    }
}

/// Quote a field if it contains a delimiter, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: u32, a: &str, b: &str, score_a: i64, score_b: i64) -> MatchResult {
        let outcome = match score_a.cmp(&score_b) {
            std::cmp::Ordering::Greater => RoundOutcome::AWins,
            std::cmp::Ordering::Less => RoundOutcome::BWins,
            std::cmp::Ordering::Equal => RoundOutcome::Tie,
        };
        MatchResult {
            match_index: index,
            bot_a: a.into(),
            bot_b: b.into(),
            rounds_played: 1,
            score_a,
            score_b,
            outcome,
            winner: None,
            forfeited_by: None,
            moves_a: BTreeMap::new(),
            moves_b: BTreeMap::new(),
            faults_a: 0,
            faults_b: 0,
            tokens_used_a: 0,
            tokens_used_b: 0,
        }
    }

    #[test]
    fn test_ranking_and_counts() {
        let results = vec![
            result(0, "A", "B", 3, -3),
            result(1, "A", "C", 0, 0),
            result(2, "B", "C", -1, 1),
        ];
        let board = Leaderboard::from_results(["A", "B", "C"], &results);
        let names: Vec<&str> = board.standings().iter().map(|s| s.bot.as_str()).collect();
        assert_eq!(names, ["A", "C", "B"]);

        let a = board.get("A").unwrap();
        assert_eq!((a.rank, a.matches, a.wins, a.ties, a.losses, a.score), (1, 2, 1, 1, 0, 3));
        let b = board.get("B").unwrap();
        assert_eq!((b.rank, b.wins, b.ties, b.losses, b.score), (3, 0, 0, 2, -4));

        assert_eq!(board.total_decisions(), 2 * results.len() as u32);
        assert_eq!(board.leader().unwrap().bot, "A");
    }

    #[test]
    fn test_equal_scores_break_by_name() {
        let results = vec![result(0, "zeta", "alpha", 0, 0)];
        let board = Leaderboard::from_results(["zeta", "alpha", "mid"], &results);
        let names: Vec<&str> = board.standings().iter().map(|s| s.bot.as_str()).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
        assert_eq!(board.get("mid").unwrap().matches, 0);
    }

    #[test]
    fn test_forfeit_outcome_overrides_score() {
        let mut forfeited = result(0, "A", "B", 5, -5);
        forfeited.outcome = RoundOutcome::BWins;
        forfeited.forfeited_by = Some(Side::A);
        let board = Leaderboard::from_results(["A", "B"], &[forfeited]);
        assert_eq!(board.get("A").unwrap().losses, 1);
        assert_eq!(board.get("B").unwrap().wins, 1);
        // Points still count toward the aggregate
        assert_eq!(board.leader().unwrap().bot, "A");
    }

    #[test]
    fn test_order_independent() {
        let results = vec![
            result(0, "A", "B", 2, -2),
            result(1, "A", "C", -1, 1),
            result(2, "B", "C", 0, 0),
        ];
        let mut reversed = results.clone();
        reversed.reverse();
        assert_eq!(
            Leaderboard::from_results(["A", "B", "C"], &results),
            Leaderboard::from_results(["C", "B", "A"], &reversed)
        );
    }

    #[test]
    fn test_csv() {
        let results = vec![result(0, "A", "has,comma", 1, -1)];
        let csv = Leaderboard::from_results(["A", "has,comma"], &results).to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1,A,1,1,0,0,1,0");
        assert_eq!(lines[2], "2,\"has,comma\",1,0,0,1,-1,0");
    }

    #[test]
    fn test_shadow_usage() {
        let mut first = result(0, "A", "B", 1, -1);
        first.tokens_used_a = 30;
        first.tokens_used_b = 5;
        let mut second = result(1, "A", "C", 0, 0);
        second.tokens_used_a = 20;
        let board = Leaderboard::from_results(["A", "B", "C"], &[first, second]);

        let a = board.get("A").unwrap();
        assert_eq!(a.shadow_used, 50);
        assert_eq!(a.shadow_efficiency(50), Some(0.5));
        assert_eq!(a.shadow_efficiency(0), None);
        assert_eq!(board.get("B").unwrap().shadow_used, 5);
        assert!(board.to_csv().lines().nth(1).unwrap().ends_with(",1,50"));
    }

    #[test]
    fn test_empty() {
        let board = Leaderboard::default();
        assert!(board.leader().is_none());
        assert_eq!(board.to_csv(), format!("{CSV_HEADER}\n"));
        assert_eq!(board.snapshot(0).standings.len(), 0);
    }
}
