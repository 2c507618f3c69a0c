//! Leaderboard pretty-printing

use match_logic::{Leaderboard, PersistenceStatus, TournamentReport};

/// Fixed-width leaderboard table
pub fn format_leaderboard(leaderboard: &Leaderboard) -> String {
    let width = leaderboard
        .standings()
        .iter()
        .map(|s| s.bot.len())
        .max()
        .unwrap_or(0)
        .max(3);

    let mut out = String::new();
    out.push_str(&format!(
        "{:>4}  {:<width$}  {:>7}  {:>5}  {:>5}  {:>5}  {:>8}  {:>6}\n",
        "Rank", "Bot", "Matches", "W", "T", "L", "Score", "Shadow"
    ));
    out.push_str(&"-".repeat(4 + 2 + width + 2 + 7 + 2 + 5 + 2 + 5 + 2 + 5 + 2 + 8 + 2 + 6));
    out.push('\n');

    for s in leaderboard.standings() {
        out.push_str(&format!(
            "{:>4}  {:<width$}  {:>7}  {:>5}  {:>5}  {:>5}  {:>8}  {:>6}\n",
            s.rank, s.bot, s.matches, s.wins, s.ties, s.losses, s.score, s.shadow_used
        ));
    }

    out
}

/// Summary printed after a run
pub fn format_run_summary(report: &TournamentReport) -> String {
    let mut out = format!(
        "=== Chaos League: {} matches, {} rounds ===\n\n",
        report.results.len(),
        report.rounds_played
    );
    out.push_str(&format_leaderboard(&report.leaderboard));
    out.push('\n');

    match (&report.persistence, &report.run_dir) {
        (PersistenceStatus::Complete, Some(dir)) => {
            out.push_str(&format!("Results written to {}\n", dir.display()));
        }
        (PersistenceStatus::Incomplete(reason), dir) => {
            out.push_str(&format!("Results are incomplete: {reason}\n"));
            if let Some(dir) = dir {
                out.push_str(&format!("Partial results in {}\n", dir.display()));
            }
        }
        _ => out.push_str("Simulation mode: nothing written to disk\n"),
    }

    out
}
