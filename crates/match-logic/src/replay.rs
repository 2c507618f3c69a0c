//! Replay validation
//!
//! Re-plays a league in memory and compares every regenerated round with a
//! persisted `rounds.jsonl`, line by line and in order. Lines are compared
//! as exact text, so any drift in field order or formatting is caught too.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{LeagueError, ReplayError};
use crate::game::RoundRecord;
use crate::journal::RoundSink;
use crate::pairing::pairing_for_match;
use crate::tournament::Tournament;

/// How much of the league the journal covered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayCoverage {
    /// Every scheduled round was present
    Complete,
    /// The journal stops early (an aborted run)
    Prefix,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub rounds_checked: usize,
    /// Matches whose every round was checked
    pub matches_checked: usize,
    pub coverage: ReplayCoverage,
}

/// Counts rounds without keeping them
#[derive(Default)]
struct RoundCounter(usize);

impl RoundSink for RoundCounter {
    fn record_round(&mut self, _record: &RoundRecord) {
        self.0 += 1;
    }
}

/// Read a journal into its records, one per line.
///
/// Only the newline ending the last record may be followed by nothing; any
/// other blank line is an error. A last line without its newline is a
/// record torn by an aborted run: with `allow_prefix` it is dropped,
/// otherwise it is kept and compared like any other.
pub fn read_journal(path: &Path, allow_prefix: bool) -> Result<Vec<String>, ReplayError> {
    let text = fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    if let Some(last) = lines.pop() {
        if !last.is_empty() {
            if allow_prefix {
                warn!("dropping unterminated line {} of {}", lines.len() + 1, path.display());
            } else {
                lines.push(last);
            }
        }
    }

    if let Some(blank) = lines.iter().position(|line| line.trim().is_empty()) {
        return Err(ReplayError::BlankLine { line: blank + 1 });
    }
    Ok(lines)
}

/// Validate the journal file at `path` against a fresh in-memory run
pub fn validate_journal(
    tournament: &Tournament,
    path: &Path,
    allow_prefix: bool,
) -> Result<ReplayReport, ReplayError> {
    let lines = read_journal(path, allow_prefix)?;
    let report = validate_records(tournament, &lines, allow_prefix)?;
    info!(
        "replay of {} matched {} rounds over {} matches ({:?})",
        path.display(),
        report.rounds_checked,
        report.matches_checked,
        report.coverage
    );
    Ok(report)
}

/// Validate journal lines against a fresh in-memory run.
///
/// Matches are regenerated one at a time and only as far as the journal
/// reaches, so a short prefix is cheap to check.
pub fn validate_records(
    tournament: &Tournament,
    lines: &[String],
    allow_prefix: bool,
) -> Result<ReplayReport, ReplayError> {
    let schedule = tournament.schedule();
    let mut cursor = 0usize;
    let mut matches_checked = 0usize;

    for (position, scheduled) in schedule.iter().enumerate() {
        let mut rounds: Vec<RoundRecord> = Vec::new();
        tournament.play_scheduled(scheduled, &mut rounds)?;

        for (offset, expected) in rounds.iter().enumerate() {
            let Some(line) = lines.get(cursor) else {
                if allow_prefix {
                    return Ok(ReplayReport {
                        rounds_checked: cursor,
                        matches_checked,
                        coverage: ReplayCoverage::Prefix,
                    });
                }
                let mut counter = RoundCounter(rounds.len() - offset);
                for rest in &schedule[position + 1..] {
                    tournament.play_scheduled(rest, &mut counter)?;
                }
                return Err(ReplayError::Truncated {
                    expected: cursor + counter.0,
                    found: cursor,
                });
            };
            compare_line(cursor + 1, line, expected)?;
            cursor += 1;
        }
        matches_checked += 1;
    }

    if cursor < lines.len() {
        return Err(ReplayError::ExtraRecords {
            extra: lines.len() - cursor,
        });
    }

    Ok(ReplayReport {
        rounds_checked: cursor,
        matches_checked,
        coverage: ReplayCoverage::Complete,
    })
}

/// Validate only the rounds of one match.
///
/// Returns the number of rounds checked.
pub fn validate_match(
    tournament: &Tournament,
    lines: &[String],
    match_index: u32,
) -> Result<usize, ReplayError> {
    let n = tournament.entrants().len() as u32;
    let scheduled = pairing_for_match(n, tournament.config().matches_per_pair, match_index)
        .ok_or_else(|| {
            LeagueError::ScheduleIntegrity(format!("match {match_index} is not in the schedule"))
        })?;

    let mut persisted = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let record = parse_line(i + 1, line)?;
        if record.match_index == match_index {
            persisted.push((i + 1, line));
        }
    }

    let mut rounds: Vec<RoundRecord> = Vec::new();
    tournament.play_scheduled(&scheduled, &mut rounds)?;

    for (i, expected) in rounds.iter().enumerate() {
        let Some((line_no, line)) = persisted.get(i) else {
            return Err(ReplayError::Truncated {
                expected: rounds.len(),
                found: persisted.len(),
            });
        };
        compare_line(*line_no, line, expected)?;
    }
    if persisted.len() > rounds.len() {
        return Err(ReplayError::ExtraRecords {
            extra: persisted.len() - rounds.len(),
        });
    }

    Ok(rounds.len())
}

fn parse_line(line_no: usize, line: &str) -> Result<RoundRecord, ReplayError> {
    serde_json::from_str(line).map_err(|source| ReplayError::Parse { line: line_no, source })
}

fn compare_line(line_no: usize, line: &str, expected: &RoundRecord) -> Result<(), ReplayError> {
    parse_line(line_no, line)?;
    let expected = serde_json::to_string(expected).map_err(LeagueError::from)?;
    if expected != line {
        return Err(ReplayError::Mismatch {
            line: line_no,
            expected,
            found: line.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LeagueConfig;
    use crate::random::SeedSalt;
    use crate::strategy::{Entrant, Strategy, StrategyBase};

    fn league(salt: &str) -> Tournament {
        let config = LeagueConfig {
            seed_salt: SeedSalt::from(salt),
            rounds_per_match: 4,
            ..Default::default()
        };
        Tournament::new(
            config,
            vec![
                Entrant::builtin("A", Strategy::new(StrategyBase::Chaos)),
                Entrant::builtin("B", Strategy::new(StrategyBase::Reference)),
                Entrant::builtin("C", Strategy::new(StrategyBase::Cycle)),
            ],
        )
        .unwrap()
    }

    fn journal(tournament: &Tournament) -> Vec<String> {
        let mut rounds: Vec<RoundRecord> = Vec::new();
        tournament.run_with(&mut rounds).unwrap();
        rounds.iter().map(|r| serde_json::to_string(r).unwrap()).collect()
    }

    #[test]
    fn test_full_journal_validates() {
        let lines = journal(&league("x"));
        let report = validate_records(&league("x"), &lines, false).unwrap();
        assert_eq!(report.rounds_checked, 12);
        assert_eq!(report.matches_checked, 3);
        assert_eq!(report.coverage, ReplayCoverage::Complete);
    }

    #[test]
    fn test_other_salt_mismatches() {
        let lines = journal(&league("x"));
        let err = validate_records(&league("y"), &lines, false).unwrap_err();
        assert!(matches!(err, ReplayError::Mismatch { .. }));
    }

    #[test]
    fn test_prefix() {
        let lines = journal(&league("x"));
        let prefix = &lines[..6];

        let report = validate_records(&league("x"), prefix, true).unwrap();
        assert_eq!(report.rounds_checked, 6);
        assert_eq!(report.matches_checked, 1);
        assert_eq!(report.coverage, ReplayCoverage::Prefix);

        let err = validate_records(&league("x"), prefix, false).unwrap_err();
        assert!(matches!(err, ReplayError::Truncated { expected: 12, found: 6 }));
    }

    #[test]
    fn test_extra_records() {
        let mut lines = journal(&league("x"));
        lines.push(lines[0].clone());
        let err = validate_records(&league("x"), &lines, false).unwrap_err();
        assert!(matches!(err, ReplayError::ExtraRecords { extra: 1 }));
    }

    #[test]
    fn test_tampered_line() {
        let mut lines = journal(&league("x"));
        lines[5] = lines[5].replace("\"round\":1", "\"round\":7");
        match validate_records(&league("x"), &lines, false) {
            Err(ReplayError::Mismatch { line, .. }) => assert_eq!(line, 6),
            other => panic!("expected mismatch, got {other:?}"),
        }

        lines[5] = "not json".into();
        assert!(matches!(
            validate_records(&league("x"), &lines, false),
            Err(ReplayError::Parse { line: 6, .. })
        ));
    }

    #[test]
    fn test_reordered_lines_fail() {
        let mut lines = journal(&league("x"));
        lines.swap(0, 1);
        assert!(validate_records(&league("x"), &lines, false).is_err());
    }

    #[test]
    fn test_validate_single_match() {
        let lines = journal(&league("x"));
        assert_eq!(validate_match(&league("x"), &lines, 2).unwrap(), 4);
        assert!(validate_match(&league("y"), &lines, 2).is_err());
        assert!(matches!(
            validate_match(&league("x"), &lines, 3),
            Err(ReplayError::League(LeagueError::ScheduleIntegrity(_)))
        ));
    }

    #[test]
    fn test_validate_journal_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rounds.jsonl");
        let mut text = journal(&league("x")).join("\n");
        text.push('\n');
        fs::write(&path, text).unwrap();

        let report = validate_journal(&league("x"), &path, false).unwrap();
        assert_eq!(report.rounds_checked, 12);

        let missing = dir.path().join("missing.jsonl");
        assert!(matches!(
            validate_journal(&league("x"), &missing, false),
            Err(ReplayError::Read { .. })
        ));
    }

    #[test]
    fn test_blank_lines_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rounds.jsonl");
        let mut lines = journal(&league("x"));
        lines.insert(3, String::new());
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        for allow_prefix in [false, true] {
            assert!(matches!(
                validate_journal(&league("x"), &path, allow_prefix),
                Err(ReplayError::BlankLine { line: 4 })
            ));
        }

        // A blank line after the last record is not a trailing newline
        lines.remove(3);
        fs::write(&path, lines.join("\n") + "\n\n").unwrap();
        assert!(matches!(
            validate_journal(&league("x"), &path, false),
            Err(ReplayError::BlankLine { line: 13 })
        ));

        fs::write(&path, lines.join("\n") + "\n \n").unwrap();
        assert!(matches!(read_journal(&path, true), Err(ReplayError::BlankLine { line: 13 })));
    }

    #[test]
    fn test_torn_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rounds.jsonl");
        let lines = journal(&league("x"));
        let torn = &lines[6][..lines[6].len() / 2];
        fs::write(&path, lines[..6].join("\n") + "\n" + torn).unwrap();

        let report = validate_journal(&league("x"), &path, true).unwrap();
        assert_eq!(report.rounds_checked, 6);
        assert_eq!(report.coverage, ReplayCoverage::Prefix);

        assert!(matches!(
            validate_journal(&league("x"), &path, false),
            Err(ReplayError::Parse { line: 7, .. })
        ));
    }

    #[test]
    fn test_empty_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rounds.jsonl");
        fs::write(&path, "").unwrap();
        assert!(read_journal(&path, false).unwrap().is_empty());
        let report = validate_journal(&league("x"), &path, true).unwrap();
        assert_eq!(report.rounds_checked, 0);
        assert_eq!(report.coverage, ReplayCoverage::Prefix);
    }
}
