//! End-to-end: run a competition league twice, compare the bundles and
//! replay the journal.

use std::fs;
use std::path::Path;

use match_logic::journal::{LEADERBOARD_FILE, METADATA_DIR, METADATA_FILE, RAW_DIR, ROUNDS_FILE};
use match_logic::replay::{read_journal, validate_journal, validate_records};
use match_logic::{
    Entrant, LeagueConfig, Move, PersistenceStatus, ReplayCoverage, ReplayError, RoundRecord,
    RunMetadata, SeedSalt, Strategy, StrategyBase, StrategyParams, Tournament,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn entrants() -> Vec<Entrant> {
    // Deliberately unsorted
    vec![
        Entrant::builtin("C", Strategy::new(StrategyBase::Chaos)),
        Entrant::builtin("A", Strategy::constant(Move::Rock)),
        Entrant::builtin("B", Strategy::new(StrategyBase::Mirror)),
    ]
}

fn config(results_dir: &Path, rounds: u32) -> LeagueConfig {
    LeagueConfig {
        seed_salt: SeedSalt::from("x"),
        competition: true,
        rounds_per_match: rounds,
        results_dir: results_dir.to_path_buf(),
        ..Default::default()
    }
}

fn run(results_dir: &Path, rounds: u32) -> std::path::PathBuf {
    let league = Tournament::new(config(results_dir, rounds), entrants()).unwrap();
    let report = league.run().unwrap();
    assert_eq!(report.persistence, PersistenceStatus::Complete);
    report.run_dir.unwrap()
}

#[test]
fn test_three_bot_single_round_scenario() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let first = run(dir.path(), 1);
    let second = run(dir.path(), 1);
    assert_ne!(first, second);

    let lines = read_journal(&first.join(RAW_DIR).join(ROUNDS_FILE), false).unwrap();
    assert_eq!(lines.len(), 3);
    let pairs: Vec<(String, String)> = lines
        .iter()
        .map(|l| serde_json::from_str::<RoundRecord>(l).unwrap())
        .map(|r| (r.bot_a, r.bot_b))
        .collect();
    assert_eq!(
        pairs,
        [("A", "B"), ("A", "C"), ("B", "C")].map(|(a, b)| (a.to_string(), b.to_string()))
    );

    for file in [Path::new(RAW_DIR).join(ROUNDS_FILE), Path::new(LEADERBOARD_FILE).to_path_buf()] {
        assert_eq!(
            fs::read_to_string(first.join(&file)).unwrap(),
            fs::read_to_string(second.join(&file)).unwrap(),
            "{} differs between runs",
            file.display()
        );
    }

    let league = Tournament::new(config(dir.path(), 1), entrants()).unwrap();
    let report = validate_journal(&league, &first.join(RAW_DIR).join(ROUNDS_FILE), false).unwrap();
    assert_eq!(report.rounds_checked, 3);
    assert_eq!(report.matches_checked, 3);
    assert_eq!(report.coverage, ReplayCoverage::Complete);
}

#[test]
fn test_metadata_describes_run() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let run_dir = run(dir.path(), 20);

    let text = fs::read_to_string(run_dir.join(METADATA_DIR).join(METADATA_FILE)).unwrap();
    let metadata: RunMetadata = serde_json::from_str(&text).unwrap();
    assert_eq!(metadata.seed_salt, SeedSalt::from("x"));
    assert_eq!(metadata.match_count, 3);
    assert_eq!(metadata.round_count, 60);
    assert_eq!(metadata.persistence, Some(PersistenceStatus::Complete));
    let names: Vec<&str> = metadata.bots.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);
    assert!(metadata.finished_at.unwrap() >= metadata.started_at);

    let csv = fs::read_to_string(run_dir.join(LEADERBOARD_FILE)).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.starts_with("rank,bot,matches,wins,ties,losses,score"));
}

#[test]
fn test_aborted_run_leaves_replayable_prefix() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let run_dir = run(dir.path(), 10);
    let mut lines = read_journal(&run_dir.join(RAW_DIR).join(ROUNDS_FILE), false).unwrap();
    lines.truncate(14);

    let league = Tournament::new(config(dir.path(), 10), entrants()).unwrap();
    let report = validate_records(&league, &lines, true).unwrap();
    assert_eq!(report.coverage, ReplayCoverage::Prefix);
    assert_eq!(report.rounds_checked, 14);
    assert_eq!(report.matches_checked, 1);

    assert!(matches!(
        validate_records(&league, &lines, false),
        Err(ReplayError::Truncated { expected: 30, found: 14 })
    ));
}

#[test]
fn test_different_salt_fails_replay() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let run_dir = run(dir.path(), 50);

    let other = LeagueConfig {
        seed_salt: SeedSalt::from("y"),
        ..config(dir.path(), 50)
    };
    let league = Tournament::new(other, entrants()).unwrap();
    let result = validate_journal(&league, &run_dir.join(RAW_DIR).join(ROUNDS_FILE), false);
    assert!(matches!(result, Err(ReplayError::Mismatch { .. })));
}

#[test]
fn test_shadow_moves_are_journaled_and_replayed() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let deceptive = |results_dir: &Path| LeagueConfig {
        deception_tokens: 5,
        shadow_reject_percent: 10,
        ..config(results_dir, 20)
    };
    let bluffers = || {
        let bluff = StrategyParams { bluff: true, ..Default::default() };
        vec![
            Entrant::builtin("A", Strategy::with_params(StrategyBase::Chaos, bluff)),
            Entrant::builtin("B", Strategy::with_params(StrategyBase::Mirror, bluff)),
            Entrant::builtin("C", Strategy::new(StrategyBase::Cycle)),
        ]
    };

    let report = Tournament::new(deceptive(dir.path()), bluffers()).unwrap().run().unwrap();
    assert_eq!(report.persistence, PersistenceStatus::Complete);
    let run_dir = report.run_dir.unwrap();
    let journal = run_dir.join(RAW_DIR).join(ROUNDS_FILE);

    let records: Vec<RoundRecord> = read_journal(&journal, false)
        .unwrap()
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 60);
    assert!(records.iter().all(|r| r.deception.is_some()));

    // The cycling bot never shadows, and nobody overspends
    for result in &report.results {
        assert!(result.tokens_used_a <= 5 && result.tokens_used_b <= 5);
        for side in [match_logic::Side::A, match_logic::Side::B] {
            if result.bot(side) == "C" {
                assert_eq!(result.tokens_used(side), 0);
            }
        }
    }
    // One token per accepted shadow
    let shadows: u64 = records
        .iter()
        .filter_map(|r| r.deception)
        .map(|d| u64::from(d.shadow_a) + u64::from(d.shadow_b))
        .sum();
    let spent: u64 = report.leaderboard.standings().iter().map(|s| s.shadow_used).sum();
    assert_eq!(shadows, spent);

    let league = Tournament::new(deceptive(dir.path()), bluffers()).unwrap();
    let replay = validate_journal(&league, &journal, false).unwrap();
    assert_eq!(replay.rounds_checked, 60);
    assert_eq!(replay.coverage, ReplayCoverage::Complete);

    // The same journal does not replay with the mechanic switched off
    let plain = Tournament::new(config(dir.path(), 20), bluffers()).unwrap();
    assert!(matches!(
        validate_journal(&plain, &journal, false),
        Err(ReplayError::Mismatch { .. })
    ));
}
