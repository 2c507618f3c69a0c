use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use match_logic::journal::{METADATA_DIR, METADATA_FILE, RAW_DIR, ROUNDS_FILE};
use match_logic::replay::{read_journal, validate_journal, validate_match};
use match_logic::{ReplayCoverage, RunMetadata, Tournament};

use crate::registry::load_bots;
use crate::settings::{load_config, Overrides, ReplayArgs};

pub fn read_metadata(run_dir: &Path) -> Result<RunMetadata> {
    let path = run_dir.join(METADATA_DIR).join(METADATA_FILE);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read run metadata: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse run metadata: {}", path.display()))
}

/// Rebuild the league a run directory was produced by
pub fn rebuild_tournament(args: &ReplayArgs, metadata: &RunMetadata) -> Result<Tournament> {
    let overrides = Overrides {
        seed_salt: None,
        simulation: true,
        rounds: Some(metadata.rounds_per_match),
        matches_per_pair: Some(metadata.matches_per_pair),
        ..Default::default()
    };
    let mut config = load_config(args.config.as_deref(), &overrides)?;
    config.seed_salt = metadata.seed_salt.clone();

    if config.fingerprint() != metadata.config_fingerprint {
        bail!(
            "Configuration fingerprint {} does not match the run's {}",
            config.fingerprint(),
            metadata.config_fingerprint
        );
    }

    let entrants = load_bots(&args.bots)?;
    let loaded: Vec<(&str, Option<&str>)> = entrants.iter().map(|e| (e.name(), e.digest())).collect();
    let recorded: Vec<(&str, Option<&str>)> = metadata
        .bots
        .iter()
        .map(|b| (b.name.as_str(), b.digest.as_deref()))
        .collect();
    if loaded != recorded {
        bail!("Bot roster or definitions differ from the recorded run");
    }

    Tournament::new(config, entrants).context("Failed to set up the league")
}

pub fn execute(args: &ReplayArgs) -> Result<()> {
    let metadata = read_metadata(&args.run)?;
    if metadata.finished_at.is_none() {
        warn!("run {} never finished; its journal may be a prefix", args.run.display());
    }
    let tournament = rebuild_tournament(args, &metadata)?;
    let journal = args.run.join(RAW_DIR).join(ROUNDS_FILE);

    match args.match_index {
        Some(index) => {
            let lines = read_journal(&journal, args.allow_prefix)?;
            let rounds = validate_match(&tournament, &lines, index)?;
            println!("Match {index}: {rounds} rounds reproduced exactly");
        }
        None => {
            let report = validate_journal(&tournament, &journal, args.allow_prefix)?;
            let coverage = match report.coverage {
                ReplayCoverage::Complete => "complete",
                ReplayCoverage::Prefix => "prefix",
            };
            info!("replay coverage: {coverage}");
            println!(
                "Replay OK: {} rounds over {} matches reproduced exactly ({coverage})",
                report.rounds_checked, report.matches_checked
            );
        }
    }
    Ok(())
}
