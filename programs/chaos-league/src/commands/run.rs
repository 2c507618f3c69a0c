use anyhow::{bail, Context, Result};
use log::{info, warn};
use match_logic::{PersistenceStatus, Tournament, TournamentReport};

use crate::registry::load_bots;
use crate::report::format_run_summary;
use crate::settings::{load_config, RunArgs};

/// Load the bots and configuration and play the whole league
pub fn run_league(args: &RunArgs) -> Result<TournamentReport> {
    let config = load_config(args.config.as_deref(), &args.overrides)?;
    let entrants = load_bots(&args.bots)?;
    info!(
        "league of {} bots, salt {}, {} rounds per match, {} mode",
        entrants.len(),
        config.seed_salt,
        config.rounds_per_match,
        if config.competition { "competition" } else { "simulation" }
    );

    let tournament = Tournament::new(config, entrants).context("Failed to set up the league")?;
    let report = tournament.run().context("League aborted")?;
    Ok(report)
}

pub fn execute(args: &RunArgs) -> Result<()> {
    let report = run_league(args)?;
    print!("{}", format_run_summary(&report));

    if let PersistenceStatus::Incomplete(reason) = &report.persistence {
        warn!("results bundle incomplete: {reason}");
        bail!("Results could not be fully persisted");
    }
    Ok(())
}
