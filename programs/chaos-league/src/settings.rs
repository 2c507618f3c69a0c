//! Command line and configuration file handling

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use match_logic::{LeagueConfig, SeedSalt};

/// Deterministic round-robin tournaments between bots
#[derive(Parser, Debug)]
#[command(name = "chaos-league", version, about)]
pub struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a league and print the leaderboard
    Run(RunArgs),
    /// Check a persisted journal against a fresh in-memory run
    Replay(ReplayArgs),
    /// List the built-in strategies
    Builtins,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory of bot definitions (*.toml)
    #[arg(long)]
    pub bots: PathBuf,

    /// Path to TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Directory of bot definitions (*.toml)
    #[arg(long)]
    pub bots: PathBuf,

    /// Run directory (results/tournament_...)
    #[arg(long)]
    pub run: PathBuf,

    /// Path to TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Accept a journal that stops early
    #[arg(long)]
    pub allow_prefix: bool,

    /// Only check this match
    #[arg(long)]
    pub match_index: Option<u32>,
}

/// Values that take precedence over the config file
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    #[arg(long)]
    pub seed_salt: Option<String>,

    /// Persist the results bundle
    #[arg(long, conflicts_with = "simulation")]
    pub competition: bool,

    /// Do not write anything to disk
    #[arg(long)]
    pub simulation: bool,

    #[arg(long)]
    pub rounds: Option<u32>,

    #[arg(long)]
    pub matches_per_pair: Option<u32>,

    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Shadow moves each bot may spend per match (0 disables them)
    #[arg(long)]
    pub deception_tokens: Option<u32>,
}

impl Overrides {
    pub fn apply(&self, config: &mut LeagueConfig) {
        if let Some(salt) = &self.seed_salt {
            config.seed_salt = parse_salt(salt);
        }
        if self.competition {
            config.competition = true;
        }
        if self.simulation {
            config.competition = false;
        }
        if let Some(rounds) = self.rounds {
            config.rounds_per_match = rounds;
        }
        if let Some(k) = self.matches_per_pair {
            config.matches_per_pair = k;
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir = dir.clone();
        }
        if let Some(tokens) = self.deception_tokens {
            config.deception_tokens = tokens;
        }
    }
}

/// Integers are taken as integer salts, anything else as text
pub fn parse_salt(raw: &str) -> SeedSalt {
    raw.parse::<i64>()
        .map(SeedSalt::Int)
        .unwrap_or_else(|_| SeedSalt::Text(raw.to_string()))
}

/// Read the config file (if any), apply overrides and validate
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<LeagueConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => LeagueConfig::default(),
    };

    overrides.apply(&mut config);
    config.validate().context("Invalid league configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use match_logic::{ForfeitPolicy, RuleSetConfig};

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "chaos-league", "run", "--bots", "bots", "--seed-salt", "42", "--competition",
            "--rounds", "5", "--log-level", "debug", "--deception-tokens", "50",
        ])
        .unwrap();
        assert_eq!(cli.log_level, LevelFilter::Debug);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = load_config(None, &args.overrides).unwrap();
        assert_eq!(config.seed_salt, SeedSalt::Int(42));
        assert!(config.competition);
        assert_eq!(config.rounds_per_match, 5);
        assert_eq!(config.deception_tokens, 50);
    }

    #[test]
    fn test_competition_conflicts_with_simulation() {
        assert!(Cli::try_parse_from([
            "chaos-league", "run", "--bots", "b", "--competition", "--simulation",
        ])
        .is_err());
    }

    #[test]
    fn test_config_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("league.toml");
        fs::write(
            &path,
            r#"
SEED_SALT = "from-file"
COMPETITION = true
rounds_per_match = 20
forfeit_policy = "match"

[rules]
preset = "classic"

[scoring]
win = 3
tie = 1
loss = 0
"#,
        )
        .unwrap();

        let config = load_config(Some(&path), &Overrides::default()).unwrap();
        assert_eq!(config.seed_salt, SeedSalt::from("from-file"));
        assert!(config.competition);
        assert_eq!(config.rules, RuleSetConfig::Classic);
        assert_eq!(config.forfeit_policy, ForfeitPolicy::Match);
        assert_eq!(config.scoring.win, 3);

        let overrides = Overrides { simulation: true, rounds: Some(7), ..Default::default() };
        let config = load_config(Some(&path), &overrides).unwrap();
        assert!(!config.competition);
        assert_eq!(config.rounds_per_match, 7);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let overrides = Overrides { rounds: Some(0), ..Default::default() };
        assert!(load_config(None, &overrides).is_err());
        assert!(load_config(Some(Path::new("/nonexistent/league.toml")), &Overrides::default()).is_err());
    }

    #[test]
    fn test_parse_salt() {
        assert_eq!(parse_salt("7"), SeedSalt::Int(7));
        assert_eq!(parse_salt("x"), SeedSalt::from("x"));
    }
}
