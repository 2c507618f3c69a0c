//! League configuration
//!
//! Built once by the caller, validated, then handed to the tournament as an
//! immutable value. Nothing in the engine reads ambient global state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::ConfigError;
use crate::random::SeedSalt;
use crate::rules::{RuleSet, RuleSetConfig, ScoringTable};

/// Version stamped into run metadata
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Length of the hex config fingerprint
const FINGERPRINT_LEN: usize = 10;

/// What a bot fault costs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForfeitPolicy {
    /// The faulting bot loses the round; play continues
    #[default]
    Round,
    /// The first fault ends the match and the faulting bot loses it
    Match,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueConfig {
    /// Feeds every per-match RNG derivation
    #[serde(alias = "SEED_SALT")]
    pub seed_salt: SeedSalt,
    /// Enables persistence of the results bundle
    #[serde(alias = "COMPETITION")]
    pub competition: bool,
    pub rounds_per_match: u32,
    pub matches_per_pair: u32,
    pub rules: RuleSetConfig,
    pub scoring: ScoringTable,
    pub forfeit_policy: ForfeitPolicy,
    /// Shadow moves each bot may spend per match; 0 disables deception
    #[serde(alias = "DECEPTION_TOKENS")]
    pub deception_tokens: u32,
    /// Chance (0..=100) that a shadow request is rejected
    pub shadow_reject_percent: u8,
    pub results_dir: PathBuf,
    pub log_raw_data: bool,
    pub log_summaries: bool,
    /// Matches between leaderboard snapshots; 0 disables them
    pub snapshot_interval: u32,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            seed_salt: SeedSalt::default(),
            competition: false,
            rounds_per_match: 1000,
            matches_per_pair: 1,
            rules: RuleSetConfig::default(),
            scoring: ScoringTable::default(),
            forfeit_policy: ForfeitPolicy::default(),
            deception_tokens: 0,
            shadow_reject_percent: 10,
            results_dir: PathBuf::from("results"),
            log_raw_data: true,
            log_summaries: true,
            snapshot_interval: 10,
        }
    }
}

impl LeagueConfig {
    /// Check every field and build the active rule set
    pub fn validate(&self) -> Result<RuleSet, ConfigError> {
        if self.rounds_per_match == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.matches_per_pair == 0 {
            return Err(ConfigError::NoMatchesPerPair);
        }
        if self.shadow_reject_percent > 100 {
            return Err(ConfigError::ShadowRejectPercent(self.shadow_reject_percent));
        }
        self.scoring.validate()?;
        RuleSet::from_config(&self.rules)
    }

    /// Short digest of the settings that affect computed outcomes.
    ///
    /// Persistence toggles and paths are excluded so a simulation and a
    /// competition run of the same league share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let canonical = json!({
            "seed_salt": self.seed_salt.to_string(),
            "rounds_per_match": self.rounds_per_match,
            "matches_per_pair": self.matches_per_pair,
            "rules": self.rules,
            "scoring": self.scoring,
            "forfeit_policy": self.forfeit_policy,
            "deception_tokens": self.deception_tokens,
            "shadow_reject_percent": self.shadow_reject_percent,
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        let mut hex = format!("{digest:x}");
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Move;

    #[test]
    fn test_defaults() {
        let config = LeagueConfig::default();
        assert_eq!(config.seed_salt, SeedSalt::from("CHAOS_LEAGUE_2026"));
        assert!(!config.competition);
        assert_eq!(config.rounds_per_match, 1000);
        assert_eq!(config.matches_per_pair, 1);
        assert_eq!(config.snapshot_interval, 10);
        assert_eq!(config.forfeit_policy, ForfeitPolicy::Round);
        assert_eq!(config.validate().unwrap(), RuleSet::rpsls());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = LeagueConfig { rounds_per_match: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::NoRounds));

        let config = LeagueConfig { matches_per_pair: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::NoMatchesPerPair));

        let config = LeagueConfig {
            scoring: ScoringTable { win: 1, tie: 1, loss: 0 },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NonMonotonicScoring { .. })));

        let config = LeagueConfig { shadow_reject_percent: 101, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::ShadowRejectPercent(101)));
    }

    #[test]
    fn test_deception_settings() {
        let config = LeagueConfig::default();
        assert_eq!(config.deception_tokens, 0);
        assert_eq!(config.shadow_reject_percent, 10);

        let config: LeagueConfig =
            serde_json::from_str(r#"{"DECEPTION_TOKENS": 50, "shadow_reject_percent": 0}"#).unwrap();
        assert_eq!(config.deception_tokens, 50);
        assert_eq!(config.shadow_reject_percent, 0);
        assert!(config.validate().is_ok());
        assert_ne!(config.fingerprint(), LeagueConfig::default().fingerprint());
    }

    #[test]
    fn test_uppercase_aliases() {
        let config: LeagueConfig =
            serde_json::from_str(r#"{"SEED_SALT": 7, "COMPETITION": true}"#).unwrap();
        assert_eq!(config.seed_salt, SeedSalt::Int(7));
        assert!(config.competition);
        assert_eq!(config.rounds_per_match, 1000);
    }

    #[test]
    fn test_rules_from_json() {
        let config: LeagueConfig = serde_json::from_str(
            r#"{"rules": {"preset": "custom", "beats": {
                "ROCK": ["SCISSORS"], "PAPER": ["ROCK"], "SCISSORS": ["PAPER"]
            }}, "forfeit_policy": "match"}"#,
        )
        .unwrap();
        assert_eq!(config.forfeit_policy, ForfeitPolicy::Match);
        let rules = config.validate().unwrap();
        assert_eq!(rules.moves(), &[Move::Rock, Move::Paper, Move::Scissors]);
    }

    #[test]
    fn test_fingerprint() {
        let base = LeagueConfig::default();
        let fp = base.fingerprint();
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, LeagueConfig::default().fingerprint());

        // Persistence settings do not change outcomes
        let competition = LeagueConfig {
            competition: true,
            results_dir: PathBuf::from("elsewhere"),
            ..Default::default()
        };
        assert_eq!(competition.fingerprint(), fp);

        let salted = LeagueConfig { seed_salt: SeedSalt::from("x"), ..Default::default() };
        assert_ne!(salted.fingerprint(), fp);
    }
}
