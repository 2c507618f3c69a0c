//! Tournament driver
//!
//! Ties the scheduler, RNG controller, match engine, recorder and
//! leaderboard together. Matches run strictly in schedule order on the
//! calling thread, so the journal order is fixed by the schedule alone.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{error, info};

use crate::config::{LeagueConfig, ENGINE_VERSION};
use crate::error::{ConfigError, LeagueError};
use crate::game::{play_match, Contender, MatchContext, MatchResult};
use crate::journal::{
    BotInfo, PersistenceStatus, RecorderOptions, ResultsRecorder, RoundSink, RunMetadata,
};
use crate::leaderboard::Leaderboard;
use crate::pairing::{
    calculate_match_count, checked_match_count, round_robin_schedule, verify_schedule,
    ScheduledMatch,
};
use crate::random::{MatchKey, RngController};
use crate::rules::RuleSet;
use crate::strategy::Entrant;

/// Everything a finished run produced
#[derive(Debug)]
pub struct TournamentReport {
    pub results: Vec<MatchResult>,
    pub leaderboard: Leaderboard,
    pub rounds_played: u64,
    pub persistence: PersistenceStatus,
    pub run_dir: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A validated league ready to run
pub struct Tournament {
    config: LeagueConfig,
    rules: RuleSet,
    entrants: Vec<Entrant>,
    rng: RngController,
}

impl Tournament {
    /// Validate the configuration and bot set.
    ///
    /// Entrants are sorted by name; that order defines bot indices in the
    /// schedule.
    pub fn new(config: LeagueConfig, mut entrants: Vec<Entrant>) -> Result<Self, LeagueError> {
        let rules = config.validate()?;

        if entrants.len() < 2 {
            return Err(ConfigError::NotEnoughBots(entrants.len()).into());
        }
        let mut names = BTreeSet::new();
        for entrant in &entrants {
            if entrant.name().is_empty() {
                return Err(ConfigError::EmptyBotName.into());
            }
            if !names.insert(entrant.name()) {
                return Err(ConfigError::DuplicateBot(entrant.name().to_string()).into());
            }
        }
        let legs = config.matches_per_pair;
        if u32::try_from(entrants.len())
            .ok()
            .and_then(|n| checked_match_count(n, legs))
            .is_none()
        {
            return Err(ConfigError::TooManyMatches { bots: entrants.len(), legs }.into());
        }
        entrants.sort_by(|a, b| a.name().cmp(b.name()));

        let rng = RngController::new(config.seed_salt.clone());
        Ok(Self { config, rules, entrants, rng })
    }

    pub fn config(&self) -> &LeagueConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn entrants(&self) -> &[Entrant] {
        &self.entrants
    }

    /// Bot names in schedule order
    pub fn bot_names(&self) -> Vec<&str> {
        self.entrants.iter().map(Entrant::name).collect()
    }

    pub fn match_count(&self) -> u32 {
        calculate_match_count(self.entrants.len() as u32, self.config.matches_per_pair)
    }

    pub fn schedule(&self) -> Vec<ScheduledMatch> {
        round_robin_schedule(self.entrants.len() as u32, self.config.matches_per_pair)
    }

    /// Run metadata as known before any match is played
    pub fn metadata(&self, started_at: DateTime<Utc>) -> RunMetadata {
        RunMetadata {
            engine_version: ENGINE_VERSION.to_string(),
            seed_salt: self.config.seed_salt.clone(),
            config_fingerprint: self.config.fingerprint(),
            bots: self
                .entrants
                .iter()
                .map(|e| BotInfo {
                    name: e.name().to_string(),
                    digest: e.digest().map(str::to_string),
                })
                .collect(),
            rounds_per_match: self.config.rounds_per_match,
            matches_per_pair: self.config.matches_per_pair,
            match_count: self.match_count(),
            round_count: 0,
            started_at,
            finished_at: None,
            persistence: None,
        }
    }

    /// Play one scheduled match, streaming its rounds into `sink`
    pub fn play_scheduled(
        &self,
        scheduled: &ScheduledMatch,
        sink: &mut dyn RoundSink,
    ) -> Result<MatchResult, LeagueError> {
        let (entrant_a, entrant_b) = match (
            self.entrants.get(scheduled.a as usize),
            self.entrants.get(scheduled.b as usize),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(LeagueError::ScheduleIntegrity(format!(
                    "match {} references a bot outside the league",
                    scheduled.match_index
                )))
            }
        };

        let key = MatchKey::new(entrant_a.name(), entrant_b.name(), scheduled.match_index);
        let mut rng = self.rng.for_match(&key)?;
        let ctx = MatchContext {
            match_index: scheduled.match_index,
            round_count: self.config.rounds_per_match,
            rules: &self.rules,
            scoring: self.config.scoring,
            forfeit_policy: self.config.forfeit_policy,
            deception_tokens: self.config.deception_tokens,
            shadow_reject_percent: self.config.shadow_reject_percent,
        };

        let mut decider_a = entrant_a.spawn();
        let mut decider_b = entrant_b.spawn();
        Ok(play_match(
            Contender { name: entrant_a.name(), decider: decider_a.as_mut() },
            Contender { name: entrant_b.name(), decider: decider_b.as_mut() },
            &mut rng,
            &ctx,
            sink,
        ))
    }

    /// Play the whole schedule into `sink` without touching the disk
    pub fn run_with(&self, sink: &mut dyn RoundSink) -> Result<Vec<MatchResult>, LeagueError> {
        let n = self.entrants.len() as u32;
        let legs = self.config.matches_per_pair;
        let schedule = self.schedule();
        verify_schedule(n, legs, &schedule)?;

        info!(
            "starting league: {} bots, {} matches, {} rounds each, salt {}",
            n,
            schedule.len(),
            self.config.rounds_per_match,
            self.config.seed_salt
        );

        let names = self.bot_names();
        let interval = self.config.snapshot_interval as usize;
        let mut results = Vec::with_capacity(schedule.len());

        for scheduled in &schedule {
            let result = self.play_scheduled(scheduled, sink)?;
            sink.record_match(&result);
            results.push(result);

            if interval > 0 && results.len() % interval == 0 {
                let board = Leaderboard::from_results(names.iter().copied(), &results);
                if let Some(leader) = board.leader() {
                    info!(
                        "after {} of {} matches: {} leads with {}",
                        results.len(),
                        schedule.len(),
                        leader.bot,
                        leader.score
                    );
                }
                sink.record_snapshot(&board.snapshot(results.len()));
            }
        }

        Ok(results)
    }

    /// Run the league, persisting the results bundle in competition mode
    pub fn run(&self) -> Result<TournamentReport, LeagueError> {
        let started_at = Utc::now();
        let mut metadata = self.metadata(started_at);

        let mut recorder = if self.config.competition {
            let options = RecorderOptions {
                log_raw_data: self.config.log_raw_data,
                log_summaries: self.config.log_summaries,
            };
            ResultsRecorder::create(&self.config.results_dir, &metadata, options).unwrap_or_else(|e| {
                error!("cannot create results bundle: {e}");
                ResultsRecorder::failed(e.to_string())
            })
        } else {
            ResultsRecorder::disabled()
        };

        let results = self.run_with(&mut recorder)?;
        let leaderboard = Leaderboard::from_results(self.bot_names(), &results);
        let rounds_played = results.iter().map(|r| r.rounds_played as u64).sum::<u64>();
        let finished_at = Utc::now();

        metadata.round_count = rounds_played;
        metadata.finished_at = Some(finished_at);
        let persistence = recorder.finish(&metadata, &leaderboard);

        info!(
            "league finished: {} matches, {} rounds, persistence {:?}",
            results.len(),
            rounds_played,
            persistence
        );

        Ok(TournamentReport {
            results,
            leaderboard,
            rounds_played,
            persistence,
            run_dir: recorder.run_dir().map(PathBuf::from),
            started_at,
            finished_at,
        })
    }
}

impl std::fmt::Debug for Tournament {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tournament")
            .field("config", &self.config)
            .field("bots", &self.bot_names())
            .finish_non_exhaustive()
    }
}
