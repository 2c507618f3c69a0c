//! Bot registry
//!
//! Loads `*.toml` bot definitions from a directory. A bot's identity is its
//! file stem; its digest is the SHA-256 of the definition file, recorded in
//! run metadata so a replay can tell whether the bots changed.
//!
//! ```toml
//! strategy = "Constant"
//! move = "ROCK"
//! ```
//!
//! ```toml
//! # counter the opponent's last move, Rock on round 0
//! bytecode = [2, 19, 1, 255, 15, 21, 2, 23, 24, 0, 0]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use match_logic::strategy::{Entrant, Move, Strategy, StrategyBase, StrategyParams};
use match_logic::vm::BytecodeBot;
use match_logic::Decider;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::RegistryError;

pub const BOT_EXTENSION: &str = "toml";

/// On-disk bot definition
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotDefinition {
    pub strategy: Option<StrategyBase>,
    #[serde(rename = "move")]
    pub fixed_move: Option<Move>,
    pub warmup_rounds: Option<u32>,
    pub bluff: Option<bool>,
    pub bytecode: Option<Vec<u8>>,
}

/// What a definition resolves to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotKind {
    Builtin(Strategy),
    Bytecode(BytecodeBot),
}

impl BotDefinition {
    pub fn resolve(&self, path: &Path) -> Result<BotKind, RegistryError> {
        match (&self.strategy, &self.bytecode) {
            (Some(base), None) => {
                if *base == StrategyBase::Constant && self.fixed_move.is_none() {
                    return Err(RegistryError::MissingMove(path.to_path_buf()));
                }
                let defaults = StrategyParams::default();
                let params = StrategyParams {
                    fixed_move: self.fixed_move,
                    warmup_rounds: self.warmup_rounds.unwrap_or(defaults.warmup_rounds),
                    bluff: self.bluff.unwrap_or(defaults.bluff),
                };
                Ok(BotKind::Builtin(Strategy::with_params(*base, params)))
            }
            (None, Some(code)) => BytecodeBot::new(code.clone())
                .map(BotKind::Bytecode)
                .map_err(|source| RegistryError::InvalidBytecode {
                    path: path.to_path_buf(),
                    source,
                }),
            _ => Err(RegistryError::AmbiguousDefinition(path.to_path_buf())),
        }
    }
}

impl BotKind {
    pub fn into_entrant(self, name: String, digest: String) -> Entrant {
        let entrant = match self {
            BotKind::Builtin(strategy) => Entrant::builtin(name, strategy),
            BotKind::Bytecode(bot) => {
                Entrant::new(name, move || Box::new(bot.clone()) as Box<dyn Decider>)
            }
        };
        entrant.with_digest(digest)
    }
}

/// Load a single definition file
pub fn load_bot(path: &Path) -> Result<Entrant, RegistryError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RegistryError::BadName(path.to_path_buf()))?
        .to_string();

    let bytes = fs::read(path).map_err(|source| RegistryError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let definition: BotDefinition = toml::from_str(&text).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let kind = definition.resolve(path)?;
    let digest = format!("{:x}", Sha256::digest(&bytes));

    debug!("loaded bot {name} from {} ({kind:?})", path.display());
    Ok(kind.into_entrant(name, digest))
}

/// Load every `*.toml` definition in `dir`, sorted by file stem
pub fn load_bots(dir: &Path) -> Result<Vec<Entrant>, RegistryError> {
    let entries = fs::read_dir(dir).map_err(|source| RegistryError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RegistryError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == BOT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_stem().cmp(&b.file_stem()));

    if paths.is_empty() {
        return Err(RegistryError::NoBots(dir.to_path_buf()));
    }

    let bots = paths
        .iter()
        .map(|p| load_bot(p))
        .collect::<Result<Vec<_>, _>>()?;
    info!("loaded {} bots from {}", bots.len(), dir.display());
    Ok(bots)
}

/// Names and one-line descriptions of the built-in strategies
pub fn builtin_catalog() -> Vec<(StrategyBase, String)> {
    StrategyBase::ALL
        .iter()
        .map(|base| (*base, match_logic::strategy::describe_strategy(&Strategy::new(*base))))
        .collect()
}
