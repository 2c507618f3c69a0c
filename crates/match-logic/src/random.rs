//! Seeded pseudo-random number generation
//!
//! Deterministic PRNG for reproducible match execution.
//! Every match gets an isolated stream derived from the league seed salt
//! and the match key; each bot in the match receives its own fork of it.
//! Bots only ever hold a `SeededRng`, never the seed it came from.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LeagueError;
use crate::strategy::Side;

/// Stream constant mixed into side A's fork
const SIDE_A_STREAM: u64 = 0xA5A5_A5A5;
/// Stream constant mixed into side B's fork
const SIDE_B_STREAM: u64 = 0x5A5A_5A5A;

/// Global seed salt. Config accepts an integer or a string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedSalt {
    Int(i64),
    Text(String),
}

impl Default for SeedSalt {
    fn default() -> Self {
        SeedSalt::Text("CHAOS_LEAGUE_2026".to_string())
    }
}

impl fmt::Display for SeedSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedSalt::Int(v) => write!(f, "{v}"),
            SeedSalt::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for SeedSalt {
    fn from(s: &str) -> Self {
        SeedSalt::Text(s.to_string())
    }
}

impl From<i64> for SeedSalt {
    fn from(v: i64) -> Self {
        SeedSalt::Int(v)
    }
}

/// Seeded random number generator
///
/// Deterministic: same seed + index = same sequence
#[derive(Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    /// Create a new RNG from a 32-byte seed and match index
    pub fn new(seed: &[u8; 32], match_index: u32) -> Self {
        // Combine seed bytes into initial state
        let mut state = 0u64;
        for (i, chunk) in seed.chunks(8).enumerate() {
            let mut bytes = [0u8; 8];
            bytes[..chunk.len()].copy_from_slice(chunk);
            state ^= u64::from_le_bytes(bytes).wrapping_add(i as u64);
        }

        state ^= (match_index as u64).wrapping_mul(0x517cc1b727220a95);

        // xorshift has a fixed point at zero
        if state == 0 {
            state = 0x9e3779b97f4a7c15;
        }

        // Warm up the generator
        let mut rng = Self { state };
        for _ in 0..8 {
            rng.next_u64();
        }

        rng
    }

    /// Independent stream derived from this one
    pub(crate) fn fork(&self, stream: u64) -> Self {
        let mut state = self.state ^ stream.wrapping_mul(0x9e3779b97f4a7c15);
        if state == 0 {
            state = 0x9e3779b97f4a7c15;
        }

        let mut rng = Self { state };
        rng.next_u64(); // Mix
        rng
    }

    /// Generate next u64
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545f4914f6cdd1d)
    }

    /// Generate next u32
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Generate a value in range [0, max)
    pub fn next_range(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.next_u32() % max
    }

    /// Uniform float in [0, 1) with 53 bits of precision
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Pick one element uniformly, `None` for an empty slice
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.next_range(items.len() as u32) as usize;
        items.get(idx)
    }
}

impl fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SeededRng { .. }")
    }
}

impl rand::RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        SeededRng::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        SeededRng::next_u64(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = SeededRng::next_u64(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Identifies one scheduled match for RNG derivation.
///
/// Bot identities are stored sorted so the key does not depend on seating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchKey {
    low: String,
    high: String,
    match_index: u32,
}

impl MatchKey {
    pub fn new(bot_a: &str, bot_b: &str, match_index: u32) -> Self {
        let (low, high) = if bot_a <= bot_b { (bot_a, bot_b) } else { (bot_b, bot_a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
            match_index,
        }
    }

    pub fn match_index(&self) -> u32 {
        self.match_index
    }
}

/// Per-side random streams for one match
#[derive(Debug)]
pub struct MatchRng {
    side_a: SeededRng,
    side_b: SeededRng,
}

impl MatchRng {
    pub fn side(&mut self, side: Side) -> &mut SeededRng {
        match side {
            Side::A => &mut self.side_a,
            Side::B => &mut self.side_b,
        }
    }
}

/// Derives isolated match streams from the league seed salt
#[derive(Clone, Debug)]
pub struct RngController {
    salt: SeedSalt,
}

impl RngController {
    pub fn new(salt: SeedSalt) -> Self {
        Self { salt }
    }

    pub fn salt(&self) -> &SeedSalt {
        &self.salt
    }

    /// Build the random streams for a match.
    ///
    /// Fails when the key pairs a bot with itself; such a key can only come
    /// from a broken schedule.
    pub fn for_match(&self, key: &MatchKey) -> Result<MatchRng, LeagueError> {
        if key.low.is_empty() || key.high.is_empty() {
            return Err(LeagueError::RngDerivation(format!(
                "match {} has an empty bot identity",
                key.match_index
            )));
        }
        if key.low == key.high {
            return Err(LeagueError::RngDerivation(format!(
                "match {} pairs {} with itself",
                key.match_index, key.low
            )));
        }

        let seed = self.match_seed(key);
        let base = SeededRng::new(&seed, key.match_index);
        Ok(MatchRng {
            side_a: base.fork(SIDE_A_STREAM),
            side_b: base.fork(SIDE_B_STREAM),
        })
    }

    /// SHA-256 over length-prefixed key fields
    fn match_seed(&self, key: &MatchKey) -> [u8; 32] {
        let salt = self.salt.to_string();
        let mut hasher = Sha256::new();
        hasher.update(b"chaos-league");
        for field in [salt.as_str(), key.low.as_str(), key.high.as_str()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(key.match_index.to_le_bytes());
        hasher.finalize().into()
    }
}
