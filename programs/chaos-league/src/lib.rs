//! Chaos League command line program
//!
//! Loads bot definitions from disk, runs the league through `match-logic`
//! and checks persisted journals by replay.

pub mod commands;
pub mod error;
pub mod registry;
pub mod report;
pub mod settings;
