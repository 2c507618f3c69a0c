//! Subcommand handlers

pub mod builtins;
pub mod replay;
pub mod run;

use anyhow::Result;

use crate::settings::Command;

pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run::execute(&args),
        Command::Replay(args) => replay::execute(&args),
        Command::Builtins => {
            print!("{}", builtins::render());
            Ok(())
        }
    }
}
