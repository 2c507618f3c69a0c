use anyhow::Result;
use chaos_league::commands::dispatch;
use chaos_league::settings::Cli;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .format_timestamp_millis()
        .init();

    dispatch(cli.command)
}
