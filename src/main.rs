use anyhow::Result;
use clap::Parser;
use indicatif::MultiProgress;

use cli::command::{Cli, Commands};
use cli::info::cmd_info;

mod cli;
mod input;
mod logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let multi = MultiProgress::new();
    let progress = logging::init(&cli, &multi)?;

    match &cli.command {
        Commands::Info(args) => cmd_info(args, &cli, progress),
    }
}
