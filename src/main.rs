//! Offline terrain map renderer.
#![forbid(unsafe_code)]

mod app;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "atlas", about = "Render top-down terrain maps into region tiles")]
struct Cli {
    /// Config file
    #[arg(long, short, global = true, default_value = "atlas.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every region inside the border, resuming a saved checkpoint
    Render {
        /// Discard the checkpoint and start from the center
        #[arg(long)]
        restart: bool,
        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Show the saved state of the map
    Status,
    /// Validate a block color table
    Colors {
        /// Color table path
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Render { restart, max_ticks } => config::load_config(&cli.config)
            .and_then(|cfg| app::run_render(&cfg, &app::RenderOptions { restart, max_ticks })),
        Command::Status => config::load_config(&cli.config).and_then(|cfg| app::print_status(&cfg)),
        Command::Colors { path } => app::check_colors(&path),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
