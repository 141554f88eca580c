use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::error;

use crate::config::LauncherConfig;
use crate::console::Console;
use crate::engine::state::ChannelId;

mod config;
mod console;
mod engine;
mod env;
mod installer;
mod networking;
mod process;
mod storage;
#[cfg(test)]
mod test_support;
mod updater;
mod util;

#[derive(Parser, Debug)]
#[command(
    name = "StereoMix Launcher",
    author,
    version,
    about = "Installs, updates and launches StereoMix"
)]
struct Cli {
    /// Print launcher version and exit.
    #[arg(long)]
    version_only: bool,

    /// Override the directory holding installs and version files.
    #[arg(long, value_name = "DIR")]
    app_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report the state of every channel.
    Check,
    /// Install, update or launch a channel.
    Play {
        #[arg(long, value_enum, default_value_t = ChannelArg::Game)]
        channel: ChannelArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ChannelArg {
    Game,
    Dev,
    Launcher,
}

impl From<ChannelArg> for ChannelId {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Game => ChannelId::Game,
            ChannelArg::Dev => ChannelId::Dev,
            ChannelArg::Launcher => ChannelId::Launcher,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.version_only {
        println!("StereoMix Launcher {}", updater::CURRENT_VERSION);
        return ExitCode::SUCCESS;
    }

    let app_dir = cli.app_dir.unwrap_or_else(env::default_app_dir);
    if let Err(err) = env::ensure_app_dir(&app_dir) {
        error!("failed to create {}: {err}", app_dir.display());
        return ExitCode::FAILURE;
    }

    let config = match LauncherConfig::load(&app_dir) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let trigger = match cli.command {
        None | Some(Command::Check) => None,
        Some(Command::Play { channel }) => Some(channel.into()),
    };
    Console::new(config, app_dir).run(trigger)
}
