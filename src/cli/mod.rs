pub mod goals;
pub mod track;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use goals::{process_goal_command, GoalCommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, level_filters::LevelFilter};
use track::{process_track_command, TrackCommand};

use crate::{
    engine::{create_engine, open_store, service::EngineHandle, EngineConfig},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, LOG_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Timecraft", version, long_about = None)]
#[command(about = "Track time spent on your daily goals", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Mirror logs to the console")]
    log: bool,
    #[arg(long = "log-filter", global = true)]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Goals(GoalCommand),
    #[command(about = "Track time for a goal until interrupted")]
    Track {
        #[command(flatten)]
        command: TrackCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let Args {
        commands,
        dir,
        log,
        log_filter,
    } = Args::parse();

    let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
    let level = log_filter.or(log.then_some(LevelFilter::TRACE));
    enable_logging(LOG_PREFIX, &app_dir, level, log)?;

    let shutdown = CancellationToken::new();
    let (service, handle) = create_engine(
        open_store(&app_dir)?,
        DefaultClock,
        EngineConfig::default(),
        &shutdown,
    )
    .await;

    let (service_result, command_result) = tokio::join!(service.run(), async {
        let result = run_command(commands, &handle, &shutdown).await;
        shutdown.cancel();
        result
    });

    if let Err(service_result) = service_result {
        error!("Timer engine got an error {:?}", service_result);
    }
    command_result
}

async fn run_command(
    commands: Commands,
    handle: &EngineHandle,
    shutdown: &CancellationToken,
) -> Result<()> {
    match commands {
        Commands::Goals(command) => process_goal_command(command, handle).await,
        Commands::Track { command } => process_track_command(command, handle, shutdown).await,
    }
}
