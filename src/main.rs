use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use handtime_lib::{
    load_dashboard, log_info, log_warn, run_replay,
    settings::{SettingsPatch, SettingsStore},
    utils::logging,
    AppState, ReplayOptions,
};

const ENABLE_LOGS: bool = true;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Settings file (JSON). Defaults apply when missing.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Time hands in a recorded detector stream and report each episode.
    Replay {
        input: PathBuf,

        #[arg(long, default_value_t = 30)]
        fps: u32,

        #[arg(long, default_value_t = 640)]
        width: u32,

        #[arg(long, default_value_t = 480)]
        height: u32,

        /// Write the last annotated frame here as a PNG.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print statistics over every stored episode.
    Dashboard,
    /// Change settings and write them to the --config file, then print them.
    Config {
        #[arg(long)]
        backend_url: Option<String>,

        #[arg(long)]
        grace_period_secs: Option<u64>,

        #[arg(long)]
        tick_interval_ms: Option<u64>,

        #[arg(long)]
        good_threshold_secs: Option<u64>,

        #[arg(long)]
        max_hands: Option<usize>,

        #[arg(long)]
        request_timeout_secs: Option<u64>,
    },
}

fn update_config(config: Option<PathBuf>, patch: SettingsPatch) -> Result<()> {
    let store = SettingsStore::new(config)?;
    if !store.has_file() && !patch.is_empty() {
        log_warn!("no --config file given, changes will not be saved");
    }
    let settings = store.apply_patch(patch)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    match args.command {
        Commands::Replay {
            input,
            fps,
            width,
            height,
            snapshot,
        } => {
            let app = AppState::from_config(args.config)?;
            let report = run_replay(
                &app,
                &ReplayOptions {
                    path: input,
                    fps,
                    width,
                    height,
                    snapshot,
                },
            )
            .await?;
            log_info!(
                "replay finished: {} frames, {} detector failures",
                report.frames, report.detector_failures
            );
        }
        Commands::Dashboard => {
            let app = AppState::from_config(args.config)?;
            for line in load_dashboard(&app).await.lines() {
                println!("{line}");
            }
        }
        Commands::Config {
            backend_url,
            grace_period_secs,
            tick_interval_ms,
            good_threshold_secs,
            max_hands,
            request_timeout_secs,
        } => {
            let patch = SettingsPatch {
                backend_url,
                grace_period_secs,
                tick_interval_ms,
                good_threshold_secs,
                max_hands,
                request_timeout_secs,
            };
            update_config(args.config, patch)?;
        }
    }

    Ok(())
}
