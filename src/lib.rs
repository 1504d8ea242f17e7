pub mod display;
pub mod presence;
pub mod sensing;
pub mod settings;
pub mod stats;
pub mod timer;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;

use display::ConsoleRenderer;
use presence::PresenceSample;
use sensing::{load_replay, CameraSession, Collaborators, LoopReport};
use settings::{Settings, SettingsStore};
use stats::{DashboardView, HttpStatsBackend, StatsBackend};
use timer::{TimerController, TimerStatus};

const ENABLE_LOGS: bool = true;


/// Long-lived handles shared by every command.
pub struct AppState {
    pub settings: Settings,
    pub backend: Arc<dyn StatsBackend>,
    pub timer: TimerController,
}

impl AppState {
    pub fn new(settings: Settings, backend: Arc<dyn StatsBackend>) -> Self {
        let timer = TimerController::new(&settings, backend.clone());
        Self {
            settings,
            backend,
            timer,
        }
    }

    pub fn from_config(config_path: Option<PathBuf>) -> Result<Self> {
        let settings = SettingsStore::new(config_path)?.settings();
        let backend = HttpStatsBackend::new(&settings.backend_url, settings.request_timeout())?;
        log_info!("stats backend at {}", backend.endpoint());
        Ok(Self::new(settings, Arc::new(backend)))
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub path: PathBuf,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub snapshot: Option<PathBuf>,
}

/// Runs a camera session over a recorded detector stream. When the stream
/// ends the hands are treated as gone, so a last episode still gets its
/// grace period and report before returning.
pub async fn run_replay(app: &AppState, options: &ReplayOptions) -> Result<LoopReport> {
    let (source, detector) = load_replay(&options.path, options.fps, options.width, options.height)?;
    log_info!(
        "replaying {} frames from {} at {} fps",
        detector.len(),
        options.path.display(),
        options.fps
    );

    let mut session = CameraSession::new(
        Collaborators {
            source,
            detector,
            renderer: ConsoleRenderer::new(),
        },
        app.timer.clone(),
        app.settings.max_hands,
    );
    session.start().await?;
    let report = session.wait().await?;

    let mut finalized = app.timer.subscribe();
    app.timer.observe(&PresenceSample::empty()).await;
    if app.timer.get_state().await.status == TimerStatus::GracePeriod {
        let deadline = app.settings.grace_period() + app.settings.tick_interval();
        match tokio::time::timeout(deadline, finalized.recv()).await {
            Ok(Ok(episode)) => log_info!("last episode lasted {}s", episode.seconds),
            Ok(Err(err)) => log_warn!("missed final episode: {err}"),
            Err(_) => log_warn!("final episode did not settle within {:?}", deadline),
        }
    }
    app.timer.flush_reports().await;

    if let Some(path) = &options.snapshot {
        if let Some(parts) = session.into_parts() {
            parts.renderer.save_snapshot(path)?;
            log_info!("last frame written to {}", path.display());
        }
    }

    Ok(report)
}

/// Fetches the stored episodes and builds the dashboard. A failed fetch is
/// logged and leaves the dashboard empty.
pub async fn load_dashboard(app: &AppState) -> DashboardView {
    match app.backend.fetch_records().await {
        Ok(records) => {
            log_info!("fetched {} records from backend", records.len());
            DashboardView::from_records(records, app.settings.good_threshold_secs)
        }
        Err(err) => {
            log_error!("Error fetching data: {err:#}");
            DashboardView::from_records(Vec::new(), app.settings.good_threshold_secs)
        }
    }
}
