pub mod clock;
pub mod completion;
pub mod db;
pub mod error;
pub mod models;
pub mod progress;
pub mod sensing;
pub mod session;
pub mod settings;
pub mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use tokio::sync::{broadcast::error::RecvError, Mutex};
use tokio_util::sync::CancellationToken;

use clock::{Clock, SystemClock};
use completion::{CompletionPipeline, HealthExporter, JsonlExporter};
use db::Database;
use progress::ProgressStore;
use sensing::{simulate_feed, SensingController, SimulatedRunner};
use session::{
    CompletionReport, ControllerConfig, SegmentKind, SessionController, SessionEvent,
    SessionPlan,
};
use settings::SettingsStore;
use utils::logging::init_logging;

pub use error::{CompletionError, SessionError};

const DB_FILE: &str = "fitflow.sqlite3";
const SETTINGS_FILE: &str = "settings.json";
const EXPORT_FILE: &str = "health_export.jsonl";

/// Everything a front end needs, wired against one data directory.
pub struct AppState {
    pub db: Database,
    pub settings: Arc<SettingsStore>,
    pub session: SessionController,
    pub sensing: Mutex<SensingController>,
    pub config: ControllerConfig,
}

impl AppState {
    pub fn bootstrap(data_dir: &Path, config: ControllerConfig) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let database = Database::new(data_dir.join(DB_FILE))?;
        let settings = Arc::new(SettingsStore::new(data_dir.join(SETTINGS_FILE))?);

        let export_path = settings
            .health_export()
            .path
            .unwrap_or_else(|| data_dir.join(EXPORT_FILE));
        let exporter: Arc<dyn HealthExporter> = Arc::new(JsonlExporter::new(export_path));

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pipeline = CompletionPipeline::new(
            Arc::new(database.clone()),
            settings.clone(),
            Some(exporter),
            clock.clone(),
        );
        let session = SessionController::new(Arc::new(pipeline), clock, config);

        Ok(Self {
            db: database,
            settings,
            session,
            sensing: Mutex::new(SensingController::new()),
            config,
        })
    }
}

/// `FITFLOW_DATA_DIR`, else the platform's local data directory.
pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("FITFLOW_DATA_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    dirs::data_local_dir()
        .map(|dir| dir.join("fitflow"))
        .ok_or_else(|| anyhow!("no local data directory on this platform; set FITFLOW_DATA_DIR"))
}

fn demo_plan() -> SessionPlan {
    SessionPlan::intervals(
        "demo-intervals",
        "Demo intervals",
        10,
        3,
        (SegmentKind::Run, 20),
        (SegmentKind::Walk, 10),
        10,
    )
}

/// Runs one simulated interval session end to end and prints its report.
pub async fn run() -> Result<()> {
    init_logging();
    info!("FitFlow starting up...");

    let data_dir = resolve_data_dir()?;
    let app = AppState::bootstrap(&data_dir, ControllerConfig::from_env())?;
    let mut events = app.session.subscribe();

    let plan = demo_plan();
    if let Some(planned) = plan.planned_duration_seconds() {
        info!(
            "Planned {}s across {} segments (tick every {:?})",
            planned,
            plan.segments.len(),
            app.config.tick_interval
        );
    }
    app.session.start(plan).await?;

    let feed_cancel = CancellationToken::new();
    let (feed, feeder) = simulate_feed(
        SimulatedRunner::default(),
        app.config.tick_interval,
        feed_cancel.clone(),
    );
    app.sensing
        .lock()
        .await
        .start_sensing(feed, app.session.clone())?;

    let report = wait_for_completion(&mut events).await;

    feed_cancel.cancel();
    app.sensing.lock().await.stop_sensing().await?;
    if let Err(err) = feeder.await {
        warn!("Simulated sensor feed ended abnormally: {err}");
    }

    let report = report?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize report")?
    );

    let streak = app.db.load_streak().await?;
    let stats = app.db.load_stats().await?;
    info!(
        "Streak {} day(s); {} session(s) in total, {} this week",
        streak.current_streak_count, stats.total_sessions, stats.sessions_this_week
    );

    Ok(())
}

async fn wait_for_completion(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Result<CompletionReport> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Completed(report)) => return Ok(report),
            Ok(SessionEvent::SegmentAdvanced { index, .. }) => {
                info!("Segment {} started", index + 1);
            }
            Ok(SessionEvent::Heartbeat(snapshot)) => {
                info!(
                    "{}s elapsed, {:.0} m, segment {}/{}",
                    snapshot.state.total_elapsed_seconds,
                    snapshot.state.live_distance_meters,
                    snapshot.state.current_index + 1,
                    snapshot.state.segments.len()
                );
            }
            Ok(SessionEvent::Cancelled(record)) => {
                bail!("session {} was cancelled", record.session_id);
            }
            Ok(SessionEvent::StateChanged(_)) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event receiver lagged; skipped {skipped} events");
            }
            Err(RecvError::Closed) => bail!("session event channel closed"),
        }
    }
}
