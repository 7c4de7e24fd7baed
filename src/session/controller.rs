use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::Duration,
};

use log::{error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    clock::Clock,
    completion::{CompletionPipeline, CompletionResult},
    error::SessionError,
    models::FinishedSessionRecord,
};

use super::{
    segment::{SegmentSpec, SessionPlan},
    state::{ActiveSessionState, SensorSample, Transition},
};

// Per-tick logging is noisy; flip to true when debugging the clock.
const ENABLE_LOGS: bool = false;

use crate::log_debug;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: ActiveSessionState,
    pub current_segment: Option<SegmentSpec>,
    pub next_segment: Option<SegmentSpec>,
    pub progress: f64,
    pub remaining_seconds: Option<u32>,
    pub segment_distance_meters: f64,
}

impl From<&ActiveSessionState> for SessionSnapshot {
    fn from(state: &ActiveSessionState) -> Self {
        Self {
            current_segment: state.current_segment().cloned(),
            next_segment: state.next_segment().cloned(),
            progress: state.progress(),
            remaining_seconds: state.remaining_seconds(),
            segment_distance_meters: state.segment_distance_meters(),
            state: state.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub record: FinishedSessionRecord,
    pub result: CompletionResult,
}

/// Broadcast to the presentation layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionSnapshot),
    Heartbeat(SessionSnapshot),
    SegmentAdvanced { session_id: String, index: usize },
    Completed(CompletionReport),
    Cancelled(FinishedSessionRecord),
}

/// Result of a command that may end the session.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Updated(SessionSnapshot),
    Completed(CompletionReport),
}

/// Result of one manual clock tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Session is paused; nothing counted.
    Ignored,
    Ticked(SessionSnapshot),
    Advanced(SessionSnapshot),
    Completed(CompletionReport),
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
    pub heartbeat_every_ticks: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: 10,
        }
    }
}

impl ControllerConfig {
    /// `FITFLOW_DEBUG=1` heartbeats every tick; `FITFLOW_TICK_MS` overrides the
    /// tick period (simulations run faster than real time).
    pub fn from_env() -> Self {
        let debug_mode = std::env::var("FITFLOW_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let tick_interval = std::env::var("FITFLOW_TICK_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(1));

        Self {
            tick_interval,
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
        }
    }
}

/// Single-session invariant as a type.
#[derive(Default)]
enum SessionSlot {
    #[default]
    Idle,
    Active(Box<ActiveSessionState>),
}

/// What one tick did, before any completion work.
enum ClockStep {
    Ignored,
    Ticked(SessionSnapshot),
    Advanced(SessionSnapshot),
    Finished(FinishedSessionRecord),
}

struct RunningTicker {
    handle: JoinHandle<()>,
    /// Deadline of the first tick not yet counted. Written by the ticker task
    /// right after each counted tick.
    next_due: Arc<StdMutex<Instant>>,
}

#[derive(Default)]
struct TickerSlot {
    running: Option<RunningTicker>,
    /// Time still owed to the next tick when the clock was paused.
    carried: Option<Duration>,
}

#[derive(Clone)]
pub struct SessionController {
    slot: Arc<Mutex<SessionSlot>>,
    ticker: Arc<Mutex<TickerSlot>>,
    pipeline: Arc<CompletionPipeline>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<SessionEvent>,
    config: ControllerConfig,
}

impl SessionController {
    pub fn new(
        pipeline: Arc<CompletionPipeline>,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            slot: Arc::new(Mutex::new(SessionSlot::Idle)),
            ticker: Arc::new(Mutex::new(TickerSlot::default())),
            pipeline,
            clock,
            events,
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// `None` while idle.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        match &*self.slot.lock().await {
            SessionSlot::Active(state) => Some(SessionSnapshot::from(&**state)),
            SessionSlot::Idle => None,
        }
    }

    pub async fn is_clock_running(&self) -> bool {
        self.ticker
            .lock()
            .await
            .running
            .as_ref()
            .map(|ticker| !ticker.handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn start(&self, plan: SessionPlan) -> Result<SessionSnapshot, SessionError> {
        let session_id = Uuid::new_v4().to_string();

        let snapshot = {
            let mut slot = self.slot.lock().await;
            if matches!(*slot, SessionSlot::Active(_)) {
                return Err(SessionError::AlreadyActive);
            }

            let state = ActiveSessionState::begin(plan, session_id.clone(), self.clock.now())?;
            info!(
                "Starting session {} '{}' with {} segments",
                session_id,
                state.name,
                state.segments.len()
            );
            let snapshot = SessionSnapshot::from(&state);
            *slot = SessionSlot::Active(Box::new(state));
            snapshot
        };

        self.spawn_ticker(session_id).await;
        self.emit(SessionEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn pause(&self) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self
            .with_active(|state| {
                state.pause()?;
                Ok(SessionSnapshot::from(&*state))
            })
            .await?;

        self.park_ticker().await;
        info!("Paused session {}", snapshot.state.session_id);
        self.emit(SessionEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn resume(&self) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self
            .with_active(|state| {
                state.resume()?;
                Ok(SessionSnapshot::from(&*state))
            })
            .await?;

        self.spawn_ticker(snapshot.state.session_id.clone()).await;
        info!("Resumed session {}", snapshot.state.session_id);
        self.emit(SessionEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Completes the current segment; on the last one this finishes the
    /// session and runs the completion pipeline.
    pub async fn skip(&self) -> Result<CommandOutcome, SessionError> {
        let now = self.clock.now();
        let flow = {
            let mut slot = self.slot.lock().await;
            let SessionSlot::Active(state) = &mut *slot else {
                return Err(SessionError::NoActiveSession);
            };
            match state.skip(now)? {
                Transition::Finished(record) => {
                    *slot = SessionSlot::Idle;
                    ControlFlow::Break(record)
                }
                _ => ControlFlow::Continue(SessionSnapshot::from(&**state)),
            }
        };

        match flow {
            ControlFlow::Continue(snapshot) => {
                self.announce_advance(&snapshot);
                Ok(CommandOutcome::Updated(snapshot))
            }
            ControlFlow::Break(record) => {
                self.cancel_ticker().await;
                self.complete(record).await.map(CommandOutcome::Completed)
            }
        }
    }

    /// Pose flows only.
    pub async fn previous(&self) -> Result<SessionSnapshot, SessionError> {
        let (transition, snapshot) = self
            .with_active(|state| {
                let transition = state.previous()?;
                Ok((transition, SessionSnapshot::from(&*state)))
            })
            .await?;

        if transition != Transition::Unchanged {
            self.announce_advance(&snapshot);
        }
        Ok(snapshot)
    }

    /// Ends the session early and runs the completion pipeline once.
    pub async fn finish(&self) -> Result<CompletionReport, SessionError> {
        let now = self.clock.now();
        let record = self.take_active(|state| state.finish(now)).await?;
        self.cancel_ticker().await;
        self.complete(record).await
    }

    /// Ends the session without crediting it. The returned record is for
    /// display only and must not be fed to the pipeline.
    pub async fn cancel(&self) -> Result<FinishedSessionRecord, SessionError> {
        let now = self.clock.now();
        let record = self.take_active(|state| state.cancel(now)).await?;
        self.cancel_ticker().await;
        info!(
            "Cancelled session {} after {}s",
            record.session_id, record.total_duration_seconds
        );
        self.emit(SessionEvent::Cancelled(record.clone()));
        Ok(record)
    }

    pub async fn update_live_data(&self, sample: SensorSample) -> Result<(), SessionError> {
        self.with_active(|state| state.apply_sample(sample)).await
    }

    /// Logs strength volume (load × reps) against the active session.
    pub async fn add_volume(&self, amount: f64) -> Result<(), SessionError> {
        self.with_active(|state| state.add_volume(amount)).await
    }

    /// One clock second, for callers driving simulated time themselves.
    pub async fn tick(&self) -> Result<TickOutcome, SessionError> {
        match self.advance_clock(None).await? {
            ClockStep::Ignored => Ok(TickOutcome::Ignored),
            ClockStep::Ticked(snapshot) => Ok(TickOutcome::Ticked(snapshot)),
            ClockStep::Advanced(snapshot) => Ok(TickOutcome::Advanced(snapshot)),
            ClockStep::Finished(record) => {
                self.cancel_ticker().await;
                self.complete(record).await.map(TickOutcome::Completed)
            }
        }
    }

    /// `expected` pins the tick to the session a ticker was spawned for, so a
    /// stale ticker can never advance a newer session.
    async fn advance_clock(&self, expected: Option<&str>) -> Result<ClockStep, SessionError> {
        let now = self.clock.now();
        let mut slot = self.slot.lock().await;
        let SessionSlot::Active(state) = &mut *slot else {
            return Err(SessionError::NoActiveSession);
        };
        if expected.is_some_and(|id| id != state.session_id) {
            return Err(SessionError::NoActiveSession);
        }

        let step = match state.tick(now) {
            Transition::Ignored => ClockStep::Ignored,
            Transition::Advanced { index } => {
                log_debug!("Session {} advanced to segment {}", state.session_id, index);
                ClockStep::Advanced(SessionSnapshot::from(&**state))
            }
            Transition::Finished(record) => ClockStep::Finished(record),
            Transition::Ticked | Transition::Unchanged => {
                ClockStep::Ticked(SessionSnapshot::from(&**state))
            }
        };

        match step {
            ClockStep::Finished(_) => *slot = SessionSlot::Idle,
            ClockStep::Advanced(ref snapshot) => self.announce_advance(snapshot),
            _ => {}
        }
        Ok(step)
    }

    async fn complete(&self, record: FinishedSessionRecord) -> Result<CompletionReport, SessionError> {
        info!(
            "Session {} finished after {}s ({} segments)",
            record.session_id, record.total_duration_seconds, record.segments_completed
        );

        match self.pipeline.process(&record).await {
            Ok(result) => {
                let report = CompletionReport { record, result };
                self.emit(SessionEvent::Completed(report.clone()));
                Ok(report)
            }
            Err(err) => {
                error!("Completion pipeline rejected session {}: {err}", record.session_id);
                Err(err.into())
            }
        }
    }

    async fn with_active<T>(
        &self,
        f: impl FnOnce(&mut ActiveSessionState) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut slot = self.slot.lock().await;
        match &mut *slot {
            SessionSlot::Active(state) => f(state),
            SessionSlot::Idle => Err(SessionError::NoActiveSession),
        }
    }

    /// Runs a terminal transition and empties the slot if it succeeds.
    async fn take_active(
        &self,
        f: impl FnOnce(&mut ActiveSessionState) -> Result<FinishedSessionRecord, SessionError>,
    ) -> Result<FinishedSessionRecord, SessionError> {
        let mut slot = self.slot.lock().await;
        let record = match &mut *slot {
            SessionSlot::Active(state) => f(state)?,
            SessionSlot::Idle => return Err(SessionError::NoActiveSession),
        };
        *slot = SessionSlot::Idle;
        Ok(record)
    }

    /// Starts the clock for `session_id`. After a pause the first tick lands
    /// once the carried remainder of the interrupted period has run.
    async fn spawn_ticker(&self, session_id: String) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.running.take() {
            previous.handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.config.tick_interval;
        let heartbeat_every = self.config.heartbeat_every_ticks.max(1);
        let first_delay = ticker_guard.carried.take().unwrap_or(tick_interval);
        let first_due = Instant::now() + first_delay;
        let next_due = Arc::new(StdMutex::new(first_due));
        let due_writer = next_due.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(first_due, tick_interval);
            // Catch up after a stall so no running second is dropped.
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                let due = interval.tick().await;

                match controller.advance_clock(Some(&session_id)).await {
                    Ok(ClockStep::Ticked(snapshot)) => {
                        mark_counted(&due_writer, due + tick_interval);
                        if snapshot.state.total_elapsed_seconds % heartbeat_every == 0 {
                            controller.emit(SessionEvent::Heartbeat(snapshot));
                        }
                    }
                    Ok(ClockStep::Advanced(_)) => {
                        mark_counted(&due_writer, due + tick_interval);
                    }
                    Ok(ClockStep::Finished(record)) => {
                        // Own task so aborting this ticker can never cut the
                        // pipeline short.
                        let completer = controller.clone();
                        tokio::spawn(async move {
                            let _ = completer.complete(record).await;
                        });
                        break;
                    }
                    Ok(ClockStep::Ignored) => break,
                    Err(_) => {
                        warn!("Ticker for session {session_id} outlived its session");
                        break;
                    }
                }
            }
        });

        ticker_guard.running = Some(RunningTicker { handle, next_due });
    }

    /// Tears the ticker down and waits for it, so no tick lands after this
    /// returns. Yields the time left until the next uncounted tick.
    async fn stop_ticker(&self) -> Option<Duration> {
        let RunningTicker { handle, next_due } = self.ticker.lock().await.running.take()?;
        handle.abort();
        let _ = handle.await;

        let next_due = *next_due.lock().unwrap_or_else(PoisonError::into_inner);
        Some(next_due.saturating_duration_since(Instant::now()))
    }

    async fn cancel_ticker(&self) {
        self.stop_ticker().await;
        self.ticker.lock().await.carried = None;
    }

    /// Stops the clock but keeps the part of the current period that already
    /// ran, for `resume` to pick up.
    async fn park_ticker(&self) {
        let carried = self.stop_ticker().await;
        self.ticker.lock().await.carried = carried;
    }

    fn announce_advance(&self, snapshot: &SessionSnapshot) {
        self.emit(SessionEvent::SegmentAdvanced {
            session_id: snapshot.state.session_id.clone(),
            index: snapshot.state.current_index,
        });
        self.emit(SessionEvent::StateChanged(snapshot.clone()));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn mark_counted(next_due: &StdMutex<Instant>, due: Instant) {
    *next_due.lock().unwrap_or_else(PoisonError::into_inner) = due;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        models::ActivityKind,
        progress::{MemoryProgressStore, ProgressStore},
        session::{
            segment::{SegmentKind, SegmentPhase, SessionFormat},
            RunState,
        },
        settings::StaticProfile,
    };
    use chrono::Utc;
    use tokio::{sync::broadcast::error::RecvError, time::sleep};

    fn controller(store: Arc<MemoryProgressStore>, config: ControllerConfig) -> SessionController {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pipeline = CompletionPipeline::new(
            store,
            Arc::new(StaticProfile {
                weight_kg: Some(70.0),
                health_export_enabled: false,
            }),
            None,
            clock.clone(),
        );
        SessionController::new(Arc::new(pipeline), clock, config)
    }

    /// Ticker effectively disabled so tests drive `tick` by hand.
    fn manual_config() -> ControllerConfig {
        ControllerConfig {
            tick_interval: Duration::from_secs(24 * 60 * 60),
            heartbeat_every_ticks: 10,
        }
    }

    fn timed_plan(durations: &[u32]) -> SessionPlan {
        SessionPlan::new(
            "lib-intervals",
            "Intervals",
            ActivityKind::Running,
            SessionFormat::Interval,
            durations
                .iter()
                .map(|secs| SegmentSpec::timed(SegmentPhase::Main, SegmentKind::Run, *secs))
                .collect(),
        )
    }

    async fn elapsed(controller: &SessionController) -> u32 {
        controller
            .snapshot()
            .await
            .map(|snapshot| snapshot.state.total_elapsed_seconds)
            .unwrap_or_default()
    }

    /// Collects events up to and including the completion.
    async fn events_until_completed(
        rx: &mut broadcast::Receiver<SessionEvent>,
    ) -> (Vec<SessionEvent>, CompletionReport) {
        let mut seen = Vec::new();
        loop {
            match rx.recv().await {
                Ok(SessionEvent::Completed(report)) => return (seen, report),
                Ok(event) => seen.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event channel closed"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interval_session_runs_to_completion_on_its_own() {
        let store = Arc::new(MemoryProgressStore::new());
        let controller = controller(store.clone(), ControllerConfig::default());
        let mut rx = controller.subscribe();

        controller.start(timed_plan(&[30, 10])).await.unwrap();
        let (events, report) = events_until_completed(&mut rx).await;

        assert_eq!(report.record.total_duration_seconds, 40);
        assert_eq!(report.record.segments_completed, 2);
        assert!(!report.record.cancelled);
        assert!(report.result.stats_updated);
        assert!(events
            .iter()
            .any(|event| matches!(event, SessionEvent::SegmentAdvanced { index: 1, .. })));

        assert!(controller.snapshot().await.is_none());
        assert!(!controller.is_clock_running().await);
        assert_eq!(store.load_stats().await.unwrap().total_sessions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_follow_the_configured_cadence() {
        let store = Arc::new(MemoryProgressStore::new());
        let controller = controller(store, ControllerConfig::default());
        let mut rx = controller.subscribe();

        controller.start(timed_plan(&[25])).await.unwrap();
        let (events, _) = events_until_completed(&mut rx).await;

        let heartbeats: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Heartbeat(snapshot) => Some(snapshot.state.total_elapsed_seconds),
                _ => None,
            })
            .collect();
        assert_eq!(heartbeats, vec![10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_the_clock_until_resume() {
        let controller = controller(Arc::new(MemoryProgressStore::new()), ControllerConfig::default());
        controller.start(timed_plan(&[600])).await.unwrap();

        sleep(Duration::from_millis(5_500)).await;
        assert_eq!(elapsed(&controller).await, 5);

        let paused = controller.pause().await.unwrap();
        assert_eq!(paused.state.run_state, RunState::Paused);
        assert!(!controller.is_clock_running().await);

        sleep(Duration::from_secs(100)).await;
        assert_eq!(elapsed(&controller).await, 5);

        controller.resume().await.unwrap();
        assert!(controller.is_clock_running().await);
        sleep(Duration::from_millis(3_500)).await;

        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.state.total_elapsed_seconds, 8);
        assert_eq!(snapshot.state.segment_elapsed_seconds, 8);
        assert_eq!(snapshot.remaining_seconds, Some(592));
    }

    #[tokio::test(start_paused = true)]
    async fn short_runs_between_pauses_add_up() {
        let controller = controller(Arc::new(MemoryProgressStore::new()), ControllerConfig::default());
        controller.start(timed_plan(&[600])).await.unwrap();

        for _ in 0..10 {
            sleep(Duration::from_millis(900)).await;
            controller.pause().await.unwrap();
            sleep(Duration::from_secs(5)).await;
            controller.resume().await.unwrap();
        }
        // The ninth second ends exactly at the last pause; let it land.
        sleep(Duration::from_millis(50)).await;

        assert_eq!(elapsed(&controller).await, 9);
        sleep(Duration::from_millis(900)).await;
        assert_eq!(elapsed(&controller).await, 9);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(elapsed(&controller).await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_tears_down_the_clock_and_skips_the_pipeline() {
        let store = Arc::new(MemoryProgressStore::new());
        let controller = controller(store.clone(), ControllerConfig::default());
        let mut rx = controller.subscribe();

        controller.start(timed_plan(&[600])).await.unwrap();
        sleep(Duration::from_millis(3_500)).await;

        let record = controller.cancel().await.unwrap();
        assert!(record.cancelled);
        assert_eq!(record.total_duration_seconds, 3);
        assert!(!controller.is_clock_running().await);
        assert!(controller.snapshot().await.is_none());

        sleep(Duration::from_secs(10)).await;
        assert!(controller.snapshot().await.is_none());

        assert_eq!(store.load_stats().await.unwrap(), Default::default());
        assert!(store.claim_session(&record.session_id, Utc::now()).await.unwrap());

        let mut cancelled_seen = false;
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, SessionEvent::Completed(_)));
            cancelled_seen |= matches!(event, SessionEvent::Cancelled(_));
        }
        assert!(cancelled_seen);

        // A fresh session starts from zero with its own clock.
        controller.start(timed_plan(&[600])).await.unwrap();
        assert_eq!(elapsed(&controller).await, 0);
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(elapsed(&controller).await, 2);
    }

    #[tokio::test]
    async fn start_while_active_is_rejected() {
        let controller = controller(Arc::new(MemoryProgressStore::new()), manual_config());
        let first = controller.start(timed_plan(&[60])).await.unwrap();

        assert_eq!(
            controller.start(timed_plan(&[30])).await.unwrap_err(),
            SessionError::AlreadyActive
        );
        let current = controller.snapshot().await.unwrap();
        assert_eq!(current.state.session_id, first.state.session_id);
        assert_eq!(current.state.segments.len(), 1);
        assert_eq!(current.state.segments[0].target_duration_seconds, Some(60));
    }

    #[tokio::test]
    async fn empty_plan_never_becomes_active() {
        let controller = controller(Arc::new(MemoryProgressStore::new()), manual_config());

        assert_eq!(
            controller.start(timed_plan(&[])).await.unwrap_err(),
            SessionError::EmptyPlan
        );
        assert!(controller.snapshot().await.is_none());
        assert!(!controller.is_clock_running().await);
    }

    #[tokio::test]
    async fn commands_without_a_session_are_rejected() {
        let controller = controller(Arc::new(MemoryProgressStore::new()), manual_config());

        assert_eq!(controller.pause().await.unwrap_err(), SessionError::NoActiveSession);
        assert_eq!(controller.finish().await.unwrap_err(), SessionError::NoActiveSession);
        assert_eq!(controller.cancel().await.unwrap_err(), SessionError::NoActiveSession);
        assert!(matches!(
            controller.tick().await,
            Err(SessionError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn manual_ticks_walk_through_every_segment() {
        let store = Arc::new(MemoryProgressStore::new());
        let controller = controller(store.clone(), manual_config());
        controller.start(timed_plan(&[2, 1])).await.unwrap();

        assert!(matches!(controller.tick().await.unwrap(), TickOutcome::Ticked(_)));
        match controller.tick().await.unwrap() {
            TickOutcome::Advanced(snapshot) => {
                assert_eq!(snapshot.state.current_index, 1);
                assert_eq!(snapshot.state.segment_elapsed_seconds, 0);
                assert_eq!(snapshot.progress, 0.5);
            }
            other => panic!("expected advance, got {other:?}"),
        }
        match controller.tick().await.unwrap() {
            TickOutcome::Completed(report) => {
                assert_eq!(report.record.total_duration_seconds, 3);
                assert_eq!(report.record.segments_completed, 2);
            }
            other => panic!("expected completion, got {other:?}"),
        }

        assert!(controller.snapshot().await.is_none());
        assert_eq!(store.load_stats().await.unwrap().total_sessions, 1);
    }

    #[tokio::test]
    async fn paused_ticks_are_ignored() {
        let controller = controller(Arc::new(MemoryProgressStore::new()), manual_config());
        controller.start(timed_plan(&[60])).await.unwrap();
        controller.pause().await.unwrap();

        assert!(matches!(controller.tick().await.unwrap(), TickOutcome::Ignored));
        assert_eq!(elapsed(&controller).await, 0);
    }

    #[tokio::test]
    async fn finish_runs_the_pipeline_exactly_once() {
        let store = Arc::new(MemoryProgressStore::new());
        let controller = controller(store.clone(), manual_config());
        controller.start(timed_plan(&[600])).await.unwrap();
        for _ in 0..90 {
            controller.tick().await.unwrap();
        }

        let report = controller.finish().await.unwrap();
        assert_eq!(report.record.total_duration_seconds, 90);
        assert_eq!(report.record.segments_completed, 0);
        assert!(report.result.streak_updated);
        assert!(report.result.stats_updated);
        assert!(!report.result.health_exported);
        assert!(!controller.is_clock_running().await);

        assert_eq!(controller.finish().await.unwrap_err(), SessionError::NoActiveSession);
        assert_eq!(store.load_stats().await.unwrap().total_sessions, 1);
        assert_eq!(store.load_streak().await.unwrap().current_streak_count, 1);
    }

    #[tokio::test]
    async fn skip_through_the_last_segment_completes() {
        let controller = controller(Arc::new(MemoryProgressStore::new()), manual_config());
        let mut rx = controller.subscribe();
        controller.start(timed_plan(&[30, 30])).await.unwrap();

        match controller.skip().await.unwrap() {
            CommandOutcome::Updated(snapshot) => assert_eq!(snapshot.state.current_index, 1),
            other => panic!("expected update, got {other:?}"),
        }
        match controller.skip().await.unwrap() {
            CommandOutcome::Completed(report) => assert_eq!(report.record.segments_completed, 2),
            other => panic!("expected completion, got {other:?}"),
        }

        let (events, _) = events_until_completed(&mut rx).await;
        assert!(events
            .iter()
            .any(|event| matches!(event, SessionEvent::SegmentAdvanced { index: 1, .. })));
        assert!(controller.snapshot().await.is_none());
        assert!(!controller.is_clock_running().await);
    }

    #[tokio::test]
    async fn previous_is_limited_to_pose_flows() {
        let controller = controller(Arc::new(MemoryProgressStore::new()), manual_config());
        controller.start(timed_plan(&[30, 30])).await.unwrap();
        controller.skip().await.unwrap();

        assert_eq!(
            controller.previous().await.unwrap_err(),
            SessionError::PreviousUnsupported
        );
        controller.cancel().await.unwrap();

        let flow = SessionPlan::pose_flow(
            "lib-flow",
            "Morning flow",
            vec![
                SegmentSpec::pose("Mountain", 30, None),
                SegmentSpec::pose("Warrior II", 45, Some(crate::session::Side::Left)),
            ],
        );
        controller.start(flow).await.unwrap();
        controller.skip().await.unwrap();

        let back = controller.previous().await.unwrap();
        assert_eq!(back.state.current_index, 0);
        let still = controller.previous().await.unwrap();
        assert_eq!(still.state.current_index, 0);
    }

    #[tokio::test]
    async fn live_data_and_volume_reach_the_record() {
        let store = Arc::new(MemoryProgressStore::new());
        let controller = controller(store.clone(), manual_config());
        let plan = SessionPlan::new(
            "lib-strength",
            "Lower body",
            ActivityKind::Strength,
            SessionFormat::Workout,
            vec![SegmentSpec::open(SegmentPhase::Main, SegmentKind::Rest).with_label("Back squat")],
        );
        controller.start(plan).await.unwrap();

        controller
            .update_live_data(SensorSample {
                steps: 120,
                distance_meters: 35.0,
                pace_min_per_km: None,
            })
            .await
            .unwrap();
        controller.add_volume(800.0).await.unwrap();
        controller.add_volume(450.0).await.unwrap();
        assert_eq!(
            controller.add_volume(-1.0).await.unwrap_err(),
            SessionError::InvalidVolume(-1.0)
        );

        let report = controller.finish().await.unwrap();
        assert_eq!(report.record.total_steps, Some(120));
        assert_eq!(report.record.total_distance_meters, Some(35.0));
        assert_eq!(report.record.total_volume, 1250.0);
        assert_eq!(store.load_stats().await.unwrap().total_volume, 1250.0);
    }

    #[tokio::test]
    async fn records_are_stamped_by_the_injected_clock() {
        use crate::clock::ManualClock;
        use chrono::TimeZone;

        let t0 = Utc.with_ymd_and_hms(2024, 5, 4, 7, 30, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let store = Arc::new(MemoryProgressStore::new());
        let pipeline = CompletionPipeline::new(
            store.clone(),
            Arc::new(StaticProfile::default()),
            None,
            clock.clone(),
        );
        let controller = SessionController::new(Arc::new(pipeline), clock.clone(), manual_config());

        let started = controller.start(timed_plan(&[600])).await.unwrap();
        assert_eq!(started.state.started_at, t0);

        clock.advance(chrono::Duration::minutes(25));
        let report = controller.finish().await.unwrap();
        assert_eq!(report.record.started_at, t0);
        assert_eq!(report.record.finished_at, t0 + chrono::Duration::minutes(25));

        let streak = store.load_streak().await.unwrap();
        assert_eq!(
            streak.last_activity_date,
            Some(crate::completion::activity_day(report.record.finished_at))
        );
    }

    #[test]
    fn default_config_ticks_every_second() {
        let config = ControllerConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.heartbeat_every_ticks, 10);
    }
}
