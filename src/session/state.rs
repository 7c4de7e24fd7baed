use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::{ActivityKind, FinishedSessionRecord};

use super::segment::{CompletionCriterion, SegmentSpec, SessionFormat, SessionPlan};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
    Cancelled,
}

impl RunState {
    pub fn is_live(&self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }
}

/// One push from the sensing service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    pub steps: u32,
    pub distance_meters: f64,
    /// `None` while standing still.
    pub pace_min_per_km: Option<f64>,
}

/// Result of feeding the machine a tick or a segment command.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Not running; nothing changed.
    Ignored,
    /// Counters moved, same segment.
    Ticked,
    /// Command accepted but had nothing to do.
    Unchanged,
    Advanced { index: usize },
    Finished(FinishedSessionRecord),
}

/// The live session. Counters are owned by the clock, `live_*` fields by the
/// sensor adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionState {
    pub session_id: String,
    pub source_id: String,
    pub name: String,
    pub activity_kind: ActivityKind,
    pub format: SessionFormat,
    pub segments: Vec<SegmentSpec>,
    pub current_index: usize,
    pub segment_elapsed_seconds: u32,
    pub total_elapsed_seconds: u32,
    pub run_state: RunState,
    pub started_at: DateTime<Utc>,
    pub live_steps: u32,
    pub live_distance_meters: f64,
    pub live_pace_min_per_km: Option<f64>,
    pub volume: f64,
    /// Live distance when the current segment began.
    #[serde(skip)]
    segment_start_distance: f64,
}

impl ActiveSessionState {
    pub fn begin(
        plan: SessionPlan,
        session_id: String,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let plan = plan.validated()?;

        Ok(Self {
            session_id,
            source_id: plan.source_id,
            name: plan.name,
            activity_kind: plan.activity_kind,
            format: plan.format,
            segments: plan.segments,
            current_index: 0,
            segment_elapsed_seconds: 0,
            total_elapsed_seconds: 0,
            run_state: RunState::Running,
            started_at,
            live_steps: 0,
            live_distance_meters: 0.0,
            live_pace_min_per_km: None,
            volume: 0.0,
            segment_start_distance: 0.0,
        })
    }

    pub fn current_segment(&self) -> Option<&SegmentSpec> {
        self.segments.get(self.current_index)
    }

    pub fn next_segment(&self) -> Option<&SegmentSpec> {
        self.segments.get(self.current_index + 1)
    }

    pub fn is_last_segment(&self) -> bool {
        self.current_index + 1 >= self.segments.len()
    }

    /// `current_index / total`. Per-segment granularity, not time-weighted:
    /// a session sitting in its last segment reports `(n - 1) / n`.
    pub fn progress(&self) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        self.current_index as f64 / self.segments.len() as f64
    }

    /// Seconds left in a duration-bound segment.
    pub fn remaining_seconds(&self) -> Option<u32> {
        match self.current_segment()?.completion_criterion() {
            CompletionCriterion::Duration(target) => {
                Some(target.saturating_sub(self.segment_elapsed_seconds))
            }
            _ => None,
        }
    }

    /// Live distance covered since the current segment began.
    pub fn segment_distance_meters(&self) -> f64 {
        (self.live_distance_meters - self.segment_start_distance).max(0.0)
    }

    /// One clock second. Only counts while running.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Transition {
        if self.run_state != RunState::Running {
            return Transition::Ignored;
        }

        self.segment_elapsed_seconds = self.segment_elapsed_seconds.saturating_add(1);
        self.total_elapsed_seconds = self.total_elapsed_seconds.saturating_add(1);

        match self.current_segment().map(SegmentSpec::completion_criterion) {
            Some(CompletionCriterion::Duration(target))
                if self.segment_elapsed_seconds >= target =>
            {
                self.complete_segment(now)
            }
            _ => Transition::Ticked,
        }
    }

    /// Manual segment completion. Paused sessions advance and stay paused.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        self.require_live("skip")?;
        Ok(self.complete_segment(now))
    }

    pub fn previous(&mut self) -> Result<Transition, SessionError> {
        if !self.format.supports_previous() {
            return Err(SessionError::PreviousUnsupported);
        }
        self.require_live("go back")?;

        if self.current_index == 0 {
            return Ok(Transition::Unchanged);
        }

        self.current_index -= 1;
        self.reset_segment_counters();
        Ok(Transition::Advanced {
            index: self.current_index,
        })
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.run_state != RunState::Running {
            return Err(SessionError::InvalidTransition {
                command: "pause",
                state: self.run_state,
            });
        }
        self.run_state = RunState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.run_state != RunState::Paused {
            return Err(SessionError::InvalidTransition {
                command: "resume",
                state: self.run_state,
            });
        }
        self.run_state = RunState::Running;
        Ok(())
    }

    /// Early end; remaining segments are dropped.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<FinishedSessionRecord, SessionError> {
        self.require_live("finish")?;
        self.run_state = RunState::Finished;
        Ok(self.to_record(now, self.current_index))
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<FinishedSessionRecord, SessionError> {
        self.require_live("cancel")?;
        self.run_state = RunState::Cancelled;
        Ok(self.to_record(now, self.current_index))
    }

    /// Last write wins per field. Accepted while paused too.
    pub fn apply_sample(&mut self, sample: SensorSample) -> Result<(), SessionError> {
        self.require_live("update live data")?;
        self.live_steps = sample.steps;
        self.live_distance_meters = sample.distance_meters;
        self.live_pace_min_per_km = sample.pace_min_per_km;
        Ok(())
    }

    pub fn add_volume(&mut self, amount: f64) -> Result<(), SessionError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(SessionError::InvalidVolume(amount));
        }
        self.require_live("add volume")?;
        self.volume += amount;
        Ok(())
    }

    fn complete_segment(&mut self, now: DateTime<Utc>) -> Transition {
        if self.is_last_segment() {
            self.run_state = RunState::Finished;
            return Transition::Finished(self.to_record(now, self.segments.len()));
        }

        self.current_index += 1;
        self.reset_segment_counters();
        Transition::Advanced {
            index: self.current_index,
        }
    }

    fn reset_segment_counters(&mut self) {
        self.segment_elapsed_seconds = 0;
        self.segment_start_distance = self.live_distance_meters;
    }

    fn require_live(&self, command: &'static str) -> Result<(), SessionError> {
        if self.run_state.is_live() {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                command,
                state: self.run_state,
            })
        }
    }

    fn to_record(
        &self,
        finished_at: DateTime<Utc>,
        segments_completed: usize,
    ) -> FinishedSessionRecord {
        FinishedSessionRecord {
            session_id: self.session_id.clone(),
            source_id: self.source_id.clone(),
            name: self.name.clone(),
            activity_kind: self.activity_kind,
            total_duration_seconds: self.total_elapsed_seconds,
            total_distance_meters: (self.live_distance_meters > 0.0)
                .then_some(self.live_distance_meters),
            total_steps: (self.live_steps > 0).then_some(self.live_steps),
            total_volume: self.volume,
            segments_completed,
            started_at: self.started_at,
            finished_at,
            cancelled: self.run_state == RunState::Cancelled,
        }
    }
}
