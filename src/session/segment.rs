//! Static description of a session's phases, handed to the controller by the
//! session library and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::ActivityKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SegmentPhase {
    Warmup,
    Main,
    Cooldown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SegmentKind {
    Run,
    Walk,
    Jog,
    Sprint,
    Rest,
    Pose,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EffortLevel {
    Easy,
    Moderate,
    Hard,
    Max,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Left,
    Right,
    Both,
}

/// How a segment is considered done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionCriterion {
    /// Auto-completed by the clock.
    Duration(u32),
    /// Completed by the caller via `skip`.
    Distance(f64),
    /// Completed by the caller via `skip`.
    Reps(u32),
    /// No target; runs until skipped or the session is finished.
    Open,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSpec {
    pub index: usize,
    pub phase: SegmentPhase,
    pub kind: SegmentKind,
    pub effort: Option<EffortLevel>,
    pub target_duration_seconds: Option<u32>,
    pub target_distance_meters: Option<f64>,
    pub repeat_count: Option<u32>,
    pub side: Option<Side>,
    pub label: Option<String>,
}

impl SegmentSpec {
    fn bare(phase: SegmentPhase, kind: SegmentKind) -> Self {
        Self {
            index: 0,
            phase,
            kind,
            effort: None,
            target_duration_seconds: None,
            target_distance_meters: None,
            repeat_count: None,
            side: None,
            label: None,
        }
    }

    pub fn timed(phase: SegmentPhase, kind: SegmentKind, seconds: u32) -> Self {
        Self {
            target_duration_seconds: Some(seconds),
            ..Self::bare(phase, kind)
        }
    }

    pub fn distance(phase: SegmentPhase, kind: SegmentKind, meters: f64) -> Self {
        Self {
            target_distance_meters: Some(meters),
            ..Self::bare(phase, kind)
        }
    }

    pub fn reps(phase: SegmentPhase, kind: SegmentKind, count: u32) -> Self {
        Self {
            repeat_count: Some(count),
            ..Self::bare(phase, kind)
        }
    }

    pub fn open(phase: SegmentPhase, kind: SegmentKind) -> Self {
        Self::bare(phase, kind)
    }

    pub fn pose(label: impl Into<String>, hold_seconds: u32, side: Option<Side>) -> Self {
        Self {
            label: Some(label.into()),
            side,
            ..Self::timed(SegmentPhase::Main, SegmentKind::Pose, hold_seconds)
        }
    }

    pub fn with_effort(mut self, effort: EffortLevel) -> Self {
        self.effort = Some(effort);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Duration wins over distance, distance over reps.
    pub fn completion_criterion(&self) -> CompletionCriterion {
        if let Some(seconds) = self.target_duration_seconds {
            CompletionCriterion::Duration(seconds)
        } else if let Some(meters) = self.target_distance_meters {
            CompletionCriterion::Distance(meters)
        } else if let Some(count) = self.repeat_count {
            CompletionCriterion::Reps(count)
        } else {
            CompletionCriterion::Open
        }
    }
}

/// How the presentation layer lets the user move through segments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionFormat {
    Interval,
    PoseFlow,
    Workout,
}

impl SessionFormat {
    pub fn supports_previous(&self) -> bool {
        matches!(self, SessionFormat::PoseFlow)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionPlan {
    pub source_id: String,
    pub name: String,
    pub activity_kind: ActivityKind,
    pub format: SessionFormat,
    pub segments: Vec<SegmentSpec>,
}

impl SessionPlan {
    pub fn new(
        source_id: impl Into<String>,
        name: impl Into<String>,
        activity_kind: ActivityKind,
        format: SessionFormat,
        segments: Vec<SegmentSpec>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            activity_kind,
            format,
            segments,
        }
    }

    /// Warm-up, `rounds` × (work, recover), cool-down.
    pub fn intervals(
        source_id: impl Into<String>,
        name: impl Into<String>,
        warmup_seconds: u32,
        rounds: u32,
        work: (SegmentKind, u32),
        recover: (SegmentKind, u32),
        cooldown_seconds: u32,
    ) -> Self {
        let mut segments = Vec::with_capacity(rounds as usize * 2 + 2);
        if warmup_seconds > 0 {
            segments.push(
                SegmentSpec::timed(SegmentPhase::Warmup, SegmentKind::Walk, warmup_seconds)
                    .with_effort(EffortLevel::Easy),
            );
        }
        for round in 0..rounds {
            segments.push(
                SegmentSpec::timed(SegmentPhase::Main, work.0, work.1)
                    .with_effort(EffortLevel::Hard),
            );
            // Last round flows straight into the cool-down.
            if round + 1 < rounds || cooldown_seconds == 0 {
                segments.push(
                    SegmentSpec::timed(SegmentPhase::Main, recover.0, recover.1)
                        .with_effort(EffortLevel::Easy),
                );
            }
        }
        if cooldown_seconds > 0 {
            segments.push(
                SegmentSpec::timed(SegmentPhase::Cooldown, SegmentKind::Walk, cooldown_seconds)
                    .with_effort(EffortLevel::Easy),
            );
        }

        Self::new(
            source_id,
            name,
            ActivityKind::Running,
            SessionFormat::Interval,
            segments,
        )
    }

    pub fn pose_flow(
        source_id: impl Into<String>,
        name: impl Into<String>,
        poses: Vec<SegmentSpec>,
    ) -> Self {
        Self::new(
            source_id,
            name,
            ActivityKind::Yoga,
            SessionFormat::PoseFlow,
            poses,
        )
    }

    /// Checks targets and renumbers segment indices to their position.
    pub fn validated(mut self) -> Result<Self, SessionError> {
        if self.segments.is_empty() {
            return Err(SessionError::EmptyPlan);
        }

        for (position, segment) in self.segments.iter_mut().enumerate() {
            if segment.target_duration_seconds == Some(0) {
                return Err(SessionError::InvalidPlan(format!(
                    "segment {position} has a zero duration target"
                )));
            }
            if let Some(meters) = segment.target_distance_meters {
                if !meters.is_finite() || meters <= 0.0 {
                    return Err(SessionError::InvalidPlan(format!(
                        "segment {position} has distance target {meters}"
                    )));
                }
            }
            if segment.repeat_count == Some(0) {
                return Err(SessionError::InvalidPlan(format!(
                    "segment {position} has a zero repeat count"
                )));
            }
            segment.index = position;
        }

        Ok(self)
    }

    /// Sum of duration targets; `None` if any segment is not duration-bound.
    pub fn planned_duration_seconds(&self) -> Option<u32> {
        self.segments
            .iter()
            .map(|segment| segment.target_duration_seconds)
            .sum()
    }
}
