//! Session-related data models shared by the controller and the completion
//! pipeline.

use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of activity a session was, for calorie and volume purposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    Strength,
    Bodyweight,
    Cardio,
    Yoga,
    Running,
    Mobility,
    #[default]
    Unspecified,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Strength => "strength",
            ActivityKind::Bodyweight => "bodyweight",
            ActivityKind::Cardio => "cardio",
            ActivityKind::Yoga => "yoga",
            ActivityKind::Running => "running",
            ActivityKind::Mobility => "mobility",
            ActivityKind::Unspecified => "unspecified",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "strength" => Ok(ActivityKind::Strength),
            "bodyweight" => Ok(ActivityKind::Bodyweight),
            "cardio" => Ok(ActivityKind::Cardio),
            "yoga" => Ok(ActivityKind::Yoga),
            "running" => Ok(ActivityKind::Running),
            "mobility" => Ok(ActivityKind::Mobility),
            "unspecified" | "" => Ok(ActivityKind::Unspecified),
            other => Err(anyhow!("unknown activity kind '{other}'")),
        }
    }
}

/// Immutable snapshot produced when a session finishes or is cancelled.
///
/// Cancelled records are handed back to the caller for display only; the
/// completion pipeline refuses them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinishedSessionRecord {
    pub session_id: String,
    pub source_id: String,
    pub name: String,
    pub activity_kind: ActivityKind,
    pub total_duration_seconds: u32,
    pub total_distance_meters: Option<f64>,
    pub total_steps: Option<u32>,
    /// Load × reps logged during the session. Zero for non-strength work.
    pub total_volume: f64,
    pub segments_completed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
}

impl FinishedSessionRecord {
    pub fn duration_minutes(&self) -> f64 {
        f64::from(self.total_duration_seconds) / 60.0
    }
}
