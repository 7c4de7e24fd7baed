use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Day-granularity streak. Mutated only by the streak engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    pub current_streak_count: u32,
    pub last_activity_date: Option<NaiveDate>,
}

/// Workout calories burned on one calendar day. Additive within the day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyCalorieEntry {
    pub date: NaiveDate,
    pub workout_calories_burned: u32,
}

/// Rolling counters. The week/month windows are reset by an external
/// scheduler; the aggregator itself only increments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_sessions: u64,
    pub total_volume: f64,
    pub sessions_this_week: u32,
    pub sessions_this_month: u32,
}
