//! Persistent progress targets: streak, aggregate stats, daily calories and
//! the ledger of sessions the completion pipeline has already processed.
//!
//! Callers treat the store as a read-modify-write target with no transaction
//! guarantees across calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{AggregateStats, DailyCalorieEntry, StreakState};

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load_streak(&self) -> Result<StreakState>;
    async fn save_streak(&self, state: &StreakState) -> Result<()>;

    async fn load_stats(&self) -> Result<AggregateStats>;
    async fn save_stats(&self, stats: &AggregateStats) -> Result<()>;

    /// Adds to the day's total, creating the entry if needed.
    async fn add_daily_calories(&self, date: NaiveDate, calories: u32)
        -> Result<DailyCalorieEntry>;
    async fn daily_calories(&self, date: NaiveDate) -> Result<Option<DailyCalorieEntry>>;

    /// Records `session_id` as processed. `false` if it already was.
    async fn claim_session(&self, session_id: &str, processed_at: DateTime<Utc>) -> Result<bool>;

    /// Window rollover hooks for the external scheduler.
    async fn reset_week_window(&self) -> Result<()>;
    async fn reset_month_window(&self) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    streak: StreakState,
    stats: AggregateStats,
    calories: HashMap<NaiveDate, u32>,
    processed: HashSet<String>,
}

/// Volatile store for tests and store-less embedding.
#[derive(Default)]
pub struct MemoryProgressStore {
    state: Mutex<MemoryState>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load_streak(&self) -> Result<StreakState> {
        Ok(self.lock().streak)
    }

    async fn save_streak(&self, state: &StreakState) -> Result<()> {
        self.lock().streak = *state;
        Ok(())
    }

    async fn load_stats(&self) -> Result<AggregateStats> {
        Ok(self.lock().stats)
    }

    async fn save_stats(&self, stats: &AggregateStats) -> Result<()> {
        self.lock().stats = *stats;
        Ok(())
    }

    async fn add_daily_calories(
        &self,
        date: NaiveDate,
        calories: u32,
    ) -> Result<DailyCalorieEntry> {
        let mut state = self.lock();
        let total = state.calories.entry(date).or_insert(0);
        *total = total.saturating_add(calories);
        Ok(DailyCalorieEntry {
            date,
            workout_calories_burned: *total,
        })
    }

    async fn daily_calories(&self, date: NaiveDate) -> Result<Option<DailyCalorieEntry>> {
        Ok(self
            .lock()
            .calories
            .get(&date)
            .map(|total| DailyCalorieEntry {
                date,
                workout_calories_burned: *total,
            }))
    }

    async fn claim_session(&self, session_id: &str, _processed_at: DateTime<Utc>) -> Result<bool> {
        Ok(self.lock().processed.insert(session_id.to_string()))
    }

    async fn reset_week_window(&self) -> Result<()> {
        self.lock().stats.sessions_this_week = 0;
        Ok(())
    }

    async fn reset_month_window(&self) -> Result<()> {
        self.lock().stats.sessions_this_month = 0;
        Ok(())
    }
}
