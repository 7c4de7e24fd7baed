use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

use crate::{
    db::{
        helpers::{format_date, parse_date, parse_optional_date, to_i64, to_u32, to_u64},
        Database,
    },
    models::{AggregateStats, DailyCalorieEntry, StreakState},
    progress::ProgressStore,
};

impl Database {
    pub async fn get_streak(&self) -> Result<StreakState> {
        self.execute(|conn| {
            let row = conn
                .query_row(
                    "SELECT current_streak_count, last_activity_date
                     FROM streak_state
                     WHERE id = 1",
                    [],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
                )
                .optional()?;

            match row {
                Some((count, last)) => Ok(StreakState {
                    current_streak_count: to_u32(count, "current_streak_count")?,
                    last_activity_date: parse_optional_date(last, "last_activity_date")?,
                }),
                None => Ok(StreakState::default()),
            }
        })
        .await
    }

    pub async fn put_streak(&self, state: &StreakState) -> Result<()> {
        let state = *state;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO streak_state (id, current_streak_count, last_activity_date, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     current_streak_count = excluded.current_streak_count,
                     last_activity_date = excluded.last_activity_date,
                     updated_at = excluded.updated_at",
                params![
                    i64::from(state.current_streak_count),
                    state.last_activity_date.map(format_date),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_stats(&self) -> Result<AggregateStats> {
        self.execute(|conn| {
            let row = conn
                .query_row(
                    "SELECT total_sessions, total_volume, sessions_this_week, sessions_this_month
                     FROM aggregate_stats
                     WHERE id = 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((total, volume, week, month)) => Ok(AggregateStats {
                    total_sessions: to_u64(total, "total_sessions")?,
                    total_volume: volume,
                    sessions_this_week: to_u32(week, "sessions_this_week")?,
                    sessions_this_month: to_u32(month, "sessions_this_month")?,
                }),
                None => Ok(AggregateStats::default()),
            }
        })
        .await
    }

    pub async fn put_stats(&self, stats: &AggregateStats) -> Result<()> {
        let stats = *stats;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO aggregate_stats
                     (id, total_sessions, total_volume, sessions_this_week, sessions_this_month, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     total_sessions = excluded.total_sessions,
                     total_volume = excluded.total_volume,
                     sessions_this_week = excluded.sessions_this_week,
                     sessions_this_month = excluded.sessions_this_month,
                     updated_at = excluded.updated_at",
                params![
                    to_i64(stats.total_sessions)?,
                    stats.total_volume,
                    i64::from(stats.sessions_this_week),
                    i64::from(stats.sessions_this_month),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn increment_daily_calories(
        &self,
        date: NaiveDate,
        calories: u32,
    ) -> Result<DailyCalorieEntry> {
        self.execute(move |conn| {
            let key = format_date(date);
            conn.execute(
                "INSERT INTO daily_calories (date, workout_calories_burned)
                 VALUES (?1, ?2)
                 ON CONFLICT(date) DO UPDATE SET
                     workout_calories_burned = workout_calories_burned + excluded.workout_calories_burned",
                params![key, i64::from(calories)],
            )?;

            let total: i64 = conn.query_row(
                "SELECT workout_calories_burned FROM daily_calories WHERE date = ?1",
                params![key],
                |row| row.get(0),
            )?;

            Ok(DailyCalorieEntry {
                date,
                workout_calories_burned: to_u32(total, "workout_calories_burned")?,
            })
        })
        .await
    }

    pub async fn get_daily_calories(&self, date: NaiveDate) -> Result<Option<DailyCalorieEntry>> {
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT date, workout_calories_burned FROM daily_calories WHERE date = ?1",
                    params![format_date(date)],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;

            row.map(|(raw_date, total)| -> Result<DailyCalorieEntry> {
                Ok(DailyCalorieEntry {
                    date: parse_date(&raw_date, "date")?,
                    workout_calories_burned: to_u32(total, "workout_calories_burned")?,
                })
            })
            .transpose()
        })
        .await
    }

    pub async fn mark_session_processed(
        &self,
        session_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO processed_sessions (session_id, processed_at)
                 VALUES (?1, ?2)",
                params![session_id, processed_at.to_rfc3339()],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn reset_stats_window(&self, column: &'static str) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE aggregate_stats SET {column} = 0, updated_at = ?1 WHERE id = 1"
                ),
                params![Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ProgressStore for Database {
    async fn load_streak(&self) -> Result<StreakState> {
        self.get_streak().await
    }

    async fn save_streak(&self, state: &StreakState) -> Result<()> {
        self.put_streak(state).await
    }

    async fn load_stats(&self) -> Result<AggregateStats> {
        self.get_stats().await
    }

    async fn save_stats(&self, stats: &AggregateStats) -> Result<()> {
        self.put_stats(stats).await
    }

    async fn add_daily_calories(
        &self,
        date: NaiveDate,
        calories: u32,
    ) -> Result<DailyCalorieEntry> {
        self.increment_daily_calories(date, calories).await
    }

    async fn daily_calories(&self, date: NaiveDate) -> Result<Option<DailyCalorieEntry>> {
        self.get_daily_calories(date).await
    }

    async fn claim_session(&self, session_id: &str, processed_at: DateTime<Utc>) -> Result<bool> {
        self.mark_session_processed(session_id, processed_at).await
    }

    async fn reset_week_window(&self) -> Result<()> {
        self.reset_stats_window("sessions_this_week").await
    }

    async fn reset_month_window(&self) -> Result<()> {
        self.reset_stats_window("sessions_this_month").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    #[tokio::test]
    async fn empty_database_returns_defaults() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("progress.sqlite3")).unwrap();

        assert_eq!(db.load_streak().await.unwrap(), StreakState::default());
        assert_eq!(db.load_stats().await.unwrap(), AggregateStats::default());
        assert!(db.daily_calories(day(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn streak_and_stats_round_trip_through_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.sqlite3");

        {
            let db = Database::new(path.clone()).unwrap();
            db.save_streak(&StreakState {
                current_streak_count: 4,
                last_activity_date: Some(day(9)),
            })
            .await
            .unwrap();
            db.save_stats(&AggregateStats {
                total_sessions: 21,
                total_volume: 12_500.5,
                sessions_this_week: 2,
                sessions_this_month: 7,
            })
            .await
            .unwrap();
        }

        let db = Database::new(path).unwrap();
        assert_eq!(
            db.load_streak().await.unwrap(),
            StreakState {
                current_streak_count: 4,
                last_activity_date: Some(day(9)),
            }
        );
        let stats = db.load_stats().await.unwrap();
        assert_eq!(stats.total_sessions, 21);
        assert_eq!(stats.total_volume, 12_500.5);
    }

    #[tokio::test]
    async fn daily_calories_are_additive() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("progress.sqlite3")).unwrap();

        db.add_daily_calories(day(3), 250).await.unwrap();
        let entry = db.add_daily_calories(day(3), 180).await.unwrap();
        assert_eq!(entry.workout_calories_burned, 430);
        db.add_daily_calories(day(4), 90).await.unwrap();

        assert_eq!(
            db.daily_calories(day(3)).await.unwrap(),
            Some(DailyCalorieEntry {
                date: day(3),
                workout_calories_burned: 430,
            })
        );
    }

    #[tokio::test]
    async fn processed_ledger_rejects_duplicates() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("progress.sqlite3")).unwrap();

        assert!(db.claim_session("run-1", Utc::now()).await.unwrap());
        assert!(!db.claim_session("run-1", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn window_resets_only_touch_their_column() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("progress.sqlite3")).unwrap();
        db.save_stats(&AggregateStats {
            total_sessions: 5,
            total_volume: 0.0,
            sessions_this_week: 2,
            sessions_this_month: 5,
        })
        .await
        .unwrap();

        db.reset_week_window().await.unwrap();
        let stats = db.load_stats().await.unwrap();
        assert_eq!(stats.sessions_this_week, 0);
        assert_eq!(stats.sessions_this_month, 5);
        assert_eq!(stats.total_sessions, 5);

        db.reset_month_window().await.unwrap();
        assert_eq!(db.load_stats().await.unwrap().sessions_this_month, 0);
    }
}
