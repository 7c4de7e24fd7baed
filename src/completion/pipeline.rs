use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration};

use crate::{
    clock::Clock,
    error::CompletionError,
    models::FinishedSessionRecord,
    progress::ProgressStore,
    settings::ProfileProvider,
};

use super::{
    calories::estimate_calories,
    export::{HealthExporter, WorkoutSummary},
    stats::{apply_completion, counted_volume},
    streak::{activity_day, record_activity},
};

const EXPORT_TIMEOUT_SECS: u64 = 15;

/// Informational outcome. Partial success is a normal terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub calories_burned: u32,
    pub streak_updated: bool,
    pub stats_updated: bool,
    pub health_exported: bool,
}

/// Turns a finished session into progress data: calories, streak, stats,
/// then a best-effort export. Each step's failure is logged and isolated.
pub struct CompletionPipeline {
    store: Arc<dyn ProgressStore>,
    profile: Arc<dyn ProfileProvider>,
    exporter: Option<Arc<dyn HealthExporter>>,
    clock: Arc<dyn Clock>,
    export_timeout: Duration,
}

impl CompletionPipeline {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        profile: Arc<dyn ProfileProvider>,
        exporter: Option<Arc<dyn HealthExporter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            profile,
            exporter,
            clock,
            export_timeout: Duration::from_secs(EXPORT_TIMEOUT_SECS),
        }
    }

    pub fn with_export_timeout(mut self, export_timeout: Duration) -> Self {
        self.export_timeout = export_timeout;
        self
    }

    pub async fn process(
        &self,
        record: &FinishedSessionRecord,
    ) -> Result<CompletionResult, CompletionError> {
        if record.cancelled {
            warn!(
                "Refusing to complete cancelled session {}",
                record.session_id
            );
            return Err(CompletionError::Cancelled(record.session_id.clone()));
        }

        match self
            .store
            .claim_session(&record.session_id, self.clock.now())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!("Session {} was already processed", record.session_id);
                return Err(CompletionError::AlreadyProcessed(record.session_id.clone()));
            }
            Err(err) => {
                error!(
                    "Failed to record session {} as processed, continuing: {err:#}",
                    record.session_id
                );
            }
        }

        let calories_burned = estimate_calories(
            record.duration_minutes(),
            record.activity_kind,
            self.profile.weight_kg(),
        );

        let streak_updated = match self.update_streak(record).await {
            Ok(()) => true,
            Err(err) => {
                error!("Streak update failed for session {}: {err:#}", record.session_id);
                false
            }
        };

        let stats_updated = match self.update_stats(record).await {
            Ok(()) => true,
            Err(err) => {
                error!("Stats update failed for session {}: {err:#}", record.session_id);
                false
            }
        };

        let day = activity_day(record.finished_at);
        if let Err(err) = self.store.add_daily_calories(day, calories_burned).await {
            error!(
                "Daily calorie log failed for session {} on {day}: {err:#}",
                record.session_id
            );
        }

        let health_exported = self.export(record, calories_burned).await;

        let result = CompletionResult {
            calories_burned,
            streak_updated,
            stats_updated,
            health_exported,
        };

        info!(
            "Completed session {} ({}): {} kcal, streak={}, stats={}, exported={}",
            record.session_id,
            record.name,
            result.calories_burned,
            result.streak_updated,
            result.stats_updated,
            result.health_exported
        );

        Ok(result)
    }

    async fn update_streak(&self, record: &FinishedSessionRecord) -> Result<()> {
        let current = self.store.load_streak().await?;
        let next = record_activity(&current, activity_day(record.finished_at));
        if next != current {
            self.store.save_streak(&next).await?;
        }
        Ok(())
    }

    async fn update_stats(&self, record: &FinishedSessionRecord) -> Result<()> {
        let current = self.store.load_stats().await?;
        let next = apply_completion(&current, counted_volume(record));
        self.store.save_stats(&next).await
    }

    async fn export(&self, record: &FinishedSessionRecord, calories: u32) -> bool {
        if !self.profile.health_export_enabled() {
            return false;
        }
        let Some(exporter) = self.exporter.as_ref() else {
            warn!("Health export enabled but no exporter is configured");
            return false;
        };

        let summary = WorkoutSummary::from_record(record, calories);
        match timeout(self.export_timeout, exporter.export(&summary)).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(
                    "Health export via {} failed for session {}: {err:#}",
                    exporter.name(),
                    record.session_id
                );
                false
            }
            Err(_) => {
                warn!(
                    "Health export via {} timed out (> {:?}) for session {}",
                    exporter.name(),
                    self.export_timeout,
                    record.session_id
                );
                false
            }
        }
    }
}
