use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::models::{ActivityKind, FinishedSessionRecord};

/// What gets handed to the external health platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSummary {
    pub session_id: String,
    pub name: String,
    pub activity_kind: ActivityKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub distance_meters: Option<f64>,
    pub steps: Option<u32>,
    pub calories_burned: u32,
}

impl WorkoutSummary {
    pub fn from_record(record: &FinishedSessionRecord, calories_burned: u32) -> Self {
        Self {
            session_id: record.session_id.clone(),
            name: record.name.clone(),
            activity_kind: record.activity_kind,
            started_at: record.started_at,
            finished_at: record.finished_at,
            duration_seconds: record.total_duration_seconds,
            distance_meters: record.total_distance_meters,
            steps: record.total_steps,
            calories_burned,
        }
    }
}

/// Best-effort sink for finished workouts. Any error means "not exported".
#[async_trait]
pub trait HealthExporter: Send + Sync {
    fn name(&self) -> &str;

    async fn export(&self, summary: &WorkoutSummary) -> Result<()>;
}

/// Appends one JSON object per workout to a file that a platform bridge can
/// pick up.
pub struct JsonlExporter {
    path: PathBuf,
}

impl JsonlExporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl HealthExporter for JsonlExporter {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn export(&self, summary: &WorkoutSummary) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create export directory {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(summary).context("failed to serialize workout")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open export file {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to write export file {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}
