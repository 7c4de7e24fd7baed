use crate::models::{ActivityKind, AggregateStats, FinishedSessionRecord};

/// Volume that counts toward the totals. Only strength work carries volume.
pub fn counted_volume(record: &FinishedSessionRecord) -> f64 {
    match record.activity_kind {
        ActivityKind::Strength if record.total_volume.is_finite() => record.total_volume.max(0.0),
        _ => 0.0,
    }
}

/// Additive update for one completed session. Never resets a window.
pub fn apply_completion(stats: &AggregateStats, volume: f64) -> AggregateStats {
    AggregateStats {
        total_sessions: stats.total_sessions.saturating_add(1),
        total_volume: stats.total_volume + volume,
        sessions_this_week: stats.sessions_this_week.saturating_add(1),
        sessions_this_month: stats.sessions_this_month.saturating_add(1),
    }
}
