//! Day-granularity streak engine.
//!
//! Days are local calendar days. A timezone change between two sessions is not
//! reconciled: the day a completion lands on is whatever the local clock said
//! at `finished_at`.

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::models::StreakState;

/// Local calendar day a session finished on.
pub fn activity_day(finished_at: DateTime<Utc>) -> NaiveDate {
    finished_at.with_timezone(&Local).date_naive()
}

impl StreakState {
    /// Streak as it should be shown on `today`, without mutating anything.
    /// Zero once more than a day has passed since the last activity.
    pub fn effective_count(&self, today: NaiveDate) -> u32 {
        match self.last_activity_date {
            Some(last) if (today - last).num_days() <= 1 => self.current_streak_count,
            _ => 0,
        }
    }
}

/// Apply one completed session on `day` to `state`.
pub fn record_activity(state: &StreakState, day: NaiveDate) -> StreakState {
    let Some(last) = state.last_activity_date else {
        return StreakState {
            current_streak_count: 1,
            last_activity_date: Some(day),
        };
    };

    let gap = (day - last).num_days();

    // Same day, or a day earlier than the last one after a clock change.
    if gap <= 0 {
        return *state;
    }

    let base = if gap > 1 { 0 } else { state.current_streak_count };

    StreakState {
        current_streak_count: base.saturating_add(1),
        last_activity_date: Some(day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_session_starts_streak_at_one() {
        let state = record_activity(&StreakState::default(), day(2024, 6, 1));
        assert_eq!(state.current_streak_count, 1);
        assert_eq!(state.last_activity_date, Some(day(2024, 6, 1)));
    }

    #[test]
    fn second_session_same_day_does_not_count() {
        let first = record_activity(&StreakState::default(), day(2024, 6, 1));
        let second = record_activity(&first, day(2024, 6, 1));
        assert_eq!(second, first);
    }

    #[test]
    fn consecutive_days_increment() {
        let mut state = StreakState::default();
        for d in 1..=5 {
            state = record_activity(&state, day(2024, 6, d));
        }
        assert_eq!(state.current_streak_count, 5);
    }

    #[test]
    fn two_day_gap_resets_to_one() {
        let state = StreakState {
            current_streak_count: 4,
            last_activity_date: Some(day(2024, 6, 1)),
        };
        let next = record_activity(&state, day(2024, 6, 3));
        assert_eq!(next.current_streak_count, 1);
        assert_eq!(next.last_activity_date, Some(day(2024, 6, 3)));
    }

    #[test]
    fn crosses_month_boundary() {
        let state = StreakState {
            current_streak_count: 9,
            last_activity_date: Some(day(2024, 2, 29)),
        };
        assert_eq!(
            record_activity(&state, day(2024, 3, 1)).current_streak_count,
            10
        );
    }

    #[test]
    fn earlier_day_is_ignored() {
        let state = StreakState {
            current_streak_count: 3,
            last_activity_date: Some(day(2024, 6, 10)),
        };
        assert_eq!(record_activity(&state, day(2024, 6, 9)), state);
    }

    #[test]
    fn effective_count_drops_to_zero_when_broken() {
        let state = StreakState {
            current_streak_count: 6,
            last_activity_date: Some(day(2024, 6, 10)),
        };
        assert_eq!(state.effective_count(day(2024, 6, 10)), 6);
        assert_eq!(state.effective_count(day(2024, 6, 11)), 6);
        assert_eq!(state.effective_count(day(2024, 6, 12)), 0);
        assert_eq!(StreakState::default().effective_count(day(2024, 6, 12)), 0);
    }
}
