pub mod progress;
pub mod session;

pub use progress::{AggregateStats, DailyCalorieEntry, StreakState};
pub use session::{ActivityKind, FinishedSessionRecord};
