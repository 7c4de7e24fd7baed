pub mod calories;
pub mod export;
pub mod pipeline;
pub mod stats;
pub mod streak;

pub use calories::{estimate_calories, met_for, DEFAULT_WEIGHT_KG};
pub use export::{HealthExporter, JsonlExporter, WorkoutSummary};
pub use pipeline::{CompletionPipeline, CompletionResult};
pub use streak::{activity_day, record_activity};
