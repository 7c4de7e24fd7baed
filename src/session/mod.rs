pub mod controller;
pub mod segment;
pub mod state;

pub use controller::{
    CommandOutcome, CompletionReport, ControllerConfig, SessionController, SessionEvent,
    SessionSnapshot, TickOutcome,
};
pub use segment::{
    CompletionCriterion, EffortLevel, SegmentKind, SegmentPhase, SegmentSpec, SessionFormat,
    SessionPlan, Side,
};
pub use state::{ActiveSessionState, RunState, SensorSample, Transition};
