pub mod controller;
mod loop_worker;
pub mod simulated;

pub use controller::SensingController;
pub use simulated::{simulate_feed, SimulatedRunner};
