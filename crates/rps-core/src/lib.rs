pub mod agent;
pub mod config;
pub mod constants;
pub mod controller;
pub mod interaction;
pub mod metrics;
pub mod rng;
pub mod spatial;
pub mod stats;
pub mod world;

pub use agent::{Agent, AgentType, PerType};
pub use config::{SimConfig, SimConfigError};
pub use controller::{
    Clock, ManualClock, RunState, Simulation, StartError, SystemClock, TickOutcome,
};
pub use metrics::{RunSummary, TimeseriesRow, Winner};
pub use stats::{format_elapsed_time, format_kdr};
