// src/sched/mod.rs

//! Per-worker orchestration: the task loop, its run state, progress refresh
//! and status reporting.

pub mod refresh;
pub mod run_state;
pub mod scheduler;
pub mod status;

pub use refresh::{refresh_all, scan_progress};
pub use run_state::RunState;
pub use scheduler::{RunReport, Scheduler};
pub use status::{ChannelSink, StatusEvent, StatusSink, TracingSink};
