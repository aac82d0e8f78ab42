// src/bot/mod.rs

//! UI-driving layer between the raw device and the task scheduler.

pub mod app;
pub mod completion;
pub mod context;
pub mod navigator;
pub mod poll;
pub mod retry;
pub mod scroll;

pub use app::{AppControl, DeviceApp};
pub use context::{AppProfile, BotContext, Timings};
pub use retry::{run_with_retry, RetryOutcome};
