// src/sched/status.rs

//! Status reporting to the operator.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::types::TaskStatus;

/// Receives every task status transition, synchronously.
pub trait StatusSink: Send + Sync {
    fn on_status_change(&self, task: &str, status: TaskStatus);
}

/// Logs transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn on_status_change(&self, task: &str, status: TaskStatus) {
        match status {
            TaskStatus::Failed => warn!(task, %status, "task status"),
            _ => info!(task, %status, "task status"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub emulator: u32,
    pub task: String,
    pub status: TaskStatus,
}

/// Forwards transitions, tagged with the emulator index, to a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    emulator: u32,
    tx: UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new(emulator: u32, tx: UnboundedSender<StatusEvent>) -> Self {
        Self { emulator, tx }
    }
}

impl StatusSink for ChannelSink {
    fn on_status_change(&self, task: &str, status: TaskStatus) {
        let event = StatusEvent {
            emulator: self.emulator,
            task: task.to_string(),
            status,
        };
        // A closed channel means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}
