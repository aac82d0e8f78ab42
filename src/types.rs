// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Externally visible lifecycle of one task inside a run.
///
/// - `Pending`: reset at run start (and by a progress refresh).
/// - `Running`: execution began.
/// - `Success` / `Failed`: terminal for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        };
        f.pad(s)
    }
}

/// How much state an app reset clears.
///
/// - `Full`: stop the host app and every companion app it launches into.
/// - `HostOnly`: stop just the host app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetDepth {
    Full,
    HostOnly,
}

impl Default for ResetDepth {
    fn default() -> Self {
        ResetDepth::Full
    }
}

impl FromStr for ResetDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(ResetDepth::Full),
            "host_only" | "host-only" | "host" => Ok(ResetDepth::HostOnly),
            other => Err(format!(
                "invalid reset_depth: {other} (expected \"full\" or \"host_only\")"
            )),
        }
    }
}
