// src/sched/scheduler.rs

//! The per-worker task loop.
//!
//! For every selected task, in order:
//!
//! 1. optional progress refresh (`refresh_before` tasks, full runs, after a
//!    failure);
//! 2. liveness check;
//! 3. mark `Running`;
//! 4. completion short-circuit when the previous task was skipped;
//! 5. reset decision;
//! 6. retry controller;
//! 7. carry the outcome into the next [`RunState`].
//!
//! A stop or disconnect aborts the loop. The in-flight task is marked
//! `Failed`, later tasks stay `Pending`.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, info_span, warn, Instrument};

use crate::bot::{run_with_retry, AppControl, BotContext};
use crate::errors::{BotError, Result};
use crate::sched::refresh::refresh_all;
use crate::sched::run_state::RunState;
use crate::sched::status::StatusSink;
use crate::tasks::{TaskDefinition, TaskRegistry};
use crate::types::TaskStatus;

/// Final status of every task the run touched, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub statuses: Vec<(String, TaskStatus)>,
}

impl RunReport {
    pub fn status_of(&self, task: &str) -> Option<TaskStatus> {
        self.statuses
            .iter()
            .find(|(n, _)| n == task)
            .map(|(_, s)| *s)
    }

    pub fn all_succeeded(&self) -> bool {
        self.statuses.iter().all(|(_, s)| *s == TaskStatus::Success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.statuses
            .iter()
            .filter(|(_, s)| *s == TaskStatus::Failed)
            .map(|(n, _)| n.as_str())
    }
}

/// Latest status per task, forwarding every change to the outer sink.
struct StatusBoard {
    inner: Arc<dyn StatusSink>,
    statuses: Mutex<Vec<(String, TaskStatus)>>,
}

impl StatusBoard {
    fn new(inner: Arc<dyn StatusSink>) -> Self {
        Self {
            inner,
            statuses: Mutex::new(Vec::new()),
        }
    }

    fn snapshot(&self) -> Vec<(String, TaskStatus)> {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StatusSink for StatusBoard {
    fn on_status_change(&self, task: &str, status: TaskStatus) {
        {
            let mut statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
            match statuses.iter_mut().find(|(n, _)| n == task) {
                Some(entry) => entry.1 = status,
                None => statuses.push((task.to_string(), status)),
            }
        }
        self.inner.on_status_change(task, status);
    }
}

pub struct Scheduler {
    app: Arc<dyn AppControl>,
    ctx: BotContext,
    registry: Arc<TaskRegistry>,
    board: StatusBoard,
}

impl Scheduler {
    pub fn new(
        app: Arc<dyn AppControl>,
        ctx: BotContext,
        registry: Arc<TaskRegistry>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            app,
            ctx,
            registry,
            board: StatusBoard::new(sink),
        }
    }

    /// Current status of every task reported so far.
    pub fn statuses(&self) -> Vec<(String, TaskStatus)> {
        self.board.snapshot()
    }

    fn report(&self, task: &str, status: TaskStatus) {
        self.board.on_status_change(task, status);
    }

    fn abort_error(&self) -> BotError {
        if self.ctx.stop_requested() {
            BotError::Stopped
        } else {
            BotError::Disconnected("device lost before task start".to_string())
        }
    }

    /// Run every task, or only `target`.
    pub async fn run(&self, target: Option<&str>) -> Result<RunReport> {
        let selected = self.registry.select(target)?;
        let full_run = target.is_none();
        info!(tasks = selected.len(), full_run, "starting run");

        for def in &selected {
            self.report(&def.name, TaskStatus::Pending);
        }

        let mut state = RunState::default();
        for def in selected {
            let span = info_span!("task", task = %def.name);
            match self.run_one(def, state, full_run).instrument(span).await {
                Ok(next) => state = next,
                Err(e) if e.is_abort() => {
                    warn!(task = %def.name, error = %e, "run aborted");
                    self.report(&def.name, TaskStatus::Failed);
                    return Err(e);
                }
                Err(e) => {
                    warn!(task = %def.name, error = %e, "task errored");
                    self.report(&def.name, TaskStatus::Failed);
                    state = state.after_failure();
                }
            }
        }

        let report = RunReport {
            statuses: self.statuses(),
        };
        info!(
            failed = report.failed().count(),
            total = report.statuses.len(),
            "run finished"
        );
        Ok(report)
    }

    async fn run_one(&self, def: &TaskDefinition, state: RunState, full_run: bool) -> Result<RunState> {
        let extra_active = def.is_extra_active();

        if def.refresh_before && full_run && state.any_task_failed {
            info!("earlier failures; refreshing progress first");
            refresh_all(self.app.as_ref(), &self.ctx, &self.registry, &self.board).await?;
        }

        if !self.ctx.is_alive().await {
            return Err(self.abort_error());
        }

        self.report(&def.name, TaskStatus::Running);

        if state.last_task_skipped {
            if let Some(label) = def.label.as_deref() {
                self.app.ensure_app_started().await?;
                if self.app.navigate().await? && self.app.check_completed(label).await? {
                    info!("already completed; skipping");
                    self.report(&def.name, TaskStatus::Success);
                    return Ok(state.after_skip());
                }
            }
        }

        if state.can_skip_reset(extra_active) {
            debug!(
                skipped = state.last_task_skipped,
                restarted = state.just_restarted,
                "reusing current app state"
            );
        } else if !self.app.reset_app().await? {
            warn!("app reset failed");
            self.report(&def.name, TaskStatus::Failed);
            return Ok(state.after_failure());
        }

        let outcome = run_with_retry(self.app.as_ref(), &self.ctx, def).await?;
        let status = if outcome.success {
            TaskStatus::Success
        } else {
            TaskStatus::Failed
        };
        self.report(&def.name, status);
        Ok(state.after_task(outcome))
    }
}
