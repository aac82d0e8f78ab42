// src/bot/retry.rs

//! Retry/reset controller around a single task execution.
//!
//! Budget per call: one app restart, two task invocations. Surface tasks
//! are navigated to before each invocation; navigation failure consumes the
//! restart.

use tracing::{info, warn};

use crate::bot::app::AppControl;
use crate::bot::context::BotContext;
use crate::errors::Result;
use crate::tasks::{TaskDefinition, TaskOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryOutcome {
    pub success: bool,
    /// The app was restarted while handling this task.
    pub restarted: bool,
    /// The task found its row already complete.
    pub already_done: bool,
}

impl RetryOutcome {
    fn failed(restarted: bool) -> Self {
        Self {
            success: false,
            restarted,
            already_done: false,
        }
    }

    fn from_task(outcome: TaskOutcome, restarted: bool) -> Self {
        Self {
            success: outcome.is_success(),
            restarted,
            already_done: outcome == TaskOutcome::AlreadyDone,
        }
    }
}

/// Run the task once; non-abort errors count as a failed attempt.
async fn invoke(ctx: &BotContext, def: &TaskDefinition) -> Result<TaskOutcome> {
    match def.task.execute(ctx).await {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_abort() => Err(e),
        Err(e) => {
            warn!(task = %def.name, error = %e, "task errored");
            Ok(TaskOutcome::Failed)
        }
    }
}

/// Restart the app for a retry. A restart that never reached the home
/// screen still spends the budget and still skips the next reset.
async fn restart(app: &dyn AppControl, def: &TaskDefinition) -> Result<()> {
    if !app.restart_app().await? {
        warn!(task = %def.name, "app restart did not reach the home screen; continuing");
    }
    Ok(())
}

pub async fn run_with_retry(
    app: &dyn AppControl,
    ctx: &BotContext,
    def: &TaskDefinition,
) -> Result<RetryOutcome> {
    let mut restarted = false;

    if def.is_extra_active() && !app.navigate().await? {
        warn!(task = %def.name, "navigation failed; restarting app");
        restart(app, def).await?;
        restarted = true;
        if !app.navigate().await? {
            warn!(task = %def.name, "navigation failed after restart");
            return Ok(RetryOutcome::failed(true));
        }
    }

    let first = invoke(ctx, def).await?;
    if first.is_success() {
        return Ok(RetryOutcome::from_task(first, restarted));
    }

    if restarted {
        warn!(task = %def.name, "task failed and the restart budget is spent");
        return Ok(RetryOutcome::failed(true));
    }

    info!(task = %def.name, "task failed; restarting app and retrying once");
    restart(app, def).await?;

    if def.is_extra_active() && !app.navigate().await? {
        warn!(task = %def.name, "navigation failed after restart; not retrying");
        return Ok(RetryOutcome::failed(true));
    }

    let second = invoke(ctx, def).await?;
    if second.is_success() {
        info!(task = %def.name, "retry succeeded");
    } else {
        warn!(task = %def.name, "retry failed");
    }
    Ok(RetryOutcome::from_task(second, true))
}
