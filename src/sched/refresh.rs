// src/sched/refresh.rs

//! Progress refresh: read the completion state of every surface task
//! without running any of them.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bot::completion::is_completed;
use crate::bot::{AppControl, BotContext};
use crate::device::{Selector, SwipeDirection};
use crate::errors::Result;
use crate::sched::status::StatusSink;
use crate::tasks::TaskRegistry;
use crate::types::TaskStatus;

const SCAN_SETTLE: Duration = Duration::from_secs(1);

/// Scan the surface, resolving each `(task, label)` as soon as its row is
/// visible. Returns the tasks that were never seen.
pub async fn scan_progress(
    ctx: &BotContext,
    entries: &[(String, String)],
    max_scrolls: u32,
    sink: &dyn StatusSink,
) -> Result<Vec<String>> {
    // label -> task name
    let mut unresolved: BTreeMap<&str, &str> = entries
        .iter()
        .map(|(name, label)| (label.as_str(), name.as_str()))
        .collect();
    let mut last = None;

    for iteration in 1..=max_scrolls {
        ctx.ensure_alive().await?;

        let visible: Vec<&str> = {
            let mut v = Vec::new();
            for label in unresolved.keys() {
                if ctx.exists(&Selector::text_contains(*label)).await? {
                    v.push(*label);
                }
            }
            v
        };

        for label in visible {
            let done = is_completed(ctx, label).await?;
            if let Some(task) = unresolved.remove(label) {
                let status = if done {
                    TaskStatus::Success
                } else {
                    TaskStatus::Pending
                };
                debug!(task, done, "progress resolved");
                sink.on_status_change(task, status);
            }
        }

        if unresolved.is_empty() {
            info!(iteration, "all surface tasks resolved");
            return Ok(Vec::new());
        }

        let current = ctx.signature().await?;
        if current.is_some() && current == last {
            debug!(iteration, "reached bottom of surface");
            break;
        }
        last = current;

        ctx.swipe(SwipeDirection::Up, 0.6).await?;
        ctx.pause(SCAN_SETTLE).await?;
    }

    let missing: Vec<String> = unresolved.values().map(|t| t.to_string()).collect();
    warn!(?missing, "some surface tasks were not found; left pending");
    Ok(missing)
}

/// Reset, navigate to the surface and scan it.
///
/// A failed reset or navigation is logged and ends the refresh quietly.
pub async fn refresh_all(
    app: &dyn AppControl,
    ctx: &BotContext,
    registry: &TaskRegistry,
    sink: &dyn StatusSink,
) -> Result<()> {
    info!("refreshing task progress");

    if !app.reset_app().await? {
        warn!("refresh: app reset failed");
        return Ok(());
    }
    if !app.navigate().await? {
        warn!("refresh: could not reach task surface");
        return Ok(());
    }

    let entries: Vec<(String, String)> = registry
        .extra_active()
        .map(|(n, l)| (n.to_string(), l.to_string()))
        .collect();
    for (name, _) in &entries {
        sink.on_status_change(name, TaskStatus::Pending);
    }

    scan_progress(ctx, &entries, ctx.timings().refresh_max_scrolls, sink).await?;
    Ok(())
}
