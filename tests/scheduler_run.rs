// tests/scheduler_run.rs

mod common;
use crate::common::builders::{ContextBuilder, RegistryBuilder};
use crate::common::{init_tracing, row, FakeApp, FakeDevice, FakeTask, RecordingSink};

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dailybot::bot::BotContext;
use dailybot::errors::BotError;
use dailybot::sched::Scheduler;
use dailybot::tasks::{Task, TaskOutcome};
use dailybot::types::TaskStatus;

type TestResult = Result<(), Box<dyn Error>>;

/// Unplugs the device mid-task.
struct UnplugTask {
    device: Arc<FakeDevice>,
}

#[async_trait]
impl Task for UnplugTask {
    async fn execute(&self, _ctx: &BotContext) -> dailybot::errors::Result<TaskOutcome> {
        self.device.disconnect();
        Err(BotError::Disconnected("cable pulled".to_string()))
    }
}

fn position(calls: &[String], nth: usize, what: &str) -> usize {
    calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_str() == what)
        .nth(nth)
        .map(|(i, _)| i)
        .unwrap_or(usize::MAX)
}

#[tokio::test]
async fn skip_aware_run_restarts_once_and_avoids_second_reset() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    let app = Arc::new(FakeApp::new());
    let sink = RecordingSink::new();

    let a = FakeTask::new([TaskOutcome::AlreadyDone]);
    let b = FakeTask::succeeding();
    let c = FakeTask::new([TaskOutcome::Failed, TaskOutcome::Completed]);
    let registry = RegistryBuilder::new()
        .surface("A", "row A", a.clone())
        .surface("B", "row B", b.clone())
        .plain("C", c.clone())
        .build();

    let scheduler = Scheduler::new(app.clone(), ctx, Arc::new(registry), sink.clone());
    let report = scheduler.run(None).await?;

    assert_eq!(report.status_of("A"), Some(TaskStatus::Success));
    assert_eq!(report.status_of("B"), Some(TaskStatus::Success));
    assert_eq!(report.status_of("C"), Some(TaskStatus::Success));
    assert!(report.all_succeeded());

    assert_eq!(app.restarts(), 1, "only C's first failure restarts the app");
    assert_eq!(a.runs(), 1);
    assert_eq!(b.runs(), 1);
    assert_eq!(c.runs(), 2);

    // Resets: one before A, one before C. Nothing between A and B.
    let calls = app.calls();
    assert_eq!(app.resets(), 2);
    let first_reset = position(&calls, 0, "reset");
    let second_reset = position(&calls, 1, "reset");
    let b_check = position(&calls, 0, "check_completed");
    assert!(first_reset < b_check);
    assert!(b_check < second_reset);

    assert_eq!(
        sink.history("B"),
        vec![TaskStatus::Pending, TaskStatus::Running, TaskStatus::Success]
    );
    Ok(())
}

#[tokio::test]
async fn completed_row_is_never_executed() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    let app = Arc::new(FakeApp::new().with_completed(&["row B"]));

    let a = FakeTask::new([TaskOutcome::AlreadyDone]);
    let b = FakeTask::succeeding();
    let registry = RegistryBuilder::new()
        .surface("A", "row A", a.clone())
        .surface("B", "row B", b.clone())
        .build();

    let scheduler = Scheduler::new(app.clone(), ctx, Arc::new(registry), RecordingSink::new());
    let report = scheduler.run(None).await?;

    assert_eq!(report.status_of("B"), Some(TaskStatus::Success));
    assert_eq!(b.runs(), 0);
    assert_eq!(app.completion_checks(), 1);
    assert_eq!(app.resets(), 1);
    Ok(())
}

#[tokio::test]
async fn disconnect_leaves_later_tasks_pending() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    let app = Arc::new(FakeApp::new());
    let sink = RecordingSink::new();

    let c = FakeTask::succeeding();
    let registry = RegistryBuilder::new()
        .plain("A", FakeTask::succeeding())
        .plain(
            "B",
            Arc::new(UnplugTask {
                device: Arc::clone(&device),
            }),
        )
        .plain("C", c.clone())
        .build();

    let scheduler = Scheduler::new(app.clone(), ctx, Arc::new(registry), sink.clone());
    let err = scheduler.run(None).await.unwrap_err();

    assert!(matches!(err, BotError::Disconnected(_)));
    assert_eq!(sink.last_status("A"), Some(TaskStatus::Success));
    assert_eq!(sink.last_status("B"), Some(TaskStatus::Failed));
    assert_eq!(sink.history("C"), vec![TaskStatus::Pending]);
    assert_eq!(c.runs(), 0);
    assert_eq!(app.restarts(), 0, "an abort is never retried");
    Ok(())
}

#[tokio::test]
async fn stop_before_first_task_marks_it_failed() -> TestResult {
    init_tracing();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(device).cancel(cancel).build();
    let app = Arc::new(FakeApp::new());
    let sink = RecordingSink::new();

    let registry = RegistryBuilder::new()
        .plain("A", FakeTask::succeeding())
        .plain("B", FakeTask::succeeding())
        .build();

    let scheduler = Scheduler::new(app.clone(), ctx, Arc::new(registry), sink.clone());
    let err = scheduler.run(None).await.unwrap_err();

    assert!(matches!(err, BotError::Stopped));
    assert_eq!(sink.last_status("A"), Some(TaskStatus::Failed));
    assert_eq!(sink.history("B"), vec![TaskStatus::Pending]);
    assert_eq!(app.resets(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_reset_fails_the_task_and_moves_on() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(device).build();
    let app = Arc::new(FakeApp::new().with_failing_reset());

    let a = FakeTask::succeeding();
    let b = FakeTask::succeeding();
    let registry = RegistryBuilder::new()
        .plain("A", a.clone())
        .plain("B", b.clone())
        .build();

    let scheduler = Scheduler::new(app.clone(), ctx, Arc::new(registry), RecordingSink::new());
    let report = scheduler.run(None).await?;

    assert_eq!(report.status_of("A"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("B"), Some(TaskStatus::Failed));
    assert_eq!(a.runs() + b.runs(), 0);
    assert_eq!(app.resets(), 2);
    Ok(())
}

#[tokio::test]
async fn targeted_run_touches_only_the_named_task() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(device).build();
    let app = Arc::new(FakeApp::new());
    let sink = RecordingSink::new();

    let a = FakeTask::succeeding();
    let b = FakeTask::succeeding();
    let registry = RegistryBuilder::new()
        .plain("A", a.clone())
        .plain("B", b.clone())
        .build();

    let scheduler = Scheduler::new(app, ctx, Arc::new(registry), sink.clone());
    let report = scheduler.run(Some("B")).await?;

    assert_eq!(report.statuses.len(), 1);
    assert_eq!(a.runs(), 0);
    assert_eq!(b.runs(), 1);
    assert!(sink.history("A").is_empty());

    let missing = scheduler.run(Some("nope")).await.unwrap_err();
    assert!(matches!(missing, BotError::TaskNotFound(n) if n == "nope"));
    Ok(())
}

#[tokio::test]
async fn earlier_failure_triggers_refresh_before_flagged_task() -> TestResult {
    init_tracing();

    let mut page = row("row S", 200, true);
    page.extend(row("额外活跃", 100, false));
    let device = Arc::new(FakeDevice::new(page));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    let app = Arc::new(FakeApp::new());
    let sink = RecordingSink::new();

    let registry = RegistryBuilder::new()
        .plain("X", FakeTask::failing())
        .surface("S", "row S", FakeTask::succeeding())
        .refreshing("F", FakeTask::succeeding())
        .build();

    let scheduler = Scheduler::new(app.clone(), ctx, Arc::new(registry), sink.clone());
    let report = scheduler.run(None).await?;

    assert_eq!(report.status_of("X"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("F"), Some(TaskStatus::Success));
    // Run, then the refresh re-reads the surface row.
    assert_eq!(
        sink.history("S"),
        vec![
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Success,
            TaskStatus::Pending,
            TaskStatus::Success,
        ]
    );
    Ok(())
}
