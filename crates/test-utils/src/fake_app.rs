//! Scripted stand-ins for the app lifecycle, tasks and status sinks.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dailybot::bot::{AppControl, BotContext};
use dailybot::errors::Result;
use dailybot::sched::StatusSink;
use dailybot::tasks::{Task, TaskOutcome};
use dailybot::types::TaskStatus;

/// App control that never touches a device and counts every call.
#[derive(Debug)]
pub struct FakeApp {
    pub resets: AtomicU32,
    pub restarts: AtomicU32,
    pub navigations: AtomicU32,
    pub starts: AtomicU32,
    pub completion_checks: AtomicU32,
    navigate_results: Mutex<VecDeque<bool>>,
    reset_ok: bool,
    restart_ok: bool,
    completed: Mutex<HashSet<String>>,
    log: Mutex<Vec<String>>,
}

impl Default for FakeApp {
    fn default() -> Self {
        Self {
            resets: AtomicU32::new(0),
            restarts: AtomicU32::new(0),
            navigations: AtomicU32::new(0),
            starts: AtomicU32::new(0),
            completion_checks: AtomicU32::new(0),
            navigate_results: Mutex::new(VecDeque::new()),
            reset_ok: true,
            restart_ok: true,
            completed: Mutex::new(HashSet::new()),
            log: Mutex::new(Vec::new()),
        }
    }
}

impl FakeApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results for successive `navigate` calls; once used up, navigation
    /// succeeds.
    pub fn with_navigation(self, results: impl IntoIterator<Item = bool>) -> Self {
        self.navigate_results.lock().unwrap().extend(results);
        self
    }

    pub fn with_failing_reset(mut self) -> Self {
        self.reset_ok = false;
        self
    }

    /// `restart_app` runs but reports that home was never reached.
    pub fn with_failing_restart(mut self) -> Self {
        self.restart_ok = false;
        self
    }

    /// Rows `check_completed` reports as done.
    pub fn with_completed(self, labels: &[&str]) -> Self {
        self.completed
            .lock()
            .unwrap()
            .extend(labels.iter().map(|l| l.to_string()));
        self
    }

    pub fn resets(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> u32 {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn completion_checks(&self) -> u32 {
        self.completion_checks.load(Ordering::SeqCst)
    }

    /// Every app call in order, e.g. `["reset", "navigate", "restart"]`.
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.log.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl AppControl for FakeApp {
    async fn ensure_app_started(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.record("ensure_started");
        Ok(())
    }

    async fn navigate(&self) -> Result<bool> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        self.record("navigate");
        Ok(self
            .navigate_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(true))
    }

    async fn reset_app(&self) -> Result<bool> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.record("reset");
        Ok(self.reset_ok)
    }

    async fn restart_app(&self) -> Result<bool> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.record("restart");
        Ok(self.restart_ok)
    }

    async fn check_completed(&self, label: &str) -> Result<bool> {
        self.completion_checks.fetch_add(1, Ordering::SeqCst);
        self.record("check_completed");
        Ok(self.completed.lock().unwrap().contains(label))
    }
}

/// Task returning a scripted sequence of outcomes. The last outcome repeats.
#[derive(Debug)]
pub struct FakeTask {
    outcomes: Mutex<VecDeque<TaskOutcome>>,
    last: Mutex<TaskOutcome>,
    runs: AtomicU32,
}

impl FakeTask {
    pub fn new(outcomes: impl IntoIterator<Item = TaskOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(TaskOutcome::Completed),
            runs: AtomicU32::new(0),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new([TaskOutcome::Completed])
    }

    pub fn failing() -> Arc<Self> {
        Self::new([TaskOutcome::Failed])
    }

    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for FakeTask {
    async fn execute(&self, ctx: &BotContext) -> Result<TaskOutcome> {
        ctx.check_stop()?;
        self.runs.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.outcomes.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(*last)
    }
}

/// Sink keeping every transition.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, TaskStatus)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, TaskStatus)> {
        self.events.lock().unwrap().clone()
    }

    /// Transitions of one task, in order.
    pub fn history(&self, task: &str) -> Vec<TaskStatus> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == task)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn last_status(&self, task: &str) -> Option<TaskStatus> {
        self.history(task).last().copied()
    }
}

impl StatusSink for RecordingSink {
    fn on_status_change(&self, task: &str, status: TaskStatus) {
        self.events
            .lock()
            .unwrap()
            .push((task.to_string(), status));
    }
}
