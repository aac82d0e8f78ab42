// src/tasks/mod.rs

//! Task contract and the static task registry.
//!
//! A [`Task`] is one self-contained UI script. It knows nothing about
//! navigation, retries or resets; the scheduler and retry controller wrap
//! it. The [`TaskRegistry`] replaces dynamic lookup by name with an ordered
//! list resolved at startup.

pub mod add_friend;
pub mod catalog;
pub mod script;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bot::context::BotContext;
use crate::errors::{BotError, Result};

pub use add_friend::AddFriendTask;
pub use script::{ScriptedTask, Step};

/// How a single task execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The script ran to the end.
    Completed,
    /// The task found its own row already marked complete and did nothing.
    AlreadyDone,
    Failed,
}

impl TaskOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, TaskOutcome::Failed)
    }

    pub fn from_bool(ok: bool) -> Self {
        if ok {
            TaskOutcome::Completed
        } else {
            TaskOutcome::Failed
        }
    }
}

#[async_trait]
pub trait Task: Send + Sync {
    /// Run the script once.
    ///
    /// Misses are `Ok(TaskOutcome::Failed)`; `Err` is reserved for stop and
    /// disconnect.
    async fn execute(&self, ctx: &BotContext) -> Result<TaskOutcome>;
}

#[derive(Clone)]
pub struct TaskDefinition {
    pub name: String,
    /// On-screen row label, set for tasks living on the shared surface.
    pub label: Option<String>,
    /// Wants a fresh progress snapshot first if something already failed.
    pub refresh_before: bool,
    pub task: Arc<dyn Task>,
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("refresh_before", &self.refresh_before)
            .finish_non_exhaustive()
    }
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>, task: Arc<dyn Task>) -> Self {
        Self {
            name: name.into(),
            label: None,
            refresh_before: false,
            task,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_refresh_before(mut self) -> Self {
        self.refresh_before = true;
        self
    }

    pub fn is_extra_active(&self) -> bool {
        self.label.is_some()
    }
}

/// Ordered set of tasks; order is the execution order.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<TaskDefinition>,
}

impl TaskRegistry {
    pub fn new(tasks: Vec<TaskDefinition>) -> Self {
        Self { tasks }
    }

    /// The built-in daily tasks.
    pub fn builtin(friend_ids: Vec<String>) -> Self {
        Self::new(catalog::builtin_tasks(friend_ids))
    }

    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// All tasks, or just the named one.
    pub fn select(&self, target: Option<&str>) -> Result<Vec<&TaskDefinition>> {
        match target {
            None => Ok(self.tasks.iter().collect()),
            Some(name) => self
                .get(name)
                .map(|t| vec![t])
                .ok_or_else(|| BotError::TaskNotFound(name.to_string())),
        }
    }

    /// `(name, label)` for every task on the shared surface, in order.
    pub fn extra_active(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tasks
            .iter()
            .filter_map(|t| t.label.as_deref().map(|l| (t.name.as_str(), l)))
    }

    pub fn extra_active_labels(&self) -> Vec<String> {
        self.extra_active().map(|(_, l)| l.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Task for Noop {
        async fn execute(&self, _ctx: &BotContext) -> Result<TaskOutcome> {
            Ok(TaskOutcome::Completed)
        }
    }

    fn registry() -> TaskRegistry {
        TaskRegistry::new(vec![
            TaskDefinition::new("a", Arc::new(Noop)).with_label("A row"),
            TaskDefinition::new("b", Arc::new(Noop)).with_refresh_before(),
        ])
    }

    #[test]
    fn select_by_name() {
        let reg = registry();
        assert_eq!(reg.select(None).unwrap().len(), 2);
        let one = reg.select(Some("b")).unwrap();
        assert_eq!(one[0].name, "b");
        assert!(one[0].refresh_before);
        assert!(matches!(
            reg.select(Some("zzz")),
            Err(BotError::TaskNotFound(n)) if n == "zzz"
        ));
    }

    #[test]
    fn extra_active_set_follows_labels() {
        let reg = registry();
        let set: Vec<_> = reg.extra_active().collect();
        assert_eq!(set, vec![("a", "A row")]);
    }

    #[test]
    fn outcome_success() {
        assert!(TaskOutcome::AlreadyDone.is_success());
        assert!(TaskOutcome::Completed.is_success());
        assert!(!TaskOutcome::Failed.is_success());
        assert_eq!(TaskOutcome::from_bool(false), TaskOutcome::Failed);
    }

    #[test]
    fn builtin_catalog_order() {
        let reg = TaskRegistry::builtin(vec!["12345".into()]);
        let names: Vec<_> = reg.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), 13);
        assert_eq!(names[0], "福利社");
        assert_eq!(names[12], "添加好友");
        assert!(reg.get("添加好友").unwrap().refresh_before);
        assert_eq!(reg.extra_active().count(), 12);
    }
}
