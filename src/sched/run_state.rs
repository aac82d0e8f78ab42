// src/sched/run_state.rs

//! Flags carried from one scheduler iteration to the next.

use crate::bot::RetryOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunState {
    /// The previous task was found already complete; the driver is still on
    /// the shared surface.
    pub last_task_skipped: bool,
    /// The previous task's recovery restarted the app and left it on the
    /// surface.
    pub just_restarted: bool,
    pub any_task_failed: bool,
}

impl RunState {
    /// State after a task was skipped by the completion short-circuit.
    pub fn after_skip(self) -> Self {
        Self {
            last_task_skipped: true,
            just_restarted: false,
            ..self
        }
    }

    /// State after the current task failed outside the retry controller.
    pub fn after_failure(self) -> Self {
        Self {
            last_task_skipped: false,
            just_restarted: false,
            any_task_failed: true,
        }
    }

    /// State after the retry controller returned.
    pub fn after_task(self, outcome: RetryOutcome) -> Self {
        Self {
            last_task_skipped: outcome.already_done,
            just_restarted: outcome.restarted,
            any_task_failed: self.any_task_failed || !outcome.success,
        }
    }

    /// Whether the reset before a task can be skipped.
    pub fn can_skip_reset(&self, extra_active: bool) -> bool {
        (self.last_task_skipped && extra_active) || self.just_restarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_sticks_across_tasks() {
        let s = RunState::default().after_task(RetryOutcome {
            success: false,
            restarted: true,
            already_done: false,
        });
        assert!(s.any_task_failed);
        assert!(s.just_restarted);

        let s = s.after_task(RetryOutcome {
            success: true,
            restarted: false,
            already_done: true,
        });
        assert!(s.any_task_failed);
        assert!(!s.just_restarted);
        assert!(s.last_task_skipped);
    }

    #[test]
    fn reset_skip_rules() {
        let skipped = RunState::default().after_skip();
        assert!(skipped.can_skip_reset(true));
        assert!(!skipped.can_skip_reset(false));

        let restarted = RunState {
            just_restarted: true,
            ..Default::default()
        };
        assert!(restarted.can_skip_reset(false));
        assert!(!RunState::default().can_skip_reset(true));
    }
}
