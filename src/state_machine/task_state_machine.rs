use super::{
    errors::{StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskState,
};
use crate::models::Task;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Lifecycle owner for a single task.
///
/// The machine holds the task exclusively while an attempt is in flight, so
/// transitions for one task are serialized by ownership. Callers persist the
/// result through [`TaskStateMachine::into_task`] once they are done.
#[derive(Debug)]
pub struct TaskStateMachine {
    task: Task,
}

impl TaskStateMachine {
    /// Create a new task state machine instance
    pub fn new(task: Task) -> Self {
        Self { task }
    }

    /// Get the current state of the task
    pub fn current_state(&self) -> TaskState {
        self.task.status
    }

    /// Attempt to transition the task state
    pub fn transition(&mut self, event: TaskEvent) -> StateMachineResult<TaskState> {
        self.transition_at(event, Utc::now())
    }

    /// Transition with an explicit clock, used by the dispatcher and tests
    pub fn transition_at(
        &mut self,
        event: TaskEvent,
        now: DateTime<Utc>,
    ) -> StateMachineResult<TaskState> {
        let current_state = self.current_state();
        let target_state = self.determine_target_state(current_state, &event)?;

        self.check_guards(current_state, &event)?;
        self.apply(target_state, event, now);

        debug!(
            task_id = %self.task.id,
            from = %current_state,
            to = %target_state,
            retry_count = self.task.retry_count,
            "🔄 TASK_STATE_TRANSITION"
        );

        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(
        &self,
        current_state: TaskState,
        event: &TaskEvent,
    ) -> StateMachineResult<TaskState> {
        let target = match (current_state, event) {
            // Start transitions
            (TaskState::Pending, TaskEvent::Start { .. }) => TaskState::Running,
            (TaskState::Retrying, TaskEvent::Start { .. }) => TaskState::Running,

            // Outcome transitions
            (TaskState::Running, TaskEvent::Complete(_)) => TaskState::Completed,
            (TaskState::Running, TaskEvent::Fail(_)) => TaskState::Failed,
            (TaskState::Running, TaskEvent::Retry { .. }) => TaskState::Retrying,

            // Terminal states and everything else
            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    fn check_guards(&self, current_state: TaskState, event: &TaskEvent) -> StateMachineResult<()> {
        if let (TaskState::Running, TaskEvent::Retry { .. }) = (current_state, event) {
            if self.task.retry_count >= self.task.max_retries {
                return Err(StateMachineError::RetryBudgetExhausted {
                    task_id: self.task.id.clone(),
                    retry_count: self.task.retry_count,
                    max_retries: self.task.max_retries,
                });
            }
        }
        Ok(())
    }

    fn apply(&mut self, target_state: TaskState, event: TaskEvent, now: DateTime<Utc>) {
        let task = &mut self.task;
        match event {
            TaskEvent::Start { proxy_id } => {
                if task.started_at.is_none() {
                    task.started_at = Some(now);
                }
                task.proxy_id = Some(proxy_id);
                task.next_attempt_at = None;
            }
            TaskEvent::Complete(result) => {
                task.completed_at = Some(now);
                task.result = Some(result);
                task.error_message = None;
            }
            TaskEvent::Fail(message) => {
                task.completed_at = Some(now);
                task.error_message = Some(message);
            }
            TaskEvent::Retry { delay, error } => {
                task.retry_count += 1;
                task.error_message = Some(error);
                let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
                task.next_attempt_at = Some(now.checked_add_signed(delay).unwrap_or(now));
            }
        }
        task.status = target_state;
        task.updated_at = now;
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.current_state().is_terminal()
    }

    /// Check if the task is currently active (being processed)
    pub fn is_active(&self) -> bool {
        self.current_state().is_active()
    }

    /// Get task information
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Get task ID
    pub fn task_id(&self) -> &str {
        &self.task.id
    }

    pub fn into_task(self) -> Task {
        self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, TaskKind};
    use serde_json::json;
    use std::time::Duration;

    fn pending_task(max_retries: u32) -> Task {
        NewTask::new(TaskKind::StarEmail, "acct-1")
            .with_max_retries(max_retries)
            .into_task(3)
    }

    #[test]
    fn test_happy_path_sets_timestamps() {
        let mut sm = TaskStateMachine::new(pending_task(3));

        assert_eq!(
            sm.transition(TaskEvent::start("10.0.0.1:8080")).unwrap(),
            TaskState::Running
        );
        assert!(sm.task().started_at.is_some());
        assert_eq!(sm.task().proxy_id.as_deref(), Some("10.0.0.1:8080"));

        assert_eq!(
            sm.transition(TaskEvent::Complete(json!({"ok": true}))).unwrap(),
            TaskState::Completed
        );
        assert!(sm.task().completed_at.is_some());
        assert_eq!(sm.task().result, Some(json!({"ok": true})));
        assert!(sm.is_terminal());
    }

    #[test]
    fn test_retry_increments_and_schedules() {
        let mut sm = TaskStateMachine::new(pending_task(2));
        let now = Utc::now();

        sm.transition_at(TaskEvent::start("p1"), now).unwrap();
        let first_start = sm.task().started_at;

        sm.transition_at(
            TaskEvent::retry_after(Duration::from_secs(300), "network down"),
            now,
        )
        .unwrap();
        assert_eq!(sm.current_state(), TaskState::Retrying);
        assert_eq!(sm.task().retry_count, 1);
        assert_eq!(
            sm.task().next_attempt_at,
            Some(now + chrono::Duration::seconds(300))
        );
        assert!(sm.task().completed_at.is_none());

        let later = now + chrono::Duration::seconds(301);
        sm.transition_at(TaskEvent::start("p2"), later).unwrap();
        assert_eq!(sm.task().started_at, first_start);
        assert!(sm.task().next_attempt_at.is_none());
    }

    #[test]
    fn test_retry_guard_respects_budget() {
        let mut sm = TaskStateMachine::new(pending_task(1));
        sm.transition(TaskEvent::start("p1")).unwrap();
        sm.transition(TaskEvent::retry_after(Duration::ZERO, "timeout"))
            .unwrap();
        sm.transition(TaskEvent::start("p1")).unwrap();

        let err = sm
            .transition(TaskEvent::retry_after(Duration::ZERO, "timeout"))
            .unwrap_err();
        assert!(matches!(err, StateMachineError::RetryBudgetExhausted { .. }));
        assert_eq!(sm.current_state(), TaskState::Running);
        assert_eq!(sm.task().retry_count, 1);
    }

    #[test]
    fn test_terminal_states_reject_all_events() {
        let mut completed = TaskStateMachine::new(pending_task(3));
        completed.transition(TaskEvent::start("p1")).unwrap();
        completed.transition(TaskEvent::Complete(json!(null))).unwrap();

        let mut failed = TaskStateMachine::new(pending_task(3));
        failed.transition(TaskEvent::start("p1")).unwrap();
        failed
            .transition(TaskEvent::fail_with_error("account locked"))
            .unwrap();

        for sm in [&mut completed, &mut failed] {
            let before = sm.task().clone();
            for event in [
                TaskEvent::start("p2"),
                TaskEvent::Complete(json!(1)),
                TaskEvent::fail_with_error("x"),
                TaskEvent::retry_after(Duration::ZERO, "x"),
            ] {
                let err = sm.transition(event).unwrap_err();
                assert!(matches!(err, StateMachineError::InvalidTransition { .. }));
            }
            assert_eq!(sm.task(), &before);
        }
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut sm = TaskStateMachine::new(pending_task(3));
        assert!(sm.transition(TaskEvent::Complete(json!(null))).is_err());
        assert_eq!(sm.current_state(), TaskState::Pending);
    }
}
