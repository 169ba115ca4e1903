//! Submit/poll state machine of asynchronous Doubao tasks.
//!
//! ```text
//! Submitted --poll--> Polling --in_queue/generating--> Polling
//!                        |  \--done--> Completed
//!                        |   \--not_found/expired--> Failed
//!                        \--attempts exhausted--> TimedOut
//! ```

use std::future::Future;
use std::time::Duration;

use crate::error::RelayError;

/// Status reported by the result endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    InQueue,
    Generating,
    Done,
    NotFound,
    Expired,
    Unknown(String),
}

impl TaskStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "in_queue" => Self::InQueue,
            "generating" => Self::Generating,
            "done" => Self::Done,
            "not_found" => Self::NotFound,
            "expired" => Self::Expired,
            _ => Self::Unknown(status.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InQueue => "in_queue",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::Unknown(s) => s,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::NotFound | Self::Expired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Submitted,
    /// `attempt` polls have been made so far
    Polling { attempt: u32 },
    Completed,
    Failed(TaskStatus),
    TimedOut { attempts: u32 },
}

impl TaskState {
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed(_) | Self::TimedOut { .. }
        )
    }
}

/// Next state after a poll returned `status`.
///
/// Unknown statuses keep the task polling. Terminal states absorb.
pub fn transition(state: &TaskState, status: &TaskStatus, max_attempts: u32) -> TaskState {
    let attempt = match state {
        TaskState::Submitted => 1,
        TaskState::Polling { attempt } => attempt + 1,
        terminal => return terminal.clone(),
    };
    match status {
        TaskStatus::Done => TaskState::Completed,
        TaskStatus::NotFound | TaskStatus::Expired => TaskState::Failed(status.clone()),
        TaskStatus::InQueue | TaskStatus::Generating | TaskStatus::Unknown(_) => {
            if attempt >= max_attempts {
                TaskState::TimedOut { attempts: attempt }
            } else {
                TaskState::Polling { attempt }
            }
        }
    }
}

/// Poll a submitted task until it reaches a terminal state.
///
/// `poll` is called after each `interval`; it yields the reported status and
/// the payload, which is returned once the status is `done`. Poll errors end
/// the task immediately.
pub async fn drive_task<F, Fut, T>(
    task_id: &str,
    mut poll: F,
    interval: Duration,
    max_attempts: u32,
) -> Result<T, RelayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(TaskStatus, T), RelayError>>,
{
    if max_attempts == 0 {
        return Err(timeout_error(task_id, 0));
    }

    let mut state = TaskState::Submitted;

    loop {
        tokio::time::sleep(interval).await;
        let (status, payload) = poll().await?;
        state = transition(&state, &status, max_attempts);
        tracing::debug!(task_id, status = status.as_str(), state = ?state, "doubao task polled");

        match &state {
            TaskState::Completed => return Ok(payload),
            TaskState::Failed(status) => {
                return Err(RelayError::TaskFailed {
                    task_id: task_id.to_string(),
                    status: status.as_str().to_string(),
                });
            }
            TaskState::TimedOut { attempts } => return Err(timeout_error(task_id, *attempts)),
            TaskState::Submitted | TaskState::Polling { .. } => {}
        }
    }
}

fn timeout_error(task_id: &str, attempts: u32) -> RelayError {
    RelayError::TimeoutError(format!(
        "processing timeout: task {task_id} unfinished after {attempts} polls"
    ))
}
