use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BoardError;

/// Display and sort hint. Never consulted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// A task owned by one user.
///
/// `time_left` is the timebox countdown in seconds and always stays within
/// `0..=duration * 60`. Once `is_completed` is set it never reverts and the
/// countdown is disarmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    /// Planned length in minutes, fixed at creation.
    pub duration: u32,
    pub time_left: u32,
    pub is_active: bool,
    pub is_completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    pub user_id: String,
}

impl Task {
    /// Builds a fresh task from a validated creation request.
    pub fn new(user_id: &str, request: CreateTaskRequest) -> Result<Self, BoardError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(BoardError::InvalidTask("name must not be empty".to_string()));
        }
        if request.duration == 0 {
            return Err(BoardError::InvalidTask(
                "duration must be at least one minute".to_string(),
            ));
        }
        let duration_secs = request.duration.checked_mul(60).ok_or_else(|| {
            BoardError::InvalidTask(format!("duration {} is too large", request.duration))
        })?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            duration: request.duration,
            time_left: duration_secs,
            is_active: false,
            is_completed: false,
            priority: request.priority.unwrap_or_default(),
            scheduled_time: request.scheduled_time,
            user_id: user_id.to_string(),
        })
    }

    /// Full countdown length in seconds.
    pub fn total_secs(&self) -> u32 {
        self.duration.saturating_mul(60)
    }

    /// Merges a partial update while keeping the task invariants intact.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(scheduled_time) = patch.scheduled_time {
            self.scheduled_time = Some(scheduled_time);
        }
        if let Some(time_left) = patch.time_left {
            self.time_left = time_left.min(self.total_secs());
        }
        if patch.is_completed == Some(true) {
            self.is_completed = true;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active && self.time_left > 0;
        }
        if self.is_completed {
            self.is_active = false;
        }
    }
}

/// Payload for `POST /tasks`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub name: String,
    pub duration: u32,
    pub priority: Option<Priority>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Payload for `PATCH /tasks/{id}`. Timer fields are driven by the board only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub priority: Option<Priority>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl UpdateTaskRequest {
    pub fn into_patch(self) -> Result<TaskPatch, BoardError> {
        let name = match self.name {
            Some(name) if name.trim().is_empty() => {
                return Err(BoardError::InvalidTask("name must not be empty".to_string()));
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        Ok(TaskPatch {
            name,
            priority: self.priority,
            scheduled_time: self.scheduled_time,
            ..TaskPatch::default()
        })
    }
}

/// A partial update. Serializes to exactly the fields that change, which is
/// also the shape written to storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl TaskPatch {
    pub fn armed(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Self::default()
        }
    }

    pub fn time_left(secs: u32) -> Self {
        Self {
            time_left: Some(secs),
            ..Self::default()
        }
    }

    /// Marks a task done and disarms it in a single write.
    pub fn completed() -> Self {
        Self {
            is_active: Some(false),
            is_completed: Some(true),
            ..Self::default()
        }
    }

    /// Countdown hit zero: remaining time, armed flag and completion together.
    pub fn expired() -> Self {
        Self {
            time_left: Some(0),
            ..Self::completed()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which control drives the board's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    #[default]
    Timebox,
    Pomodoro,
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timebox => write!(f, "timebox"),
            Self::Pomodoro => write!(f, "pomodoro"),
        }
    }
}

/// Single derived activity per task, so readers never combine the timebox
/// flag with the focus-session binding themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskActivity {
    Idle,
    Timeboxing,
    Focused,
    Done,
}

impl TaskActivity {
    pub fn of(task: &Task, mode: TimerMode, focused_task_id: Option<&str>) -> Self {
        if task.is_completed {
            Self::Done
        } else if focused_task_id == Some(task.id.as_str()) {
            Self::Focused
        } else if mode == TimerMode::Timebox && task.is_active {
            Self::Timeboxing
        } else {
            Self::Idle
        }
    }
}

/// A task as rendered by the list, card and calendar views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub activity: TaskActivity,
}
