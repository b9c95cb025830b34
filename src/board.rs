// src/board.rs

//! One user's task board: the collection plus both timer controls.
//!
//! The board is the single owner of the collection. Every change is applied
//! here first and then queued for storage, and every tick reads the current
//! collection before deciding what to write.

use log::{debug, info, warn};
use serde::Serialize;

use crate::auth::SessionContext;
use crate::error::BoardError;
use crate::models::{CreateTaskRequest, Task, TaskActivity, TaskPatch, TaskView, TimerMode};
use crate::pomodoro::{PhaseOutcome, SessionScheduler, SessionState};
use crate::repository::{WriteIntent, WriteQueue};
use crate::stats::TaskStats;
use crate::timer::{format_clock, Countdown};

/// Focus-session panel: clock, bound task and the start estimate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub mode: TimerMode,
    #[serde(flatten)]
    pub state: SessionState,
    pub phase_clock: String,
    pub active_task_name: Option<String>,
    pub can_start: bool,
    /// e.g. "Start 3 Pomodoros", or "No tasks left".
    pub estimate: String,
    pub stats: TaskStats,
}

/// Everything a client needs to render the board.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub session: SessionView,
    pub tasks: Vec<TaskView>,
}

pub struct UserBoard {
    session: SessionContext,
    tasks: Vec<Task>,
    mode: TimerMode,
    scheduler: SessionScheduler,
    writes: WriteQueue,
}

impl UserBoard {
    pub fn new(session: SessionContext, tasks: Vec<Task>, writes: WriteQueue) -> Self {
        Self {
            session,
            tasks,
            mode: TimerMode::default(),
            scheduler: SessionScheduler::new(),
            writes,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &SessionScheduler {
        &self.scheduler
    }

    pub fn create_task(&mut self, request: CreateTaskRequest) -> Result<Task, BoardError> {
        let task = Task::new(&self.session.user_id, request)?;
        info!("Task created: {} ({} min)", task.id, task.duration);
        self.tasks.push(task.clone());
        self.writes.push(WriteIntent::Insert(task.clone()));
        Ok(task)
    }

    /// Applies a partial update. A task that no longer exists is left alone.
    pub fn update_task(&mut self, task_id: &str, patch: TaskPatch) -> Option<Task> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            debug!("Ignoring update for missing task {}", task_id);
            return None;
        };
        task.apply(&patch);
        let updated = task.clone();
        self.writes.push(WriteIntent::Update {
            task_id: task_id.to_string(),
            patch,
        });
        Some(updated)
    }

    /// Removes a task, armed or not. Returns whether it existed.
    pub fn delete_task(&mut self, task_id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != task_id);
        if self.tasks.len() == before {
            debug!("Ignoring delete for missing task {}", task_id);
            return false;
        }
        info!("Task deleted: {}", task_id);
        self.writes.push(WriteIntent::Delete {
            task_id: task_id.to_string(),
        });
        true
    }

    /// Start/pause a timebox countdown.
    pub fn toggle_timer(&mut self, task_id: &str) -> Result<Option<Task>, BoardError> {
        self.require_mode(TimerMode::Timebox)?;
        let Some(task) = self.tasks.iter().find(|task| task.id == task_id) else {
            debug!("Ignoring toggle for missing task {}", task_id);
            return Ok(None);
        };
        match Countdown::observe(task).toggle() {
            Some(patch) => Ok(self.update_task(task_id, patch)),
            None => Ok(Some(task.clone())),
        }
    }

    pub fn start_session(&mut self) -> Result<(), BoardError> {
        self.require_mode(TimerMode::Pomodoro)?;
        let task_id = self.scheduler.start(&self.tasks).inspect_err(|e| {
            warn!("Focus session not started for {}: {}", self.session.user_id, e);
        })?;
        info!("Focus session started for {} on {}", self.session.user_id, task_id);
        Ok(())
    }

    pub fn stop_session(&mut self) {
        if self.scheduler.is_running() {
            info!("Focus session stopped for {}", self.session.user_id);
        }
        self.scheduler.stop();
    }

    /// Switching modes in either direction ends any running session. Timebox
    /// flags are kept; their countdowns only advance in timebox mode.
    pub fn set_mode(&mut self, mode: TimerMode) {
        if self.mode == mode {
            return;
        }
        self.stop_session();
        self.mode = mode;
        info!("Timer mode for {} is now {}", self.session.user_id, mode);
    }

    /// Whether the clock has anything to drive on this board.
    pub fn needs_clock(&self) -> bool {
        match self.mode {
            TimerMode::Timebox => self
                .tasks
                .iter()
                .map(Countdown::observe)
                .any(|countdown| countdown.is_armed() && countdown.remaining() > 0),
            TimerMode::Pomodoro => self.scheduler.is_running(),
        }
    }

    /// One second of wall clock. Returns whether anything changed.
    pub fn tick(&mut self) -> bool {
        match self.mode {
            TimerMode::Timebox => self.tick_countdowns(),
            TimerMode::Pomodoro => self.tick_session(),
        }
    }

    fn tick_countdowns(&mut self) -> bool {
        let writes: Vec<(String, TaskPatch)> = self
            .tasks
            .iter()
            .filter_map(|task| {
                Countdown::observe(task)
                    .tick()
                    .map(|patch| (task.id.clone(), patch))
            })
            .collect();

        let changed = !writes.is_empty();
        for (task_id, patch) in writes {
            if patch.is_completed == Some(true) {
                info!("Timebox finished for task {}", task_id);
            }
            self.update_task(&task_id, patch);
        }
        changed
    }

    fn tick_session(&mut self) -> bool {
        let outcome = self.scheduler.tick(&self.tasks);
        if let PhaseOutcome::Advanced { next, .. } = &outcome {
            debug!("Focus moved to task {}", next);
        }
        if let Some(task_id) = outcome.completed().map(str::to_string) {
            info!("Focus task completed: {}", task_id);
            self.update_task(&task_id, TaskPatch::completed());
        }
        !matches!(outcome, PhaseOutcome::Idle)
    }

    fn require_mode(&self, mode: TimerMode) -> Result<(), BoardError> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(BoardError::WrongMode(mode))
        }
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.tasks)
    }

    pub fn session_view(&self) -> SessionView {
        let stats = self.stats();
        let running = self.scheduler.is_running();
        let active_task_name = self.scheduler.active_task_id().and_then(|id| {
            self.tasks
                .iter()
                .find(|task| task.id == id)
                .map(|task| task.name.clone())
        });
        let estimate = match stats.sessions_needed {
            _ if stats.remaining_minutes == 0 => "No tasks left".to_string(),
            1 => "Est. 1 Pomodoro".to_string(),
            n => format!("Est. {n} Pomodoros"),
        };

        SessionView {
            mode: self.mode,
            state: self.scheduler.state().clone(),
            phase_clock: format_clock(self.scheduler.phase_secs_left()),
            active_task_name,
            can_start: self.mode == TimerMode::Pomodoro
                && !running
                && stats.remaining_minutes > 0,
            estimate,
            stats,
        }
    }

    pub fn task_views(&self) -> Vec<TaskView> {
        let focused = self.scheduler.active_task_id();
        self.tasks
            .iter()
            .map(|task| TaskView {
                task: task.clone(),
                activity: TaskActivity::of(task, self.mode, focused),
            })
            .collect()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            session: self.session_view(),
            tasks: self.task_views(),
        }
    }
}
