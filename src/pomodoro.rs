// src/pomodoro.rs

//! Focus-session scheduler.
//!
//! Runs fixed 25 minute phases over the queue of incomplete tasks. The
//! active task gets its own countdown seeded from its duration; whichever of
//! the two counters reaches zero first ends the phase. Both counters are
//! decremented before the check, so a phase ends on the tick that brings a
//! counter to exactly zero: a 10 minute task completes on tick 600.

use log::info;
use serde::Serialize;

use crate::error::BoardError;
use crate::models::Task;

/// Length of one focus phase in seconds.
pub const FOCUS_PHASE_SECS: u32 = 25 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    Running {
        active_task_id: String,
        phase_secs_left: u32,
        task_secs_left: u32,
    },
}

/// What a tick did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// No session is running.
    Idle,
    Continuing,
    /// The phase ended and another task took over.
    Advanced {
        completed: Option<String>,
        next: String,
    },
    /// The phase ended and no incomplete task was left.
    Finished { completed: Option<String> },
}

impl PhaseOutcome {
    pub fn completed(&self) -> Option<&str> {
        match self {
            Self::Advanced { completed, .. } | Self::Finished { completed } => completed.as_deref(),
            Self::Idle | Self::Continuing => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionScheduler {
    state: SessionState,
}

impl SessionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    pub fn active_task_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Running { active_task_id, .. } => Some(active_task_id),
            SessionState::Idle => None,
        }
    }

    /// Phase clock for display; a full phase while idle.
    pub fn phase_secs_left(&self) -> u32 {
        match &self.state {
            SessionState::Running {
                phase_secs_left, ..
            } => *phase_secs_left,
            SessionState::Idle => FOCUS_PHASE_SECS,
        }
    }

    /// Binds the first incomplete task and starts a phase.
    pub fn start(&mut self, tasks: &[Task]) -> Result<String, BoardError> {
        if self.is_running() {
            return Err(BoardError::AlreadyRunning);
        }
        let first = tasks
            .iter()
            .find(|task| !task.is_completed)
            .ok_or(BoardError::EmptyQueue)?;
        self.bind(first);
        Ok(first.id.clone())
    }

    /// Ends the session. Nothing is marked completed.
    pub fn stop(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Advances the session by one second against the current collection.
    ///
    /// An active task that was deleted or completed elsewhere ends the phase
    /// without being completed here.
    pub fn tick(&mut self, tasks: &[Task]) -> PhaseOutcome {
        let SessionState::Running {
            active_task_id,
            phase_secs_left,
            task_secs_left,
        } = &mut self.state
        else {
            return PhaseOutcome::Idle;
        };

        *phase_secs_left = phase_secs_left.saturating_sub(1);
        *task_secs_left = task_secs_left.saturating_sub(1);

        let still_open = tasks
            .iter()
            .any(|task| task.id == *active_task_id && !task.is_completed);
        if still_open && *phase_secs_left > 0 && *task_secs_left > 0 {
            return PhaseOutcome::Continuing;
        }

        let finished = active_task_id.clone();
        let completed = (still_open && *task_secs_left == 0).then(|| finished.clone());
        self.end_phase(tasks, &finished, completed)
    }

    fn end_phase(
        &mut self,
        tasks: &[Task],
        finished: &str,
        completed: Option<String>,
    ) -> PhaseOutcome {
        let next = tasks
            .iter()
            .find(|task| !task.is_completed && task.id != finished);
        match next {
            Some(task) => {
                info!("Focus phase over for {finished}; moving to {}", task.id);
                self.bind(task);
                PhaseOutcome::Advanced {
                    completed,
                    next: task.id.clone(),
                }
            }
            None => {
                info!("Focus phase over for {finished}; queue is empty");
                self.state = SessionState::Idle;
                PhaseOutcome::Finished { completed }
            }
        }
    }

    fn bind(&mut self, task: &Task) {
        self.state = SessionState::Running {
            active_task_id: task.id.clone(),
            phase_secs_left: FOCUS_PHASE_SECS,
            task_secs_left: task.total_secs(),
        };
    }
}
