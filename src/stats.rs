// src/stats.rs

use serde::Serialize;

use crate::models::Task;
use crate::pomodoro::FOCUS_PHASE_SECS;

const PHASE_MINUTES: u32 = FOCUS_PHASE_SECS / 60;

/// Progress figures derived from the collection on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    /// Sum of durations of the incomplete tasks, in minutes.
    pub remaining_minutes: u32,
    pub sessions_needed: u32,
    pub completion_percentage: u32,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.is_completed).count();
        let remaining_minutes = tasks
            .iter()
            .filter(|task| !task.is_completed)
            .fold(0u32, |sum, task| sum.saturating_add(task.duration));

        Self {
            total,
            completed,
            remaining_minutes,
            sessions_needed: sessions_needed(remaining_minutes),
            completion_percentage: completion_percentage(completed, total),
        }
    }
}

pub fn sessions_needed(remaining_minutes: u32) -> u32 {
    remaining_minutes.div_ceil(PHASE_MINUTES)
}

/// `round(100 * completed / total)` with halves rounded up; 0 for no tasks.
pub fn completion_percentage(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rounded = (200 * completed as u64 + total as u64) / (2 * total as u64);
    rounded as u32
}
