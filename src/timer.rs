// src/timer.rs

//! Timebox countdown for a single task.
//!
//! A [`Countdown`] is rebuilt from the latest task record on every use and
//! never outlives the call, so a tick always works from current state.

use crate::models::{Task, TaskPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    armed: bool,
    completed: bool,
}

impl Countdown {
    pub fn observe(task: &Task) -> Self {
        Self {
            remaining: task.time_left,
            armed: task.is_active && !task.is_completed,
            completed: task.is_completed,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arms the countdown. Does nothing once the time is used up.
    pub fn arm(&mut self) -> bool {
        if self.completed || self.remaining == 0 {
            return false;
        }
        self.armed = true;
        true
    }

    /// Start/pause. Returns the write to persist, if anything changed.
    pub fn toggle(&mut self) -> Option<TaskPatch> {
        if self.armed {
            self.armed = false;
            Some(TaskPatch::armed(false))
        } else if self.arm() {
            Some(TaskPatch::armed(true))
        } else {
            None
        }
    }

    /// One clock tick. Exactly one second is taken per call; reaching zero
    /// yields a single write carrying `timeLeft`, `isActive` and `isCompleted`.
    pub fn tick(&mut self) -> Option<TaskPatch> {
        if !self.armed || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.armed = false;
            self.completed = true;
            Some(TaskPatch::expired())
        } else {
            Some(TaskPatch::time_left(self.remaining))
        }
    }
}

/// Renders seconds as `m:ss`.
pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateTaskRequest;

    fn task(minutes: u32) -> Task {
        Task::new(
            "user-1",
            CreateTaskRequest {
                name: "Focus".to_string(),
                duration: minutes,
                priority: None,
                scheduled_time: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn disarmed_countdown_does_not_tick() {
        let mut countdown = Countdown::observe(&task(1));
        assert_eq!(countdown.tick(), None);
        assert_eq!(countdown.remaining(), 60);
    }

    #[test]
    fn toggle_flips_between_start_and_pause() {
        let mut countdown = Countdown::observe(&task(1));
        assert_eq!(countdown.toggle(), Some(TaskPatch::armed(true)));
        assert!(countdown.is_armed());
        assert_eq!(countdown.toggle(), Some(TaskPatch::armed(false)));
        assert!(!countdown.is_armed());
    }

    #[test]
    fn each_tick_takes_exactly_one_second() {
        let mut countdown = Countdown::observe(&task(1));
        countdown.arm();
        assert_eq!(countdown.tick(), Some(TaskPatch::time_left(59)));
        assert_eq!(countdown.tick(), Some(TaskPatch::time_left(58)));
    }

    #[test]
    fn reaching_zero_completes_in_one_write() {
        let mut t = task(1);
        t.time_left = 1;
        t.is_active = true;
        let mut countdown = Countdown::observe(&t);
        assert_eq!(countdown.tick(), Some(TaskPatch::expired()));
        assert!(!countdown.is_armed());
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn ticks_after_completion_are_noops() {
        let mut t = task(1);
        t.time_left = 1;
        t.is_active = true;
        let mut countdown = Countdown::observe(&t);
        countdown.tick();
        assert_eq!(countdown.tick(), None);
        assert!(!countdown.arm());
        assert_eq!(countdown.toggle(), None);

        t.apply(&TaskPatch::expired());
        let mut reloaded = Countdown::observe(&t);
        assert_eq!(reloaded.tick(), None);
        assert_eq!(reloaded.remaining(), 0);
    }

    #[test]
    fn arm_is_noop_without_time_left() {
        let mut t = task(1);
        t.time_left = 0;
        let mut countdown = Countdown::observe(&t);
        assert!(!countdown.arm());
        assert_eq!(countdown.tick(), None);
    }

    #[test]
    fn clock_is_rendered_as_minutes_and_padded_seconds() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(0), "0:00");
    }
}
