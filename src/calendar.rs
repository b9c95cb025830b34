// src/calendar.rs

//! Weekly calendar layout. Scheduled times are placed on a UTC day grid.

use actix_web::{web, HttpResponse};
use chrono::{Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth::SessionContext;
use crate::board_server::ListTasks;
use crate::error::BoardError;
use crate::models::{Priority, Task};
use crate::tasks::open_board;
use crate::timer::format_clock;

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub week_start: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarWeek {
    pub week_start: NaiveDate,
    pub previous_week: NaiveDate,
    pub next_week: NaiveDate,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Mon".
    pub weekday: String,
    pub entries: Vec<CalendarEntry>,
}

/// A task block; `top` and `height` are percentages of the day column.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub task_id: String,
    pub label: String,
    pub priority: Priority,
    pub top: f64,
    pub height: f64,
}

/// Lays out the week starting at `week_start`. Fails when the week or its
/// neighbours fall outside the representable date range.
pub fn week_layout(week_start: NaiveDate, tasks: &[Task]) -> Result<CalendarWeek, BoardError> {
    let shift = |days: i64| {
        week_start
            .checked_add_signed(Duration::days(days))
            .ok_or(BoardError::InvalidWeek(week_start))
    };

    let days = (0..7)
        .map(|offset| {
            let date = shift(offset)?;
            Ok(CalendarDay {
                date,
                weekday: date.format("%a").to_string(),
                entries: tasks
                    .iter()
                    .filter_map(|task| place(task, date))
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, BoardError>>()?;

    Ok(CalendarWeek {
        week_start,
        previous_week: shift(-7)?,
        next_week: shift(7)?,
        days,
    })
}

fn place(task: &Task, date: NaiveDate) -> Option<CalendarEntry> {
    let scheduled = task.scheduled_time?;
    if scheduled.date_naive() != date {
        return None;
    }
    let start_minutes = f64::from(scheduled.hour() * 60 + scheduled.minute());
    Some(CalendarEntry {
        task_id: task.id.clone(),
        label: format!("{} ({})", task.name, format_clock(task.total_secs())),
        priority: task.priority,
        top: start_minutes / MINUTES_PER_DAY * 100.0,
        height: f64::from(task.duration) / MINUTES_PER_DAY * 100.0,
    })
}

/// GET /calendar?week_start=YYYY-MM-DD
pub async fn get_calendar(
    session: SessionContext,
    data: web::Data<AppState>,
    query: web::Query<WeekQuery>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let tasks = data.board_server.send(ListTasks { session }).await??;
    let week_start = query
        .week_start
        .unwrap_or_else(|| Utc::now().date_naive());
    Ok(HttpResponse::Ok().json(week_layout(week_start, &tasks)?))
}
