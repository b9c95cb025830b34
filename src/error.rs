// src/error.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::TimerMode;

/// Failures of task board operations, mapped onto HTTP responses.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("No incomplete tasks to start a Pomodoro!")]
    EmptyQueue,
    #[error("a focus session is already running")]
    AlreadyRunning,
    #[error("this action is only available in {0} mode")]
    WrongMode(TimerMode),
    #[error("invalid task: {0}")]
    InvalidTask(String),
    #[error("no calendar week can start on {0}")]
    InvalidWeek(chrono::NaiveDate),
    #[error("task board for user {0} is not loaded")]
    NotLoaded(String),
    #[error("task storage unavailable: {0}")]
    Storage(#[from] RepositoryError),
    #[error("task board is not responding: {0}")]
    Mailbox(#[from] actix::MailboxError),
}

impl ResponseError for BoardError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyQueue | Self::AlreadyRunning | Self::WrongMode(_) => StatusCode::CONFLICT,
            Self::InvalidTask(_) | Self::InvalidWeek(_) => StatusCode::BAD_REQUEST,
            Self::NotLoaded(_) | Self::Storage(_) | Self::Mailbox(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("could not encode task update: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
