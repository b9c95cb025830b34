// src/session_endpoints.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::SessionContext;
use crate::board_server::{GetSnapshot, GetStats, SetMode, StartSession, StopSession};
use crate::error::BoardError;
use crate::models::TimerMode;
use crate::tasks::open_board;

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: TimerMode,
}

/// GET /session
pub async fn get_session(
    session: SessionContext,
    data: web::Data<AppState>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let snapshot = data.board_server.send(GetSnapshot { session }).await??;
    Ok(HttpResponse::Ok().json(snapshot.session))
}

/// POST /session/start
/// 409 when no incomplete task is left.
pub async fn start_session(
    session: SessionContext,
    data: web::Data<AppState>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let view = data.board_server.send(StartSession { session }).await??;
    Ok(HttpResponse::Ok().json(view))
}

/// POST /session/stop
pub async fn stop_session(
    session: SessionContext,
    data: web::Data<AppState>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let view = data.board_server.send(StopSession { session }).await??;
    Ok(HttpResponse::Ok().json(view))
}

/// PUT /session/mode
pub async fn set_mode(
    session: SessionContext,
    data: web::Data<AppState>,
    payload: web::Json<ModeRequest>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let view = data
        .board_server
        .send(SetMode {
            session,
            mode: payload.mode,
        })
        .await??;
    Ok(HttpResponse::Ok().json(view))
}

/// GET /stats
pub async fn get_stats(
    session: SessionContext,
    data: web::Data<AppState>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let stats = data.board_server.send(GetStats { session }).await??;
    Ok(HttpResponse::Ok().json(stats))
}
