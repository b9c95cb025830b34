// src/tasks.rs

use actix_web::{web, HttpResponse};

use crate::app_state::AppState;
use crate::auth::SessionContext;
use crate::board_server::{CreateTask, DeleteTask, GetSnapshot, LoadBoard, ToggleTimer, UpdateTask};
use crate::error::BoardError;
use crate::models::{CreateTaskRequest, UpdateTaskRequest};

/// Makes sure the user's board is in memory before talking to it.
pub async fn open_board(data: &AppState, session: &SessionContext) -> Result<(), BoardError> {
    data.board_server
        .send(LoadBoard {
            session: session.clone(),
        })
        .await?
}

/// GET /tasks
/// Tasks in collection order, each with its derived activity.
pub async fn list_tasks(
    session: SessionContext,
    data: web::Data<AppState>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let snapshot = data.board_server.send(GetSnapshot { session }).await??;
    Ok(HttpResponse::Ok().json(snapshot.tasks))
}

/// POST /tasks
pub async fn create_task(
    session: SessionContext,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let task = data
        .board_server
        .send(CreateTask {
            session,
            request: payload.into_inner(),
        })
        .await??;
    Ok(HttpResponse::Created().json(task))
}

/// PATCH /tasks/{task_id}
/// An unknown id is a no-op and answers 204.
pub async fn update_task(
    session: SessionContext,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, BoardError> {
    let patch = payload.into_inner().into_patch()?;
    open_board(&data, &session).await?;
    let updated = data
        .board_server
        .send(UpdateTask {
            session,
            task_id: path.into_inner(),
            patch,
        })
        .await??;
    Ok(match updated {
        Some(task) => HttpResponse::Ok().json(task),
        None => HttpResponse::NoContent().finish(),
    })
}

/// DELETE /tasks/{task_id}
pub async fn delete_task(
    session: SessionContext,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    data.board_server
        .send(DeleteTask {
            session,
            task_id: path.into_inner(),
        })
        .await??;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /tasks/{task_id}/toggle
/// Start or pause the task's timebox countdown.
pub async fn toggle_timer(
    session: SessionContext,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, BoardError> {
    open_board(&data, &session).await?;
    let toggled = data
        .board_server
        .send(ToggleTimer {
            session,
            task_id: path.into_inner(),
        })
        .await??;
    Ok(match toggled {
        Some(task) => HttpResponse::Ok().json(task),
        None => HttpResponse::NoContent().finish(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix::Actor;
    use actix_web::{http::StatusCode, test, web, App};
    use chrono::Duration;
    use serde_json::{json, Value};

    use crate::app_state::AppState;
    use crate::auth::{create_jwt, Authentication};
    use crate::board_server::BoardServer;
    use crate::repository::{run_writer, InMemoryTaskRepository, TaskRepository, WriteQueue};
    use crate::routes;

    const SECRET: &str = "test-secret";

    fn bearer(user_id: &str) -> (String, String) {
        let token = create_jwt(user_id, SECRET, Duration::hours(1)).unwrap();
        ("Authorization".to_string(), format!("Bearer {token}"))
    }

    fn state() -> AppState {
        let repository: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskRepository::default());
        let (writes, rx) = WriteQueue::new();
        actix_web::rt::spawn(run_writer(repository.clone(), rx));
        AppState {
            board_server: BoardServer::new(repository, writes).start(),
        }
    }

    #[actix_web::test]
    async fn requests_without_session_are_unauthorized() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new(SECRET))
                .app_data(web::Data::new(state()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/tasks").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/tasks")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn task_lifecycle_over_http() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new(SECRET))
                .app_data(web::Data::new(state()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/tasks")
            .insert_header(bearer("user-1"))
            .set_json(json!({ "name": "Write report", "duration": 10, "priority": "High" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["timeLeft"], 600);
        assert_eq!(created["isActive"], false);
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/tasks/{id}/toggle"))
            .insert_header(bearer("user-1"))
            .to_request();
        let toggled: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(toggled["isActive"], true);

        let req = test::TestRequest::get()
            .uri("/tasks")
            .insert_header(bearer("user-1"))
            .to_request();
        let listed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed[0]["activity"], "timeboxing");
        assert_eq!(listed[0]["priority"], "High");

        let req = test::TestRequest::patch()
            .uri(&format!("/tasks/{id}"))
            .insert_header(bearer("user-1"))
            .set_json(json!({ "name": "Final report" }))
            .to_request();
        let renamed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(renamed["name"], "Final report");

        let req = test::TestRequest::delete()
            .uri(&format!("/tasks/{id}"))
            .insert_header(bearer("user-1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::patch()
            .uri(&format!("/tasks/{id}"))
            .insert_header(bearer("user-1"))
            .set_json(json!({ "name": "Ghost" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn invalid_task_is_a_bad_request() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new(SECRET))
                .app_data(web::Data::new(state()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/tasks")
            .insert_header(bearer("user-1"))
            .set_json(json!({ "name": " ", "duration": 10 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
