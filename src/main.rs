// src/main.rs

mod app_state;
mod auth;
mod board;
mod board_server;
mod calendar;
mod config;
mod db;
mod error;
mod models;
mod pomodoro;
mod repository;
mod session_endpoints;
mod stats;
mod tasks;
mod timer;
mod web_socket_server;

use std::sync::Arc;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info};

use crate::app_state::AppState;
use crate::auth::Authentication;
use crate::board_server::BoardServer;
use crate::calendar::get_calendar;
use crate::config::{Config, StorageBackend};
use crate::db::MongoDB;
use crate::repository::{
    run_writer, InMemoryTaskRepository, MongoTaskRepository, TaskRepository, WriteQueue,
};
use crate::session_endpoints::{get_session, get_stats, set_mode, start_session, stop_session};
use crate::tasks::{create_task, delete_task, list_tasks, toggle_timer, update_task};
use crate::web_socket_server::ws_index;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tasks")
            .route("", web::get().to(list_tasks))
            .route("", web::post().to(create_task))
            .route("/{task_id}", web::patch().to(update_task))
            .route("/{task_id}", web::delete().to(delete_task))
            .route("/{task_id}/toggle", web::post().to(toggle_timer)),
    )
    .service(
        web::scope("/session")
            .route("", web::get().to(get_session))
            .route("/start", web::post().to(start_session))
            .route("/stop", web::post().to(stop_session))
            .route("/mode", web::put().to(set_mode)),
    )
    .route("/stats", web::get().to(get_stats))
    .route("/calendar", web::get().to(get_calendar))
    // WEBSOCKET route for live board updates
    .service(web::resource("/ws").route(web::get().to(ws_index)));
}

async fn open_repository(config: &Config) -> std::io::Result<Arc<dyn TaskRepository>> {
    match &config.storage {
        StorageBackend::Mongo { uri, database_name } => {
            let mongodb = MongoDB::init(uri, database_name).await.map_err(|e| {
                error!("Could not connect to MongoDB: {}", e);
                std::io::Error::other(e)
            })?;
            info!("Using MongoDB database {}", database_name);
            Ok(Arc::new(MongoTaskRepository::new(&mongodb)))
        }
        StorageBackend::Memory => {
            info!("Using in-memory task storage");
            Ok(Arc::new(InMemoryTaskRepository::default()))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        std::io::Error::other(e)
    })?;

    let repository = open_repository(&config).await?;
    let (writes, write_rx) = WriteQueue::new();
    actix_web::rt::spawn(run_writer(repository.clone(), write_rx));
    let board_server = BoardServer::new(repository, writes).start();

    info!("Server running at http://{}", config.bind_addr);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let bind_addr = config.bind_addr.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication::new(&config.jwt_secret))
            .app_data(web::Data::new(AppState {
                board_server: board_server.clone(),
            }))
            .configure(routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
