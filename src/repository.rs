// src/repository.rs

//! Task persistence.
//!
//! The board never awaits storage. Every change is queued as a
//! [`WriteIntent`] and a single writer task applies the queue in order, so
//! consecutive updates to one task cannot overtake each other. Failed writes
//! are logged and dropped.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::TryStreamExt;
use log::{debug, error};
use mongodb::bson::{doc, to_document};
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::db::MongoDB;
use crate::error::RepositoryError;
use crate::models::{Priority, Task, TaskPatch};

pub trait TaskRepository: Send + Sync {
    /// All tasks of one user, in creation order.
    fn list_for_user(&self, user_id: String) -> BoxFuture<'_, Result<Vec<Task>, RepositoryError>>;

    fn insert(&self, task: Task) -> BoxFuture<'_, Result<(), RepositoryError>>;

    /// Returns `false` when no task has that id.
    fn update(
        &self,
        task_id: String,
        patch: TaskPatch,
    ) -> BoxFuture<'_, Result<bool, RepositoryError>>;

    /// Returns `false` when no task has that id.
    fn delete(&self, task_id: String) -> BoxFuture<'_, Result<bool, RepositoryError>>;
}

/// Stored shape of a task in the `tasks` collection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    duration: u32,
    time_left: u32,
    is_active: bool,
    is_completed: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scheduled_time: Option<DateTime<Utc>>,
    user_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<Task> for TaskDocument {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            name: task.name,
            duration: task.duration,
            time_left: task.time_left,
            is_active: task.is_active,
            is_completed: task.is_completed,
            priority: task.priority,
            scheduled_time: task.scheduled_time,
            user_id: task.user_id,
            created_at: Utc::now(),
        }
    }
}

impl From<TaskDocument> for Task {
    fn from(document: TaskDocument) -> Self {
        Self {
            id: document.id,
            name: document.name,
            duration: document.duration,
            time_left: document.time_left,
            is_active: document.is_active,
            is_completed: document.is_completed,
            priority: document.priority,
            scheduled_time: document.scheduled_time,
            user_id: document.user_id,
        }
    }
}

pub struct MongoTaskRepository {
    collection: Collection<TaskDocument>,
}

impl MongoTaskRepository {
    pub fn new(mongodb: &MongoDB) -> Self {
        Self {
            collection: mongodb.db.collection::<TaskDocument>("tasks"),
        }
    }
}

impl TaskRepository for MongoTaskRepository {
    fn list_for_user(&self, user_id: String) -> BoxFuture<'_, Result<Vec<Task>, RepositoryError>> {
        Box::pin(async move {
            let documents: Vec<TaskDocument> = self
                .collection
                .find(doc! { "userId": &user_id })
                .sort(doc! { "createdAt": 1 })
                .await?
                .try_collect()
                .await?;
            Ok(documents.into_iter().map(Task::from).collect())
        })
    }

    fn insert(&self, task: Task) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(async move {
            self.collection.insert_one(TaskDocument::from(task)).await?;
            Ok(())
        })
    }

    fn update(
        &self,
        task_id: String,
        patch: TaskPatch,
    ) -> BoxFuture<'_, Result<bool, RepositoryError>> {
        Box::pin(async move {
            if patch.is_empty() {
                return Ok(true);
            }
            let changes = to_document(&patch)?;
            let result = self
                .collection
                .update_one(doc! { "_id": &task_id }, doc! { "$set": changes })
                .await?;
            Ok(result.matched_count > 0)
        })
    }

    fn delete(&self, task_id: String) -> BoxFuture<'_, Result<bool, RepositoryError>> {
        Box::pin(async move {
            let result = self.collection.delete_one(doc! { "_id": &task_id }).await?;
            Ok(result.deleted_count > 0)
        })
    }
}

/// Process-local storage, used by `STORAGE_BACKEND=memory` and by tests.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<Vec<Task>>,
    failing: bool,
}

impl InMemoryTaskRepository {
    #[cfg(test)]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            failing: false,
        }
    }

    /// A store whose every call fails, for exercising error paths.
    #[cfg(test)]
    pub fn unavailable() -> Self {
        Self {
            tasks: Mutex::default(),
            failing: true,
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<Task> {
        self.lock().map(|tasks| tasks.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Task>>, RepositoryError> {
        if self.failing {
            return Err(RepositoryError::Unavailable("store is offline".to_string()));
        }
        self.tasks
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn list_for_user(&self, user_id: String) -> BoxFuture<'_, Result<Vec<Task>, RepositoryError>> {
        let result = self.lock().map(|tasks| {
            tasks
                .iter()
                .filter(|task| task.user_id == user_id)
                .cloned()
                .collect::<Vec<_>>()
        });
        Box::pin(async move { result })
    }

    fn insert(&self, task: Task) -> BoxFuture<'_, Result<(), RepositoryError>> {
        let result = self.lock().map(|mut tasks| tasks.push(task));
        Box::pin(async move { result })
    }

    fn update(
        &self,
        task_id: String,
        patch: TaskPatch,
    ) -> BoxFuture<'_, Result<bool, RepositoryError>> {
        let result = self.lock().map(|mut tasks| {
            match tasks.iter_mut().find(|task| task.id == task_id) {
                Some(task) => {
                    task.apply(&patch);
                    true
                }
                None => false,
            }
        });
        Box::pin(async move { result })
    }

    fn delete(&self, task_id: String) -> BoxFuture<'_, Result<bool, RepositoryError>> {
        let result = self.lock().map(|mut tasks| {
            let before = tasks.len();
            tasks.retain(|task| task.id != task_id);
            tasks.len() != before
        });
        Box::pin(async move { result })
    }
}

/// A pending write against the task store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteIntent {
    Insert(Task),
    Update { task_id: String, patch: TaskPatch },
    Delete { task_id: String },
}

#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<WriteIntent>,
}

impl WriteQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WriteIntent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn push(&self, intent: WriteIntent) {
        if let Err(e) = self.tx.send(intent) {
            error!("Task writer has stopped, dropping {:?}", e.0);
        }
    }
}

/// Drains the queue until every [`WriteQueue`] handle is dropped.
pub async fn run_writer(
    repository: Arc<dyn TaskRepository>,
    mut rx: mpsc::UnboundedReceiver<WriteIntent>,
) {
    while let Some(intent) = rx.recv().await {
        match intent {
            WriteIntent::Insert(task) => {
                let task_id = task.id.clone();
                if let Err(e) = repository.insert(task).await {
                    error!("Error adding task {}: {}", task_id, e);
                }
            }
            WriteIntent::Update { task_id, patch } => {
                match repository.update(task_id.clone(), patch).await {
                    Ok(true) => {}
                    Ok(false) => debug!("Update for missing task {} ignored", task_id),
                    Err(e) => error!("Error updating task {}: {}", task_id, e),
                }
            }
            WriteIntent::Delete { task_id } => {
                match repository.delete(task_id.clone()).await {
                    Ok(true) => {}
                    Ok(false) => debug!("Delete for missing task {} ignored", task_id),
                    Err(e) => error!("Error deleting task {}: {}", task_id, e),
                }
            }
        }
    }
    debug!("Task writer finished");
}
