// src/board_server.rs

//! Actor owning every loaded [`UserBoard`].
//!
//! All reads and writes arrive as messages and are handled one at a time,
//! and the one-second clock runs inside the same actor. A stop or pause that
//! has been answered is therefore always seen by the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix::prelude::*;
use log::{debug, error, info};

use crate::auth::SessionContext;
use crate::board::{BoardSnapshot, SessionView, UserBoard};
use crate::error::BoardError;
use crate::models::{CreateTaskRequest, Task, TaskPatch, TimerMode};
use crate::repository::{TaskRepository, WriteQueue};
use crate::stats::TaskStats;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Loads the user's tasks from storage unless the board is already in memory.
#[derive(Message)]
#[rtype(result = "Result<(), BoardError>")]
pub struct LoadBoard {
    pub session: SessionContext,
}

#[derive(Message)]
#[rtype(result = "Result<BoardSnapshot, BoardError>")]
pub struct GetSnapshot {
    pub session: SessionContext,
}

#[derive(Message)]
#[rtype(result = "Result<TaskStats, BoardError>")]
pub struct GetStats {
    pub session: SessionContext,
}

#[derive(Message)]
#[rtype(result = "Result<Vec<Task>, BoardError>")]
pub struct ListTasks {
    pub session: SessionContext,
}

#[derive(Message)]
#[rtype(result = "Result<Task, BoardError>")]
pub struct CreateTask {
    pub session: SessionContext,
    pub request: CreateTaskRequest,
}

#[derive(Message)]
#[rtype(result = "Result<Option<Task>, BoardError>")]
pub struct UpdateTask {
    pub session: SessionContext,
    pub task_id: String,
    pub patch: TaskPatch,
}

#[derive(Message)]
#[rtype(result = "Result<bool, BoardError>")]
pub struct DeleteTask {
    pub session: SessionContext,
    pub task_id: String,
}

#[derive(Message)]
#[rtype(result = "Result<Option<Task>, BoardError>")]
pub struct ToggleTimer {
    pub session: SessionContext,
    pub task_id: String,
}

#[derive(Message)]
#[rtype(result = "Result<SessionView, BoardError>")]
pub struct StartSession {
    pub session: SessionContext,
}

#[derive(Message)]
#[rtype(result = "Result<SessionView, BoardError>")]
pub struct StopSession {
    pub session: SessionContext,
}

#[derive(Message)]
#[rtype(result = "Result<SessionView, BoardError>")]
pub struct SetMode {
    pub session: SessionContext,
    pub mode: TimerMode,
}

/// JSON board snapshot pushed to subscribers after each change.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct BoardChanged {
    pub payload: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub user_id: String,
    pub addr: Recipient<BoardChanged>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub user_id: String,
    pub addr: Recipient<BoardChanged>,
}

pub struct BoardServer {
    boards: HashMap<String, UserBoard>,
    subscribers: HashMap<String, Vec<Recipient<BoardChanged>>>,
    repository: Arc<dyn TaskRepository>,
    writes: WriteQueue,
    clock: Option<SpawnHandle>,
}

impl BoardServer {
    pub fn new(repository: Arc<dyn TaskRepository>, writes: WriteQueue) -> Self {
        BoardServer {
            boards: HashMap::new(),
            subscribers: HashMap::new(),
            repository,
            writes,
            clock: None,
        }
    }

    fn board(&self, session: &SessionContext) -> Result<&UserBoard, BoardError> {
        self.boards
            .get(&session.user_id)
            .ok_or_else(|| BoardError::NotLoaded(session.user_id.clone()))
    }

    /// Runs a mutation on one board, then notifies and re-arms the clock.
    fn change<R>(
        &mut self,
        session: &SessionContext,
        ctx: &mut Context<Self>,
        f: impl FnOnce(&mut UserBoard) -> Result<R, BoardError>,
    ) -> Result<R, BoardError> {
        let board = self
            .boards
            .get_mut(&session.user_id)
            .ok_or_else(|| BoardError::NotLoaded(session.user_id.clone()))?;
        let result = f(board);
        self.notify(&session.user_id);
        self.sync_clock(ctx);
        result
    }

    fn notify(&mut self, user_id: &str) {
        let (Some(board), Some(addrs)) = (self.boards.get(user_id), self.subscribers.get(user_id))
        else {
            return;
        };
        match serde_json::to_string(&board.snapshot()) {
            Ok(payload) => {
                for addr in addrs {
                    addr.do_send(BoardChanged {
                        payload: payload.clone(),
                    });
                }
            }
            Err(e) => error!("Could not encode board for {}: {}", user_id, e),
        }
    }

    /// Keeps the clock running exactly while some board has work for it.
    fn sync_clock(&mut self, ctx: &mut Context<Self>) {
        let busy = self.boards.values().any(UserBoard::needs_clock);
        match (busy, self.clock) {
            (true, None) => {
                debug!("Clock started");
                self.clock = Some(ctx.run_interval(TICK_INTERVAL, |act, ctx| act.tick(ctx)));
            }
            (false, Some(handle)) => {
                debug!("Clock stopped");
                ctx.cancel_future(handle);
                self.clock = None;
            }
            _ => {}
        }
    }

    fn tick(&mut self, ctx: &mut Context<Self>) {
        let changed: Vec<String> = self
            .boards
            .iter_mut()
            .filter_map(|(user_id, board)| board.tick().then(|| user_id.clone()))
            .collect();
        for user_id in &changed {
            self.notify(user_id);
        }
        self.sync_clock(ctx);
    }
}

impl Actor for BoardServer {
    type Context = Context<Self>;
}

impl Handler<LoadBoard> for BoardServer {
    type Result = ResponseActFuture<Self, Result<(), BoardError>>;

    fn handle(&mut self, msg: LoadBoard, _: &mut Context<Self>) -> Self::Result {
        if self.boards.contains_key(&msg.session.user_id) {
            return Box::pin(fut::ready(Ok(())));
        }
        let repository = self.repository.clone();
        let user_id = msg.session.user_id.clone();
        Box::pin(
            async move { repository.list_for_user(user_id).await }
                .into_actor(self)
                .map(move |res, act, ctx| {
                    let tasks = res?;
                    let user_id = msg.session.user_id.clone();
                    if !act.boards.contains_key(&user_id) {
                        info!("Loaded {} tasks for {}", tasks.len(), user_id);
                        let board = UserBoard::new(msg.session, tasks, act.writes.clone());
                        act.boards.insert(user_id, board);
                        act.sync_clock(ctx);
                    }
                    Ok(())
                }),
        )
    }
}

impl Handler<GetSnapshot> for BoardServer {
    type Result = Result<BoardSnapshot, BoardError>;

    fn handle(&mut self, msg: GetSnapshot, _: &mut Context<Self>) -> Self::Result {
        Ok(self.board(&msg.session)?.snapshot())
    }
}

impl Handler<GetStats> for BoardServer {
    type Result = Result<TaskStats, BoardError>;

    fn handle(&mut self, msg: GetStats, _: &mut Context<Self>) -> Self::Result {
        Ok(self.board(&msg.session)?.stats())
    }
}

impl Handler<ListTasks> for BoardServer {
    type Result = Result<Vec<Task>, BoardError>;

    fn handle(&mut self, msg: ListTasks, _: &mut Context<Self>) -> Self::Result {
        Ok(self.board(&msg.session)?.tasks().to_vec())
    }
}

impl Handler<CreateTask> for BoardServer {
    type Result = Result<Task, BoardError>;

    fn handle(&mut self, msg: CreateTask, ctx: &mut Context<Self>) -> Self::Result {
        self.change(&msg.session, ctx, |board| board.create_task(msg.request))
    }
}

impl Handler<UpdateTask> for BoardServer {
    type Result = Result<Option<Task>, BoardError>;

    fn handle(&mut self, msg: UpdateTask, ctx: &mut Context<Self>) -> Self::Result {
        self.change(&msg.session, ctx, |board| {
            Ok(board.update_task(&msg.task_id, msg.patch))
        })
    }
}

impl Handler<DeleteTask> for BoardServer {
    type Result = Result<bool, BoardError>;

    fn handle(&mut self, msg: DeleteTask, ctx: &mut Context<Self>) -> Self::Result {
        self.change(&msg.session, ctx, |board| Ok(board.delete_task(&msg.task_id)))
    }
}

impl Handler<ToggleTimer> for BoardServer {
    type Result = Result<Option<Task>, BoardError>;

    fn handle(&mut self, msg: ToggleTimer, ctx: &mut Context<Self>) -> Self::Result {
        self.change(&msg.session, ctx, |board| board.toggle_timer(&msg.task_id))
    }
}

impl Handler<StartSession> for BoardServer {
    type Result = Result<SessionView, BoardError>;

    fn handle(&mut self, msg: StartSession, ctx: &mut Context<Self>) -> Self::Result {
        self.change(&msg.session, ctx, |board| {
            board.start_session()?;
            Ok(board.session_view())
        })
    }
}

impl Handler<StopSession> for BoardServer {
    type Result = Result<SessionView, BoardError>;

    fn handle(&mut self, msg: StopSession, ctx: &mut Context<Self>) -> Self::Result {
        self.change(&msg.session, ctx, |board| {
            board.stop_session();
            Ok(board.session_view())
        })
    }
}

impl Handler<SetMode> for BoardServer {
    type Result = Result<SessionView, BoardError>;

    fn handle(&mut self, msg: SetMode, ctx: &mut Context<Self>) -> Self::Result {
        self.change(&msg.session, ctx, |board| {
            board.set_mode(msg.mode);
            Ok(board.session_view())
        })
    }
}

impl Handler<Subscribe> for BoardServer {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) {
        info!("User {} subscribed to board updates", msg.user_id);
        self.subscribers
            .entry(msg.user_id.clone())
            .or_default()
            .push(msg.addr);
        self.notify(&msg.user_id);
    }
}

impl Handler<Unsubscribe> for BoardServer {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        info!("User {} unsubscribed from board updates", msg.user_id);
        if let Some(addrs) = self.subscribers.get_mut(&msg.user_id) {
            addrs.retain(|a| a != &msg.addr);
            if addrs.is_empty() {
                self.subscribers.remove(&msg.user_id);
            }
        }
    }
}

/// One second on every board, delivered by hand instead of by the clock.
#[cfg(test)]
#[derive(Message)]
#[rtype(result = "()")]
pub struct Tick;

#[cfg(test)]
impl Handler<Tick> for BoardServer {
    type Result = ();

    fn handle(&mut self, _: Tick, ctx: &mut Context<Self>) {
        self.tick(ctx);
    }
}

/// Whether the one-second clock is currently scheduled.
#[cfg(test)]
#[derive(Message)]
#[rtype(result = "bool")]
pub struct ClockRunning;

#[cfg(test)]
impl Handler<ClockRunning> for BoardServer {
    type Result = bool;

    fn handle(&mut self, _: ClockRunning, _: &mut Context<Self>) -> bool {
        self.clock.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pomodoro::SessionState;
    use crate::repository::{run_writer, InMemoryTaskRepository};
    use serde_json::Value;

    /// Records every snapshot pushed to it.
    #[derive(Default)]
    struct Listener {
        received: Vec<String>,
    }

    impl Actor for Listener {
        type Context = Context<Self>;
    }

    impl Handler<BoardChanged> for Listener {
        type Result = ();

        fn handle(&mut self, msg: BoardChanged, _: &mut Context<Self>) {
            self.received.push(msg.payload);
        }
    }

    #[derive(Message)]
    #[rtype(result = "Vec<String>")]
    struct Received;

    impl Handler<Received> for Listener {
        type Result = MessageResult<Received>;

        fn handle(&mut self, _: Received, _: &mut Context<Self>) -> Self::Result {
            MessageResult(self.received.clone())
        }
    }

    fn request(name: &str, minutes: u32) -> CreateTaskRequest {
        CreateTaskRequest {
            name: name.to_string(),
            duration: minutes,
            priority: None,
            scheduled_time: None,
        }
    }

    fn start_server(repository: InMemoryTaskRepository) -> Addr<BoardServer> {
        let repository: Arc<dyn TaskRepository> = Arc::new(repository);
        let (writes, rx) = WriteQueue::new();
        actix_web::rt::spawn(run_writer(repository.clone(), rx));
        BoardServer::new(repository, writes).start()
    }

    async fn loaded(server: &Addr<BoardServer>, session: &SessionContext) {
        server
            .send(LoadBoard {
                session: session.clone(),
            })
            .await
            .unwrap()
            .unwrap();
    }

    async fn create(server: &Addr<BoardServer>, session: &SessionContext, minutes: u32) -> Task {
        server
            .send(CreateTask {
                session: session.clone(),
                request: request("A", minutes),
            })
            .await
            .unwrap()
            .unwrap()
    }

    async fn toggle(server: &Addr<BoardServer>, session: &SessionContext, task_id: &str) {
        server
            .send(ToggleTimer {
                session: session.clone(),
                task_id: task_id.to_string(),
            })
            .await
            .unwrap()
            .unwrap();
    }

    #[actix_web::test]
    async fn subscribers_receive_snapshots_until_unsubscribed() {
        let server = start_server(InMemoryTaskRepository::default());
        let session = SessionContext::new("user-1");
        loaded(&server, &session).await;
        let listener = Listener::default().start();

        server
            .send(Subscribe {
                user_id: session.user_id.clone(),
                addr: listener.clone().recipient(),
            })
            .await
            .unwrap();
        let received = listener.send(Received).await.unwrap();
        assert_eq!(received.len(), 1);
        let first: Value = serde_json::from_str(&received[0]).unwrap();
        assert_eq!(first["tasks"], serde_json::json!([]));

        let task = create(&server, &session, 1).await;
        assert_eq!(listener.send(Received).await.unwrap().len(), 2);

        toggle(&server, &session, &task.id).await;
        server.send(Tick).await.unwrap();
        let received = listener.send(Received).await.unwrap();
        assert_eq!(received.len(), 4);
        let latest: Value = serde_json::from_str(&received[3]).unwrap();
        assert_eq!(latest["tasks"][0]["timeLeft"], 59);
        assert_eq!(latest["tasks"][0]["activity"], "timeboxing");

        server
            .send(Unsubscribe {
                user_id: session.user_id.clone(),
                addr: listener.clone().recipient(),
            })
            .await
            .unwrap();
        create(&server, &session, 5).await;
        server.send(Tick).await.unwrap();
        assert_eq!(listener.send(Received).await.unwrap().len(), 4);
    }

    #[actix_web::test]
    async fn other_users_changes_are_not_pushed() {
        let server = start_server(InMemoryTaskRepository::default());
        let alice = SessionContext::new("alice");
        let bob = SessionContext::new("bob");
        loaded(&server, &alice).await;
        loaded(&server, &bob).await;
        let listener = Listener::default().start();
        server
            .send(Subscribe {
                user_id: alice.user_id.clone(),
                addr: listener.clone().recipient(),
            })
            .await
            .unwrap();

        create(&server, &bob, 5).await;
        assert_eq!(listener.send(Received).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn clock_runs_only_while_a_countdown_is_armed() {
        let server = start_server(InMemoryTaskRepository::default());
        let session = SessionContext::new("user-1");
        loaded(&server, &session).await;
        let task = create(&server, &session, 1).await;
        assert!(!server.send(ClockRunning).await.unwrap());

        toggle(&server, &session, &task.id).await;
        assert!(server.send(ClockRunning).await.unwrap());

        toggle(&server, &session, &task.id).await;
        assert!(!server.send(ClockRunning).await.unwrap());

        toggle(&server, &session, &task.id).await;
        for _ in 0..60 {
            server.send(Tick).await.unwrap();
        }
        let tasks = server
            .send(ListTasks {
                session: session.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        assert!(tasks[0].is_completed);
        assert!(!server.send(ClockRunning).await.unwrap());
    }

    #[actix_web::test]
    async fn clock_follows_the_focus_session() {
        let server = start_server(InMemoryTaskRepository::default());
        let session = SessionContext::new("user-1");
        loaded(&server, &session).await;
        create(&server, &session, 10).await;
        server
            .send(SetMode {
                session: session.clone(),
                mode: TimerMode::Pomodoro,
            })
            .await
            .unwrap()
            .unwrap();
        assert!(!server.send(ClockRunning).await.unwrap());

        server
            .send(StartSession {
                session: session.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        assert!(server.send(ClockRunning).await.unwrap());

        server
            .send(StopSession {
                session: session.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        assert!(!server.send(ClockRunning).await.unwrap());
    }

    #[actix_web::test]
    async fn operations_require_a_loaded_board() {
        let server = start_server(InMemoryTaskRepository::default());
        let session = SessionContext::new("user-1");
        let res = server.send(GetSnapshot { session }).await.unwrap();
        assert!(matches!(res, Err(BoardError::NotLoaded(_))));
    }

    #[actix_web::test]
    async fn load_reads_existing_tasks_once() {
        let existing = Task::new("user-1", request("Stored", 5)).unwrap();
        let server = start_server(InMemoryTaskRepository::with_tasks(vec![existing.clone()]));
        let session = SessionContext::new("user-1");

        server.send(LoadBoard { session: session.clone() }).await.unwrap().unwrap();
        server
            .send(CreateTask {
                session: session.clone(),
                request: request("Fresh", 5),
            })
            .await
            .unwrap()
            .unwrap();
        // A second load must not replace the in-memory board.
        server.send(LoadBoard { session: session.clone() }).await.unwrap().unwrap();

        let tasks = server.send(ListTasks { session }).await.unwrap().unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0], existing);
    }

    #[actix_web::test]
    async fn load_failure_is_reported_as_storage_error() {
        let server = start_server(InMemoryTaskRepository::unavailable());
        let res = server
            .send(LoadBoard {
                session: SessionContext::new("user-1"),
            })
            .await
            .unwrap();
        assert!(matches!(res, Err(BoardError::Storage(_))));
    }

    #[actix_web::test]
    async fn ticks_drive_the_focus_session() {
        let server = start_server(InMemoryTaskRepository::default());
        let session = SessionContext::new("user-1");
        server.send(LoadBoard { session: session.clone() }).await.unwrap().unwrap();
        let task = server
            .send(CreateTask {
                session: session.clone(),
                request: request("A", 1),
            })
            .await
            .unwrap()
            .unwrap();

        let res = server
            .send(StartSession {
                session: session.clone(),
            })
            .await
            .unwrap();
        assert!(matches!(res, Err(BoardError::WrongMode(TimerMode::Pomodoro))));

        server
            .send(SetMode {
                session: session.clone(),
                mode: TimerMode::Pomodoro,
            })
            .await
            .unwrap()
            .unwrap();
        let view = server
            .send(StartSession {
                session: session.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.active_task_name.as_deref(), Some("A"));

        for _ in 0..60 {
            server.send(Tick).await.unwrap();
        }

        let snapshot = server.send(GetSnapshot { session }).await.unwrap().unwrap();
        assert_eq!(snapshot.session.state, SessionState::Idle);
        assert_eq!(snapshot.tasks[0].task.id, task.id);
        assert!(snapshot.tasks[0].task.is_completed);
        assert_eq!(snapshot.session.stats.completion_percentage, 100);
    }

    #[actix_web::test]
    async fn boards_are_isolated_per_user() {
        let server = start_server(InMemoryTaskRepository::default());
        let alice = SessionContext::new("alice");
        let bob = SessionContext::new("bob");
        for session in [&alice, &bob] {
            server.send(LoadBoard { session: session.clone() }).await.unwrap().unwrap();
        }
        server
            .send(CreateTask {
                session: alice.clone(),
                request: request("Alice's", 5),
            })
            .await
            .unwrap()
            .unwrap();

        let stats = server.send(GetStats { session: bob }).await.unwrap().unwrap();
        assert_eq!(stats.total, 0);
    }
}
