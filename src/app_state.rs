use crate::board_server::BoardServer;
use actix::Addr;

#[derive(Clone)]
pub struct AppState {
    pub board_server: Addr<BoardServer>,
}
