// src/web_socket_server.rs

use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};

use crate::app_state::AppState;
use crate::auth::SessionContext;
use crate::board_server::{BoardChanged, BoardServer, LoadBoard, Subscribe, Unsubscribe};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pushes a JSON board snapshot to the client after every change.
pub struct BoardConnection {
    pub session: SessionContext,
    pub hb: Instant,
    pub addr: Addr<BoardServer>,
}

impl BoardConnection {
    pub fn new(session: SessionContext, addr: Addr<BoardServer>) -> Self {
        Self {
            session,
            hb: Instant::now(),
            addr,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("Board socket for {} missed heartbeat, disconnecting", act.session.user_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for BoardConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        self.addr
            .send(LoadBoard {
                session: self.session.clone(),
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(Ok(())) => {
                        act.addr.do_send(Subscribe {
                            user_id: act.session.user_id.clone(),
                            addr: ctx.address().recipient(),
                        });
                    }
                    Ok(Err(e)) => {
                        warn!("Could not open board for {}: {}", act.session.user_id, e);
                        ctx.stop();
                    }
                    Err(e) => {
                        warn!("Board server unavailable: {}", e);
                        ctx.stop();
                    }
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.addr.do_send(Unsubscribe {
            user_id: self.session.user_id.clone(),
            addr: ctx.address().recipient(),
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for BoardConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                // Changes go through the HTTP API; the socket is push-only.
                debug!("Ignoring inbound frame from {}", self.session.user_id);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("WebSocket error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<BoardChanged> for BoardConnection {
    type Result = ();

    fn handle(&mut self, msg: BoardChanged, ctx: &mut Self::Context) {
        ctx.text(msg.payload);
    }
}

/// GET /ws
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    session: SessionContext,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    info!("Board socket opened for {}", session.user_id);
    ws::start(
        BoardConnection::new(session, data.board_server.clone()),
        &req,
        stream,
    )
}
