//! Cell actor: one chunk of the world grid.

use crate::{actor_logger, reply};
use overmind_kit::{EdgeLetter, Letter, Logger, Mail, MsgType};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Position reported by a move request.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A session present in this cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub session_id: i64,
    pub position: Option<Position>,
    /// Sequence number of the last request applied
    pub last_msg_no: i32,
}

#[derive(Debug, Serialize)]
struct EnterWorldResp {
    rt: i32,
    cell: String,
}

/// The sessions inside one chunk of the grid.
#[derive(Debug)]
pub struct Chunk {
    chunk_x: i32,
    chunk_y: i32,
    entities: HashMap<i64, Entity>,
}

impl Chunk {
    pub fn new(chunk_x: i32, chunk_y: i32) -> Self {
        Self {
            chunk_x,
            chunk_y,
            entities: HashMap::new(),
        }
    }

    /// Chunk label, `x_y`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.chunk_x, self.chunk_y)
    }

    pub fn entity(&self, session_id: i64) -> Option<&Entity> {
        self.entities.get(&session_id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Records a session entering the cell.
    pub fn enter(&mut self, edge: &EdgeLetter) {
        let entity = self.entities.entry(edge.session_id).or_insert(Entity {
            session_id: edge.session_id,
            position: None,
            last_msg_no: edge.msg_no,
        });
        entity.last_msg_no = edge.msg_no;
        debug!("Session {} entered cell {}", edge.session_id, self.label());
    }

    /// Applies a move. An empty or unparsable body keeps the old position.
    pub fn apply_move(&mut self, edge: &EdgeLetter) {
        let position = serde_json::from_slice::<Position>(&edge.body).ok();
        let entity = self.entities.entry(edge.session_id).or_insert(Entity {
            session_id: edge.session_id,
            position: None,
            last_msg_no: edge.msg_no,
        });
        entity.last_msg_no = edge.msg_no;
        if position.is_some() {
            entity.position = position;
        }
    }

    /// Forgets a session. Returns false if it was not here.
    pub fn leave(&mut self, session_id: i64) -> bool {
        self.entities.remove(&session_id).is_some()
    }

    fn handle_edge(&mut self, mail: &Mail, edge: &EdgeLetter) {
        match MsgType::try_from(edge.msg_type) {
            Ok(MsgType::EnterWorldReq) => {
                self.enter(edge);
                let response = EnterWorldResp {
                    rt: 0,
                    cell: self.label(),
                };
                match serde_json::to_vec(&response) {
                    Ok(body) => reply(mail, edge, MsgType::EnterWorldResp.code(), body),
                    Err(e) => warn!("Failed to serialize enter-world response: {}", e),
                }
            }
            Ok(MsgType::MoveReq) => self.apply_move(edge),
            _ => debug!("Cell {} ignoring message type {}", self.label(), edge.msg_type),
        }
    }
}

/// Actor owning one [`Chunk`].
#[derive(Debug)]
pub struct CellActor {
    chunk_x: i32,
    chunk_y: i32,
}

/// State of a running [`CellActor`].
#[derive(Debug)]
pub struct CellState {
    pub chunk: Chunk,
    pub logger: Logger,
}

impl CellActor {
    pub fn new(chunk_x: i32, chunk_y: i32) -> Self {
        Self { chunk_x, chunk_y }
    }

    /// Actor name of the cell at the given chunk coordinates.
    pub fn name_for(chunk_x: i32, chunk_y: i32) -> String {
        format!("cell_{chunk_x}_{chunk_y}")
    }
}

impl Actor for CellActor {
    type Msg = Mail;
    type State = CellState;
    type Arguments = Logger;

    async fn pre_start(&self, myself: ActorRef<Mail>, parent: Logger) -> Result<CellState, ActorProcessingErr> {
        let logger = actor_logger(&parent, &myself);
        logger.in_scope(|| info!("🧱 Cell [{},{}] started", self.chunk_x, self.chunk_y));
        Ok(CellState {
            chunk: Chunk::new(self.chunk_x, self.chunk_y),
            logger,
        })
    }

    async fn handle(&self, _myself: ActorRef<Mail>, mail: Mail, state: &mut CellState) -> Result<(), ActorProcessingErr> {
        let logger = state.logger.with_trace_id(&mail.envelope.trace_id);
        let chunk = &mut state.chunk;
        logger.in_scope(|| match &mail.envelope.payload {
            Letter::Edge(edge) => chunk.handle_edge(&mail, edge),
            Letter::Evict(evict) => {
                if chunk.leave(evict.session_id) {
                    debug!("Session {} left cell {}", evict.session_id, chunk.label());
                }
            }
        });
        Ok(())
    }

    async fn post_stop(&self, _myself: ActorRef<Mail>, state: &mut CellState) -> Result<(), ActorProcessingErr> {
        state
            .logger
            .in_scope(|| info!("🧱 Cell [{},{}] stopped", self.chunk_x, self.chunk_y));
        Ok(())
    }
}
