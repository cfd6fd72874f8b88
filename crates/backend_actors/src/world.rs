//! World actor: supervises the cell grid and routes requests to cells.

use crate::actor_logger;
use crate::cell::CellActor;
use overmind_kit::{Letter, Logger, Mail};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Side length of the pre-spawned cell grid.
pub const GRID_SIZE: i32 = 2;

/// How long the world waits for each cell when it stops.
const CELL_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Spawns the cells as linked children and forwards each request to one of
/// them.
///
/// A session is pinned to cell `session_id mod cell count` until requests
/// carry coordinates. A named world names its cells `<world>.cell_<x>_<y>`.
#[derive(Debug, Default)]
pub struct WorldActor;

impl WorldActor {
    pub fn new() -> Self {
        Self
    }
}

/// State of a running [`WorldActor`].
pub struct WorldState {
    cells: Vec<ActorRef<Mail>>,
    logger: Logger,
}

impl WorldState {
    fn cell_for(&self, session_id: i64) -> Option<&ActorRef<Mail>> {
        if self.cells.is_empty() {
            return None;
        }
        let index = session_id.rem_euclid(self.cells.len() as i64) as usize;
        self.cells.get(index)
    }

    fn route(&self, mail: Mail) {
        let session_id = match &mail.envelope.payload {
            Letter::Edge(edge) => edge.session_id,
            Letter::Evict(evict) => {
                // Every cell may hold the session.
                for cell in &self.cells {
                    let _ = cell.cast(mail.clone());
                }
                debug!("Broadcast eviction of session {} to cells", evict.session_id);
                return;
            }
        };

        let Some(cell) = self.cell_for(session_id) else {
            warn!("No cell available for session {}", session_id);
            return;
        };
        if cell.cast(mail).is_err() {
            warn!("Cell {} unavailable, dropping request", cell.get_id());
        }
    }
}

impl Actor for WorldActor {
    type Msg = Mail;
    type State = WorldState;
    type Arguments = Logger;

    async fn pre_start(&self, myself: ActorRef<Mail>, parent: Logger) -> Result<WorldState, ActorProcessingErr> {
        let logger = actor_logger(&parent, &myself);
        let mut cells = Vec::new();
        for x in 0..GRID_SIZE {
            for y in 0..GRID_SIZE {
                let name = myself
                    .get_name()
                    .map(|world| format!("{world}.{}", CellActor::name_for(x, y)));
                let (cell, _) =
                    Actor::spawn_linked(name, CellActor::new(x, y), logger.clone(), myself.get_cell()).await?;
                cells.push(cell);
            }
        }
        logger.in_scope(|| info!("🌍 World actor started, {} cell(s) online", cells.len()));
        Ok(WorldState { cells, logger })
    }

    async fn handle(&self, _myself: ActorRef<Mail>, mail: Mail, state: &mut WorldState) -> Result<(), ActorProcessingErr> {
        let logger = state.logger.with_trace_id(&mail.envelope.trace_id);
        logger.in_scope(|| state.route(mail));
        Ok(())
    }

    async fn post_stop(&self, _myself: ActorRef<Mail>, state: &mut WorldState) -> Result<(), ActorProcessingErr> {
        let cells = &state.cells;
        state
            .logger
            .instrument(async move {
                for cell in cells {
                    if cell.stop_and_wait(None, Some(CELL_STOP_TIMEOUT)).await.is_err() {
                        warn!("Cell {} did not stop in time", cell.get_id());
                    }
                }
                info!("🌍 World actor stopped");
            })
            .await;
        Ok(())
    }
}
