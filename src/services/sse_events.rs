use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dto::{
        game::GameResponse,
        sse::{ServerEvent, SystemStatus},
    },
    state::{SharedState, SseHub, game::Game},
};

pub(crate) const EVENT_GAME_STATE: &str = "game.state";
pub(crate) const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast the committed state of a game to its stream, if anyone listens.
pub fn broadcast_game_state(state: &SharedState, game: &Game) {
    let Some(hub) = state.existing_game_sse(game.id) else {
        return;
    };
    send_event(&hub, EVENT_GAME_STATE, &GameResponse::from(game));
    debug!(game_id = %game.id, version = game.version, "broadcast game state");
}

/// Broadcast the degraded flag to every game stream.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    match ServerEvent::json(
        Some(EVENT_SYSTEM_STATUS.to_string()),
        &SystemStatus { degraded },
    ) {
        Ok(event) => state.sse().broadcast_all(event),
        Err(err) => warn!(error = %err, "failed to serialize system status"),
    }
}

/// Relay degraded mode changes to the game streams until the state is dropped.
pub async fn forward_degraded_changes(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        broadcast_system_status(&state, degraded);
    }
}

pub(crate) fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
