use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        game::GameResponse,
        sse::{Handshake, ServerEvent},
    },
    error::ServiceError,
    services::sse_events::{EVENT_GAME_STATE, EVENT_HANDSHAKE},
    state::{SharedState, game::Game},
};

/// Live subscription to the events of one game.
pub struct GameSubscription {
    /// Game being followed.
    pub game_id: Uuid,
    /// Events broadcast after the subscription was taken.
    pub receiver: broadcast::Receiver<ServerEvent>,
    /// Events delivered to this client before anything else.
    pub initial: Vec<ServerEvent>,
}

/// Subscribe to a game stream. The client first receives a handshake and the current
/// game state, then every committed change.
pub async fn subscribe_game(
    state: &SharedState,
    game_id: Uuid,
) -> Result<GameSubscription, ServiceError> {
    // Subscribe before reading so no commit falls between the snapshot and the stream.
    let receiver = state.subscribe_game_sse(game_id);

    let game = match load_snapshot(state, game_id).await {
        Ok(game) => game,
        Err(err) => {
            drop(receiver);
            state.release_game_sse(game_id);
            return Err(err);
        }
    };

    let mut initial = Vec::with_capacity(2);
    let handshake = Handshake {
        game_id,
        message: format!("subscribed to game {game_id}"),
        degraded: state.is_degraded(),
    };
    initial.push(
        ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &handshake)
            .map_err(|err| ServiceError::InvalidState(err.to_string()))?,
    );
    initial.push(
        ServerEvent::json(
            Some(EVENT_GAME_STATE.to_string()),
            &GameResponse::from(&game),
        )
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?,
    );

    Ok(GameSubscription {
        game_id,
        receiver,
        initial,
    })
}

async fn load_snapshot(state: &SharedState, game_id: Uuid) -> Result<Game, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_game(game_id)
        .await?
        .map(Game::from)
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a subscription into an SSE response, forwarding events and releasing the game
/// hub once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    subscription: GameSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let GameSubscription {
        game_id,
        mut receiver,
        initial,
    } = subscription;
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                break;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Later game.state events carry the full game.
                            warn!(%game_id, skipped, "SSE subscriber lagged behind");
                            continue;
                        }
                    }
                }
            }
        }

        drop(receiver);
        state.release_game_sse(game_id);
        info!(%game_id, "game SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
