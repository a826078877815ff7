/// Participation, game and turn-order mutations.
pub mod engine;
/// Game aggregate and its participants.
pub mod game;
/// Question kinds, runtime and grading.
pub mod question;
/// Rounds, scoring settings and max points.
pub mod round;
/// Score aggregation.
pub mod scoreboard;
mod sse;
/// Game status graph and guarded transitions.
pub mod state_machine;
/// Countdown timers derived from timestamps.
pub mod timer;

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig, dao::game_store::GameStore, dto::sse::ServerEvent, error::ServiceError,
};

pub use self::sse::SseHub;
use self::sse::SseState;

/// Cheaply clonable handle on the application state.
pub type SharedState = Arc<AppState>;

/// Central application state holding the storage handle and event hubs.
///
/// Game state itself lives in the store; nothing here is authoritative.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    sse: SseState,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            sse: SseState::new(config.sse.channel_capacity),
            degraded: degraded_tx,
            config: Arc::new(config),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current game store, or [`ServiceError::Degraded`] when none is usable.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Subscribe to the events of a game, creating its hub on first use.
    pub fn subscribe_game_sse(&self, game_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.sse.subscribe(game_id)
    }

    /// Event hub of a game, only if a client is listening.
    pub fn existing_game_sse(&self, game_id: Uuid) -> Option<SseHub> {
        self.sse.existing_hub(game_id)
    }

    /// Forget the hub of a game when no subscriber is left.
    pub fn release_game_sse(&self, game_id: Uuid) {
        self.sse.release(game_id);
    }

    /// Hubs of every game with listeners.
    pub(crate) fn sse(&self) -> &SseState {
        &self.sse
    }
}
