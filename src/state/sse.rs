use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Per-game broadcast hubs, created on first use.
pub struct SseState {
    hubs: DashMap<Uuid, SseHub>,
    capacity: usize,
}

impl SseState {
    /// Build an empty registry whose hubs buffer `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to the hub of a game, created when missing. The receiver is registered
    /// while the entry is held, so a concurrent [`SseState::release`] cannot drop the hub
    /// under a new subscriber.
    pub fn subscribe(&self, game_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(game_id)
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Hub of a game if someone subscribed to it.
    pub fn existing_hub(&self, game_id: Uuid) -> Option<SseHub> {
        self.hubs.get(&game_id).map(|hub| hub.clone())
    }

    /// Drop the hub of a game once its last subscriber left.
    pub fn release(&self, game_id: Uuid) {
        self.hubs
            .remove_if(&game_id, |_, hub| hub.sender.receiver_count() == 0);
    }

    /// Send an event to every game stream.
    pub fn broadcast_all(&self, event: ServerEvent) {
        for hub in self.hubs.iter() {
            hub.broadcast(event.clone());
        }
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
#[derive(Clone)]
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
