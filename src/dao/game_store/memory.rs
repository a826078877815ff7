use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, QuestionEntity, UserEntity},
    storage::{StorageError, StorageResult},
};

/// Process-local store, used when no database is configured and by the service tests.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    games: Arc<DashMap<Uuid, GameEntity>>,
    questions: Arc<DashMap<Uuid, QuestionEntity>>,
    users: Arc<DashMap<Uuid, UserEntity>>,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, game: GameEntity) -> StorageResult<()> {
        match self.games.entry(game.id) {
            Entry::Occupied(_) => Err(StorageError::Conflict { id: game.id }),
            Entry::Vacant(slot) => {
                slot.insert(game);
                Ok(())
            }
        }
    }

    fn replace(&self, game: GameEntity, expected_version: u64) -> StorageResult<()> {
        match self.games.get_mut(&game.id) {
            Some(mut stored) if stored.version == expected_version => {
                *stored = game;
                Ok(())
            }
            _ => Err(StorageError::Conflict { id: game.id }),
        }
    }
}

impl GameStore for MemoryGameStore {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let found = self.games.get(&id).map(|game| game.clone());
        Box::pin(async move { Ok(found) })
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.insert(game);
        Box::pin(async move { result })
    }

    fn replace_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.replace(game, expected_version);
        Box::pin(async move { result })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let found = self.questions.get(&id).map(|question| question.clone());
        Box::pin(async move { Ok(found) })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.questions.insert(question.id, question);
        Box::pin(async { Ok(()) })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let found = self.users.get(&id).map(|user| user.clone());
        Box::pin(async move { Ok(found) })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.users.insert(user.id, user);
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
