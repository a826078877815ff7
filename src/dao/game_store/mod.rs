#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{GameEntity, QuestionEntity, UserEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for games, bank questions and users.
///
/// Game writes are compare-and-swap on [`GameEntity::version`]: `insert_game` fails with
/// [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict) when the id is
/// taken, `replace_game` when the stored version differs from `expected_version`.
pub trait GameStore: Send + Sync {
    /// Load a game by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Persist a new game.
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Overwrite a game if it is still at `expected_version`.
    fn replace_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a bank question by id.
    fn find_question(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    /// Upsert a bank question.
    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a user by id.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Upsert a user.
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Probe the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
