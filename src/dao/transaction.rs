use std::time::SystemTime;

use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::TransactionConfig,
    dao::{game_store::GameStore, models::GameEntity},
    error::ServiceError,
    state::game::Game,
};

/// Run `mutate` against the latest committed version of a game and commit the result with
/// a compare-and-swap on its version.
///
/// The closure may run several times and must derive everything from the game it receives.
/// An error aborts the transaction without writing. A mutation that leaves the game
/// untouched commits nothing and returns the game as read.
pub async fn with_game_transaction<T, F>(
    store: &dyn GameStore,
    policy: &TransactionConfig,
    game_id: Uuid,
    mut mutate: F,
) -> Result<(Game, T), ServiceError>
where
    F: FnMut(&mut Game) -> Result<T, ServiceError>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let entity = store
            .find_game(game_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;
        let current = Game::from(entity);
        let mut next = current.clone();

        let output = mutate(&mut next)?;
        if next == current {
            debug!(%game_id, attempt, "transaction left the game unchanged");
            return Ok((current, output));
        }

        let expected_version = current.version;
        next.version = expected_version + 1;
        next.updated_at = SystemTime::now().max(current.updated_at);

        match store
            .replace_game(GameEntity::from(next.clone()), expected_version)
            .await
        {
            Ok(()) => {
                debug!(
                    %game_id,
                    attempt,
                    version = next.version,
                    status = ?next.status,
                    "transaction committed"
                );
                return Ok((next, output));
            }
            Err(err) if err.is_conflict() => {
                warn!(%game_id, attempt, max_attempts, "transaction conflict");
                if attempt < max_attempts {
                    sleep(policy.backoff(attempt)).await;
                }
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::TransactionConflict {
        game_id,
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        game_store::memory::MemoryGameStore,
        models::{QuestionEntity, UserEntity},
        storage::{StorageError, StorageResult},
    };
    use futures::future::BoxFuture;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    /// Memory store whose first `conflicts` replacements lose the race.
    struct ContendedStore {
        inner: MemoryGameStore,
        conflicts: AtomicU32,
    }

    impl GameStore for ContendedStore {
        fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
            self.inner.find_game(id)
        }
        fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.insert_game(game)
        }
        fn replace_game(
            &self,
            game: GameEntity,
            expected_version: u64,
        ) -> BoxFuture<'static, StorageResult<()>> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                let id = game.id;
                return Box::pin(async move { Err(StorageError::Conflict { id }) });
            }
            self.inner.replace_game(game, expected_version)
        }
        fn find_question(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
            self.inner.find_question(id)
        }
        fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_question(question)
        }
        fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            self.inner.find_user(id)
        }
        fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_user(user)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    fn policy() -> TransactionConfig {
        TransactionConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    async fn seeded(conflicts: u32) -> (ContendedStore, Uuid) {
        let store = ContendedStore {
            inner: MemoryGameStore::new(),
            conflicts: AtomicU32::new(conflicts),
        };
        let game = Game::fixture();
        let id = game.id;
        store.insert_game(game.into()).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn commit_bumps_the_version() {
        let (store, id) = seeded(0).await;
        let (game, ()) = with_game_transaction(&store, &policy(), id, |game| {
            game.title = "Renamed".into();
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(game.version, 1);
        let stored = store.find_game(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn conflicts_are_retried_with_a_fresh_read() {
        let (store, id) = seeded(2).await;
        let runs = AtomicU32::new(0);
        let (game, ()) = with_game_transaction(&store, &policy(), id, |game| {
            runs.fetch_add(1, Ordering::SeqCst);
            game.title = "Retried".into();
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(game.version, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_a_conflict() {
        let (store, id) = seeded(10).await;
        let err = with_game_transaction(&store, &policy(), id, |game| {
            game.title = "Never".into();
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::TransactionConflict { game_id, attempts: 3 } if game_id == id
        ));
        assert_eq!(store.find_game(id).await.unwrap().unwrap().version, 0);
    }

    #[tokio::test]
    async fn mutation_errors_abort_without_writing() {
        let (store, id) = seeded(0).await;
        let err = with_game_transaction(&store, &policy(), id, |game| -> Result<(), _> {
            game.title = "Half done".into();
            Err(ServiceError::InvalidState("nope".into()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidState(_)));
        let stored = store.find_game(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Fixture");
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn unchanged_games_are_not_written() {
        let (store, id) = seeded(1).await;
        let (game, value) = with_game_transaction(&store, &policy(), id, |_| Ok(42))
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(game.version, 0);
        // The injected conflict was never consumed.
        assert_eq!(store.conflicts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_games_are_not_found() {
        let store = MemoryGameStore::new();
        let err = with_game_transaction(&store, &policy(), Uuid::new_v4(), |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_writers_all_commit() {
        let store = Arc::new(MemoryGameStore::new());
        let game = Game::fixture();
        let id = game.id;
        store.insert_game(game.into()).await.unwrap();
        let policy = TransactionConfig {
            max_attempts: 50,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        };

        let mut handles = Vec::new();
        for index in 0..8 {
            let store = store.clone();
            let policy = policy.clone();
            handles.push(tokio::spawn(async move {
                with_game_transaction(store.as_ref(), &policy, id, |game| {
                    game.title.push_str(&index.to_string());
                    Ok(())
                })
                .await
                .map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.find_game(id).await.unwrap().unwrap();
        assert_eq!(stored.version, 8);
        assert_eq!(stored.title.len(), "Fixture".len() + 8);
    }
}
