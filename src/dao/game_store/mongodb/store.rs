use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{
    Collection, Database,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoDocument, MongoGameDocument, doc_id, versioned_doc_id},
};
use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, QuestionEntity, UserEntity},
    storage::{StorageError, StorageResult},
};

const GAME_COLLECTION_NAME: &str = "games";
const QUESTION_COLLECTION_NAME: &str = "questions";
const USER_COLLECTION_NAME: &str = "users";
const DUPLICATE_KEY: i32 = 11000;

/// [`GameStore`] backed by MongoDB. The connection can be swapped by the storage supervisor.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

impl MongoGameStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        Ok(Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { database }),
                config,
            }),
        })
    }

    async fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let collection = self
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
            .await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                kind: "game",
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn insert_game(&self, game: GameEntity) -> StorageResult<()> {
        let id = game.id;
        let collection = self
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
            .await;
        match collection.insert_one(MongoGameDocument::from(game)).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::Conflict { id }),
            Err(source) => Err(MongoDaoError::Save {
                kind: "game",
                id,
                source,
            }
            .into()),
        }
    }

    async fn replace_game(&self, game: GameEntity, expected_version: u64) -> StorageResult<()> {
        let id = game.id;
        let collection = self
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
            .await;
        let result = collection
            .replace_one(
                versioned_doc_id(id, expected_version),
                MongoGameDocument::from(game),
            )
            .await
            .map_err(|source| MongoDaoError::Save {
                kind: "game",
                id,
                source,
            })?;

        if result.matched_count == 0 {
            return Err(StorageError::Conflict { id });
        }
        Ok(())
    }

    async fn find_document<T>(
        &self,
        collection_name: &str,
        kind: &'static str,
        id: Uuid,
    ) -> MongoResult<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let collection = self.collection::<MongoDocument<T>>(collection_name).await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load { kind, id, source })?;
        Ok(document.map(MongoDocument::into_entity))
    }

    async fn upsert_document<T>(
        &self,
        collection_name: &str,
        kind: &'static str,
        id: Uuid,
        entity: T,
    ) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        let collection = self.collection::<MongoDocument<T>>(collection_name).await;
        collection
            .replace_one(doc_id(id), MongoDocument::new(id, entity))
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save { kind, id, source })?;
        Ok(())
    }
}

impl GameStore for MongoGameStore {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game(game).await })
    }

    fn replace_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.replace_game(game, expected_version).await })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_document(QUESTION_COLLECTION_NAME, "question", id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(QUESTION_COLLECTION_NAME, "question", question.id, question)
                .await
                .map_err(Into::into)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_document(USER_COLLECTION_NAME, "user", id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(USER_COLLECTION_NAME, "user", user.id, user)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
