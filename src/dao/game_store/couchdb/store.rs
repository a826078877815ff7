use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, QuestionEntity, UserEntity},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchDocument, game_doc_id, question_doc_id, user_doc_id},
};

/// [`GameStore`] backed by a CouchDB database over its HTTP API.
#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchGameStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412: created concurrently by another instance.
                if create.status().is_success()
                    || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchDocument<T>>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document. CouchDB answers 409 when `_rev` is stale or missing for an
    /// existing document.
    async fn put_document<T>(&self, document: &CouchDocument<T>) -> CouchResult<()>
    where
        T: Serialize,
    {
        let path = document.id.as_str();
        let response = self
            .request(Method::PUT, path)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::RevisionConflict {
                path: path.to_string(),
            }),
            other => Err(CouchDaoError::RequestStatus {
                path: path.to_string(),
                status: other,
            }),
        }
    }

    /// Last-write-wins upsert for documents without version semantics.
    async fn upsert<T>(&self, doc_id: String, body: T) -> CouchResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let rev = self
            .get_document::<T>(&doc_id)
            .await?
            .and_then(|existing| existing.rev);
        self.put_document(&CouchDocument::new(doc_id, rev, body))
            .await
    }

    async fn replace_game(&self, game: GameEntity, expected_version: u64) -> StorageResult<()> {
        let id = game.id;
        let doc_id = game_doc_id(id);
        let existing = self
            .get_document::<GameEntity>(&doc_id)
            .await?
            .ok_or(StorageError::Conflict { id })?;
        if existing.body.version != expected_version {
            return Err(StorageError::Conflict { id });
        }

        conflict_as_storage(
            id,
            self.put_document(&CouchDocument::new(doc_id, existing.rev, game))
                .await,
        )
    }
}

fn conflict_as_storage(id: Uuid, result: CouchResult<()>) -> StorageResult<()> {
    match result {
        Err(CouchDaoError::RevisionConflict { .. }) => Err(StorageError::Conflict { id }),
        other => other.map_err(Into::into),
    }
}

impl GameStore for CouchGameStore {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let maybe_doc = store.get_document::<GameEntity>(&game_doc_id(id)).await?;
            Ok(maybe_doc.map(|doc| doc.body))
        })
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = game.id;
            let doc = CouchDocument::new(game_doc_id(id), None, game);
            conflict_as_storage(id, store.put_document(&doc).await)
        })
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
            let maybe_doc = store
                .get_document::<QuestionEntity>(&question_doc_id(id))
                .await?;
            Ok(maybe_doc.map(|doc| doc.body))
        })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert(question_doc_id(question.id), question)
                .await
                .map_err(Into::into)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let maybe_doc = store.get_document::<UserEntity>(&user_doc_id(id)).await?;
            Ok(maybe_doc.map(|doc| doc.body))
        })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert(user_doc_id(user.id), user)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
