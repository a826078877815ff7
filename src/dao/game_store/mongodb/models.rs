use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::GameEntity;

/// Game stored with its revision lifted to the top level so writes can filter on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    version: i64,
    game: GameEntity,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(game: GameEntity) -> Self {
        Self {
            id: game.id.to_string(),
            version: version_as_i64(game.version),
            game,
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        value.game
    }
}

/// Last-write-wins document for questions and users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDocument<T> {
    #[serde(rename = "_id")]
    id: String,
    entity: T,
}

impl<T> MongoDocument<T> {
    pub fn new(id: Uuid, entity: T) -> Self {
        Self {
            id: id.to_string(),
            entity,
        }
    }

    pub fn into_entity(self) -> T {
        self.entity
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

pub fn versioned_doc_id(id: Uuid, version: u64) -> Document {
    doc! { "_id": id.to_string(), "version": version_as_i64(version) }
}

// BSON has no unsigned 64-bit integer.
fn version_as_i64(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}
