use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const GAME_PREFIX: &str = "game::";
pub const QUESTION_PREFIX: &str = "question::";
pub const USER_PREFIX: &str = "user::";

/// Envelope adding CouchDB's identity and revision to a stored entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> CouchDocument<T> {
    pub fn new(id: String, rev: Option<String>, body: T) -> Self {
        Self { id, rev, body }
    }
}

pub fn game_doc_id(id: Uuid) -> String {
    format!("{}{}", GAME_PREFIX, id)
}

pub fn question_doc_id(id: Uuid) -> String {
    format!("{}{}", QUESTION_PREFIX, id)
}

pub fn user_doc_id(id: Uuid) -> String {
    format!("{}{}", USER_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::UserEntity;

    #[test]
    fn envelope_flattens_the_entity_and_omits_a_missing_revision() {
        let user = UserEntity {
            id: Uuid::nil(),
            name: "Ada".into(),
            avatar: None,
        };
        let doc = CouchDocument::new(user_doc_id(user.id), None, user.clone());

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["_id"], format!("user::{}", Uuid::nil()));
        assert_eq!(value["name"], "Ada");
        assert!(value.get("_rev").is_none());

        let back: CouchDocument<UserEntity> = serde_json::from_value(value).unwrap();
        assert_eq!(back.body, user);
    }
}
