use axum::{Router, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{error::AppError, state::SharedState};

/// Swagger UI.
pub mod docs;
/// Game building, participation and lifecycle routes.
pub mod game;
/// Health check route.
pub mod health;
/// Routes acting on the current question.
pub mod play;
/// Question bank routes.
pub mod questions;
/// Game event streams.
pub mod sse;

/// Header carrying the identity of the caller, trusted as-is.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity read from the `X-User-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Uuid);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing X-User-Id header".into()))?;
        let value = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized("X-User-Id is not valid text".into()))?;
        Uuid::parse_str(value.trim())
            .map(Actor)
            .map_err(|_| AppError::Unauthorized("X-User-Id must be a UUID".into()))
    }
}

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(game::router())
        .merge(play::router())
        .merge(questions::router())
        .merge(docs::router());

    api_router.with_state(state)
}
