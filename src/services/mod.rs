/// OpenAPI documentation generation.
pub mod documentation;
/// Game creation, participation and organizer transitions.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Buzzes, answers, clues and question expiry.
pub mod play_service;
/// Reusable question bank.
pub mod question_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming per game.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
