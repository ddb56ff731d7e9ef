/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Hand-off of finished matches to persistence and notifications.
pub mod match_reporter;
/// Per-connection protocol state machine.
pub mod session;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Match store connection supervisor and degraded mode tracking.
pub mod storage_supervisor;
/// Fixed-rate room simulation loop.
pub mod tick;
/// Tournament service result webhook.
#[cfg(feature = "tournament-webhook")]
pub mod tournament_notifier;
/// WebSocket connection and message handling service.
pub mod websocket_service;
