use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Pong arena backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::match_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::CreateRoomRequest,
            crate::dto::ws::JoinRoomRequest,
            crate::dto::ws::JoinTournamentMatchRequest,
            crate::dto::ws::InputRequest,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::MatchFinishedEvent,
            crate::dto::sse::MatchPlayer,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "game", description = "WebSocket protocol for Pong players"),
    )
)]
pub struct ApiDoc;
