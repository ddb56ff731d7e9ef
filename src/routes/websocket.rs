use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use axum_valid::Valid;

use crate::{dto::ws::ConnectParams, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws/game",
    tag = "game",
    params(ConnectParams),
    responses(
        (status = 101, description = "Switching protocols to the game WebSocket"),
        (status = 400, description = "Invalid nickname or userId")
    )
)]
/// Upgrade the HTTP connection into a game session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Valid(Query(params)): Valid<Query<ConnectParams>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, params))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/game", get(ws_handler))
}
