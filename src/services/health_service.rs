use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness, probing the match store so outages show up in the logs.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.match_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "match store health check failed");
            }
        }
        None => warn!("match store unavailable (degraded mode)"),
    }

    let rooms = state.rooms().len();
    if state.is_degraded() {
        HealthResponse::degraded(rooms)
    } else {
        HealthResponse::ok(rooms)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::match_store::memory::MemoryMatchStore,
        services::match_reporter, state::AppState,
    };

    #[tokio::test]
    async fn status_follows_store_installation() {
        let (reporter, _reports) = match_reporter::channel();
        let state = AppState::new(AppConfig::default(), reporter);
        state.rooms().create_room();

        let response = health_status(&state).await;
        assert_eq!(response.status, "degraded");
        assert_eq!(response.rooms, 1);

        state
            .set_match_store(Arc::new(MemoryMatchStore::default()))
            .await;
        assert_eq!(health_status(&state).await.status, "ok");
    }
}
