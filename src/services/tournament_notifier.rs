//! Pushes decisive tournament results to the tournament service so it can
//! advance the bracket.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::{config::TournamentWebhookSettings, state::simulation::Slot};

/// Failures while reporting a result to the tournament service.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build tournament webhook client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or timed out.
    #[error("failed to send tournament result to `{url}`")]
    RequestSend {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The tournament service answered with a non-success status.
    #[error("tournament service answered {status} for `{url}`")]
    RequestStatus { url: String, status: StatusCode },
}

/// Bracket side letters used by the tournament service: slot 0 is `A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BracketSide {
    /// Slot 0.
    A,
    /// Slot 1.
    B,
}

impl From<Slot> for BracketSide {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Left => BracketSide::A,
            Slot::Right => BracketSide::B,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchResultBody {
    winner: BracketSide,
    score_a: u32,
    score_b: u32,
}

/// HTTP client for the tournament service's result endpoint.
#[derive(Clone)]
pub struct TournamentNotifier {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl TournamentNotifier {
    /// Build a client honouring the configured timeout.
    pub fn new(settings: &TournamentWebhookSettings) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|source| NotifyError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(settings.base_url.trim_end_matches('/')),
            token: settings.token.as_deref().map(Arc::from),
        })
    }

    /// POST the final score of a bracket match.
    pub async fn submit_result(
        &self,
        tournament_id: i64,
        match_id: &str,
        winner: Slot,
        scores: [u32; 2],
    ) -> Result<(), NotifyError> {
        let url = self.result_url(tournament_id, match_id);
        let body = MatchResultBody {
            winner: winner.into(),
            score_a: scores[0],
            score_b: scores[1],
        };

        let mut builder = self.client.post(&url).json(&body);
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| NotifyError::RequestSend {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::RequestStatus { url, status })
        }
    }

    fn result_url(&self, tournament_id: i64, match_id: &str) -> String {
        format!(
            "{}/api/tournaments/{tournament_id}/matches/{match_id}/result",
            self.base_url
        )
    }
}
