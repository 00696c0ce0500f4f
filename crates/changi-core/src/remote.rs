//! The answering service.
//!
//! [`Answerer`] is the seam the send cycle talks to; [`HttpAnswerer`] is the
//! real client that posts `{query, history}` as JSON and reads back `answer`.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::ChatRequest;

pub const DEFAULT_ENDPOINT: &str = "https://changi-bot.onrender.com/chat";

/// Why a send cycle failed. `Display` is the text shown in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Server responded with status {status}.")]
    RemoteRejected { status: u16 },

    #[error("No response from server. Is it running at {endpoint}?")]
    RemoteUnreachable { endpoint: String },

    #[error("Could not send request. {detail}.")]
    RequestConstructionFailed { detail: String },

    #[error("An unexpected error occurred. Please try again.")]
    Unclassified,
}

impl SendError {
    pub fn construction(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        SendError::RequestConstructionFailed {
            detail: detail.trim_end_matches('.').to_string(),
        }
    }
}

#[async_trait]
pub trait Answerer: Send + Sync {
    /// One request, one attempt.
    async fn answer(&self, request: &ChatRequest) -> Result<String, SendError>;
}

#[derive(Deserialize)]
struct AnswerBody {
    answer: Option<String>,
}

#[derive(Clone)]
pub struct HttpAnswerer {
    client: Client,
    endpoint: String,
}

impl HttpAnswerer {
    /// No timeout is configured; transport defaults apply.
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `GET /health` next to the chat endpoint.
    pub async fn health(&self) -> Result<(), SendError> {
        let url = Url::parse(&self.endpoint)
            .and_then(|base| base.join("health"))
            .map_err(|e| SendError::construction(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(SendError::RemoteRejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    fn classify(&self, err: reqwest::Error) -> SendError {
        if err.is_builder() {
            SendError::construction(err.to_string())
        } else if err.is_connect() || err.is_timeout() || err.is_request() {
            debug!(error = %err, "no response from answering service");
            SendError::RemoteUnreachable {
                endpoint: self.endpoint.clone(),
            }
        } else {
            warn!(error = %err, "unclassified transport error");
            SendError::Unclassified
        }
    }
}

#[async_trait]
impl Answerer for HttpAnswerer {
    async fn answer(&self, request: &ChatRequest) -> Result<String, SendError> {
        debug!(
            endpoint = %self.endpoint,
            history = request.history.len(),
            "posting query"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::RemoteRejected {
                status: status.as_u16(),
            });
        }

        let body: AnswerBody = response.json().await.map_err(|e| {
            warn!(error = %e, "answer body could not be decoded");
            SendError::Unclassified
        })?;

        body.answer.ok_or_else(|| {
            warn!("success response without an answer field");
            SendError::Unclassified
        })
    }
}
