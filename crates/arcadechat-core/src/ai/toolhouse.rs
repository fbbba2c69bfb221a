use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;

use super::{AgentRequest, AgentResponse, AgentTransport};
use crate::error::TransportError;

pub const DEFAULT_AGENT_URL: &str =
    "https://agents.toolhouse.ai/4bf3221e-da92-42c9-89cd-ffc336220428";

/// Response header carrying the server-assigned run id.
pub const RUN_ID_HEADER: &str = "X-Toolhouse-Run-ID";

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

/// HTTP client for a single Toolhouse agent endpoint.
#[derive(Clone)]
pub struct ToolhouseClient {
    client: Client,
    base_url: String,
}

impl ToolhouseClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AgentTransport for ToolhouseClient {
    async fn open(&self, request: &AgentRequest) -> Result<AgentResponse, TransportError> {
        let url = request.url(&self.base_url);
        let method = request.method();
        tracing::debug!(%method, %url, "sending message to agent");

        let response = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json")
            .json(&MessageBody {
                message: &request.message,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
            });
        }

        let run_id = response
            .headers()
            .get(RUN_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())))
            .boxed();

        Ok(AgentResponse {
            run_id,
            body: Some(body),
        })
    }
}
