//! Wire contract with the remote agent.

pub mod toolhouse;

pub use toolhouse::{ToolhouseClient, DEFAULT_AGENT_URL, RUN_ID_HEADER};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use reqwest::Method;

use crate::error::TransportError;

/// Streamed response body, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// One user turn addressed to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub run_id: Option<String>,
    pub message: String,
}

impl AgentRequest {
    pub fn new(run_id: Option<&str>, message: &str) -> Self {
        Self {
            run_id: run_id.map(str::to_string),
            message: message.to_string(),
        }
    }

    /// POST starts a run, PUT continues one.
    pub fn method(&self) -> Method {
        match self.run_id {
            Some(_) => Method::PUT,
            None => Method::POST,
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match &self.run_id {
            Some(run_id) => format!("{base}/{run_id}"),
            None => base.to_string(),
        }
    }
}

pub struct AgentResponse {
    /// Value of the run-id header, when the agent sent one.
    pub run_id: Option<String>,
    pub body: Option<ByteStream>,
}

/// Opens a streamed exchange with the agent.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn open(&self, request: &AgentRequest) -> Result<AgentResponse, TransportError>;
}
