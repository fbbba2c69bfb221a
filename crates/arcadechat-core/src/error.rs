use thiserror::Error;

/// Failures talking to the agent endpoint.
///
/// Every variant is terminal for the current exchange only; the session
/// turns it into an assistant message and stays usable.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, TLS...).
    #[error("{0}")]
    Request(String),

    /// The agent answered with a non-success status.
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },

    /// The response carried no readable body.
    #[error("No response body")]
    MissingBody,

    /// Reading a chunk of the body failed mid-stream.
    #[error("{0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
            };
        }
        if err.is_body() || err.is_decode() {
            return Self::Body(err.to_string());
        }
        Self::Request(err.to_string())
    }
}

/// Failures reading or writing the local history and leaderboard files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not determine {0} directory")]
    NoDataDir(&'static str),
}
