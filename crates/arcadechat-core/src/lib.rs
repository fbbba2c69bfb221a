pub mod ai;
pub mod config;
pub mod decode;
pub mod error;
pub mod extract;
pub mod history;
pub mod scores;
pub mod session;
pub mod state;
pub mod stream;

// Re-export main types for convenience
pub use ai::{AgentRequest, AgentResponse, AgentTransport, ToolhouseClient};
pub use config::Config;
pub use error::{StoreError, TransportError};
pub use extract::{extract, Extraction, Extractor};
pub use history::{HistoryStore, SessionSummary};
pub use scores::{Game, Leaderboard, LeaderboardEntry};
pub use session::Session;
pub use state::{ChatMessage, ChatRole, Conversation, StructuredPayload};
pub use stream::{StreamAccumulator, StreamUpdate};
