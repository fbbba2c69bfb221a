//! Conversation session: run-id threading plus the message log.

use crate::ai::{AgentRequest, AgentTransport};
use crate::error::TransportError;
use crate::extract::Extractor;
use crate::state::{ChatMessage, Conversation};
use crate::stream::{accumulate, StreamAccumulator};

/// One conversation with one agent endpoint.
///
/// Holds the server-assigned run id, if any. Without one the next message
/// starts a new run; with one it continues that run.
pub struct Session<T> {
    transport: T,
    extractor: Extractor,
    run_id: Option<String>,
    conversation: Conversation,
}

impl<T: AgentTransport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self::with_extractor(transport, Extractor::default())
    }

    pub fn with_extractor(transport: T, extractor: Extractor) -> Self {
        Self {
            transport,
            extractor,
            run_id: None,
            conversation: Conversation::new(),
        }
    }

    /// Send one user message and stream the reply into the log.
    ///
    /// `on_update` sees the user message, then every state of the assistant
    /// reply in order. Failures never escape: they become a single assistant
    /// error message and leave the run id as it was.
    pub async fn send<F>(&mut self, text: &str, mut on_update: F)
    where
        F: FnMut(&ChatMessage) + Send,
    {
        let user = ChatMessage::user(text);
        self.conversation.upsert(user.clone());
        on_update(&user);

        let placeholder = ChatMessage::assistant_placeholder();
        let reply_id = placeholder.id.clone();

        if let Err(err) = self.exchange(text, placeholder, &mut on_update).await {
            tracing::warn!(error = %err, run_id = ?self.run_id, "agent exchange failed");
            let reply = ChatMessage::assistant_error(&reply_id, &err.to_string());
            self.conversation.upsert(reply.clone());
            on_update(&reply);
        }
    }

    async fn exchange<F>(
        &mut self,
        text: &str,
        placeholder: ChatMessage,
        on_update: &mut F,
    ) -> Result<(), TransportError>
    where
        F: FnMut(&ChatMessage) + Send,
    {
        let request = AgentRequest::new(self.run_id.as_deref(), text);
        let response = self.transport.open(&request).await?;

        if let Some(run_id) = response.run_id {
            if self.run_id.as_deref() != Some(run_id.as_str()) {
                tracing::info!(%run_id, "agent run id updated");
            }
            self.run_id = Some(run_id);
        }

        let body = response.body.ok_or(TransportError::MissingBody)?;

        self.conversation.upsert(placeholder.clone());
        on_update(&placeholder);

        let mut accumulator = StreamAccumulator::new(&placeholder.id, self.extractor.clone());
        let conversation = &mut self.conversation;
        accumulate(body, &mut accumulator, |update| {
            let reply = ChatMessage {
                content: update.text,
                structured: update.structured,
                ..placeholder.clone()
            };
            conversation.upsert(reply.clone());
            on_update(&reply);
        })
        .await
    }

    /// Forget the run and the messages; the next send starts a new run.
    pub fn reset(&mut self) {
        self.run_id = None;
        self.conversation.clear();
    }

    /// Show a previously saved chat. The agent run is not resumed.
    pub fn restore(&mut self, messages: Vec<ChatMessage>) {
        self.run_id = None;
        self.conversation = Conversation::from_messages(messages);
    }

    /// Continue a run whose id is already known, e.g. from the command line.
    pub fn resume(&mut self, run_id: &str) {
        self.run_id = Some(run_id.to_string());
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn has_run_id(&self) -> bool {
        self.run_id.is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
