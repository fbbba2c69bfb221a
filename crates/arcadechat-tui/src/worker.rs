//! Background task that owns the agent session.
//!
//! The UI never awaits the network itself: it queues commands here and gets
//! message upserts back through the app event channel. Commands run one at a
//! time, so a second send waits for the first stream to finish.

use arcadechat_core::{AgentTransport, ChatMessage, Session};
use tokio::sync::mpsc;

use crate::tui::AppEvent;

#[derive(Debug)]
pub enum SessionCommand {
    Send(String),
    Reset,
    Restore(Vec<ChatMessage>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Insert or replace a message by id.
    Upsert(ChatMessage),
    /// A send finished (successfully or not); carries the current run id.
    Finished { run_id: Option<String> },
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// A handle with its receiving end, for driving the app without a worker.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }

    pub fn send(&self, text: &str) {
        self.dispatch(SessionCommand::Send(text.to_string()));
    }

    pub fn reset(&self) {
        self.dispatch(SessionCommand::Reset);
    }

    pub fn restore(&self, messages: Vec<ChatMessage>) {
        self.dispatch(SessionCommand::Restore(messages));
    }

    fn dispatch(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            tracing::error!("session worker is gone; command dropped");
        }
    }
}

pub fn spawn<T>(mut session: Session<T>, events: mpsc::UnboundedSender<AppEvent>) -> SessionHandle
where
    T: AgentTransport + 'static,
{
    let (handle, mut commands) = SessionHandle::detached();

    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            match command {
                SessionCommand::Send(text) => {
                    let tx = events.clone();
                    session
                        .send(&text, |message| {
                            let _ = tx.send(AppEvent::Session(SessionEvent::Upsert(message.clone())));
                        })
                        .await;
                    let finished = SessionEvent::Finished {
                        run_id: session.run_id().map(str::to_string),
                    };
                    if events.send(AppEvent::Session(finished)).is_err() {
                        break;
                    }
                }
                SessionCommand::Reset => session.reset(),
                SessionCommand::Restore(messages) => session.restore(messages),
            }
        }
        tracing::debug!("session worker stopped");
    });

    handle
}
