//! Chat session driver: one request/response cycle per submission.
//!
//! `submit` renders the user message, posts it, and streams the reply into
//! a single in-progress assistant message. Every failure ends up in the
//! transcript as an `Error: ...` message; the send control is restored on
//! every path.

use futures_util::StreamExt;

use crate::client::{Client, ClientError};
use crate::messages::{ChatRequest, StreamRecord};
use crate::view::{ChatView, MessageId, Role};

/// Where a session is in its request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Streaming,
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty or whitespace-only input; nothing happened.
    Ignored,
    /// A previous submission never finished (its future was dropped).
    Busy,
    /// The stream ran to its end. `text` is the full assistant reply.
    Completed { text: String },
    /// Non-2xx response; `detail` is the server's message or the fallback.
    RequestFailed { detail: String },
    /// The stream carried an `error` record.
    StreamFailed { error: String },
    /// Transport, decoding or any other unexpected failure.
    Failed { message: String },
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Completed { .. })
    }
}

/// Drives submissions against one server into one view.
pub struct ChatSession<V: ChatView> {
    client: Client,
    view: V,
    model: Option<String>,
    state: SessionState,
    last_outcome: Option<SubmitOutcome>,
}

impl<V: ChatView> ChatSession<V> {
    pub fn new(client: Client, view: V) -> Self {
        Self {
            client,
            view,
            model: None,
            state: SessionState::Idle,
            last_outcome: None,
        }
    }

    /// Send `model` with every request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// How the most recent submission that reached the server ended.
    pub fn last_outcome(&self) -> Option<&SubmitOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    /// Return to `Idle` after an abandoned submission and re-enable sending.
    pub fn reset(&mut self) {
        if self.state != SessionState::Idle {
            self.state = SessionState::Idle;
            self.view.set_send_enabled(true);
        }
    }

    /// Submit one user message and stream the reply into the view.
    pub async fn submit(&mut self, user_text: &str) -> SubmitOutcome {
        let message = user_text.trim();
        if message.is_empty() {
            return SubmitOutcome::Ignored;
        }
        if self.state != SessionState::Idle {
            tracing::debug!(state = ?self.state, "submission rejected while busy");
            return SubmitOutcome::Busy;
        }

        self.view.render(Role::User, message);
        self.view.clear_input();
        self.view.set_send_enabled(false);
        self.state = SessionState::Sending;

        let outcome = match self.exchange(message).await {
            Ok(outcome) => outcome,
            Err(ClientError::Http { status, detail }) => {
                tracing::error!(%status, %detail, "chat request failed");
                self.view.render(Role::Error, &format!("Error: {detail}"));
                SubmitOutcome::RequestFailed { detail }
            }
            Err(e) => {
                tracing::error!(error = %e, "chat error");
                let message = e.to_string();
                self.view.render(Role::Error, &format!("Error: {message}"));
                SubmitOutcome::Failed { message }
            }
        };

        self.view.set_send_enabled(true);
        self.state = SessionState::Idle;
        self.last_outcome = Some(outcome.clone());
        outcome
    }

    async fn exchange(&mut self, message: &str) -> Result<SubmitOutcome, ClientError> {
        let request = ChatRequest::new(message, self.model.as_deref());
        let response = self.client.chat(&request).await?;

        self.state = SessionState::Streaming;
        let in_progress: MessageId = self.view.render(Role::Assistant, "");
        let mut reply = String::new();

        let records = response.records();
        let mut records = std::pin::pin!(records);
        while let Some(record) = records.next().await {
            match record? {
                StreamRecord::Error(error) => {
                    tracing::warn!(%error, "stream reported an error");
                    self.view.replace(in_progress, &format!("Error: {error}"));
                    return Ok(SubmitOutcome::StreamFailed { error });
                }
                StreamRecord::Content(delta) => {
                    reply.push_str(&delta);
                    self.view.replace(in_progress, &reply);
                }
                StreamRecord::Status(status) => self.view.status(&status),
                StreamRecord::Empty => {}
            }
        }

        tracing::info!(chars = reply.chars().count(), "chat reply complete");
        Ok(SubmitOutcome::Completed { text: reply })
    }
}
