//! Sending a user message and recording the reply
//!
//! The controller is either `Idle` or `Sending`. While `Sending`, exactly one
//! request is in flight on the tokio runtime and further sends are ignored.
//! Failures never leave the controller: they become an assistant message in
//! the conversation the request was issued for. A failed save keeps the
//! messages in memory and is held until the caller takes it with
//! `take_save_error`.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::ai::CompletionService;
use crate::error::{ExchangeError, StoreError};
use crate::repository::ConversationRepository;
use crate::state::{ChatMessage, ConversationId};
use crate::store::ConversationStore;

/// Assistant text used when the service replied without any text
pub const NO_REPLY_TEXT: &str = "No explanation found.";

/// Assistant text used when the service could not be reached or understood
pub const SERVICE_ERROR_TEXT: &str = "⚠️ Error: Could not connect to Gemini API.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStatus {
    Idle,
    Sending,
}

type Reply = Result<Option<String>, ExchangeError>;

struct InFlight {
    conversation: ConversationId,
    task: JoinHandle<Reply>,
}

pub struct ExchangeController<S> {
    service: Arc<S>,
    in_flight: Option<InFlight>,
    save_error: Option<StoreError>,
}

impl<S: CompletionService + 'static> ExchangeController<S> {
    pub fn new(service: S) -> Self {
        Self::with_shared(Arc::new(service))
    }

    pub fn with_shared(service: Arc<S>) -> Self {
        Self {
            service,
            in_flight: None,
            save_error: None,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Swap the completion service. Takes effect for the next send.
    pub fn set_service(&mut self, service: S) {
        self.service = Arc::new(service);
    }

    pub fn status(&self) -> ExchangeStatus {
        if self.in_flight.is_some() {
            ExchangeStatus::Sending
        } else {
            ExchangeStatus::Idle
        }
    }

    pub fn is_sending(&self) -> bool {
        self.status() == ExchangeStatus::Sending
    }

    /// Most recent save failure from a send or a reply, if not yet taken
    pub fn take_save_error(&mut self) -> Option<StoreError> {
        self.save_error.take()
    }

    /// Conversation the in-flight request will reply into
    pub fn pending_conversation(&self) -> Option<&ConversationId> {
        self.in_flight.as_ref().map(|f| &f.conversation)
    }

    /// Record the user message and start the service call without waiting.
    ///
    /// Blank text, or a send while another is in flight, is ignored and
    /// returns `None`. Otherwise returns the conversation the message went to,
    /// creating one when nothing is active.
    pub fn begin_send<R: ConversationRepository>(
        &mut self,
        store: &mut ConversationStore<R>,
        text: &str,
    ) -> Option<ConversationId> {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.is_sending() {
            return None;
        }

        let active = store.active_id().cloned();
        let conversation = match store.append_messages(active.as_ref(), vec![ChatMessage::user(trimmed)]) {
            Ok(id) => id,
            // The message is in memory even though it was not saved
            Err(e @ StoreError::Persistence(_)) => {
                self.save_error = Some(e);
                store.active_id().cloned()?
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not record user message");
                return None;
            }
        };

        let service = Arc::clone(&self.service);
        let prompt = text.to_string();
        let task = tokio::spawn(async move { service.complete(&prompt).await });

        tracing::info!(conversation = %conversation, "sending message");
        self.in_flight = Some(InFlight {
            conversation: conversation.clone(),
            task,
        });
        Some(conversation)
    }

    /// Record the reply if the in-flight request has finished.
    ///
    /// Returns `true` when a reply was recorded and the controller is idle
    /// again.
    pub async fn poll_reply<R: ConversationRepository>(&mut self, store: &mut ConversationStore<R>) -> bool {
        let finished = self
            .in_flight
            .as_ref()
            .map(|f| f.task.is_finished())
            .unwrap_or(false);
        if !finished {
            return false;
        }

        self.wait_reply(store).await
    }

    /// Wait for the in-flight request, if any, and record its reply.
    pub async fn wait_reply<R: ConversationRepository>(&mut self, store: &mut ConversationStore<R>) -> bool {
        // Taking the request is what returns the controller to Idle, whatever
        // the outcome below.
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };

        let reply = in_flight.task.await.unwrap_or_else(|e| {
            Err(ExchangeError::ServiceUnavailable(format!("request task failed: {}", e)))
        });
        let content = reply_text(reply);

        match store.append_messages(Some(&in_flight.conversation), vec![ChatMessage::assistant(content)]) {
            Ok(_) => {}
            Err(e @ StoreError::Persistence(_)) => self.save_error = Some(e),
            Err(StoreError::NotFound(id)) => {
                tracing::warn!(conversation = %id, "conversation deleted before reply arrived, dropping reply");
            }
        }
        true
    }

    /// Send `text` and wait for the reply.
    pub async fn send<R: ConversationRepository>(
        &mut self,
        store: &mut ConversationStore<R>,
        text: &str,
    ) -> Option<ConversationId> {
        let conversation = self.begin_send(store, text)?;
        self.wait_reply(store).await;
        Some(conversation)
    }
}

/// Text of the assistant message recorded for a reply
fn reply_text(reply: Reply) -> String {
    match reply {
        Ok(Some(text)) => text,
        Ok(None) => {
            tracing::warn!("reply carried no text");
            NO_REPLY_TEXT.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "completion request failed");
            SERVICE_ERROR_TEXT.to_string()
        }
    }
}
