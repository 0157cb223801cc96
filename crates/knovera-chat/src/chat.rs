//! Chat session: owns the visible transcript and drives each exchange

use std::sync::Arc;

use knovera_ai::{
    Conversation, Embedding, GenerateOptions, GenerateResult, Message, UserIdentity,
};
use tokio::sync::broadcast;

use crate::{
    backend::ChatBackend,
    conversation::{ChatState, EmbeddingView},
    error::{Error, Result},
    events::ChatEvent,
    handle::ChatHandle,
};

/// Chat session configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Who is chatting
    pub user: UserIdentity,
    /// Generation parameters sent with every prompt
    pub options: GenerateOptions,
}

impl ChatConfig {
    pub fn new(user: UserIdentity) -> Self {
        Self {
            user,
            options: GenerateOptions::default(),
        }
    }
}

/// A chat session bound to one user
pub struct ChatSession {
    config: ChatConfig,
    state: ChatState,
    backend: Arc<dyn ChatBackend>,
    event_tx: broadcast::Sender<ChatEvent>,
    handle: ChatHandle,
}

impl ChatSession {
    /// Create a new session with an empty transcript
    pub fn new(config: ChatConfig, backend: Arc<dyn ChatBackend>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            state: ChatState::default(),
            backend,
            event_tx,
            handle: ChatHandle::new(),
        }
    }

    /// Subscribe to chat events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Get the current state
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Get the session config
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Get a cloneable handle for aborting from another task
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    /// Flip web search for later prompts; returns the new setting
    pub fn toggle_web_search(&mut self) -> bool {
        self.config.options.web_search = !self.config.options.web_search;
        self.config.options.web_search
    }

    /// Leave the open conversation; the next prompt starts a new one
    pub fn new_conversation(&mut self) {
        self.state.reset();
    }

    /// Open an existing conversation, replacing the transcript
    pub async fn open(&mut self, conversation_id: &str) -> Result<()> {
        if conversation_id.is_empty() {
            return Err(Error::NoConversation);
        }
        let messages = self.backend.messages(conversation_id).await?;
        tracing::debug!(
            "Opened conversation {} ({} messages)",
            conversation_id,
            messages.len()
        );
        self.state.reset();
        self.state.conversation_id = Some(conversation_id.to_string());
        self.state.messages = messages;
        self.refresh_stats().await;
        Ok(())
    }

    /// Reload stats of the open conversation. Failures are logged, not raised.
    pub async fn refresh_stats(&mut self) {
        let Some(id) = self.state.conversation_id.clone() else {
            return;
        };
        match self.backend.stats(&id).await {
            Ok(stats) => self.state.stats = Some(stats),
            Err(e) => tracing::warn!("Failed to load stats for {}: {}", id, e),
        }
    }

    /// The user's chat conversations, most recently active first
    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        let mut conversations = self.backend.conversations(&self.config.user.id).await?;
        conversations.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(conversations)
    }

    /// Delete a conversation; closes it if it is the open one
    pub async fn delete(&mut self, conversation_id: &str) -> Result<()> {
        self.backend
            .delete(conversation_id, &self.config.user)
            .await?;
        if self.state.conversation_id.as_deref() == Some(conversation_id) {
            self.state.reset();
        }
        Ok(())
    }

    /// Embedding of a transcript message next to its nearest predecessor
    pub fn embedding_view(&self, index: usize) -> Option<EmbeddingView> {
        self.state.embedding_view(index)
    }

    /// Send a prompt and stream the reply into the transcript.
    ///
    /// A user message and an assistant placeholder are appended first. The
    /// placeholder follows every chunk; on failure it keeps whatever text
    /// arrived and the error is recorded in the state.
    pub async fn send(&mut self, prompt: &str) -> Result<GenerateResult> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::EmptyPrompt);
        }
        if self.handle.is_running() {
            return Err(Error::Busy);
        }

        let cancel = self.handle.begin();
        let placeholder_id = uuid::Uuid::new_v4().to_string();
        self.state.messages.push(Message::user(prompt));
        self.state
            .messages
            .push(Message::assistant_placeholder(placeholder_id.clone()));
        let index = self.state.messages.len() - 1;
        self.state.is_streaming = true;
        self.state.error = None;
        let _ = self.event_tx.send(ChatEvent::ExchangeStart {
            placeholder_id: placeholder_id.clone(),
        });

        let previous_id = self.state.conversation_id.clone();
        let result = {
            let messages = &mut self.state.messages;
            let event_tx = &self.event_tx;
            let mut on_chunk = |full: &str| {
                if let Some(message) = messages.get_mut(index) {
                    message.content = full.to_string();
                }
                let _ = event_tx.send(ChatEvent::MessageUpdate {
                    id: placeholder_id.clone(),
                    content: full.to_string(),
                });
            };
            self.backend
                .send(
                    prompt,
                    previous_id.as_deref(),
                    &self.config.user,
                    &self.config.options,
                    cancel,
                    &mut on_chunk,
                )
                .await
        };

        self.state.is_streaming = false;
        self.handle.finish();

        let outcome = match result {
            Ok(result) => {
                if let Some(message) = self.state.messages.get_mut(index) {
                    let embedding = (!result.embedding.is_empty())
                        .then(|| Embedding::Vector(result.embedding.clone()));
                    message.complete(result.response.clone(), embedding);
                    let _ = self.event_tx.send(ChatEvent::MessageEnd {
                        message: message.clone(),
                    });
                }

                if !result.conversation_id.is_empty()
                    && previous_id.as_deref() != Some(result.conversation_id.as_str())
                {
                    self.state.conversation_id = Some(result.conversation_id.clone());
                    let _ = self.event_tx.send(ChatEvent::ConversationCreated {
                        conversation_id: result.conversation_id.clone(),
                    });
                }
                if self.state.conversation_id.is_some() {
                    self.refresh_stats().await;
                }
                Ok(result)
            }
            Err(e) => {
                let e = Error::from(e);
                if let (Some(partial), Some(message)) =
                    (e.partial_content(), self.state.messages.get_mut(index))
                {
                    message.content = partial.to_string();
                }
                tracing::warn!("Exchange failed: {}", e);
                self.state.error = Some(e.to_string());
                let _ = self.event_tx.send(ChatEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        };

        let _ = self.event_tx.send(ChatEvent::ExchangeEnd {
            conversation_id: self.state.conversation_id.clone(),
        });
        outcome
    }
}
