//! Backend abstraction for chat sessions

use async_trait::async_trait;
use knovera_ai::{
    ApiClient, Conversation, ConversationStats, GenerateOptions, GenerateResult, Message, Result,
    UserIdentity,
};
use tokio_util::sync::CancellationToken;

/// Everything a chat session needs from the server.
///
/// Implemented for [`ApiClient`]; tests plug in scripted fakes.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Generate a reply. `on_chunk` gets the full reply text so far.
    async fn send(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
        user: &UserIdentity,
        options: &GenerateOptions,
        cancel: CancellationToken,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<GenerateResult>;

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    async fn stats(&self, conversation_id: &str) -> Result<ConversationStats>;

    async fn conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;

    async fn delete(&self, conversation_id: &str, owner: &UserIdentity) -> Result<()>;
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn send(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
        user: &UserIdentity,
        options: &GenerateOptions,
        cancel: CancellationToken,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<GenerateResult> {
        self.send_message(prompt, conversation_id, user, options, cancel, on_chunk)
            .await
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        ApiClient::messages(self, conversation_id).await
    }

    async fn stats(&self, conversation_id: &str) -> Result<ConversationStats> {
        ApiClient::stats(self, conversation_id).await
    }

    async fn conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        ApiClient::conversations(self, user_id).await
    }

    async fn delete(&self, conversation_id: &str, owner: &UserIdentity) -> Result<()> {
        self.delete_conversation(conversation_id, owner).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatConfig, ChatSession, Error};
    use knovera_ai::SessionContext;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_api_client_drives_chat_session() {
        // Nothing listens on the discard port; the request is rejected before it is sent.
        let client = Arc::new(ApiClient::new("http://127.0.0.1:9", SessionContext::new()));
        let mut chat = ChatSession::new(ChatConfig::new(UserIdentity::teacher("")), client);

        let err = chat.send("hi").await.unwrap_err();
        assert!(matches!(err, Error::Ai(knovera_ai::Error::MissingUserId)));
        assert_eq!(chat.state().messages.len(), 2);
        assert!(chat.state().error.is_some());
    }

    #[tokio::test]
    async fn test_api_client_forwards_chunk_callback() {
        let client = ApiClient::new("http://127.0.0.1:9", SessionContext::new());
        let mut seen = Vec::new();
        let mut on_chunk = |full: &str| seen.push(full.to_string());
        let result = ChatBackend::send(
            &client,
            "hi",
            None,
            &UserIdentity::student(""),
            &GenerateOptions::default(),
            CancellationToken::new(),
            &mut on_chunk,
        )
        .await;
        assert!(matches!(result, Err(knovera_ai::Error::MissingUserId)));
        assert!(seen.is_empty());
    }
}
