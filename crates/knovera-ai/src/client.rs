//! HTTP client for the generation backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    identity::{ConversationSource, resolve_conversation_id},
    session::SessionContext,
    stream::{StreamItems, decode_events},
    transcript::{Exchange, accumulate},
    types::{
        Ack, Conversation, ConversationStats, Embedding, Envelope, GenerateOptions,
        GenerateRequest, GenerateResult, HealthStatus, Message, UserIdentity,
    },
};

/// Default backend root
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001/api/ai";

/// Number of conversations requested by list queries
pub const DEFAULT_CONVERSATION_LIMIT: u32 = 50;

/// Client for the generation and conversation endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    session: SessionContext,
    conversation_limit: u32,
}

impl ApiClient {
    /// Create a client with default transport settings
    pub fn new(base_url: impl Into<String>, session: SessionContext) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, session)
    }

    /// Create a client with an optional connect timeout
    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        session: SessionContext,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, base_url, session))
    }

    /// Create a client around an existing reqwest client
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        session: SessionContext,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            conversation_limit: DEFAULT_CONVERSATION_LIMIT,
        }
    }

    /// Set how many conversations list queries ask for
    pub fn with_conversation_limit(mut self, limit: u32) -> Self {
        self.conversation_limit = limit;
        self
    }

    /// The session this client authenticates with
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Backend root URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.authorization() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => Err(Error::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(Error::Json(e)),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);
        let response = self
            .authorized(self.client.get(&url).query(query))
            .send()
            .await?;
        Self::read_envelope(response).await
    }

    /// Open a generation stream.
    ///
    /// Fails only if the request cannot be sent or the server rejects it;
    /// everything after that is reported through the returned items.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<StreamItems> {
        let url = self.url("/generate");
        tracing::debug!("POST {} (conversation: {:?})", url, request.conversation_id);

        let response = self
            .authorized(self.client.post(&url))
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_events(response.bytes_stream(), cancel))
    }

    /// Send a prompt and stream the reply.
    ///
    /// `on_chunk` gets the full reply text so far after every chunk. The
    /// returned conversation id is empty when it could not be determined.
    pub async fn send_message<F>(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
        user: &UserIdentity,
        options: &GenerateOptions,
        cancel: CancellationToken,
        on_chunk: F,
    ) -> Result<GenerateResult>
    where
        F: FnMut(&str) + Send,
    {
        let request = GenerateRequest::new(prompt, conversation_id, user, options)?;
        let items = self.generate(&request, cancel).await?;
        let exchange = accumulate(items, on_chunk).await?;
        Ok(finish_exchange(exchange, &request, self).await)
    }

    /// Chat conversations for a user, as returned by the server
    pub async fn conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        if user_id.is_empty() {
            return Err(Error::MissingUserId);
        }
        let limit = self.conversation_limit.to_string();
        self.get(
            "/conversations",
            &[
                ("userId", user_id),
                ("sessionType", "chat"),
                ("limit", limit.as_str()),
            ],
        )
        .await
    }

    /// A single conversation
    pub async fn conversation(&self, id: &str) -> Result<Conversation> {
        self.get(&format!("/conversations/{}", id), &[]).await
    }

    /// Messages of a conversation, oldest first
    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.get(&format!("/conversations/{}/messages", conversation_id), &[])
            .await
    }

    /// Usage statistics of a conversation
    pub async fn stats(&self, conversation_id: &str) -> Result<ConversationStats> {
        self.get(&format!("/conversations/{}/stats", conversation_id), &[])
            .await
    }

    /// Delete a conversation owned by `owner`
    pub async fn delete_conversation(&self, id: &str, owner: &UserIdentity) -> Result<Ack> {
        let url = self.url(&format!("/conversations/{}", id));
        tracing::debug!("DELETE {}", url);
        let response = self
            .authorized(
                self.client
                    .delete(&url)
                    .query(&[(owner.role.id_field(), owner.id.as_str())]),
            )
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let ack: Ack = match serde_json::from_str(&body) {
            Ok(ack) => ack,
            Err(_) if !status.is_success() => {
                return Err(Error::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(e) => return Err(Error::Json(e)),
        };
        if !ack.success {
            return Err(Error::api(
                ack.message
                    .unwrap_or_else(|| "Failed to delete conversation".to_string()),
            ));
        }
        Ok(ack)
    }

    /// Backend health
    pub async fn health(&self) -> Result<HealthStatus> {
        self.get("/health", &[]).await
    }
}

/// Turn a finished exchange into the caller-facing result.
///
/// The reply text is the accumulated chunks, or the `done` event's nested
/// response when no chunk arrived. The conversation id is resolved through
/// `source` and is empty when it could not be determined.
pub async fn finish_exchange(
    exchange: Exchange,
    request: &GenerateRequest,
    source: &dyn ConversationSource,
) -> GenerateResult {
    if !exchange.malformed.is_empty() {
        tracing::warn!("Skipped {} malformed stream lines", exchange.malformed.len());
    }

    let done = exchange.done.unwrap_or_default();
    let resolution = resolve_conversation_id(
        done.conversation_id(),
        request.conversation_id.as_deref(),
        &request.user_id,
        source,
    )
    .await;
    if resolution.used_fallback() {
        tracing::debug!("Conversation id not reported, recency fallback: {:?}", resolution);
    }

    let response = if exchange.content.is_empty() {
        done.data
            .as_ref()
            .and_then(|d| d.response.clone())
            .unwrap_or_default()
    } else {
        exchange.content
    };

    GenerateResult {
        response,
        conversation_id: resolution.into_id(),
        embedding: done
            .embedding()
            .and_then(Embedding::to_vector)
            .unwrap_or_default(),
        formatted: done.formatted,
    }
}

#[async_trait]
impl ConversationSource for ApiClient {
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.conversations(user_id).await
    }
}
