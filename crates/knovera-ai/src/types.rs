//! Core types shared by the generation client and the chat runtime

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// An embedding as the backend stores it: either a numeric array or a
/// JSON-encoded string of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedding {
    Vector(Vec<f64>),
    Encoded(String),
}

impl Embedding {
    /// Decode into a numeric vector. Encoded strings that are not a JSON
    /// array of numbers yield `None`.
    pub fn to_vector(&self) -> Option<Vec<f64>> {
        match self {
            Embedding::Vector(values) => Some(values.clone()),
            Embedding::Encoded(raw) => serde_json::from_str(raw).ok(),
        }
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Embedding::Vector(values)
    }
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_docs: Option<Vec<serde_json::Value>>,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            content: text.into(),
            created_at: Some(Utc::now()),
            embedding: None,
            retrieved_docs: None,
        }
    }

    /// Create an empty assistant message that will be filled by a stream
    pub fn assistant_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            role: Role::Assistant,
            content: String::new(),
            created_at: Some(Utc::now()),
            embedding: None,
            retrieved_docs: None,
        }
    }

    /// Set the final content and embedding in one step, so neither is ever
    /// observed without the other.
    pub fn complete(&mut self, content: String, embedding: Option<Embedding>) {
        self.content = content;
        self.embedding = embedding;
    }

    /// Whether this is an assistant message
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Embedding decoded into numbers, if present and decodable
    pub fn embedding_vector(&self) -> Option<Vec<f64>> {
        self.embedding.as_ref().and_then(Embedding::to_vector)
    }
}

/// A server-side conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Per-conversation statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub message_count: u64,
    pub total_tokens: u64,
    /// Seconds spent generating
    pub duration: f64,
}

/// Backend health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub provider: String,
    pub model: String,
}

/// Standard response envelope used by every non-streaming endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning `success: false` into an API error
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(Error::api(
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| Error::api(self.message.unwrap_or_else(|| "missing data".to_string())))
    }
}

/// Acknowledgement returned by delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// The kind of account a user id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Teacher,
    Student,
}

impl UserRole {
    /// Query/body key the backend uses for this role's id
    pub fn id_field(&self) -> &'static str {
        match self {
            UserRole::Teacher => "teacherId",
            UserRole::Student => "studentId",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "teacher" => Ok(UserRole::Teacher),
            "student" => Ok(UserRole::Student),
            other => Err(Error::InvalidConfig(format!("unknown role: {}", other))),
        }
    }
}

/// Who a request is made on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub role: UserRole,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn teacher(id: impl Into<String>) -> Self {
        Self::new(id, UserRole::Teacher)
    }

    pub fn student(id: impl Into<String>) -> Self {
        Self::new(id, UserRole::Student)
    }
}

/// Tunables for a generation request
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub use_rag: bool,
    pub web_search: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 300,
            use_rag: true,
            web_search: false,
        }
    }
}

/// Body of `POST /generate`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    /// Serialized as `null` for a brand-new conversation
    pub conversation_id: Option<String>,
    pub user_id: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(rename = "useRAG")]
    pub use_rag: bool,
    pub web_search: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

impl GenerateRequest {
    /// Build a streaming request. Fails before any network call when the
    /// identity carries no id.
    pub fn new(
        prompt: impl Into<String>,
        conversation_id: Option<&str>,
        user: &UserIdentity,
        options: &GenerateOptions,
    ) -> Result<Self> {
        if user.id.trim().is_empty() {
            return Err(Error::MissingUserId);
        }
        let (teacher_id, student_id) = match user.role {
            UserRole::Teacher => (Some(user.id.clone()), None),
            UserRole::Student => (None, Some(user.id.clone())),
        };
        Ok(Self {
            prompt: prompt.into(),
            conversation_id: conversation_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            user_id: user.id.clone(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: true,
            use_rag: options.use_rag,
            web_search: options.web_search,
            teacher_id,
            student_id,
        })
    }
}

/// Final outcome of a completed generation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    pub response: String,
    /// Empty when the id could not be determined
    pub conversation_id: String,
    pub embedding: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_decodes_encoded_string() {
        let e = Embedding::Encoded("[0.5, -1, 2]".into());
        assert_eq!(e.to_vector(), Some(vec![0.5, -1.0, 2.0]));

        let bad = Embedding::Encoded("not json".into());
        assert_eq!(bad.to_vector(), None);
    }

    #[test]
    fn test_message_deserializes_either_embedding_form() {
        let json = r#"{"id":"m1","role":"assistant","content":"hi","embedding":[1.0,2.0]}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.embedding_vector(), Some(vec![1.0, 2.0]));

        let json = r#"{"role":"assistant","content":"hi","embedding":"[3,4]"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.embedding_vector(), Some(vec![3.0, 4.0]));
        assert!(msg.is_assistant());
    }

    #[test]
    fn test_conversation_parses_camel_case() {
        let json = r#"{"id":"c1","title":null,"lastActiveAt":"2025-03-01T10:00:00Z"}"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.id, "c1");
        assert!(conv.title.is_none());
        assert!(conv.messages.is_empty());
    }

    #[test]
    fn test_envelope_failure_is_api_error() {
        let env: Envelope<Vec<Conversation>> =
            serde_json::from_str(r#"{"success":false,"message":"denied"}"#).unwrap();
        match env.into_result() {
            Err(Error::Api { message }) => assert_eq!(message, "denied"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_generate_request_wire_format() {
        let req = GenerateRequest::new(
            "hello",
            None,
            &UserIdentity::teacher("t-1"),
            &GenerateOptions::default(),
        )
        .unwrap();
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["conversationId"], serde_json::Value::Null);
        assert_eq!(value["userId"], "t-1");
        assert_eq!(value["teacherId"], "t-1");
        assert_eq!(value["useRAG"], true);
        assert_eq!(value["stream"], true);
        assert_eq!(value["maxTokens"], 300);
        assert!(value.get("studentId").is_none());
    }

    #[test]
    fn test_generate_request_requires_user_id() {
        let result = GenerateRequest::new(
            "hello",
            Some("c1"),
            &UserIdentity::student(""),
            &GenerateOptions::default(),
        );
        assert!(matches!(result, Err(Error::MissingUserId)));
    }

    #[test]
    fn test_user_role_parse() {
        assert_eq!("Teacher".parse::<UserRole>().unwrap(), UserRole::Teacher);
        assert_eq!(UserRole::Student.id_field(), "studentId");
        assert!("admin".parse::<UserRole>().is_err());
    }
}
