//! Working out which conversation a finished exchange belongs to
//!
//! The server may or may not echo the id of a conversation it just created.
//! Resolution order: the id in the `done` event, then the id the caller sent,
//! then the most recently active conversation of the user.

use async_trait::async_trait;

use crate::{error::Result, types::Conversation};

/// Read access to a user's conversation list
#[async_trait]
pub trait ConversationSource: Send + Sync {
    /// List conversations for a user, in any order
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;
}

/// Why no id could be determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The user has no conversations at all
    NoConversations,
    /// The list query failed
    QueryFailed(String),
    /// No user id to query with
    NoUser,
}

/// Outcome of resolving a conversation id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Reported by the `done` event
    FromStream(String),
    /// Supplied by the caller when the request was made
    FromRequest(String),
    /// Picked as the most recently active conversation
    FromRecency(String),
    /// Could not be determined; do not navigate to or persist anything
    Unresolved(UnresolvedReason),
}

impl Resolution {
    /// The resolved id, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Resolution::FromStream(id)
            | Resolution::FromRequest(id)
            | Resolution::FromRecency(id) => Some(id),
            Resolution::Unresolved(_) => None,
        }
    }

    /// The resolved id, or an empty string when unresolved
    pub fn into_id(self) -> String {
        match self {
            Resolution::FromStream(id)
            | Resolution::FromRequest(id)
            | Resolution::FromRecency(id) => id,
            Resolution::Unresolved(_) => String::new(),
        }
    }

    /// Whether the recency heuristic was used
    pub fn used_fallback(&self) -> bool {
        matches!(
            self,
            Resolution::FromRecency(_)
                | Resolution::Unresolved(UnresolvedReason::NoConversations)
                | Resolution::Unresolved(UnresolvedReason::QueryFailed(_))
        )
    }
}

/// Most recently active conversation. Ties keep list order.
pub fn most_recent(conversations: &[Conversation]) -> Option<&Conversation> {
    conversations.iter().fold(None, |best: Option<&Conversation>, c| match best {
        Some(b) if b.last_active_at >= c.last_active_at => Some(b),
        _ => Some(c),
    })
}

/// Resolve the conversation id for a just-completed exchange.
///
/// Never fails: a failing list query degrades to
/// [`Resolution::Unresolved`]. The fallback can pick the wrong conversation
/// if another client touches one of this user's conversations between the
/// end of the stream and the query.
pub async fn resolve_conversation_id(
    from_stream: Option<&str>,
    from_request: Option<&str>,
    user_id: &str,
    source: &dyn ConversationSource,
) -> Resolution {
    if let Some(id) = from_stream.filter(|id| !id.is_empty()) {
        return Resolution::FromStream(id.to_string());
    }
    if let Some(id) = from_request.filter(|id| !id.is_empty()) {
        return Resolution::FromRequest(id.to_string());
    }
    if user_id.is_empty() {
        return Resolution::Unresolved(UnresolvedReason::NoUser);
    }

    match source.list_conversations(user_id).await {
        Ok(conversations) => match most_recent(&conversations) {
            Some(latest) => {
                tracing::debug!("Recovered conversation id {} from recency", latest.id);
                Resolution::FromRecency(latest.id.clone())
            }
            None => Resolution::Unresolved(UnresolvedReason::NoConversations),
        },
        Err(e) => {
            tracing::warn!("Failed to recover conversation id: {}", e);
            Resolution::Unresolved(UnresolvedReason::QueryFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        conversations: Vec<Conversation>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with(conversations: Vec<Conversation>) -> Self {
            Self {
                conversations,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                conversations: vec![],
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ConversationSource for FakeSource {
        async fn list_conversations(&self, _user_id: &str) -> Result<Vec<Conversation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::api("backend unavailable"));
            }
            Ok(self.conversations.clone())
        }
    }

    fn conv(id: &str, hour: u32) -> Conversation {
        Conversation {
            id: id.to_string(),
            title: None,
            last_active_at: Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).unwrap(),
            messages: vec![],
        }
    }

    #[tokio::test]
    async fn test_stream_id_wins() {
        let source = FakeSource::with(vec![conv("other", 5)]);
        let r = resolve_conversation_id(Some("abc"), Some("xyz"), "u1", &source).await;
        assert_eq!(r, Resolution::FromStream("abc".into()));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_request_id_used_when_stream_silent() {
        let source = FakeSource::with(vec![]);
        let r = resolve_conversation_id(None, Some("xyz"), "u1", &source).await;
        assert_eq!(r, Resolution::FromRequest("xyz".into()));

        let r = resolve_conversation_id(Some(""), Some("xyz"), "u1", &source).await;
        assert_eq!(r.id(), Some("xyz"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recency_fallback_picks_latest() {
        let source = FakeSource::with(vec![conv("old1", 1), conv("new1", 2)]);
        let r = resolve_conversation_id(None, None, "u1", &source).await;
        assert_eq!(r, Resolution::FromRecency("new1".into()));
        assert!(r.used_fallback());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_query_degrades_to_empty_id() {
        let source = FakeSource::failing();
        let r = resolve_conversation_id(None, None, "u1", &source).await;
        assert!(matches!(
            r,
            Resolution::Unresolved(UnresolvedReason::QueryFailed(_))
        ));
        assert!(r.used_fallback());
        assert_eq!(r.into_id(), "");
    }

    #[tokio::test]
    async fn test_empty_list_and_missing_user() {
        let source = FakeSource::with(vec![]);
        let r = resolve_conversation_id(None, Some(""), "u1", &source).await;
        assert_eq!(r, Resolution::Unresolved(UnresolvedReason::NoConversations));

        let r = resolve_conversation_id(None, None, "", &source).await;
        assert_eq!(r, Resolution::Unresolved(UnresolvedReason::NoUser));
        assert!(!r.used_fallback());
    }

    #[test]
    fn test_most_recent_ties_keep_order() {
        let list = vec![conv("a", 3), conv("b", 3), conv("c", 1)];
        assert_eq!(most_recent(&list).map(|c| c.id.as_str()), Some("a"));
        assert!(most_recent(&[]).is_none());
    }
}
