//! Conversation types: messages and transcript snapshots

use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::prompts_builtin;

/// Unique message identifier
///
/// A UUIDv7: ordered by creation time, with random bits that keep ids from
/// different processes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn next() -> Self {
        MessageId(Uuid::now_v7())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

/// Delivery status of a message
///
/// Only user messages ever sit in `Pending` or `Failed`; assistant messages
/// are created `Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Delivered,
    Failed,
}

impl Status {
    /// Whether a message may move from `self` to `next` in place
    pub fn can_become(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Delivered) | (Status::Pending, Status::Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl Message {
    /// A freshly submitted user message awaiting its reply
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::next(),
            text: text.into(),
            author: Author::User,
            timestamp: Utc::now(),
            status: Status::Pending,
            attachments: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::next(),
            text: text.into(),
            author: Author::Assistant,
            timestamp: Utc::now(),
            status: Status::Delivered,
            attachments: Vec::new(),
        }
    }
}

/// Immutable, cheaply clonable view of the transcript at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    messages: Arc<[Message]>,
}

impl Transcript {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages: messages.into(),
        }
    }

    /// The transcript a new visitor sees: a single assistant greeting
    pub fn greeting(text: &str) -> Self {
        Self::new(vec![Message::assistant(text)])
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.messages)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let messages: Vec<Message> = serde_json::from_str(json)?;
        Ok(Self::new(messages))
    }

    /// Copy of this snapshot with `message` appended
    pub(crate) fn with_appended(&self, message: Message) -> Self {
        let mut messages = self.messages.to_vec();
        messages.push(message);
        Self::new(messages)
    }

    /// Copy of this snapshot with the status of `id` replaced
    pub(crate) fn with_status(&self, id: MessageId, status: Status) -> Self {
        let messages = self
            .messages
            .iter()
            .map(|m| {
                if m.id == id {
                    Message {
                        status,
                        ..m.clone()
                    }
                } else {
                    m.clone()
                }
            })
            .collect();
        Self::new(messages)
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::greeting(prompts_builtin::GREETING)
    }
}

impl Deref for Transcript {
    type Target = [Message];

    fn deref(&self) -> &[Message] {
        &self.messages
    }
}

impl Serialize for Transcript {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.messages.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<MessageId> = (0..10_000).map(|_| MessageId::next()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_ids_are_uuid_v7_strings() {
        let id = MessageId::next();
        assert_eq!(id.0.get_version_num(), 7);

        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }

    #[test]
    fn test_default_is_single_greeting() {
        let transcript = Transcript::default();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].author, Author::Assistant);
        assert_eq!(transcript[0].text, prompts_builtin::GREETING);
        assert_eq!(transcript[0].status, Status::Delivered);
    }

    #[test]
    fn test_status_transitions() {
        assert!(Status::Pending.can_become(Status::Delivered));
        assert!(Status::Pending.can_become(Status::Failed));
        assert!(!Status::Failed.can_become(Status::Delivered));
        assert!(!Status::Delivered.can_become(Status::Failed));
        assert!(!Status::Pending.can_become(Status::Pending));
    }

    #[test]
    fn test_json_round_trip_keeps_order_and_status() {
        let mut failed = Message::user("first");
        failed.status = Status::Failed;
        let transcript = Transcript::new(vec![
            Message::assistant("hi"),
            failed,
            Message::user("second"),
        ]);

        let json = transcript.to_json().unwrap();
        let reloaded = Transcript::from_json(&json).unwrap();
        assert_eq!(reloaded, transcript);
    }

    #[test]
    fn test_attachments_omitted_when_empty() {
        let json = serde_json::to_value(Message::user("hello")).unwrap();
        assert!(json.get("attachments").is_none());
        assert_eq!(json["author"], "user");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_with_status_leaves_original_snapshot_untouched() {
        let msg = Message::user("hello");
        let id = msg.id;
        let before = Transcript::new(vec![msg]);
        let after = before.with_status(id, Status::Failed);

        assert_eq!(before[0].status, Status::Pending);
        assert_eq!(after[0].status, Status::Failed);
    }
}
