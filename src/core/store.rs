//! Transcript store
//!
//! Owns the current transcript snapshot. The only ways to change it are
//! [`TranscriptStore::append`] and [`TranscriptStore::update_status`]; each
//! produces a new immutable snapshot and hands it to every observer before
//! returning.

use std::sync::Arc;

use async_trait::async_trait;

use crate::conversation::{Message, MessageId, Status, Transcript};

/// Something that reacts to transcript changes, e.g. persistence
#[async_trait]
pub trait TranscriptObserver: Send + Sync {
    async fn on_change(&self, transcript: &Transcript);
}

pub struct TranscriptStore {
    current: Transcript,
    observers: Vec<Arc<dyn TranscriptObserver>>,
}

impl TranscriptStore {
    pub fn new(initial: Transcript) -> Self {
        Self {
            current: initial,
            observers: Vec::new(),
        }
    }

    /// Register an observer; observers run in registration order
    pub fn subscribe(&mut self, observer: Arc<dyn TranscriptObserver>) {
        self.observers.push(observer);
    }

    pub fn snapshot(&self) -> Transcript {
        self.current.clone()
    }

    pub async fn append(&mut self, message: Message) -> Transcript {
        self.current = self.current.with_appended(message);
        self.notify().await;
        self.current.clone()
    }

    /// Move a message to `status`
    ///
    /// Returns `None` without touching anything when the id is unknown or
    /// the transition is not `pending → delivered | failed`.
    pub async fn update_status(&mut self, id: MessageId, status: Status) -> Option<Transcript> {
        let Some(message) = self.current.get(id) else {
            tracing::warn!(%id, "status update for unknown message");
            return None;
        };

        if !message.status.can_become(status) {
            tracing::warn!(
                %id,
                from = ?message.status,
                to = ?status,
                "refusing status transition"
            );
            return None;
        }

        self.current = self.current.with_status(id, status);
        self.notify().await;
        Some(self.current.clone())
    }

    async fn notify(&self) {
        for observer in &self.observers {
            observer.on_change(&self.current).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use crate::conversation::Author;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Transcript>>,
    }

    #[async_trait]
    impl TranscriptObserver for Recorder {
        async fn on_change(&self, transcript: &Transcript) {
            self.seen.lock().unwrap().push(transcript.clone());
        }
    }

    fn store_with_recorder() -> (TranscriptStore, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut store = TranscriptStore::new(Transcript::default());
        store.subscribe(recorder.clone());
        (store, recorder)
    }

    #[tokio::test]
    async fn test_append_returns_new_snapshot_and_notifies() {
        let (mut store, recorder) = store_with_recorder();
        let before = store.snapshot();

        let after = store.append(Message::user("Hello")).await;

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
        assert_eq!(after[1].text, "Hello");
        assert_eq!(after[1].author, Author::User);
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[after]);
    }

    #[tokio::test]
    async fn test_update_status_in_place() {
        let (mut store, recorder) = store_with_recorder();
        let msg = Message::user("Hello");
        let id = msg.id;
        store.append(msg).await;
        store.append(Message::assistant("Hi")).await;

        let updated = store.update_status(id, Status::Failed).await.unwrap();

        assert_eq!(updated.len(), 3);
        assert_eq!(updated[1].id, id);
        assert_eq!(updated[1].status, Status::Failed);
        assert_eq!(updated[2].text, "Hi");
        assert_eq!(recorder.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_refused_updates_do_not_notify() {
        let (mut store, recorder) = store_with_recorder();
        let msg = Message::user("Hello");
        let id = msg.id;
        store.append(msg).await;
        store.update_status(id, Status::Delivered).await.unwrap();

        // Terminal status
        assert!(store.update_status(id, Status::Failed).await.is_none());
        // Unknown id
        assert!(store
            .update_status(MessageId::next(), Status::Failed)
            .await
            .is_none());

        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
        assert_eq!(store.snapshot()[1].status, Status::Delivered);
    }
}
