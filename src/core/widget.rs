//! The chat widget
//!
//! `ChatWidget` is the state behind the floating chat bubble on the site:
//!
//! 1. Holds the visibility flag, the input draft and the composing indicator
//! 2. Appends submitted text to the transcript straight away as `pending`
//! 3. Sends it, alone, to the completion service under a timeout
//! 4. Appends the reply, or marks the submission `failed`
//! 5. Optionally fills the draft from a voice capture
//!
//! The transcript is persisted by an observer on the store, so every
//! mutation made here reaches storage without the widget asking for it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::widget::CompletionConfig;
use crate::config::{DispatchPolicy, WidgetConfig};
use crate::conversation::{Message, MessageId, Status, Transcript};
use crate::providers::{CompletionRequest, CompletionService, ProviderError};
use crate::voice::{RecognitionEvent, RecognitionOptions, VoiceCapability};

use super::storage::{load_transcript, KvStore, TranscriptPersister};
use super::store::TranscriptStore;

/// Why a submission did not get a reply
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Completion failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("No reply within {0:?}")]
    TimedOut(Duration),

    #[error("Submission was abandoned before it finished")]
    Abandoned,
}

/// An accepted submission
pub struct Submission {
    /// Id of the user message added to the transcript
    pub message_id: MessageId,
    outcome: oneshot::Receiver<Result<MessageId, ChatError>>,
}

impl Submission {
    /// Wait for the reply; on success returns the id of the assistant message
    pub async fn wait(self) -> Result<MessageId, ChatError> {
        self.outcome.await.unwrap_or(Err(ChatError::Abandoned))
    }
}

/// What happened to a voice capture request
#[derive(Debug)]
pub enum VoiceCapture {
    /// Capture running; the handle finishes when it ends
    Started(JoinHandle<()>),
    /// A capture is already running, this request was ignored
    AlreadyActive,
    /// No recognizer on this platform
    Unavailable,
}

/// Everything the chat surface renders
#[derive(Debug, Clone, Serialize)]
pub struct WidgetView {
    pub open: bool,
    pub composing: bool,
    pub recording: bool,
    pub voice_available: bool,
    pub input: String,
    pub messages: Transcript,
}

#[derive(Debug, Default)]
struct UiState {
    open: bool,
    input: String,
    /// Submissions not yet settled; the composing indicator shows while > 0
    in_flight: usize,
    recording: bool,
    /// Completes when the most recent serial submission settles
    tail: Option<oneshot::Receiver<()>>,
}

struct Inner {
    completion: CompletionConfig,
    dispatch: DispatchPolicy,
    voice_language: String,
    service: Arc<dyn CompletionService>,
    voice: VoiceCapability,
    store: tokio::sync::Mutex<TranscriptStore>,
    ui: Mutex<UiState>,
}

impl Inner {
    fn ui(&self) -> MutexGuard<'_, UiState> {
        self.ui.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send one submission and apply its outcome to the transcript
    async fn deliver(&self, id: MessageId, text: String) -> Result<MessageId, ChatError> {
        let timeout = self.completion.timeout();
        let request = CompletionRequest::from_config(&self.completion, text);

        let result = match tokio::time::timeout(timeout, self.service.complete(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(ChatError::Provider(e)),
            Err(_) => Err(ChatError::TimedOut(timeout)),
        };

        let outcome = match result {
            Ok(reply) => {
                let reply = Message::assistant(reply);
                let reply_id = reply.id;

                let mut store = self.store.lock().await;
                store.update_status(id, Status::Delivered).await;
                store.append(reply).await;

                tracing::info!(message_id = %id, reply_id = %reply_id, "Reply delivered");
                Ok(reply_id)
            }
            Err(e) => {
                tracing::warn!(message_id = %id, "Submission failed: {}", e);
                self.store.lock().await.update_status(id, Status::Failed).await;
                Err(e)
            }
        };

        let mut ui = self.ui();
        ui.in_flight = ui.in_flight.saturating_sub(1);
        outcome
    }
}

/// Chat widget state, cheap to clone and share between handlers
#[derive(Clone)]
pub struct ChatWidget {
    inner: Arc<Inner>,
}

impl ChatWidget {
    /// Create the widget, restoring the transcript from `storage`
    pub async fn new(
        config: &WidgetConfig,
        service: Arc<dyn CompletionService>,
        storage: Arc<dyn KvStore>,
        voice: VoiceCapability,
    ) -> Self {
        let key = &config.widget.storage_key;
        let transcript = load_transcript(storage.as_ref(), key, &config.widget.greeting).await;

        let mut store = TranscriptStore::new(transcript);
        store.subscribe(Arc::new(TranscriptPersister::new(storage, key.clone())));

        tracing::debug!(
            dispatch = ?config.widget.dispatch,
            voice = ?voice,
            "Chat widget ready"
        );

        Self {
            inner: Arc::new(Inner {
                completion: config.completion.clone(),
                dispatch: config.widget.dispatch,
                voice_language: config.voice.language.clone(),
                service,
                voice,
                store: tokio::sync::Mutex::new(store),
                ui: Mutex::new(UiState::default()),
            }),
        }
    }

    pub fn open(&self) {
        self.inner.ui().open = true;
    }

    pub fn close(&self) {
        self.inner.ui().open = false;
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.inner.ui().input = text.into();
    }

    pub fn input(&self) -> String {
        self.inner.ui().input.clone()
    }

    /// Whether the "assistant is typing" indicator is showing
    pub fn is_composing(&self) -> bool {
        self.inner.ui().in_flight > 0
    }

    pub async fn transcript(&self) -> Transcript {
        self.inner.store.lock().await.snapshot()
    }

    pub async fn view(&self) -> WidgetView {
        let messages = self.transcript().await;
        let composing = self.is_composing();
        let ui = self.inner.ui();
        WidgetView {
            open: ui.open,
            composing,
            recording: ui.recording,
            voice_available: self.inner.voice.is_available(),
            input: ui.input.clone(),
            messages,
        }
    }

    /// Submit `text` to the assistant
    ///
    /// Blank text is ignored and returns `None`. Otherwise the user message
    /// is in the transcript as `pending` by the time this returns, and the
    /// reply arrives in the background.
    pub async fn submit(&self, text: &str) -> Option<Submission> {
        if text.trim().is_empty() {
            tracing::debug!("Ignoring blank submission");
            return None;
        }

        let message = Message::user(text);
        let id = message.id;
        // Holding the store while taking a queue slot keeps the queue in transcript order
        let mut store = self.inner.store.lock().await;
        store.append(message).await;

        let (turn, previous) = {
            let mut ui = self.inner.ui();
            ui.input.clear();
            ui.in_flight += 1;

            match self.inner.dispatch {
                DispatchPolicy::Serial => {
                    let (done_tx, done_rx) = oneshot::channel::<()>();
                    (Some(done_tx), ui.tail.replace(done_rx))
                }
                DispatchPolicy::Concurrent => (None, None),
            }
        };
        drop(store);

        tracing::info!(message_id = %id, "Message submitted");

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let inner = self.inner.clone();
        let text = text.to_string();

        tokio::spawn(async move {
            if let Some(previous) = previous {
                // Resolves (with an error) once the previous submission drops its sender
                let _ = previous.await;
            }
            let outcome = inner.deliver(id, text).await;
            drop(turn);
            let _ = outcome_tx.send(outcome);
        });

        Some(Submission {
            message_id: id,
            outcome: outcome_rx,
        })
    }

    /// Submit whatever is in the input draft
    pub async fn submit_input(&self) -> Option<Submission> {
        let text = self.input();
        self.submit(&text).await
    }

    /// Start a single-utterance voice capture that fills the input draft
    ///
    /// A request made while a capture is running is ignored rather than
    /// restarting it.
    pub fn start_voice_capture(&self) -> VoiceCapture {
        let recognizer = match &self.inner.voice {
            VoiceCapability::Available(recognizer) => recognizer.clone(),
            VoiceCapability::Unavailable => {
                tracing::debug!("Voice capture requested but no recognizer is available");
                return VoiceCapture::Unavailable;
            }
        };

        {
            let mut ui = self.inner.ui();
            if ui.recording {
                return VoiceCapture::AlreadyActive;
            }
            ui.recording = true;
        }

        let inner = self.inner.clone();
        let options = RecognitionOptions::single_utterance(&self.inner.voice_language);

        let handle = tokio::spawn(async move {
            match recognizer.start(options).await {
                Ok(mut events) => {
                    while let Some(event) = events.recv().await {
                        match event {
                            RecognitionEvent::Result(text) => {
                                tracing::debug!("Voice capture produced a transcript");
                                inner.ui().input = text;
                                break;
                            }
                            RecognitionEvent::Error(e) => {
                                tracing::warn!("Voice capture failed: {}", e);
                                break;
                            }
                            RecognitionEvent::End => break,
                        }
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            }
            inner.ui().recording = false;
        });

        VoiceCapture::Started(handle)
    }
}
