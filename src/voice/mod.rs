//! Speech-to-text input
//!
//! Voice input is an optional platform capability. The widget never talks to
//! a recognizer directly; it goes through [`VoiceCapability`], which is
//! either backed by a [`SpeechRecognizer`] or reports that no recognizer
//! exists, in which case capture requests are no-ops.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Settings for a single capture
///
/// Captures are single-utterance and final-result-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    pub continuous: bool,
    pub interim_results: bool,
    pub language: String,
}

impl RecognitionOptions {
    pub fn single_utterance(language: impl Into<String>) -> Self {
        Self {
            continuous: false,
            interim_results: false,
            language: language.into(),
        }
    }
}

/// Events emitted by a recognizer during one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Final transcript of the utterance
    Result(String),
    Error(String),
    /// Natural end of the utterance
    End,
}

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Recognizer failed to start: {0}")]
    StartFailed(String),
}

/// A platform speech recognizer
///
/// `start` begins one capture and returns the stream of its events. The
/// capture is over once the stream yields `End` or closes.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start(
        &self,
        options: RecognitionOptions,
    ) -> Result<mpsc::Receiver<RecognitionEvent>, VoiceError>;
}

/// Result of capability detection
#[derive(Clone, Default)]
pub enum VoiceCapability {
    Available(Arc<dyn SpeechRecognizer>),
    #[default]
    Unavailable,
}

impl VoiceCapability {
    pub fn detect(recognizer: Option<Arc<dyn SpeechRecognizer>>) -> Self {
        match recognizer {
            Some(recognizer) => VoiceCapability::Available(recognizer),
            None => VoiceCapability::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, VoiceCapability::Available(_))
    }
}

impl std::fmt::Debug for VoiceCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceCapability::Available(_) => f.write_str("Available"),
            VoiceCapability::Unavailable => f.write_str("Unavailable"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedRecognizer;
    use super::*;

    #[test]
    fn test_detect() {
        assert!(!VoiceCapability::detect(None).is_available());

        let recognizer: Arc<dyn SpeechRecognizer> = Arc::new(ScriptedRecognizer::default());
        assert!(VoiceCapability::detect(Some(recognizer)).is_available());
    }

    #[test]
    fn test_single_utterance_options() {
        let options = RecognitionOptions::single_utterance("en-US");
        assert!(!options.continuous);
        assert!(!options.interim_results);
        assert_eq!(options.language, "en-US");
    }
}
