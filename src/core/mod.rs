//! Core widget components
//!
//! The transcript store, its persistence, and the chat widget that drives
//! both.

mod storage;
mod store;
mod widget;

pub use storage::{KvStore, MemoryKvStore, SqliteKvStore};
pub use widget::{ChatWidget, VoiceCapture, WidgetView};
