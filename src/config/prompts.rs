//! Built-in prompt strings
//!
//! Both can be overridden in the widget TOML (`completion.system_prompt` and
//! `widget.greeting`).

/// Built-in prompts that don't require configuration
pub mod builtin {
    /// System role instruction sent with every completion request
    pub const SYSTEM_PROMPT: &str =
        "You are a helpful AI assistant for GlobalSync Technologies.";

    /// First message of a fresh transcript
    pub const GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";
}
