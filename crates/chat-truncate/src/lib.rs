pub mod budget;
pub mod chat;

pub use budget::{
    maybe_truncate, probe, truncate_conversation, Budget, ChatMlRenderer, Conversation,
    HeuristicTokenCounter, MessageSegmenter, PreparedPrompt, PromptRenderer, RenderedPrompt,
    ServerParams, SlotCapacity, TokenCounter, TruncationConfig, TruncationReport, Turn,
};
pub use chat::{ConfigError, Message, Role, TruncateError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
