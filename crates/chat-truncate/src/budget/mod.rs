//! Token budgeting and conversation truncation.
//!
//! When a rendered chat prompt does not fit the prompt budget of its serving
//! slot, the oldest conversation turns are dropped until it does, while the
//! leading system message and the latest exchange are kept.
//!
//! # Key Components
//!
//! - [`segmenter`]: Splits messages into system / turns / trailing user message
//! - [`types`]: `TruncationConfig`, `SlotCapacity`, `Budget`, `PreparedPrompt`
//! - [`limits`]: Server-wide capacity parameters and per-slot derivation
//! - [`counter`]: Token counting for rendered prompts
//! - [`render`]: Chat template rendering and fit probing
//! - [`truncation`]: Oldest-first turn eviction loop
//! - [`preparation`]: Per-request decision gate

pub mod counter;
pub mod limits;
pub mod preparation;
pub mod render;
pub mod segmenter;
pub mod truncation;
pub mod types;

pub use counter::{HeuristicTokenCounter, TokenCounter};
pub use limits::ServerParams;
pub use preparation::maybe_truncate;
pub use render::{probe, ChatMlRenderer, PromptRenderer, RenderedPrompt};
pub use segmenter::{Conversation, MessageSegmenter, Turn};
pub use truncation::{truncate_conversation, TruncationReport};
pub use types::{Budget, PreparedPrompt, SlotCapacity, TruncationConfig};
