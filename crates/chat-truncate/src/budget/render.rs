//! Prompt rendering and fit probing.
//!
//! The true cost of a message list is only known after it has been rendered
//! through the chat template and tokenized as a whole. Every measurement the
//! truncation path makes goes through a [`PromptRenderer`].

use crate::budget::counter::TokenCounter;
use crate::chat::{Message, TruncateError};

/// A rendered prompt together with its token count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub prompt: String,
    pub n_tokens: u32,
}

/// Renders a message list through the chat template and tokenizes the result.
///
/// Implementations must be deterministic for a fixed message list.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, messages: &[Message]) -> Result<RenderedPrompt, TruncateError>;
}

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";

/// ChatML template renderer backed by a [`TokenCounter`].
#[derive(Debug, Clone)]
pub struct ChatMlRenderer<C> {
    counter: C,
    add_generation_prompt: bool,
}

impl<C: TokenCounter> ChatMlRenderer<C> {
    pub fn new(counter: C) -> Self {
        Self {
            counter,
            add_generation_prompt: true,
        }
    }

    pub fn with_generation_prompt(mut self, enabled: bool) -> Self {
        self.add_generation_prompt = enabled;
        self
    }

    fn apply_template(&self, messages: &[Message]) -> String {
        let mut prompt = String::new();
        for message in messages {
            prompt.push_str(IM_START);
            prompt.push_str(message.role().as_str());
            prompt.push('\n');
            prompt.push_str(message.content());
            prompt.push_str(IM_END);
            prompt.push('\n');
        }
        if self.add_generation_prompt {
            prompt.push_str(IM_START);
            prompt.push_str("assistant\n");
        }
        prompt
    }
}

impl<C: TokenCounter> PromptRenderer for ChatMlRenderer<C> {
    fn render(&self, messages: &[Message]) -> Result<RenderedPrompt, TruncateError> {
        let prompt = self.apply_template(messages);
        let n_tokens = self.counter.count_text(&prompt);
        Ok(RenderedPrompt { prompt, n_tokens })
    }
}

/// Measure a message list once through the renderer.
pub fn probe(
    renderer: &dyn PromptRenderer,
    messages: &[Message],
) -> Result<RenderedPrompt, TruncateError> {
    let rendered = renderer.render(messages)?;
    tracing::debug!(
        "Probed {} messages: {} prompt tokens",
        messages.len(),
        rendered.n_tokens
    );
    Ok(rendered)
}
