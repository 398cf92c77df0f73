//! Per-request truncation decision.
//!
//! Measures the conversation once, then either passes it through, rejects it
//! with a context-size error, or hands it to the truncation loop.

use crate::budget::render::{probe, PromptRenderer};
use crate::budget::segmenter::MessageSegmenter;
use crate::budget::truncation::truncate_conversation;
use crate::budget::types::{Budget, PreparedPrompt, SlotCapacity, TruncationConfig};
use crate::chat::{Message, TruncateError};

/// Fit a chat request into its slot's prompt budget.
///
/// 1. Render the full message list once and compute the [`Budget`]
/// 2. If it fits `available_for_prompt`, return it unchanged
/// 3. If it does not fit and truncation is disabled, fail with
///    [`TruncateError::ContextExceeded`]
/// 4. Otherwise drop the oldest turns until the prompt is under `target`
///
/// The returned prompt and token count always describe the returned messages.
///
/// # Example
///
/// ```
/// use chat_truncate::{maybe_truncate, ChatMlRenderer, HeuristicTokenCounter};
/// use chat_truncate::{Message, SlotCapacity, TruncationConfig};
///
/// let renderer = ChatMlRenderer::new(HeuristicTokenCounter::default());
/// let config = TruncationConfig::enabled(0.8).unwrap();
/// let messages = vec![Message::system("Be brief."), Message::user("Hello?")];
///
/// let prepared = maybe_truncate(messages, &config, &SlotCapacity::new(256, 64), &renderer).unwrap();
/// assert!(!prepared.truncation_occurred);
/// assert_eq!(prepared.messages.len(), 2);
/// ```
pub fn maybe_truncate(
    messages: Vec<Message>,
    config: &TruncationConfig,
    capacity: &SlotCapacity,
    renderer: &dyn PromptRenderer,
) -> Result<PreparedPrompt, TruncateError> {
    let budget = Budget::compute(capacity, config.fraction());
    let initial = probe(renderer, &messages)?;

    if !budget.needs_truncation(initial.n_tokens) {
        return Ok(PreparedPrompt {
            messages,
            prompt: initial.prompt,
            prompt_tokens: initial.n_tokens,
            budget,
            truncation_occurred: false,
            turns_removed: 0,
            exhausted: false,
        });
    }

    if !config.is_enabled() {
        tracing::debug!(
            "Prompt of {} tokens exceeds {} available and chat truncation is disabled",
            initial.n_tokens,
            budget.available_for_prompt
        );
        return Err(TruncateError::ContextExceeded {
            n_prompt_tokens: initial.n_tokens,
            n_ctx: budget.available_for_prompt,
        });
    }

    let original_count = messages.len();
    let original_tokens = initial.n_tokens;
    let mut conversation = MessageSegmenter::new().segment(messages);
    let report = truncate_conversation(&mut conversation, renderer, budget.target, initial)?;
    let messages = conversation.into_messages();

    tracing::info!(
        "Chat truncated: {} -> {} messages, {} -> {} prompt tokens (target {}, available {})",
        original_count,
        messages.len(),
        original_tokens,
        report.rendered.n_tokens,
        budget.target,
        budget.available_for_prompt
    );

    Ok(PreparedPrompt {
        messages,
        prompt: report.rendered.prompt,
        prompt_tokens: report.rendered.n_tokens,
        budget,
        truncation_occurred: report.turns_removed > 0,
        turns_removed: report.turns_removed,
        exhausted: report.exhausted,
    })
}
