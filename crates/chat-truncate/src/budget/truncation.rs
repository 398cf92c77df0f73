//! Oldest-first turn eviction under re-tokenization feedback.

use crate::budget::render::{probe, PromptRenderer, RenderedPrompt};
use crate::budget::segmenter::Conversation;
use crate::chat::TruncateError;

/// Outcome of a truncation run.
#[derive(Debug, Clone)]
pub struct TruncationReport {
    /// Render of the surviving conversation
    pub rendered: RenderedPrompt,
    pub turns_removed: usize,
    /// No droppable turn was left before the prompt got under the target
    pub exhausted: bool,
}

/// Drop whole turns from the front of `conversation` until its rendered
/// prompt is strictly below `target` tokens.
///
/// `initial` is the measurement of the untrimmed conversation. Each removal
/// is followed by exactly one render of the remaining messages. When nothing
/// is left to drop the loop stops and returns the minimal prompt as is.
pub fn truncate_conversation(
    conversation: &mut Conversation,
    renderer: &dyn PromptRenderer,
    target: u32,
    initial: RenderedPrompt,
) -> Result<TruncationReport, TruncateError> {
    let mut rendered = initial;
    let mut turns_removed = 0;

    loop {
        let Some(turn) = conversation.drop_oldest_turn() else {
            tracing::warn!(
                "Chat truncation exhausted after removing {} turns: {} prompt tokens still >= target {}",
                turns_removed,
                rendered.n_tokens,
                target
            );
            return Ok(TruncationReport {
                rendered,
                turns_removed,
                exhausted: true,
            });
        };
        turns_removed += 1;

        rendered = probe(renderer, &conversation.to_messages())?;
        tracing::debug!(
            "Dropped turn at index {} ({} messages): {} prompt tokens, target {}",
            turn.index,
            turn.message_count(),
            rendered.n_tokens,
            target
        );

        if rendered.n_tokens < target {
            return Ok(TruncationReport {
                rendered,
                turns_removed,
                exhausted: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::segmenter::MessageSegmenter;
    use crate::chat::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Each message costs its content length; no template overhead.
    struct ContentLengthRenderer {
        calls: AtomicUsize,
    }

    impl ContentLengthRenderer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PromptRenderer for ContentLengthRenderer {
        fn render(&self, messages: &[Message]) -> Result<RenderedPrompt, TruncateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt: String = messages.iter().map(Message::content).collect();
            Ok(RenderedPrompt {
                n_tokens: prompt.len() as u32,
                prompt,
            })
        }
    }

    struct FailingRenderer;

    impl PromptRenderer for FailingRenderer {
        fn render(&self, _messages: &[Message]) -> Result<RenderedPrompt, TruncateError> {
            Err(TruncateError::Render("template error".to_string()))
        }
    }

    fn ten_char_conversation() -> Conversation {
        // Every message is 10 characters long.
        MessageSegmenter::new().segment(vec![
            Message::system("system-000"),
            Message::user("user-01-xx"),
            Message::assistant("asst-01-xx"),
            Message::user("user-02-xx"),
            Message::assistant("asst-02-xx"),
            Message::user("user-03-xx"),
            Message::assistant("asst-03-xx"),
            Message::user("final-user"),
        ])
    }

    fn measure(renderer: &ContentLengthRenderer, conversation: &Conversation) -> RenderedPrompt {
        renderer.render(&conversation.to_messages()).unwrap()
    }

    #[test]
    fn stops_as_soon_as_prompt_is_below_target() {
        let renderer = ContentLengthRenderer::new();
        let mut conversation = ten_char_conversation();
        let initial = measure(&renderer, &conversation);
        assert_eq!(initial.n_tokens, 80);

        // 80 -> 60 -> 40; 40 < 45 stops after two removals.
        let report = truncate_conversation(&mut conversation, &renderer, 45, initial).unwrap();

        assert_eq!(report.turns_removed, 2);
        assert!(!report.exhausted);
        assert_eq!(report.rendered.n_tokens, 40);
        assert_eq!(renderer.calls(), 3);
        assert_eq!(
            report.rendered.prompt,
            "system-000user-03-xxasst-03-xxfinal-user"
        );
    }

    #[test]
    fn target_comparison_is_strict() {
        let renderer = ContentLengthRenderer::new();
        let mut conversation = ten_char_conversation();
        let initial = measure(&renderer, &conversation);

        // 60 is not < 60, so a second turn goes.
        let report = truncate_conversation(&mut conversation, &renderer, 60, initial).unwrap();

        assert_eq!(report.turns_removed, 2);
        assert_eq!(report.rendered.n_tokens, 40);
    }

    #[test]
    fn exhaustion_keeps_system_and_tail() {
        let renderer = ContentLengthRenderer::new();
        let mut conversation = ten_char_conversation();
        let initial = measure(&renderer, &conversation);

        let report = truncate_conversation(&mut conversation, &renderer, 5, initial).unwrap();

        assert!(report.exhausted);
        assert_eq!(report.turns_removed, 3);
        assert_eq!(report.rendered.prompt, "system-000final-user");
        assert_eq!(conversation.turn_count(), 0);
    }

    #[test]
    fn exhaustion_protects_last_turn_without_tail() {
        let renderer = ContentLengthRenderer::new();
        let mut conversation = MessageSegmenter::new().segment(vec![
            Message::user("user-01-xx"),
            Message::assistant("asst-01-xx"),
            Message::user("user-02-xx"),
            Message::assistant("asst-02-xx"),
        ]);
        let initial = measure(&renderer, &conversation);

        let report = truncate_conversation(&mut conversation, &renderer, 1, initial).unwrap();

        assert!(report.exhausted);
        assert_eq!(report.turns_removed, 1);
        assert_eq!(report.rendered.prompt, "user-02-xxasst-02-xx");
    }

    #[test]
    fn nothing_droppable_returns_initial_render() {
        let renderer = ContentLengthRenderer::new();
        let mut conversation = MessageSegmenter::new()
            .segment(vec![Message::system("Sys."), Message::user("Only question.")]);
        let initial = measure(&renderer, &conversation);

        let report =
            truncate_conversation(&mut conversation, &renderer, 0, initial.clone()).unwrap();

        assert!(report.exhausted);
        assert_eq!(report.turns_removed, 0);
        assert_eq!(report.rendered, initial);
        assert_eq!(renderer.calls(), 1);
    }

    #[test]
    fn render_failure_propagates() {
        let mut conversation = ten_char_conversation();
        let initial = RenderedPrompt {
            prompt: String::new(),
            n_tokens: 80,
        };

        let result = truncate_conversation(&mut conversation, &FailingRenderer, 10, initial);

        assert!(matches!(result, Err(TruncateError::Render(_))));
    }
}
