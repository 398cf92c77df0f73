use crate::{
    maybe_truncate, ChatMlRenderer, HeuristicTokenCounter, Message, PromptRenderer, Role,
    SlotCapacity, TruncationConfig,
};

fn renderer() -> ChatMlRenderer<HeuristicTokenCounter> {
    ChatMlRenderer::new(HeuristicTokenCounter::default())
}

fn numbered_conversation(turns: usize) -> Vec<Message> {
    let mut messages = vec![Message::system("You are a helpful assistant.")];
    for i in 1..=turns {
        messages.push(Message::user(format!("[U{i:02}] Please explain topic {i} in detail.")));
        messages.push(Message::assistant(format!(
            "[A{i:02}] Here is my explanation of topic {i}."
        )));
    }
    messages.push(Message::user("This is the most recent question."));
    messages
}

fn surviving_turns(messages: &[Message], prefix: char) -> Vec<usize> {
    messages
        .iter()
        .filter_map(|m| {
            let label = m.content().strip_prefix('[')?.strip_prefix(prefix)?;
            label.get(..2)?.parse().ok()
        })
        .collect()
}

#[test]
fn test_message_serialization() {
    let msg = Message::user("Hello");
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["role"], "user");
    assert_eq!(json["content"], "Hello");

    let parsed: Message =
        serde_json::from_str(r#"{"role":"assistant","content":"Hi!"}"#).unwrap();
    assert_eq!(parsed.role(), Role::Assistant);
    assert_eq!(parsed.content(), "Hi!");
}

#[test]
fn test_unknown_role_rejected() {
    let parsed = serde_json::from_str::<Message>(r#"{"role":"narrator","content":"x"}"#);
    assert!(parsed.is_err());
}

#[test]
fn test_fraction_sweep_respects_target() {
    let renderer = renderer();
    let capacity = SlotCapacity::new(256, 64);

    for step in 1..20 {
        let fraction = step as f64 / 20.0;
        let config = TruncationConfig::enabled(fraction).unwrap();
        let prepared =
            maybe_truncate(numbered_conversation(15), &config, &capacity, &renderer).unwrap();

        assert!(prepared.truncation_occurred, "fraction {fraction}");
        if !prepared.exhausted {
            assert!(
                prepared.prompt_tokens < prepared.budget.target,
                "fraction {fraction}: {} >= {}",
                prepared.prompt_tokens,
                prepared.budget.target
            );
        }
        assert_eq!(
            prepared.prompt_tokens,
            renderer.render(&prepared.messages).unwrap().n_tokens
        );
    }
}

#[test]
fn test_oldest_turns_evicted_first() {
    let config = TruncationConfig::enabled(0.5).unwrap();
    let prepared = maybe_truncate(
        numbered_conversation(15),
        &config,
        &SlotCapacity::new(256, 64),
        &renderer(),
    )
    .unwrap();

    let users = surviving_turns(&prepared.messages, 'U');
    assert!(!users.is_empty());
    let first = users[0];
    // Survivors form a contiguous suffix of the original turns.
    assert_eq!(users, (first..=15).collect::<Vec<_>>());
    assert_eq!(prepared.turns_removed, first - 1);
}

#[test]
fn test_no_orphan_assistant_messages() {
    let config = TruncationConfig::enabled(0.8).unwrap();
    let prepared = maybe_truncate(
        numbered_conversation(15),
        &config,
        &SlotCapacity::new(256, 64),
        &renderer(),
    )
    .unwrap();

    let users = surviving_turns(&prepared.messages, 'U');
    assert!(!users.is_empty());
    assert_eq!(users, surviving_turns(&prepared.messages, 'A'));
    for pair in prepared.messages.windows(2) {
        if pair[1].role() == Role::Assistant {
            assert_eq!(pair[0].role(), Role::User);
        }
    }
}

#[test]
fn test_system_and_final_user_always_survive() {
    let renderer = renderer();
    for n_ctx_slot in [8, 64, 128, 256, 512] {
        let config = TruncationConfig::enabled(0.5).unwrap();
        let prepared = maybe_truncate(
            numbered_conversation(10),
            &config,
            &SlotCapacity::new(n_ctx_slot, -1),
            &renderer,
        )
        .unwrap();

        assert!(prepared.prompt.contains("You are a helpful assistant."));
        assert!(prepared.prompt.contains("This is the most recent question."));
        assert_eq!(prepared.messages[0].role(), Role::System);
    }
}

#[test]
fn test_truncation_is_idempotent() {
    let renderer = renderer();
    let config = TruncationConfig::enabled(0.8).unwrap();
    let capacity = SlotCapacity::new(256, 64);

    let first = maybe_truncate(numbered_conversation(15), &config, &capacity, &renderer).unwrap();
    assert!(first.truncation_occurred);

    let second = maybe_truncate(first.messages.clone(), &config, &capacity, &renderer).unwrap();
    assert!(!second.truncation_occurred);
    assert_eq!(second.messages, first.messages);
    assert_eq!(second.prompt, first.prompt);
}
