use delve_llm::{truncate_chars, Message, Role, Thread, ToolCall};
use proptest::prelude::*;

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::System),
        Just(Role::User),
        Just(Role::Assistant),
        Just(Role::Tool),
    ]
}

fn message_for(role: Role, idx: usize) -> Message {
    let content = format!("m{idx}");
    match role {
        Role::System => Message::system(content),
        Role::User => Message::user(content),
        Role::Assistant => Message::assistant(content),
        Role::Tool => Message::tool_result(
            &ToolCall::new(format!("c{idx}"), "search", serde_json::json!({})),
            content,
        ),
    }
}

#[test]
fn test_thread_collects_from_iterator() {
    let thread: Thread = (0..3).map(|i| Message::user(format!("u{i}"))).collect();
    assert_eq!(thread.len(), 3);
    assert_eq!(thread.messages()[2].content, "u2");
}

#[test]
fn test_replace_overrides_thread() {
    let mut thread = Thread::from(vec![Message::user("old")]);
    thread.replace(vec![Message::system("lead"), Message::user("brief")]);
    assert_eq!(thread.len(), 2);
    assert_eq!(thread.messages()[0].role, Role::System);
}

proptest! {
    #[test]
    fn prop_removal_keeps_strict_prefix(roles in prop::collection::vec(role_strategy(), 0..20)) {
        let original: Thread = roles
            .iter()
            .enumerate()
            .map(|(i, role)| message_for(*role, i))
            .collect();
        let mut thread = original.clone();
        let removed = thread.remove_through_last_assistant();

        let has_assistant = roles.contains(&Role::Assistant);
        prop_assert_eq!(removed, has_assistant);
        if removed {
            prop_assert!(thread.len() < original.len());
            prop_assert_eq!(thread.messages(), &original.messages()[..thread.len()]);
        } else {
            prop_assert_eq!(&thread, &original);
        }
    }

    #[test]
    fn prop_truncate_chars_is_prefix(text in ".{0,64}", max in 0usize..80) {
        let cut = truncate_chars(&text, max);
        prop_assert!(text.starts_with(cut));
        prop_assert!(cut.chars().count() <= max);
    }
}
