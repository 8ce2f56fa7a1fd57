//! End-to-end store behavior: conversation membership, message ordering,
//! read watermarks, and the concurrency invariant.

mod common;

use common::{open_store, seed_user};
use forum_chat_core::ports::{ChatError, ConversationStore, MessageStore};

#[tokio::test]
async fn create_conversation_dedups_participants() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;
    let b = seed_user(&auth, "bob").await;

    let conversation = store
        .create_conversation(&[a, b, a, b])
        .await
        .expect("create should succeed");
    assert_eq!(conversation.participants, vec![a, b]);

    let participants = store.participants(conversation.id).await.unwrap();
    assert_eq!(participants, vec![a, b]);
}

#[tokio::test]
async fn degenerate_participant_sets_are_rejected() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;
    let b = seed_user(&auth, "bob").await;

    // Self-only, even when repeated.
    let err = store.create_conversation(&[a, a]).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidParticipants(_)));

    let err = store.create_conversation(&[a]).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidParticipants(_)));

    // Unknown users never make it into a membership set.
    let ghost = uuid::Uuid::new_v4();
    let err = store.create_conversation(&[a, ghost]).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidParticipants(_)));

    // None of the failures left a conversation behind.
    assert!(store.conversations_for_user(a).await.unwrap().is_empty());
    assert!(store.conversations_for_user(b).await.unwrap().is_empty());
}

#[tokio::test]
async fn send_list_and_mark_read_round_trip() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;
    let b = seed_user(&auth, "bob").await;
    let k = store.create_conversation(&[a, b]).await.unwrap().id;

    store.append_message(k, a, "hi").await.unwrap();
    store.append_message(k, a, "there").await.unwrap();

    let messages = store.list_messages(k, a, 10, 0).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi", "there"]);

    assert_eq!(store.unread_count(k, b).await.unwrap(), 2);
    // The sender has nothing unread from themselves.
    assert_eq!(store.unread_count(k, a).await.unwrap(), 0);

    store.mark_read(k, b).await.unwrap();
    assert_eq!(store.unread_count(k, b).await.unwrap(), 0);

    // A later message from B is unread for A only.
    store.append_message(k, b, "hey").await.unwrap();
    assert_eq!(store.unread_count(k, a).await.unwrap(), 1);
    assert_eq!(store.unread_count(k, b).await.unwrap(), 0);
}

#[tokio::test]
async fn non_participants_are_forbidden() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;
    let b = seed_user(&auth, "bob").await;
    let c = seed_user(&auth, "mallory").await;
    let k = store.create_conversation(&[a, b]).await.unwrap().id;

    let err = store.append_message(k, c, "x").await.unwrap_err();
    assert!(matches!(err, ChatError::Forbidden { .. }));

    let err = store.list_messages(k, c, 10, 0).await.unwrap_err();
    assert!(matches!(err, ChatError::Forbidden { .. }));

    let err = store.mark_read(k, c).await.unwrap_err();
    assert!(matches!(err, ChatError::Forbidden { .. }));

    // The rejected send left no row behind.
    assert!(store.list_messages(k, a, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_conversations_are_not_found_but_membership_reads_false() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;

    let err = store.append_message(999, a, "hello?").await.unwrap_err();
    assert!(matches!(err, ChatError::NotFound(999)));

    let err = store.participants(999).await.unwrap_err();
    assert!(matches!(err, ChatError::NotFound(999)));

    // is_participant never errors for a missing conversation.
    assert!(!store.is_participant(999, a).await.unwrap());
}

#[tokio::test]
async fn whitespace_content_is_rejected_and_stored_content_is_trimmed() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;
    let b = seed_user(&auth, "bob").await;
    let k = store.create_conversation(&[a, b]).await.unwrap().id;

    let err = store.append_message(k, a, "   \t\n").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidContent));

    let message = store.append_message(k, a, "  hi  ").await.unwrap();
    assert_eq!(message.content, "hi");
}

#[tokio::test]
async fn pagination_is_disjoint_and_covers_the_full_history() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;
    let b = seed_user(&auth, "bob").await;
    let k = store.create_conversation(&[a, b]).await.unwrap().id;

    for i in 0..5 {
        store.append_message(k, a, &format!("m{i}")).await.unwrap();
    }

    let full = store.list_messages(k, a, 100, 0).await.unwrap();
    assert_eq!(full.len(), 5);

    let mut paged = Vec::new();
    for offset in [0, 2, 4] {
        let page = store.list_messages(k, a, 2, offset).await.unwrap();
        for message in &page {
            assert!(
                !paged.iter().any(|m: &forum_chat_core::domain::Message| m.id == message.id),
                "page overlap at offset {offset}"
            );
        }
        paged.extend(page);
    }
    let full_ids: Vec<i64> = full.iter().map(|m| m.id).collect();
    let paged_ids: Vec<i64> = paged.iter().map(|m| m.id).collect();
    assert_eq!(full_ids, paged_ids);

    // Offset past the end is an empty page, not an error.
    assert!(store.list_messages(k, a, 2, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_appends_keep_timestamps_non_decreasing() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;
    let b = seed_user(&auth, "bob").await;
    let k = store.create_conversation(&[a, b]).await.unwrap().id;

    let mut tasks = Vec::new();
    for task in 0..10 {
        let store = store.clone();
        let sender = if task % 2 == 0 { a } else { b };
        tasks.push(tokio::spawn(async move {
            for i in 0..10 {
                store
                    .append_message(k, sender, &format!("task {task} msg {i}"))
                    .await
                    .expect("append should succeed");
            }
        }));
    }
    for task in tasks {
        task.await.expect("task panicked");
    }

    let messages = store.list_messages(k, a, 1000, 0).await.unwrap();
    assert_eq!(messages.len(), 100);
    for pair in messages.windows(2) {
        assert!(
            pair[0].sent_at <= pair[1].sent_at,
            "timestamps must be non-decreasing in listing order"
        );
        assert!(pair[0].id < pair[1].id);
    }
}

#[tokio::test]
async fn listings_put_recently_active_conversations_first() {
    let (store, auth) = open_store().await;
    let a = seed_user(&auth, "alice").await;
    let b = seed_user(&auth, "bob").await;
    let c = seed_user(&auth, "carol").await;

    let quiet = store.create_conversation(&[a, b]).await.unwrap().id;
    let busy = store.create_conversation(&[a, c]).await.unwrap().id;
    store.append_message(busy, c, "ping").await.unwrap();

    let summaries = store.conversations_for_user(a).await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].id, busy);
    assert_eq!(summaries[0].unread, 1);
    assert!(summaries[0].last_message_at.is_some());
    // Conversations with no messages sort last.
    assert_eq!(summaries[1].id, quiet);
    assert!(summaries[1].last_message_at.is_none());

    // B is not in the busy conversation at all.
    let summaries = store.conversations_for_user(b).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, quiet);
}
