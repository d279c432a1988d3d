//! Integration tests for presence, writing activity, and message
//! reconciliation through the running engine.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chatsync_core::events::{MessageEvent, PresenceEvent, WritingActivityEvent};
use chatsync_core::model::{PresenceStatus, WritingActivity};
use chatsync_core::traits::Identity;
use chatsync_core::types::id::{ConversationId, UserId};
use chatsync_realtime::reconcile::UpsertOutcome;

use helpers::{TestApp, eventually, message, writing};

#[tokio::test(start_paused = true)]
async fn test_remote_status_for_self_is_ignored() {
    let app = TestApp::started().await;
    let bob = UserId::new();

    app.push(PresenceEvent::UserStatusChanged {
        user_id: app.me.user_id,
        status: PresenceStatus::Offline,
    })
    .await;
    app.push(PresenceEvent::UserStatusChanged {
        user_id: bob,
        status: PresenceStatus::Inactive,
    })
    .await;

    assert_eq!(app.engine.presence_of(&app.me.user_id), PresenceStatus::Online);
    assert_eq!(app.engine.presence_of(&bob), PresenceStatus::Inactive);

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_message_push_is_idempotent() {
    let app = TestApp::started().await;
    let mut notifications = app.engine.notifications();
    let conversation = ConversationId::new();
    let m = message(conversation, UserId::new(), "hello");

    app.push(MessageEvent::NewMessage { message: m.clone() }).await;
    let first = app.engine.messages(conversation);
    app.push(MessageEvent::NewMessage { message: m.clone() }).await;
    let second = app.engine.messages(conversation);

    assert_eq!(second.len(), 1);
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert_eq!(*second[0], m);

    assert_eq!(notifications.try_recv().unwrap().message_id, m.id);
    assert!(notifications.try_recv().is_err());

    // A history fetch delivering the same message changes nothing either.
    assert_eq!(app.engine.ingest_message(m), UpsertOutcome::Unchanged);

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_focused_conversation_and_own_messages_do_not_notify() {
    let app = TestApp::started().await;
    let mut notifications = app.engine.notifications();
    let focused = ConversationId::new();
    app.engine.focus_conversation(Some(focused));

    app.push(MessageEvent::NewMessage {
        message: message(focused, UserId::new(), "seen already"),
    })
    .await;
    app.push(MessageEvent::NewMessage {
        message: message(ConversationId::new(), app.me.user_id, "mine"),
    })
    .await;

    assert!(notifications.try_recv().is_err());
    assert_eq!(app.engine.messages(focused).len(), 1);

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_writing_activity_keeps_latest() {
    let app = TestApp::started().await;
    let conversation = ConversationId::new();
    let bob = UserId::new();
    let indicator = app.engine.writing_indicator(conversation);
    let now = app.now_ms();

    app.push(WritingActivityEvent::ConversationWritingActivity {
        activity: writing(conversation, bob, "Bob", WritingActivity::IsWriting, now),
    })
    .await;
    app.push(WritingActivityEvent::ConversationWritingActivity {
        activity: writing(conversation, bob, "Bob", WritingActivity::StoppedWriting, now - 50),
    })
    .await;

    assert_eq!(*indicator.borrow(), "Bob is writing..");

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_silent_writer_ages_out_on_poll() {
    let app = TestApp::started().await;
    let conversation = ConversationId::new();
    let mut indicator = app.engine.writing_indicator(conversation);
    let now = app.now_ms();

    app.push(WritingActivityEvent::ConversationWritingActivity {
        activity: writing(conversation, UserId::new(), "Ann", WritingActivity::IsWriting, now),
    })
    .await;
    app.push(WritingActivityEvent::ConversationWritingActivity {
        activity: writing(conversation, UserId::new(), "Bob", WritingActivity::IsWriting, now),
    })
    .await;
    assert_eq!(*indicator.borrow_and_update(), "Ann, Bob are writing..");

    // No StoppedWriting ever arrives; only time passes.
    tokio::time::sleep(Duration::from_millis(9_000)).await;
    assert!(!indicator.has_changed().unwrap());

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert!(indicator.has_changed().unwrap());
    assert_eq!(*indicator.borrow_and_update(), "");

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_own_writing_is_not_displayed() {
    let app = TestApp::started().await;
    let conversation = ConversationId::new();
    let indicator = app.engine.writing_indicator(conversation);

    app.push(WritingActivityEvent::ConversationWritingActivity {
        activity: writing(
            conversation,
            app.me.user_id,
            "Me",
            WritingActivity::IsWriting,
            app.now_ms(),
        ),
    })
    .await;

    assert_eq!(*indicator.borrow(), "");
    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_local_typing_is_debounced_with_trailing_stop() {
    let app = TestApp::started().await;
    let conversation = ConversationId::new();

    for i in 1..=10 {
        app.engine
            .local_input(conversation, "x".repeat(i))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(
        app.api.writing_broadcasts(),
        vec![(conversation, WritingActivity::IsWriting)]
    );

    // Last keystroke was ~100 ms ago; the stop fires 10 s after it.
    tokio::time::sleep(Duration::from_millis(9_800)).await;
    assert_eq!(app.api.writing_broadcasts().len(), 1);

    tokio::time::sleep(Duration::from_millis(15_000)).await;
    assert_eq!(
        app.api.writing_broadcasts(),
        vec![
            (conversation, WritingActivity::IsWriting),
            (conversation, WritingActivity::StoppedWriting),
        ]
    );
    assert_eq!(app.engine.metrics().writing_broadcasts, 2);

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_identity_change_resets_per_user_state() {
    let app = TestApp::started().await;
    let conversation = ConversationId::new();
    let bob = UserId::new();

    app.push(MessageEvent::NewMessage {
        message: message(conversation, bob, "hi"),
    })
    .await;
    app.push(PresenceEvent::UserStatusChanged {
        user_id: bob,
        status: PresenceStatus::Online,
    })
    .await;
    assert_eq!(app.engine.messages(conversation).len(), 1);

    let other = Identity {
        user_id: UserId::new(),
        display_name: "Other".to_string(),
    };
    app.session.sign_in(other.clone(), "token-other");
    eventually("connected as the new user", || {
        app.hub.handshake_attempts() == 2
            && app.engine.connection_state().is_connected()
            && app.engine.presence_of(&other.user_id) == PresenceStatus::Online
    })
    .await;

    assert!(app.engine.messages(conversation).is_empty());
    assert_eq!(app.engine.presence_of(&bob), PresenceStatus::Offline);
    assert_eq!(app.engine.presence_of(&other.user_id), PresenceStatus::Online);
    assert_eq!(app.hub.tokens_seen().last().map(String::as_str), Some("token-other"));

    app.engine.stop().await;
}
