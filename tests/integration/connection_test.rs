//! Integration tests for connection lifecycle and group membership.

mod helpers;

use chatsync_core::error::{AppError, ErrorKind};
use chatsync_core::model::PresenceStatus;
use chatsync_core::types::id::{ConnectionId, ConversationId};
use chatsync_realtime::api::ApiCall;
use chatsync_realtime::connection::ConnectionStatus;

use helpers::{TestApp, eventually, settle};

#[tokio::test(start_paused = true)]
async fn test_start_connects_and_announces_observed_conversations() {
    let app = TestApp::new();
    let conversation = ConversationId::new();
    app.engine.observe_conversation(conversation).await.unwrap();
    assert!(app.api.calls().is_empty());

    app.engine.start().await.unwrap();
    settle().await;

    let state = app.engine.connection_state();
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert!(!state.is_reconnected);
    assert_eq!(app.api.listens_on(&ConnectionId::new("mem-1")), vec![conversation]);
    assert_eq!(app.engine.presence_of(&app.me.user_id), PresenceStatus::Online);
    assert_eq!(app.engine.metrics().connects, 1);

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_reannounces_each_conversation_once_with_new_id() {
    let app = TestApp::started().await;
    let a = ConversationId::new();
    let b = ConversationId::new();
    app.engine.observe_conversation(a).await.unwrap();
    app.engine.observe_conversation(b).await.unwrap();
    app.api.take_calls();

    app.session.set_token("token-2");
    assert!(app.hub.drop_link("network lost"));
    eventually("reconnected", || app.engine.connection_state().is_reconnected).await;
    settle().await;

    let calls = app.api.take_calls();
    let new_id = ConnectionId::new("mem-2");
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| matches!(
        call,
        ApiCall::Listen { connection_id, .. } if *connection_id == new_id
    )));
    let mut announced: Vec<ConversationId> = calls
        .iter()
        .filter_map(|call| match call {
            ApiCall::Listen {
                conversation_id, ..
            } => Some(*conversation_id),
            _ => None,
        })
        .collect();
    announced.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(announced, expected);

    assert_eq!(app.hub.tokens_seen(), vec!["token-1", "token-2"]);
    assert_eq!(app.engine.connection_state().connection_id, Some(new_id));
    assert_eq!(app.engine.presence_of(&app.me.user_id), PresenceStatus::Online);
    assert_eq!(app.engine.metrics().reconnects, 1);

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_reconnect_goes_offline() {
    let app = TestApp::with_retry_delays(vec![0, 500]);
    app.engine.start().await.unwrap();
    settle().await;

    app.hub.fail_next_handshake(AppError::transport("refused"));
    app.hub.fail_next_handshake(AppError::transport("refused"));
    app.hub.drop_link("network lost");

    eventually("terminal disconnect", || {
        app.engine.metrics().terminal_disconnects == 1
    })
    .await;
    settle().await;

    assert_eq!(app.engine.connection_state().status, ConnectionStatus::Disconnected);
    assert_eq!(app.engine.presence_of(&app.me.user_id), PresenceStatus::Offline);

    // Memberships wait for the next connection.
    let conversation = ConversationId::new();
    app.engine.observe_conversation(conversation).await.unwrap();
    assert!(app.api.calls().is_empty());

    app.engine.connect().await.unwrap();
    settle().await;
    assert_eq!(app.api.listens_on(&ConnectionId::new("mem-2")), vec![conversation]);

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_token_leaves_engine_not_connected() {
    let app = TestApp::new();
    app.session.set_token("");

    app.engine.start().await.unwrap();
    settle().await;

    assert_eq!(app.engine.connection_state().status, ConnectionStatus::Disconnected);
    assert_eq!(app.hub.handshake_attempts(), 0);

    let err = app.engine.connect().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);

    app.session.set_token("token-1");
    app.engine.connect().await.unwrap();
    assert!(app.engine.connection_state().is_connected());

    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_disconnects_and_engine_restarts() {
    let app = TestApp::started().await;
    let conversation = ConversationId::new();
    app.engine.observe_conversation(conversation).await.unwrap();

    app.engine.stop().await;

    assert_eq!(app.engine.connection_state().status, ConnectionStatus::Disconnected);
    assert!(!app.hub.has_open_link());
    assert_eq!(app.engine.presence_of(&app.me.user_id), PresenceStatus::Offline);

    app.engine.start().await.unwrap();
    settle().await;
    assert!(app.engine.connection_state().is_connected());
    assert_eq!(app.api.listens_on(&ConnectionId::new("mem-2")), vec![conversation]);

    app.engine.stop().await;
    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected() {
    let app = TestApp::started().await;
    let err = app.engine.start().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    app.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_disconnects_and_sign_in_reconnects() {
    let app = TestApp::started().await;
    assert!(app.engine.connection_state().is_connected());

    app.session.sign_out();
    eventually("disconnected after sign-out", || {
        app.engine.connection_state().status == ConnectionStatus::Disconnected
    })
    .await;

    app.session.sign_in(app.me.clone(), "token-3");
    eventually("connected after sign-in", || {
        app.engine.connection_state().is_connected()
    })
    .await;
    assert_eq!(app.hub.handshake_attempts(), 2);
    assert_eq!(app.hub.tokens_seen().last().map(String::as_str), Some("token-3"));

    app.engine.stop().await;
}
