//! End-to-end gateway tests
//!
//! Drives the full stack over real websocket clients: handshake, send,
//! fan-out, receipts, and presence.

mod common;

use common::{assert_silent, connect, connect_raw, expect_close_code, recv_event, spawn_server};
use futures_util::SinkExt;
use pingme_core::UserId;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

const ALICE: UserId = UserId::new(1);
const BOB: UserId = UserId::new(2);
const CAROL: UserId = UserId::new(3);

async fn send_text(ws: &mut common::WsClient, text: &str) {
    ws.send(Message::Text(text.to_string())).await.expect("send");
}

#[tokio::test]
async fn rejects_connection_without_token() {
    let server = spawn_server().await;

    let mut ws = connect_raw(&server, None).await;
    expect_close_code(&mut ws, 4004).await;
}

#[tokio::test]
async fn rejects_connection_with_invalid_token() {
    let server = spawn_server().await;

    let mut ws = connect_raw(&server, Some("not-a-real-token")).await;
    expect_close_code(&mut ws, 4004).await;
}

#[tokio::test]
async fn delivers_message_to_recipient_and_acks_sender() {
    let server = spawn_server().await;
    let conv = server.store.add_conversation(&[ALICE, BOB]);

    let mut alice = connect(&server, ALICE).await;
    let mut bob = connect(&server, BOB).await;

    send_text(
        &mut alice,
        &format!(r#"{{"type":"message","conversation_id":{conv},"content":"hello"}}"#),
    )
    .await;

    let pushed = recv_event(&mut bob).await;
    assert_eq!(pushed["type"], "chat_message");
    assert_eq!(pushed["payload"]["id"], 1);
    assert_eq!(pushed["payload"]["content"], "hello");
    assert_eq!(pushed["payload"]["sender_id"], 1);

    let ack = recv_event(&mut alice).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["payload"]["id"], 1);
    assert_eq!(ack["payload"]["content"], "hello");

    // The sender gets the ack and nothing else - no duplicate push
    assert_silent(&mut alice, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn offline_recipient_does_not_fail_the_send() {
    let server = spawn_server().await;
    let conv = server.store.add_conversation(&[ALICE, BOB]);

    // Bob never connects
    let mut alice = connect(&server, ALICE).await;

    send_text(
        &mut alice,
        &format!(r#"{{"type":"message","conversation_id":{conv},"content":"hi"}}"#),
    )
    .await;

    let ack = recv_event(&mut alice).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["payload"]["id"], 1);

    // No error follows the ack
    assert_silent(&mut alice, Duration::from_millis(200)).await;
    assert_eq!(server.store.message_count(conv), 1);
}

#[tokio::test]
async fn forbidden_send_reaches_nobody() {
    let server = spawn_server().await;
    let conv = server.store.add_conversation(&[BOB, CAROL]);

    let mut alice = connect(&server, ALICE).await;
    let mut bob = connect(&server, BOB).await;

    send_text(
        &mut alice,
        &format!(r#"{{"type":"message","conversation_id":{conv},"content":"intruding"}}"#),
    )
    .await;

    let error = recv_event(&mut alice).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["payload"]["code"], "FORBIDDEN");

    assert_silent(&mut bob, Duration::from_millis(200)).await;
    assert_eq!(server.store.message_count(conv), 0);
}

#[tokio::test]
async fn unknown_conversation_reports_not_found() {
    let server = spawn_server().await;

    let mut alice = connect(&server, ALICE).await;
    send_text(
        &mut alice,
        r#"{"type":"message","conversation_id":999,"content":"hi"}"#,
    )
    .await;

    let error = recv_event(&mut alice).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["payload"]["code"], "UNKNOWN_CONVERSATION");
}

#[tokio::test]
async fn decode_error_keeps_the_connection_open() {
    let server = spawn_server().await;
    let conv = server.store.add_conversation(&[ALICE, BOB]);

    let mut alice = connect(&server, ALICE).await;

    send_text(&mut alice, "this is not json").await;
    let error = recv_event(&mut alice).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["payload"]["code"], "DECODE_ERROR");

    // Unknown event tags are rejected, not silently ignored
    send_text(
        &mut alice,
        &format!(r#"{{"type":"subscribe","conversation_id":{conv}}}"#),
    )
    .await;
    let error = recv_event(&mut alice).await;
    assert_eq!(error["payload"]["code"], "DECODE_ERROR");

    // The same connection still works afterwards
    send_text(
        &mut alice,
        &format!(r#"{{"type":"message","conversation_id":{conv},"content":"still here"}}"#),
    )
    .await;
    let ack = recv_event(&mut alice).await;
    assert_eq!(ack["type"], "ack");
}

#[tokio::test]
async fn multi_device_recipient_gets_one_push_per_handle() {
    let server = spawn_server().await;
    let conv = server.store.add_conversation(&[ALICE, BOB]);

    let mut alice = connect(&server, ALICE).await;
    let mut bob_phone = connect(&server, BOB).await;
    let mut bob_laptop = connect(&server, BOB).await;

    send_text(
        &mut alice,
        &format!(r#"{{"type":"message","conversation_id":{conv},"content":"ping"}}"#),
    )
    .await;

    for bob in [&mut bob_phone, &mut bob_laptop] {
        let pushed = recv_event(bob).await;
        assert_eq!(pushed["type"], "chat_message");
        assert_silent(bob, Duration::from_millis(200)).await;
    }
}

#[tokio::test]
async fn typing_and_read_receipts_fan_out() {
    let server = spawn_server().await;
    let conv = server.store.add_conversation(&[ALICE, BOB]);

    let mut alice = connect(&server, ALICE).await;
    let mut bob = connect(&server, BOB).await;

    send_text(
        &mut alice,
        &format!(r#"{{"type":"message","conversation_id":{conv},"content":"unread"}}"#),
    )
    .await;
    assert_eq!(recv_event(&mut bob).await["type"], "chat_message");
    assert_eq!(recv_event(&mut alice).await["type"], "ack");

    send_text(
        &mut bob,
        &format!(r#"{{"type":"typing","conversation_id":{conv}}}"#),
    )
    .await;
    let typing = recv_event(&mut alice).await;
    assert_eq!(typing["type"], "typing");
    assert_eq!(typing["payload"]["user_id"], 2);

    send_text(
        &mut bob,
        &format!(r#"{{"type":"read_receipt","conversation_id":{conv},"message_id":1}}"#),
    )
    .await;
    let receipt = recv_event(&mut alice).await;
    assert_eq!(receipt["type"], "read_receipt");
    assert_eq!(receipt["payload"]["message_id"], 1);
    assert_eq!(receipt["payload"]["reader_id"], 2);

    let stored = server
        .store
        .message(conv, pingme_core::MessageId::new(1))
        .expect("message persisted");
    assert!(stored.is_read);
}

#[tokio::test]
async fn fan_out_survives_sender_disconnecting_right_after_send() {
    let server = spawn_server().await;
    let conv = server.store.add_conversation(&[ALICE, BOB]);

    let mut alice = connect(&server, ALICE).await;
    let mut bob = connect(&server, BOB).await;

    send_text(
        &mut alice,
        &format!(r#"{{"type":"message","conversation_id":{conv},"content":"parting words"}}"#),
    )
    .await;
    alice.close(None).await.expect("close");
    drop(alice);

    // Bob may observe Alice's presence change first, but the message
    // delivery must still complete
    loop {
        let event = recv_event(&mut bob).await;
        if event["type"] == "chat_message" {
            assert_eq!(event["payload"]["content"], "parting words");
            break;
        }
        assert_eq!(event["type"], "presence");
    }
    assert_eq!(server.store.message_count(conv), 1);
}

#[tokio::test]
async fn disconnect_broadcasts_presence_to_conversation_peers() {
    let server = spawn_server().await;
    let conv = server.store.add_conversation(&[ALICE, BOB]);

    let mut alice = connect(&server, ALICE).await;
    let mut bob = connect(&server, BOB).await;

    // Routing a message warms the directory cache that the presence
    // broadcast policy consults
    send_text(
        &mut alice,
        &format!(r#"{{"type":"message","conversation_id":{conv},"content":"hi"}}"#),
    )
    .await;
    assert_eq!(recv_event(&mut bob).await["type"], "chat_message");
    assert_eq!(recv_event(&mut alice).await["type"], "ack");

    bob.close(None).await.expect("close");

    let presence = recv_event(&mut alice).await;
    assert_eq!(presence["type"], "presence");
    assert_eq!(presence["payload"]["user_id"], 2);
    assert_eq!(presence["payload"]["is_online"], false);
    assert!(presence["payload"]["last_seen"].is_string());

    // Last-seen lands in the store best-effort
    let mut persisted = server.store.last_seen(BOB);
    for _ in 0..50 {
        if persisted.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        persisted = server.store.last_seen(BOB);
    }
    assert!(persisted.is_some());
}
