//! Integration tests for the WebSocket transport, against a live listener.
//!
//! The suites bind the app to an ephemeral port, attach a real WebSocket
//! client, and drive mutations through the group handle so the event stream
//! can be observed end to end.

mod common;

use std::time::Duration;

use common::*;
use domain::participant::NewParticipant;
use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

async fn serve(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("ws://{addr}")
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn next_json(socket: &mut WsStream) -> serde_json::Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("frame must be JSON");
        }
    }
}

fn new_participant(name: &str) -> NewParticipant {
    NewParticipant {
        name: name.to_string(),
        email_id: None,
        manager: false,
    }
}

#[tokio::test]
async fn test_snapshot_comes_first_then_versioned_tail() {
    let app = create_test_app();
    let (group_id, _) = create_group(&app, "Friday Squad").await;
    let base = serve(&app).await;

    let (mut socket, _) = connect_async(format!("{base}/groups/{group_id}/ws"))
        .await
        .expect("connect");

    let snapshot = next_json(&mut socket).await;
    assert_eq!(snapshot["type"], "snapshot");
    assert_eq!(snapshot["groupId"], group_id.to_string());
    assert_eq!(snapshot["payload"]["group"]["name"], "Friday Squad");
    assert_eq!(
        snapshot["payload"]["participants"].as_array().unwrap().len(),
        1
    );
    let snapshot_version = snapshot["version"].as_u64().unwrap();

    // mutate through the actor; the socket sees the tail in order
    let handle = app.registry.get(group_id).await.unwrap();
    handle.add_participant(new_participant("Ada")).await.unwrap();
    handle.rename("Renamed".to_string()).await.unwrap();

    let added = next_json(&mut socket).await;
    assert_eq!(added["type"], "participant.added");
    assert!(added["version"].as_u64().unwrap() > snapshot_version);

    let renamed = next_json(&mut socket).await;
    assert_eq!(renamed["type"], "group.updated");
    assert!(renamed["version"].as_u64().unwrap() > added["version"].as_u64().unwrap());
    assert_eq!(renamed["payload"]["group"]["name"], "Renamed");
}

#[tokio::test]
async fn test_unknown_group_rejects_upgrade() {
    let app = create_test_app();
    let base = serve(&app).await;

    let result = connect_async(format!("{base}/groups/{}/ws", Uuid::new_v4())).await;
    assert!(result.is_err(), "upgrade should fail for unknown group");
}

#[tokio::test]
async fn test_spin_events_reach_all_subscribers_in_order() {
    let app = create_test_app();
    let (group_id, _) = create_group(&app, "Friday Squad").await;
    let base = serve(&app).await;

    let handle = app.registry.get(group_id).await.unwrap();
    handle.add_participant(new_participant("Ada")).await.unwrap();
    handle.add_participant(new_participant("Ben")).await.unwrap();

    let (mut first, _) = connect_async(format!("{base}/groups/{group_id}/ws"))
        .await
        .expect("connect");
    let (mut second, _) = connect_async(format!("{base}/groups/{group_id}/ws"))
        .await
        .expect("connect");
    assert_eq!(next_json(&mut first).await["type"], "snapshot");
    assert_eq!(next_json(&mut second).await["type"], "snapshot");

    let spin = handle.request_spin().await.unwrap();
    let spin_id = spin.spin_id.unwrap().to_string();

    for socket in [&mut first, &mut second] {
        let started = next_json(socket).await;
        assert_eq!(started["type"], "spin.started");
        assert_eq!(started["payload"]["spin"]["spinId"], spin_id);
        assert_eq!(started["payload"]["spin"]["status"], "spinning");

        let resolved = next_json(socket).await;
        assert_eq!(resolved["type"], "spin.resolved");
        assert_eq!(resolved["payload"]["spin"]["status"], "idle");

        // first spin: the two losers moved, sharing the resolve version
        for _ in 0..2 {
            let updated = next_json(socket).await;
            assert_eq!(updated["type"], "participant.updated");
            assert_eq!(updated["version"], resolved["version"]);
        }
    }
}

#[tokio::test]
async fn test_mid_spin_connect_sees_spinning_snapshot() {
    let app = create_test_app();
    let (group_id, _) = create_group(&app, "Friday Squad").await;
    let base = serve(&app).await;

    let handle = app.registry.get(group_id).await.unwrap();
    handle.add_participant(new_participant("Ada")).await.unwrap();
    let spin = handle.request_spin().await.unwrap();

    let (mut socket, _) = connect_async(format!("{base}/groups/{group_id}/ws"))
        .await
        .expect("connect");
    let snapshot = next_json(&mut socket).await;
    assert_eq!(snapshot["type"], "snapshot");
    assert_eq!(snapshot["payload"]["spin"]["status"], "spinning");
    assert_eq!(
        snapshot["payload"]["spin"]["spinId"],
        spin.spin_id.unwrap().to_string()
    );

    // exactly one resolve for that spin follows
    let resolved = loop {
        let event = next_json(&mut socket).await;
        if event["type"] == "spin.resolved" {
            break event;
        }
    };
    assert_eq!(
        resolved["payload"]["spin"]["spinId"],
        spin.spin_id.unwrap().to_string()
    );
}

#[tokio::test]
async fn test_discard_emits_reverts_then_dismissal() {
    let app = create_test_app();
    let (group_id, _) = create_group(&app, "Friday Squad").await;
    let base = serve(&app).await;

    let handle = app.registry.get(group_id).await.unwrap();
    handle.add_participant(new_participant("Ada")).await.unwrap();

    let (mut socket, _) = connect_async(format!("{base}/groups/{group_id}/ws"))
        .await
        .expect("connect");
    assert_eq!(next_json(&mut socket).await["type"], "snapshot");

    let spin = handle.request_spin().await.unwrap();
    let spin_id = spin.spin_id.unwrap();

    // drain started, resolved, and the loser's counter update
    assert_eq!(next_json(&mut socket).await["type"], "spin.started");
    assert_eq!(next_json(&mut socket).await["type"], "spin.resolved");
    assert_eq!(next_json(&mut socket).await["type"], "participant.updated");

    handle.discard_spin(spin_id).await.unwrap();

    // the loser's revert, then the dismissal
    let revert = next_json(&mut socket).await;
    assert_eq!(revert["type"], "participant.updated");
    assert_eq!(revert["payload"]["participant"]["spinsSinceLastWon"], 0);
    let dismissed = next_json(&mut socket).await;
    assert_eq!(dismissed["type"], "spin.result.dismissed");
    assert_eq!(dismissed["payload"]["action"], "discard");
    assert_eq!(dismissed["payload"]["spinId"], spin_id.to_string());
}
