//! WebSocket transport: one socket per client per group.
//!
//! On upgrade the connection subscribes to the group actor and forwards its
//! event stream verbatim; the first frame is always the snapshot. The
//! transport never interprets client frames beyond close/ping handling. A
//! failed send tears the subscription down and closes with 1011 so the
//! client reconnects and re-syncs from a fresh snapshot.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use engine::GroupHandle;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::routes::group_handle;

/// Close code sent when the transport cannot keep the client current.
const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// GET /groups/{id}/ws
pub async fn group_socket(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let handle = group_handle(&state, group_id).await?;
    Ok(ws.on_upgrade(move |socket| stream_events(socket, handle, group_id)))
}

async fn stream_events(socket: WebSocket, handle: GroupHandle, group_id: Uuid) {
    let (subscriber_id, mut events) = match handle.subscribe().await {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(group_id = %group_id, error = %err, "subscription failed");
            return;
        }
    };
    debug!(group_id = %group_id, subscriber_id = %subscriber_id, "subscriber attached");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(group_id = %group_id, error = %err, "event serialization failed");
                        continue;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CLOSE_INTERNAL_ERROR,
                            reason: "send failure".into(),
                        })))
                        .await;
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    // Inbound frames carry no protocol; only the close
                    // matters.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    handle.unsubscribe(subscriber_id).await;
    debug!(group_id = %group_id, subscriber_id = %subscriber_id, "subscriber detached");
}
