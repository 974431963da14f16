//! Websocket transport for hub subscribers
//!
//! Each connection gets a writer task that drains the subscriber's outbox in
//! order, while the upgrade task reads and discards inbound frames until the
//! peer closes. Either side ending unregisters the subscriber.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::hub::{Hub, Outbox};
use crate::routes::AppState;

/// Largest inbound message accepted from a client
pub const MAX_INBOUND_MESSAGE: usize = 512;

pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let hub = state.hub.clone();
    ws.max_message_size(MAX_INBOUND_MESSAGE)
        .on_upgrade(move |socket| serve_subscriber(socket, hub))
}

/// Run one subscriber connection to completion
pub async fn serve_subscriber(socket: WebSocket, hub: Hub) {
    let (handle, outbox) = match hub.register() {
        Ok(registration) => registration,
        Err(err) => {
            warn!(error = %err, "Rejecting websocket subscriber");
            return;
        }
    };
    let id = handle.id();
    info!(subscriber = %id, "Subscriber connected");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_frames(sink, outbox));

    discard_inbound(stream).await;
    handle.unregister();

    if let Err(err) = writer.await {
        warn!(subscriber = %id, error = %err, "Websocket writer task failed");
    }
    info!(subscriber = %id, "Subscriber disconnected");
}

async fn write_frames(mut sink: SplitSink<WebSocket, Message>, mut outbox: Outbox) {
    while let Some(frame) = outbox.recv().await {
        if let Err(err) = sink.send(Message::Text(frame)).await {
            debug!(error = %err, "Websocket write failed");
            return;
        }
    }

    // Outbox ended: unregistered or dropped for falling behind
    let _ = sink.send(Message::Close(None)).await;
}

async fn discard_inbound(mut stream: SplitStream<WebSocket>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "Websocket read failed");
                break;
            }
        }
    }
}
