use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::ConnectParams,
    services::session::{Flow, Session},
    state::{
        SharedState,
        room::{OUTBOUND_CAPACITY, Outbound},
    },
};

/// Handle the full lifecycle of one game WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, params: ConnectParams) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);

    // Dedicated writer task keeps outbound frames flowing while the room and
    // its tick loop push into the channel without awaiting the network.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let mut session = Session::new(state, params, Outbound::new(outbound_tx.clone()));
    let id = session.id();
    info!(connection = %id, "game connection opened");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if session.handle_text(text.as_str()).await == Flow::Close {
                    let _ = outbound_tx.try_send(Message::Close(None));
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.try_send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(connection = %id, "client closed the connection");
                let _ = outbound_tx.try_send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                debug!(connection = %id, "dropping binary frame");
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %id, error = %err, "websocket error");
                break;
            }
        }
    }

    let room = session
        .room_code()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".into());
    session.close().await;
    info!(connection = %id, %room, "game connection closed");

    // The session owns a sender too; it must be gone before the writer can drain.
    drop(session);
    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::Sender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
