//! services/studio/src/web/ws_handler.rs
//!
//! Streams generation progress to the browser over a WebSocket. The client
//! sends nothing; the connection lives until either side closes it.

use crate::web::{protocol::ServerMessage, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use pollen_pages_core::Progress;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New progress subscriber connected.");
    let (mut sender, mut receiver) = socket.split();
    let mut progress_rx = app_state.subscribe_progress();

    // The current snapshot first, so a late subscriber is not left blank.
    let snapshot = progress_rx.borrow_and_update().clone();
    if send_progress(&mut sender, snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = progress_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let progress = progress_rx.borrow_and_update().clone();
                if send_progress(&mut sender, progress).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => debug!("Ignoring client message on progress socket."),
                }
            }
        }
    }

    info!("Progress subscriber disconnected.");
}

async fn send_progress(
    sender: &mut SplitSink<WebSocket, Message>,
    progress: Progress,
) -> Result<(), axum::Error> {
    for msg in ServerMessage::from_progress(progress) {
        let json = serde_json::to_string(&msg).map_err(axum::Error::new)?;
        sender.send(Message::Text(json.into())).await?;
    }
    Ok(())
}
