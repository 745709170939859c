//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::matchmaking::ConnectionId;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::Outbound;
use crate::ws::router::MessageRouter;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();

    let (conn_id, outbox_rx) = state.matchmaking.register_player();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let router = MessageRouter::new(state.matchmaking.clone());
    let rate_limiter = PlayerRateLimiter::new(state.config.input_rate_limit);

    run_session(conn_id, ws_sink, ws_stream, outbox_rx, router, rate_limiter).await;

    // Cleanup on disconnect
    state.matchmaking.unregister_player(conn_id).await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: ConnectionId,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut outbox_rx: mpsc::UnboundedReceiver<Outbound>,
    router: MessageRouter,
    rate_limiter: PlayerRateLimiter,
) {
    // Spawn writer task: outbox -> WebSocket, in queue order
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if let Err(e) = send_frame(&mut ws_sink, frame).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> router, one frame at a time
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited inbound message");
                    continue;
                }

                if let Err(e) = router.route(conn_id, &text).await {
                    warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send one outbound frame over WebSocket
async fn send_frame(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: Outbound,
) -> Result<(), String> {
    let json = frame.into_text().map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
