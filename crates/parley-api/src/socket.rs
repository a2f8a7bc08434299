//! WebSocket transport for one voice session.
//!
//! Binary frames carry push-to-talk audio, text frames carry JSON client
//! actions, and every [`SessionEvent`] is pushed back as a JSON text frame.
//! A connection without a usable account is closed with policy code 1008.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use parley_chat::{ChatError, ClientAction, Session, SessionEvent};

use crate::state::AppState;

pub const NO_SERVICE_REASON: &str = "No service connected";

/// Run one session over `socket` until the client goes away.
pub async fn serve(socket: WebSocket, state: AppState) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let deps = match state.sessions.connect(events_tx, state.audio.clone()) {
        Ok(deps) => deps,
        Err(e) => {
            warn!("Rejecting connection: {}", e);
            let (sink, _) = socket.split();
            close_with_policy(sink).await;
            return;
        }
    };

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(forward_events(events_rx, sink));

    let mut session = Session::new(deps);
    if let Err(e) = session.start().await {
        warn!("Session failed to start: {}", e);
        // Dropping the session closes the event channel and ends the writer.
        drop(session);
        if let Ok(sink) = writer.await {
            if matches!(e, ChatError::NoCredentials(_)) {
                close_with_policy(sink).await;
            }
        }
        return;
    }

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(audio)) => session.handle_audio(&audio).await,
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientAction>(text.as_str()) {
                Ok(action) => session.handle_action(action).await,
                Err(e) => debug!("Ignoring malformed client action: {}", e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket receive failed: {}", e);
                break;
            }
        }
    }

    info!("Client disconnected");
    session.stop().await;
    drop(session);
    if let Ok(mut sink) = writer.await {
        let _ = sink.close().await;
    }
}

/// Forward session events to the client until every sender is gone.
/// Returns the sink so the caller can close it properly.
async fn forward_events(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    mut sink: SplitSink<WebSocket, Message>,
) -> SplitSink<WebSocket, Message> {
    while let Some(event) = events.recv().await {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode session event: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(payload.into())).await.is_err() {
            debug!("Client gone, dropping remaining events");
            break;
        }
    }
    sink
}

async fn close_with_policy(mut sink: SplitSink<WebSocket, Message>) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: NO_SERVICE_REASON.into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {}", e);
    }
}
