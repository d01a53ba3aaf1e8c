//! Manages the WebSocket connection lifecycle for one learner's session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use jedi_core::enrichment::EnrichmentReport;
use jedi_core::{Controller, LoadOutcome};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tracing::{Instrument, debug, error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Each connection owns a fresh `Controller`; nothing is shared between
/// learners except the collaborator services.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id: u32 = rand::random();
    tracing::Span::current().record("session_id", session_id);
    info!("New WebSocket connection.");

    let (socket_tx, socket_rx) = socket.split();
    if let Err(e) = run_session(state.controller(), socket_tx, socket_rx).await {
        error!(error = ?e, "Session terminated with error.");
    }
    info!("WebSocket session finished.");
}

/// Forwards client operations to the controller and state changes back to
/// the client until either side goes away.
///
/// Every operation runs on its own task so a slow quiz or answer never
/// blocks a newer request that supersedes it.
async fn run_session(
    controller: Controller,
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let mut updates = controller.subscribe();
    let (error_tx, mut error_rx) = mpsc::channel::<String>(16);
    let mut operations = JoinSet::new();
    let mut enrichment: Option<JoinHandle<EnrichmentReport>> = None;

    let initial = updates.borrow_and_update().clone();
    send_msg(&mut socket_tx, ServerMessage::StateUpdate { state: initial }).await?;

    loop {
        tokio::select! {
            incoming = socket_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        debug!(?msg, "Client operation");
                        operations.spawn(
                            dispatch(controller.clone(), msg, error_tx.clone()).in_current_span(),
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "Unparseable client message");
                        send_msg(&mut socket_tx, ServerMessage::Error {
                            message: format!("Invalid message: {e}"),
                        })
                        .await?;
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client closed the connection.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Error receiving from client WebSocket: {:?}", e);
                    break;
                }
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                send_msg(&mut socket_tx, ServerMessage::StateUpdate { state }).await?;
            },
            Some(message) = error_rx.recv() => {
                send_msg(&mut socket_tx, ServerMessage::Error { message }).await?;
            },
            Some(finished) = operations.join_next() => match finished {
                Ok(Some(handle)) => enrichment = Some(handle),
                Ok(None) => {}
                Err(e) => error!(error = ?e, "Client operation panicked"),
            },
        }
    }

    stop_background_work(&mut operations, enrichment.take());
    Ok(())
}

/// Aborts in-flight operations and every enrichment task they started,
/// including ones whose handle was never collected by the session loop.
fn stop_background_work(
    operations: &mut JoinSet<Option<JoinHandle<EnrichmentReport>>>,
    enrichment: Option<JoinHandle<EnrichmentReport>>,
) {
    // Enrichment runs detached from the operation that started it.
    if let Some(handle) = enrichment {
        handle.abort();
    }
    while let Some(finished) = operations.try_join_next() {
        if let Ok(Some(handle)) = finished {
            handle.abort();
        }
    }
    operations.abort_all();
}

/// Applies one client operation. Returns the enrichment task when a new
/// learning path was stored.
async fn dispatch(
    controller: Controller,
    msg: ClientMessage,
    errors: mpsc::Sender<String>,
) -> Option<JoinHandle<EnrichmentReport>> {
    let result = match msg {
        ClientMessage::LoadPath { topic } => match controller.load_path(&topic).await {
            Ok(LoadOutcome::Loaded(handle)) => Ok(Some(handle)),
            Ok(LoadOutcome::Superseded) => Ok(None),
            Err(e) => Err(e.to_string()),
        },
        ClientMessage::ToggleCompletion { subtopic } => controller
            .toggle_completion(&subtopic)
            .await
            .map(|_| None)
            .map_err(|e| e.to_string()),
        ClientMessage::OpenQuiz { subtopic } => {
            controller.open_quiz(&subtopic).await;
            Ok(None)
        }
        ClientMessage::CloseQuiz => {
            controller.close_quiz().await;
            Ok(None)
        }
        ClientMessage::SelectAnswer {
            question_index,
            option,
        } => controller
            .select_answer(question_index, &option)
            .await
            .map(|()| None)
            .map_err(|e| e.to_string()),
        ClientMessage::Ask { question } => controller
            .ask(&question)
            .await
            .map(|()| None)
            .map_err(|e| e.to_string()),
    };

    match result {
        Ok(handle) => handle,
        Err(message) => {
            warn!(%message, "Client operation rejected");
            let _ = errors.send(message).await;
            None
        }
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
