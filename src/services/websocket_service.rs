//! WebSocket connection lifecycle and message dispatch.
//!
//! One task per connection reads intents; a dedicated writer task drains the
//! outbound channel so broadcasts from other tasks never block on this
//! socket. Malformed or unknown envelopes are dropped without a reply;
//! recognized intents that fail map onto `room:error` (or `room:sync` for
//! stale-progress rejections).

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::RoomError,
    services::{battle_service, events, room_service, session_registry, sync},
    state::{SessionHandle, SharedState, room::ClientId},
};

/// Handle the full lifecycle for an individual game WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let client_id: ClientId = Uuid::new_v4();
    state.sessions().insert(
        client_id,
        SessionHandle {
            tx: outbound_tx.clone(),
            room: None,
        },
    );
    events::send_message_to_websocket(&outbound_tx, &ServerMessage::Hello { client_id }, "hello");
    info!(%client_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let inbound = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(inbound) => inbound,
                    Err(err) => {
                        debug!(%client_id, error = %err, "discarding malformed message");
                        continue;
                    }
                };

                if let Err(err) = dispatch(&state, client_id, inbound).await {
                    let reply = match err {
                        RoomError::StaleProgress {
                            problem_index,
                            target_index,
                            seed,
                        } => ServerMessage::Sync {
                            problem_index,
                            target_index,
                            seed,
                        },
                        other => ServerMessage::Error {
                            message: other.to_string(),
                        },
                    };
                    events::send_message_to_websocket(&outbound_tx, &reply, "error reply");
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(%client_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%client_id, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::handle_disconnect(&state, client_id).await;
    info!(%client_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Route one parsed intent to the owning service.
async fn dispatch(
    state: &SharedState,
    client_id: ClientId,
    message: ClientMessage,
) -> Result<(), RoomError> {
    match message {
        ClientMessage::CreateRoom {
            name,
            display_name,
            password,
            mode,
            settings,
        } => {
            room_service::create_room(state, client_id, name, display_name, password, mode, settings)
                .await?;
            Ok(())
        }
        ClientMessage::JoinRoom {
            room_id,
            name,
            password,
            spectate,
        } => {
            room_service::join_room(state, client_id, &room_id, name, password, spectate).await?;
            Ok(())
        }
        ClientMessage::LeaveRoom => room_service::leave_room(state, client_id).await,
        ClientMessage::Reconnect { token } => {
            if state.session_room(client_id).is_some() {
                return Err(RoomError::AlreadyInRoom);
            }
            session_registry::reconnect(state, &token, client_id).await?;
            Ok(())
        }
        ClientMessage::ListRooms => {
            let rooms = room_service::list_public_rooms(state).await;
            events::send_to_client(
                state,
                client_id,
                &ServerMessage::RoomList { rooms },
                "room list",
            );
            Ok(())
        }
        ClientMessage::UpdateSettings { mode, settings } => {
            room_service::update_settings(state, client_id, mode, settings).await
        }
        ClientMessage::Lock { locked } => room_service::toggle_lock(state, client_id, locked).await,
        ClientMessage::Start => {
            let room = state
                .session_room(client_id)
                .and_then(|code| state.room(&code))
                .ok_or(RoomError::RoomNotFound)?;
            battle_service::start_match(state, &room, client_id).await
        }
        ClientMessage::Chat { text } => room_service::post_chat(state, client_id, text).await,
        ClientMessage::Kick { player_id } => room_service::kick(state, client_id, player_id).await,
        ClientMessage::Promote { player_id } => {
            room_service::promote(state, client_id, player_id).await
        }
        ClientMessage::Score {
            score,
            dimension,
            solve_seconds,
            problem_index,
        } => {
            // Scores race with leaves and reconnects; a submission from a
            // connection with no room is dropped rather than answered.
            let Some(room) = state
                .session_room(client_id)
                .and_then(|code| state.room(&code))
            else {
                debug!(%client_id, "ignoring score submission with no room binding");
                return Ok(());
            };
            let mut inner = room.lock().await;
            let accepted =
                sync::apply_score_submission(&mut inner, client_id, score, problem_index)?;
            if let Some(accepted) = accepted {
                debug!(
                    %client_id,
                    score = accepted.score,
                    dimension,
                    solve_seconds,
                    "score accepted"
                );
            }
            Ok(())
        }
        ClientMessage::Unknown => {
            debug!(%client_id, "discarding message of unknown type");
            Ok(())
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
