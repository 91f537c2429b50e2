use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use super::events::{ClientMessage, ServerMessage};
use super::registry::{ConnectionId, ConnectionRegistry};
use crate::models::message::SendMessageRequest;
use crate::services::conversation::room_key;
use crate::services::dispatcher::MessageDispatcher;
use crate::services::presence::bulk_online_status;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::parse_user_id;

/// Bridges authenticated websocket connections to the dispatcher and registry. The caller's
/// identity is always the one bound at handshake time.
pub struct Gateway {
    dispatcher: Arc<MessageDispatcher>,
}

impl Gateway {
    pub fn new(dispatcher: Arc<MessageDispatcher>) -> Self {
        Self { dispatcher }
    }

    fn registry(&self) -> &ConnectionRegistry {
        self.dispatcher.registry()
    }

    /// Registers a freshly authenticated connection and announces the user.
    pub async fn open(&self, user_id: &str) -> (ConnectionId, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = unbounded_channel();
        let connection_id = ConnectionId::new();

        self.registry().register(user_id, connection_id, tx).await;
        self.registry()
            .send_to_connection(
                connection_id,
                ServerMessage::Connected {
                    user_id: user_id.to_string(),
                },
            )
            .await;
        self.registry()
            .broadcast_all(ServerMessage::UserOnline {
                user_id: user_id.to_string(),
            })
            .await;

        tracing::info!("User {} connected on {}", user_id, connection_id);
        (connection_id, rx)
    }

    /// Drops the connection; announces the user offline only if no newer connection replaced it.
    pub async fn close(&self, user_id: &str, connection_id: ConnectionId) {
        let went_offline = self.registry().unregister(user_id, connection_id).await;
        if went_offline {
            self.registry()
                .broadcast_all(ServerMessage::UserOffline {
                    user_id: user_id.to_string(),
                })
                .await;
        }
        tracing::info!(
            "User {} disconnected from {} (offline={})",
            user_id,
            connection_id,
            went_offline
        );
    }

    pub async fn handle_connection(self: Arc<Self>, socket: WebSocket, user_id: String) {
        let (mut sender, mut receiver) = socket.split();
        let (connection_id, mut rx) = self.open(&user_id).await;

        let mut send_task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("Failed to encode outbound event: {}", e),
                }
            }
        });

        // Spawned so a dropped socket never cancels a send halfway through persistence.
        let gateway = self.clone();
        let recv_user_id = user_id.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        gateway
                            .handle_frame(connection_id, &recv_user_id, &text)
                            .await
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        // Whichever side finishes first ends the connection; the other must not outlive it.
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        self.close(&user_id, connection_id).await;
    }

    /// Handles one inbound text frame. Failures go back to this connection only.
    pub async fn handle_frame(&self, connection_id: ConnectionId, user_id: &str, text: &str) {
        let result = match ClientMessage::parse(text) {
            Ok(event) => self.handle_event(connection_id, user_id, event).await,
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            match err {
                AppError::Database(_) | AppError::Internal(_) => {
                    tracing::error!("Event from {} failed: {}", user_id, err)
                }
                _ => tracing::debug!("Event from {} rejected: {}", user_id, err),
            }
            self.registry()
                .send_to_connection(connection_id, ServerMessage::from(&err))
                .await;
        }
    }

    async fn handle_event(
        &self,
        connection_id: ConnectionId,
        user_id: &str,
        event: ClientMessage,
    ) -> AppResult<()> {
        match event {
            ClientMessage::SendMessage {
                recipient_id,
                content,
                application_id,
            } => {
                let request = SendMessageRequest {
                    recipient_id,
                    content,
                    application_id,
                };
                self.dispatcher
                    .send(user_id, request, Some(connection_id))
                    .await?;
            }
            ClientMessage::JoinConversation { other_user_id } => {
                let conversation_room = room_key(user_id, &parse_user_id(&other_user_id)?);
                self.registry()
                    .join_room(connection_id, &conversation_room)
                    .await;
                tracing::debug!(
                    "{} joined {} ({} connections)",
                    user_id,
                    conversation_room,
                    self.registry().room_size(&conversation_room).await
                );
                self.registry()
                    .send_to_connection(
                        connection_id,
                        ServerMessage::JoinedConversation { conversation_room },
                    )
                    .await;
            }
            ClientMessage::LeaveConversation { other_user_id } => {
                let conversation_room = room_key(user_id, &parse_user_id(&other_user_id)?);
                self.registry()
                    .leave_room(connection_id, &conversation_room)
                    .await;
                self.registry()
                    .send_to_connection(
                        connection_id,
                        ServerMessage::LeftConversation { conversation_room },
                    )
                    .await;
            }
            ClientMessage::Typing {
                other_user_id,
                is_typing,
            } => {
                let conversation_room = room_key(user_id, &parse_user_id(&other_user_id)?);
                self.registry()
                    .broadcast_room(
                        &conversation_room,
                        ServerMessage::UserTyping {
                            user_id: user_id.to_string(),
                            is_typing,
                        },
                    )
                    .await;
            }
            ClientMessage::MarkAsRead { message_id } => {
                let message = self.dispatcher.mark_read(&message_id, user_id).await?;
                self.registry()
                    .send_to_connection(
                        connection_id,
                        ServerMessage::MessageMarkedRead {
                            message_id: message.id,
                        },
                    )
                    .await;
            }
            ClientMessage::GetOnlineStatus { user_ids } => {
                let online_users = bulk_online_status(self.registry(), &user_ids).await;
                self.registry()
                    .send_to_connection(connection_id, ServerMessage::OnlineStatus { online_users })
                    .await;
            }
            ClientMessage::Heartbeat => {
                self.registry()
                    .send_to_connection(connection_id, ServerMessage::Pong)
                    .await;
            }
        }

        Ok(())
    }
}
